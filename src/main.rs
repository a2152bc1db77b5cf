use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weft_core::config::EditorConfig;
use weft_core::event::EventBus;
use weft_core::schema::BuiltinSchemas;
use weft_core::traits::SchemaRegistry;
use weft_core::types::{EditorEvent, TabId, TeleportDirection};

use weft_graph::{
    check_document, FileSyncReconciler, LocalFileService, SyncDriver, Workflow, WorkflowDocument,
};

#[derive(Parser)]
#[command(name = "weft", version, about = "Workflow graph editing engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml", env = "WEFT_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow document: edges, dangling references, name conflicts
    Check {
        /// Workflow document (JSON)
        doc: PathBuf,
    },
    /// Show teleporter links across documents, one tab per document
    Links {
        /// Workflow documents (JSON)
        #[arg(required = true)]
        docs: Vec<PathBuf>,
    },
    /// Sync file-backed nodes of a document with their files on disk
    Watch {
        /// Workflow document (JSON)
        doc: PathBuf,
        /// Project directory file paths resolve against
        #[arg(long)]
        project: Option<PathBuf>,
        /// Write the synced document back on exit
        #[arg(long)]
        save: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "weft", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let schemas: Arc<dyn SchemaRegistry> = Arc::new(BuiltinSchemas::with_builtins());

    match cli.command {
        Commands::Check { doc } => run_check(&doc, &config, schemas),
        Commands::Links { docs } => run_links(&docs, config, schemas),
        Commands::Watch { doc, project, save } => {
            run_watch(&doc, project, save, config, schemas).await
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(path: &Path) -> anyhow::Result<EditorConfig> {
    if path.exists() {
        return Ok(EditorConfig::load(path)?);
    }
    if let Some(home) = dirs_home().map(|h| h.join(".weft").join("config.toml")) {
        if home.exists() {
            info!(path = %home.display(), "Loading config from home directory");
            return Ok(EditorConfig::load(&home)?);
        }
    }
    info!("No config file found, using defaults");
    Ok(EditorConfig::default())
}

fn run_check(doc_path: &Path, config: &EditorConfig, schemas: Arc<dyn SchemaRegistry>) -> anyhow::Result<()> {
    let doc = WorkflowDocument::read(doc_path)?;
    let report = check_document(&doc, config, schemas);

    println!(
        "{}: {} nodes, {} edges",
        doc_path.display(),
        doc.nodes.len(),
        doc.edges.len()
    );
    for id in &report.dangling_edges {
        println!("  dangling edge   {}", id);
    }
    for (id, reason) in &report.rejected_edges {
        println!("  rejected edge   {}  ({})", id, reason);
    }
    for id in &report.name_conflicts {
        println!("  name conflict   {}", id);
    }

    if report.is_clean() {
        println!("  ok");
        Ok(())
    } else {
        anyhow::bail!("{} problem(s) found", report.problem_count())
    }
}

fn run_links(
    doc_paths: &[PathBuf],
    config: EditorConfig,
    schemas: Arc<dyn SchemaRegistry>,
) -> anyhow::Result<()> {
    let mut docs = Vec::with_capacity(doc_paths.len());
    for path in doc_paths {
        docs.push((tab_id_for(path), WorkflowDocument::read(path)?));
    }
    let workflow = Workflow::open(config, schemas, Arc::new(EventBus::default()), docs);

    let mut unmatched = 0;
    for tab in workflow.tabs() {
        for entry in workflow.teleports().entries_for_tab(&tab.id) {
            let linked = workflow.teleports().linked_tabs(&entry.name, &tab.id);
            let partners = workflow
                .teleports()
                .matching_connections(&entry.name, None)
                .into_iter()
                .filter(|e| e.direction != entry.direction)
                .count();
            let arrow = match entry.direction {
                TeleportDirection::Out => "->",
                TeleportDirection::In => "<-",
            };
            let tabs: Vec<String> = linked.iter().map(|t| t.to_string()).collect();
            println!(
                "{:<16} {} {:<24} {} [{}]",
                tab.id,
                arrow,
                entry.name,
                entry.color,
                tabs.join(", ")
            );
            if partners == 0 {
                unmatched += 1;
                warn!(tab = %tab.id, name = %entry.name, direction = %entry.direction, "Teleporter has no counterpart");
            }
        }
    }
    println!(
        "{} teleporter(s), {} without a counterpart",
        workflow.teleports().len(),
        unmatched
    );
    Ok(())
}

async fn run_watch(
    doc_path: &Path,
    project: Option<PathBuf>,
    save: bool,
    config: EditorConfig,
    schemas: Arc<dyn SchemaRegistry>,
) -> anyhow::Result<()> {
    let project = project
        .or_else(|| config.project_dir())
        .or_else(|| doc_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    if !config.sync.enabled {
        warn!("File sync is disabled in config; nothing will be watched");
    }

    let tab = tab_id_for(doc_path);
    let event_bus = Arc::new(EventBus::default());
    let poll = Duration::from_millis(config.sync.poll_interval_ms);
    let force_polling = config.sync.force_polling;
    let doc = WorkflowDocument::read(doc_path)?;
    let mut workflow = Workflow::open(config, schemas.clone(), event_bus.clone(), vec![(tab.clone(), doc)]);
    workflow.set_project_path(&tab, Some(project.clone()))?;

    // Without a canvas, every file-backed node counts as expanded. The ones
    // expanded here are collapsed again before saving.
    let file_backed: Vec<String> = workflow
        .active_tab()
        .map(|t| {
            t.store
                .nodes()
                .iter()
                .filter(|n| !n.expanded)
                .filter(|n| schemas.schema(&n.kind).is_some_and(|s| s.file_binding.is_some()))
                .map(|n| n.id.to_string())
                .collect()
        })
        .unwrap_or_default();
    for id in &file_backed {
        workflow.set_node_expanded(id, true)?;
    }
    info!(project = %project.display(), nodes = file_backed.len(), "Watching file-backed nodes");

    let workflow = Arc::new(Mutex::new(workflow));
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    // Graceful shutdown on Ctrl-C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down watcher...");
        cancel_clone.cancel();
    });

    let mut event_rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                EditorEvent::FileSynced {
                    node_id,
                    field_id,
                    file_path,
                } => {
                    info!(node_id = %node_id, field = %field_id, path = %file_path.display(), "Synced");
                }
                EditorEvent::FileSyncFailed {
                    node_id,
                    file_path,
                    error,
                } => {
                    warn!(node_id = %node_id, path = %file_path.display(), error = %error, "Sync failed");
                }
                _ => {}
            }
        }
    });

    let files = if force_polling {
        LocalFileService::polling(poll)
    } else {
        LocalFileService::new()
    };
    let reconciler = FileSyncReconciler::new(Arc::new(files));
    SyncDriver::new(workflow.clone(), reconciler, poll, cancel).run().await;

    if save {
        let workflow = workflow.lock().await;
        if let Some(tab) = workflow.active_tab() {
            let mut doc = tab.store.to_document();
            for node in &mut doc.nodes {
                if file_backed.iter().any(|id| id == node.id.as_str()) {
                    node.expanded = false;
                }
            }
            std::fs::write(doc_path, doc.to_json()?)?;
            info!(path = %doc_path.display(), "Document saved");
        }
    }
    Ok(())
}

/// Tab id for a document: its file stem.
fn tab_id_for(path: &Path) -> TabId {
    path.file_stem()
        .map(|s| TabId::from(s.to_string_lossy().to_string()))
        .unwrap_or_default()
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
