use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use weft_core::error::Result;
use weft_core::schema::FileBinding;
use weft_core::traits::{FileService, Unsubscribe};
use weft_core::types::{ChangeType, EditorEvent, FileChangeEvent, FileContent, NodeId, TabId};

use crate::node::Node;
use crate::workflow::{Tab, Workflow};

/// What happened to one fetched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The node's content field now holds the file's content.
    Applied,
    /// The field already held the file's content.
    Unchanged,
    /// The subscription, node or path changed while the fetch was in flight.
    Stale,
    /// The fetch or the merge failed; nothing was changed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubKey {
    tab: TabId,
    node: NodeId,
}

struct Subscription {
    path: PathBuf,
    token: CancellationToken,
    generation: u64,
    handle: Unsubscribe,
}

/// Identifies the subscription a fetch was started for.
#[derive(Debug, Clone)]
pub struct SyncTicket {
    pub tab_id: TabId,
    pub node_id: NodeId,
    pub path: PathBuf,
    pub content_field: String,
    token: CancellationToken,
    generation: u64,
}

/// A fetch that passed the precondition checks, ready to run without any
/// borrow of the workflow.
pub struct PendingFetch {
    ticket: SyncTicket,
    files: Arc<dyn FileService>,
}

impl PendingFetch {
    pub fn ticket(&self) -> &SyncTicket {
        &self.ticket
    }

    pub async fn fetch(self) -> FetchedContent {
        let result = self.files.read_file(&self.ticket.path).await;
        FetchedContent {
            ticket: self.ticket,
            result,
        }
    }
}

/// Result of a fetch, waiting to be applied by
/// [`FileSyncReconciler::complete`].
pub struct FetchedContent {
    pub ticket: SyncTicket,
    pub result: Result<FileContent>,
}

/// Subscribes expanded file-backed nodes to their files and merges changes
/// back into the graph.
///
/// Subscriptions are keyed by tab and node. Each carries a cancellation
/// token and a generation number; a fetch started under one subscription is
/// discarded if that subscription has since been cancelled or replaced.
pub struct FileSyncReconciler {
    files: Arc<dyn FileService>,
    subscriptions: HashMap<SubKey, Subscription>,
    saved: HashMap<SubKey, String>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<FileChangeEvent>,
    rx: Option<mpsc::UnboundedReceiver<FileChangeEvent>>,
}

impl FileSyncReconciler {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            files,
            subscriptions: HashMap::new(),
            saved: HashMap::new(),
            next_generation: 0,
            tx,
            rx: Some(rx),
        }
    }

    /// Receiver for change events from every subscription. Can be taken once.
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<FileChangeEvent>> {
        self.rx.take()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Absolute path a node is currently subscribed to.
    pub fn subscribed_path(&self, tab: &TabId, node: &str) -> Option<&PathBuf> {
        self.subscriptions.get(&key(tab, node)).map(|s| &s.path)
    }

    /// Bring subscriptions in line with the workflow: subscribe newly
    /// expanded file-backed nodes, drop collapsed, removed or re-pointed ones.
    /// An old subscription is always cancelled before its replacement starts.
    pub fn refresh(&mut self, workflow: &Workflow) {
        let mut desired: HashMap<SubKey, PathBuf> = HashMap::new();
        if workflow.config().sync.enabled {
            for tab in workflow.tabs() {
                for node in tab.store.nodes() {
                    if let Some((path, _)) = binding_for(tab, node) {
                        desired.insert(key(&tab.id, node.id.as_str()), path);
                    }
                }
            }
        }

        let stale: Vec<SubKey> = self
            .subscriptions
            .iter()
            .filter(|(k, s)| desired.get(*k) != Some(&s.path))
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale {
            self.unsubscribe(&k);
        }

        for (k, path) in desired {
            if !self.subscriptions.contains_key(&k) {
                self.subscribe(k, path);
            }
        }
    }

    /// Check preconditions for a change event and produce the fetches to run.
    ///
    /// Deletions are ignored. Nodes that are collapsed, or whose tab has no
    /// project path, are skipped.
    pub fn begin(&self, workflow: &Workflow, event: &FileChangeEvent) -> Vec<PendingFetch> {
        if event.change_type == ChangeType::Deleted {
            debug!(path = %event.file_path.display(), "Ignoring delete event");
            return Vec::new();
        }

        self.subscriptions
            .iter()
            .filter(|(_, s)| s.path == event.file_path && !s.token.is_cancelled())
            .filter_map(|(k, s)| {
                let tab = workflow.tab(&k.tab)?;
                let node = tab.store.node(k.node.as_str())?;
                if tab.project_path.is_none() || !node.expanded {
                    debug!(node_id = %k.node, "Skipping sync for collapsed node or unset project");
                    return None;
                }
                let (_, binding) = binding_for(tab, node)?;
                Some(PendingFetch {
                    ticket: SyncTicket {
                        tab_id: k.tab.clone(),
                        node_id: k.node.clone(),
                        path: s.path.clone(),
                        content_field: binding.content_field,
                        token: s.token.clone(),
                        generation: s.generation,
                    },
                    files: self.files.clone(),
                })
            })
            .collect()
    }

    /// Apply a finished fetch, re-validating everything that may have changed
    /// during the async gap.
    pub fn complete(&mut self, workflow: &mut Workflow, fetched: FetchedContent) -> SyncOutcome {
        let FetchedContent { ticket, result } = fetched;
        let k = key(&ticket.tab_id, ticket.node_id.as_str());

        let current = self
            .subscriptions
            .get(&k)
            .is_some_and(|s| s.generation == ticket.generation);
        if ticket.token.is_cancelled() || !current {
            debug!(node_id = %ticket.node_id, "Discarding fetch for a cancelled subscription");
            return SyncOutcome::Stale;
        }

        let content = match result {
            Ok(file) => file.content,
            Err(e) => {
                warn!(node_id = %ticket.node_id, path = %ticket.path.display(), error = %e, "File fetch failed");
                workflow.events().publish(EditorEvent::FileSyncFailed {
                    node_id: ticket.node_id.clone(),
                    file_path: ticket.path.clone(),
                    error: e.to_string(),
                });
                return SyncOutcome::Failed;
            }
        };

        let still_bound = workflow.tab(&ticket.tab_id).is_some_and(|tab| {
            tab.store
                .node(ticket.node_id.as_str())
                .and_then(|node| binding_for(tab, node))
                .is_some_and(|(path, _)| path == ticket.path)
        });
        if !still_bound {
            debug!(node_id = %ticket.node_id, "Node collapsed or re-pointed during fetch");
            return SyncOutcome::Stale;
        }

        // The baseline moves first so dirty checks see the new content as saved.
        self.saved.insert(k, content.clone());

        match workflow.apply_file_sync(&ticket.tab_id, ticket.node_id.as_str(), &ticket.content_field, &content) {
            Ok(true) => {
                info!(node_id = %ticket.node_id, path = %ticket.path.display(), "File content synced");
                workflow.events().publish(EditorEvent::FileSynced {
                    node_id: ticket.node_id.clone(),
                    field_id: ticket.content_field.clone(),
                    file_path: ticket.path.clone(),
                });
                SyncOutcome::Applied
            }
            Ok(false) => SyncOutcome::Unchanged,
            Err(e) => {
                warn!(node_id = %ticket.node_id, error = %e, "Could not merge file content");
                SyncOutcome::Failed
            }
        }
    }

    /// Run begin, fetch and complete for one event in the current task.
    pub async fn process(&mut self, workflow: &mut Workflow, event: &FileChangeEvent) -> Vec<SyncOutcome> {
        let pending = self.begin(workflow, event);
        let mut outcomes = Vec::with_capacity(pending.len());
        for fetch in pending {
            let fetched = fetch.fetch().await;
            outcomes.push(self.complete(workflow, fetched));
        }
        outcomes
    }

    /// Content last read from disk for a node, if any.
    pub fn saved_content(&self, tab: &TabId, node: &str) -> Option<&str> {
        self.saved.get(&key(tab, node)).map(String::as_str)
    }

    /// Record content as saved, e.g. after the editor writes the file.
    pub fn mark_saved(&mut self, tab: &TabId, node: &str, content: impl Into<String>) {
        self.saved.insert(key(tab, node), content.into());
    }

    /// Whether a node's content field differs from its saved baseline.
    /// Nodes without a baseline are never dirty.
    pub fn is_dirty(&self, workflow: &Workflow, tab: &TabId, node: &str) -> bool {
        let Some(saved) = self.saved.get(&key(tab, node)) else {
            return false;
        };
        let Some(tab) = workflow.tab(tab) else {
            return false;
        };
        let Some(node) = tab.store.node(node) else {
            return false;
        };
        tab.store
            .schemas()
            .schema(&node.kind)
            .and_then(|s| s.file_binding.as_ref())
            .is_some_and(|b| node.field_str(&b.content_field) != Some(saved.as_str()))
    }

    /// Cancel every subscription and forget every baseline.
    pub fn teardown(&mut self) {
        let keys: Vec<SubKey> = self.subscriptions.keys().cloned().collect();
        for k in keys {
            self.unsubscribe(&k);
        }
        self.saved.clear();
    }

    fn subscribe(&mut self, k: SubKey, path: PathBuf) {
        match self.files.subscribe(&path, self.tx.clone()) {
            Ok(handle) => {
                self.next_generation += 1;
                info!(node_id = %k.node, path = %path.display(), "Watching file");
                self.subscriptions.insert(
                    k,
                    Subscription {
                        path,
                        token: CancellationToken::new(),
                        generation: self.next_generation,
                        handle,
                    },
                );
            }
            Err(e) => {
                warn!(node_id = %k.node, path = %path.display(), error = %e, "Could not watch file");
            }
        }
    }

    /// Drop a subscription together with its baseline: once unwatched, the
    /// file may change unseen, so the old baseline proves nothing.
    fn unsubscribe(&mut self, k: &SubKey) {
        self.saved.remove(k);
        if let Some(sub) = self.subscriptions.remove(k) {
            sub.token.cancel();
            sub.handle.unsubscribe();
            info!(node_id = %k.node, path = %sub.path.display(), "Stopped watching file");
        }
    }
}

impl Drop for FileSyncReconciler {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn key(tab: &TabId, node: &str) -> SubKey {
    SubKey {
        tab: tab.clone(),
        node: NodeId::from(node),
    }
}

/// Absolute path and binding for a node that should be watched: expanded,
/// file-backed with a non-blank path, in a tab with a project path.
fn binding_for(tab: &Tab, node: &Node) -> Option<(PathBuf, FileBinding)> {
    if !node.expanded {
        return None;
    }
    let binding = tab.store.schemas().schema(&node.kind)?.file_binding.clone()?;
    let relative = node
        .field_str(&binding.path_field)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let project = tab.project_path.as_ref()?;
    Some((project.join(relative), binding))
}
