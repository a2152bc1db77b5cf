//! Mocks and fixtures shared by the Weft crates' tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};

use weft_core::error::{Result, WeftError};
use weft_core::traits::{FileService, Unsubscribe};
use weft_core::types::{ChangeType, FileChangeEvent, FileContent};

#[derive(Default)]
struct MockState {
    files: HashMap<PathBuf, String>,
    failing: HashSet<PathBuf>,
    subscribers: HashMap<PathBuf, Vec<(usize, mpsc::UnboundedSender<FileChangeEvent>)>>,
    next_subscriber: usize,
}

/// In-memory [`FileService`] driven by the test.
///
/// Reads are served from a map of files. With [`MockFileService::gated`],
/// every read waits until the test releases it, which lets a test change
/// the graph while a fetch is in flight. Clones share state.
#[derive(Clone, Default)]
pub struct MockFileService {
    state: Arc<Mutex<MockState>>,
    gate: Option<Arc<Semaphore>>,
    reads: Arc<AtomicUsize>,
}

impl MockFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.set_file(path, content);
        self
    }

    /// Hold every read until [`MockFileService::release_reads`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release_reads(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, content: &str) {
        self.lock().files.insert(path.into(), content.to_string());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.lock().files.remove(path.as_ref());
    }

    /// Make reads of `path` fail even if the file exists.
    pub fn fail_reads(&self, path: impl Into<PathBuf>) {
        self.lock().failing.insert(path.into());
    }

    /// Deliver a change event to every subscriber of `path`.
    pub fn emit(&self, path: impl AsRef<Path>, change_type: ChangeType) {
        let path = path.as_ref();
        let state = self.lock();
        if let Some(subscribers) = state.subscribers.get(path) {
            for (_, tx) in subscribers {
                let _ = tx.send(FileChangeEvent::new(path, change_type));
            }
        }
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock()
            .subscribers
            .get(path.as_ref())
            .map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileService for MockFileService {
    fn read_file(&self, path: &Path) -> BoxFuture<'_, Result<FileContent>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.reads.fetch_add(1, Ordering::SeqCst);
            let state = self.lock();
            let missing = || WeftError::FileService {
                path: path.display().to_string(),
                message: "not found".to_string(),
            };
            if state.failing.contains(&path) {
                return Err(missing());
            }
            state
                .files
                .get(&path)
                .map(|content| FileContent {
                    content: content.clone(),
                })
                .ok_or_else(missing)
        })
    }

    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Result<Unsubscribe> {
        let mut state = self.lock();
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state
            .subscribers
            .entry(path.to_path_buf())
            .or_default()
            .push((id, events));

        let shared = self.state.clone();
        let path = path.to_path_buf();
        Ok(Unsubscribe::new(move || {
            let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(subscribers) = state.subscribers.get_mut(&path) {
                subscribers.retain(|(sid, _)| *sid != id);
                if subscribers.is_empty() {
                    state.subscribers.remove(&path);
                }
            }
        }))
    }
}

// ── Fixtures ───────────────────────────────────────────────────

/// A tab with every built-in kind: an agent wired to a tool and a prompt,
/// a group holding two probes, and an outbound teleporter.
pub fn sample_document() -> Value {
    json!({
        "nodes": [
            {"id": "agent", "type": "agent", "position": {"x": 0.0, "y": 0.0},
             "config": {"name": "Researcher"}},
            {"id": "search", "type": "tool", "position": {"x": -200.0, "y": 0.0},
             "config": {"name": "search", "file": "tools/search.py", "code": "def run(): ..."}},
            {"id": "system", "type": "prompt", "position": {"x": -200.0, "y": 120.0},
             "config": {"name": "system", "file": "prompts/system.md", "template": "You are helpful."}},
            {"id": "group", "type": "group", "position": {"x": 300.0, "y": 0.0},
             "size": {"width": 400.0, "height": 300.0}, "config": {"name": "checks"}},
            {"id": "probe-1", "type": "probe", "position": {"x": 20.0, "y": 20.0},
             "parent_id": "group", "config": {"name": "trace"}},
            {"id": "probe-2", "type": "probe", "position": {"x": 20.0, "y": 120.0},
             "parent_id": "group", "config": {"name": "trace"}},
            {"id": "ctx-out", "type": "connector", "position": {"x": 200.0, "y": 200.0},
             "config": {"name": "shared-ctx", "direction": "out"}}
        ],
        "edges": [
            {"id": "e1", "source": "search", "source_handle": "out", "target": "agent", "target_handle": "tools"},
            {"id": "e2", "source": "system", "source_handle": "out", "target": "agent", "target_handle": "system"},
            {"id": "e3", "source": "agent", "source_handle": "out", "target": "probe-1", "target_handle": "in"}
        ],
        "viewport": {"x": 0.0, "y": 0.0, "zoom": 1.0}
    })
}

/// A second tab whose inbound teleporter links to `sample_document`'s.
pub fn linked_document() -> Value {
    json!({
        "nodes": [
            {"id": "ctx-in", "type": "connector", "config": {"name": "shared-ctx", "direction": "in"}},
            {"id": "writer", "type": "agent", "position": {"x": 200.0, "y": 0.0},
             "config": {"name": "Writer"}}
        ],
        "edges": [
            {"id": "l1", "source": "ctx-in", "source_handle": "out", "target": "writer", "target_handle": "in"}
        ]
    })
}

/// Write `content` as `config.toml` in a fresh temporary directory.
pub fn temp_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).expect("write config");
    (dir, path)
}

/// Write a JSON document into `dir` and return its path.
pub fn write_document(dir: &Path, name: &str, doc: &Value) -> PathBuf {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(doc).expect("serialize document");
    std::fs::write(&path, json).expect("write document");
    path
}

/// A sample editor config exercising every section.
pub fn sample_config_toml() -> &'static str {
    r##"
[history]
capacity = 10

[canvas]
snap_to_grid = true
grid_size = 20

[sync]
enabled = true
poll_interval_ms = 250
force_polling = true

[teleport]
palette = ["#111111", "#222222"]

[project]
path = "/tmp/weft-project"
"##
}
