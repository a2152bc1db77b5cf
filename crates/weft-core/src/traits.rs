use std::path::Path;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::schema::{NodeKind, NodeSchema};
use crate::types::{FileChangeEvent, FileContent};

/// Schema registry — port and field declarations per node kind.
pub trait SchemaRegistry: Send + Sync {
    /// Schema for a node kind, if registered.
    fn schema(&self, kind: &NodeKind) -> Option<&NodeSchema>;
}

/// Directory/file service — reads and change notifications for project files.
pub trait FileService: Send + Sync + 'static {
    /// Read the full content of a file.
    fn read_file(&self, path: &Path) -> BoxFuture<'_, Result<FileContent>>;

    /// Start delivering change events for `path` to `events`.
    ///
    /// Dropping or calling the returned handle stops delivery.
    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Result<Unsubscribe>;
}

/// Handle returned by `FileService::subscribe`.
///
/// Runs its teardown exactly once, either explicitly or on drop.
pub struct Unsubscribe {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self { teardown: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
