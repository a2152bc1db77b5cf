use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::types::{TabId, Viewport};

use crate::edge::Edge;
use crate::node::Node;

/// Persisted form of one tab's graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl WorkflowDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a document from a file on disk.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WeftError::Document(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }
}

/// Document store — persistence backend, one document per tab.
pub trait DocumentStore: Send + Sync + 'static {
    fn load(&self, tab: &TabId) -> BoxFuture<'_, Result<WorkflowDocument>>;

    fn save(&self, tab: &TabId, doc: &WorkflowDocument) -> BoxFuture<'_, Result<()>>;
}

/// Stores each tab as `<dir>/<tab id>.json`.
pub struct JsonDocumentStore {
    dir: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, tab: &TabId) -> PathBuf {
        self.dir.join(format!("{}.json", tab))
    }
}

impl DocumentStore for JsonDocumentStore {
    fn load(&self, tab: &TabId) -> BoxFuture<'_, Result<WorkflowDocument>> {
        let path = self.path_for(tab);
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| WeftError::Document(format!("{}: {}", path.display(), e)))?;
            debug!(path = %path.display(), "Loaded workflow document");
            WorkflowDocument::from_json(&content)
        })
    }

    fn save(&self, tab: &TabId, doc: &WorkflowDocument) -> BoxFuture<'_, Result<()>> {
        let path = self.path_for(tab);
        let json = doc.to_json();
        Box::pin(async move {
            let json = json?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, json).await?;
            debug!(path = %path.display(), "Saved workflow document");
            Ok(())
        })
    }
}
