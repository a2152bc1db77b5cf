use serde::{Deserialize, Serialize};

use weft_core::types::{EdgeId, NodeId};

/// An edge wiring a source handle to a target handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    /// Source node id.
    pub source: NodeId,
    /// Output handle on the source node.
    pub source_handle: String,
    /// Target node id.
    pub target: NodeId,
    /// Input handle on the target node.
    pub target_handle: String,
}

impl Edge {
    /// Create an edge with a generated id.
    pub fn new(
        source: impl Into<NodeId>,
        source_handle: impl Into<String>,
        target: impl Into<NodeId>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: EdgeId::new(),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    /// True if `node` is either endpoint.
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }

    /// True if this edge terminates at the given target port.
    pub fn ends_at(&self, node: &NodeId, handle: &str) -> bool {
        self.target == *node && self.target_handle == handle
    }
}
