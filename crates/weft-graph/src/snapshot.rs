use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use weft_core::types::{NodeId, Viewport};

use crate::document::WorkflowDocument;
use crate::edge::Edge;
use crate::node::Node;

/// Immutable capture of a graph: nodes, edges and viewport.
///
/// Collections are shared behind `Arc`, so cloning a snapshot is cheap and two
/// snapshots taken without an intervening mutation compare equal by pointer.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub nodes: Arc<Vec<Node>>,
    pub edges: Arc<Vec<Edge>>,
    pub viewport: Viewport,
}

impl GraphSnapshot {
    pub fn new(nodes: Arc<Vec<Node>>, edges: Arc<Vec<Edge>>, viewport: Viewport) -> Self {
        Self {
            nodes,
            edges,
            viewport,
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(vec![]), Arc::new(vec![]), Viewport::default())
    }

    /// Same collections and viewport, checked by reference.
    pub fn same_as(&self, other: &GraphSnapshot) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
            && Arc::ptr_eq(&self.edges, &other.edges)
            && self.viewport == other.viewport
    }

    /// Serializable document form. Dangling edges are dropped.
    pub fn to_document(&self) -> WorkflowDocument {
        WorkflowDocument {
            nodes: self.nodes.as_ref().clone(),
            edges: prune_dangling(&self.nodes, self.edges.as_ref().clone()),
            viewport: self.viewport,
        }
    }

    pub fn from_document(doc: WorkflowDocument) -> Self {
        let edges = prune_dangling(&doc.nodes, doc.edges);
        Self::new(Arc::new(doc.nodes), Arc::new(edges), doc.viewport)
    }
}

/// Drop edges whose endpoints are not present in `nodes`.
pub fn prune_dangling(nodes: &[Node], edges: Vec<Edge>) -> Vec<Edge> {
    let ids: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let before = edges.len();
    let kept: Vec<Edge> = edges
        .into_iter()
        .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
        .collect();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "Dropped dangling edges");
    }
    kept
}
