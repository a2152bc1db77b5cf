use std::collections::HashSet;
use std::sync::Arc;

use weft_core::config::EditorConfig;
use weft_core::traits::SchemaRegistry;
use weft_core::types::{EdgeId, NodeId, TabId};

use crate::document::WorkflowDocument;
use crate::store::{Change, GraphStore};

/// Problems found in a persisted document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DocumentReport {
    /// Edges with a missing endpoint. Dropped on load.
    pub dangling_edges: Vec<EdgeId>,
    /// Edges the connection rules reject, with the reason.
    pub rejected_edges: Vec<(EdgeId, String)>,
    /// Nodes whose name collides with a sibling's.
    pub name_conflicts: Vec<NodeId>,
}

impl DocumentReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_edges.is_empty() && self.rejected_edges.is_empty() && self.name_conflicts.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.dangling_edges.len() + self.rejected_edges.len() + self.name_conflicts.len()
    }
}

/// Replay a document's edges through the store's connection rules, in
/// document order.
pub fn check_document(
    doc: &WorkflowDocument,
    config: &EditorConfig,
    schemas: Arc<dyn SchemaRegistry>,
) -> DocumentReport {
    let ids: HashSet<&NodeId> = doc.nodes.iter().map(|n| &n.id).collect();
    let mut store = GraphStore::new(TabId::from("check"), config, schemas);
    store.set_nodes(doc.nodes.clone(), Change::Transient);

    let mut report = DocumentReport::default();
    for edge in &doc.edges {
        if !ids.contains(&edge.source) || !ids.contains(&edge.target) {
            report.dangling_edges.push(edge.id.clone());
            continue;
        }
        if let Err(e) = store.connect(edge.clone()) {
            report.rejected_edges.push((edge.id.clone(), e.to_string()));
        }
    }

    let mut conflicts: Vec<NodeId> = store
        .name_conflicts()
        .iter()
        .filter(|(_, clash)| **clash)
        .map(|(id, _)| id.clone())
        .collect();
    conflicts.sort();
    report.name_conflicts = conflicts;
    report
}
