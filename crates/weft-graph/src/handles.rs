use std::collections::HashMap;

use tracing::debug;

use weft_core::traits::SchemaRegistry;
use weft_core::types::NodeId;

use crate::node::Node;
use crate::store::GraphStore;

/// Capability/type pair a source handle resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandle {
    pub capability: Option<String>,
    pub data_type: Option<String>,
    /// The node's generic output, as opposed to a narrowly-typed one.
    pub is_default: bool,
}

/// Source handles currently on the canvas, by node and handle id.
///
/// Rebuilt from the active tab's store whenever nodes come or go; lookups for
/// ids that are no longer present simply miss.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: HashMap<NodeId, HashMap<String, ResolvedHandle>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: &GraphStore) -> Self {
        let mut registry = Self::new();
        registry.rebuild(store);
        registry
    }

    /// Replace every entry with the handles of the store's current nodes.
    pub fn rebuild(&mut self, store: &GraphStore) {
        self.handles.clear();
        for node in store.nodes() {
            self.register_node(node, store.schemas());
        }
        debug!(tab = %store.tab_id(), nodes = self.handles.len(), "Handle registry rebuilt");
    }

    pub fn register_node(&mut self, node: &Node, schemas: &dyn SchemaRegistry) {
        let Some(schema) = schemas.schema(&node.kind) else {
            self.handles.remove(&node.id);
            return;
        };
        let outputs = schema
            .outputs
            .iter()
            .map(|port| {
                (
                    port.id.clone(),
                    ResolvedHandle {
                        capability: port.capability.clone(),
                        data_type: port.data_type.clone(),
                        is_default: port.default,
                    },
                )
            })
            .collect();
        self.handles.insert(node.id.clone(), outputs);
    }

    pub fn unregister_node(&mut self, node: &str) {
        self.handles.remove(node);
    }

    pub fn resolve(&self, node: &str, handle: &str) -> Option<&ResolvedHandle> {
        self.handles.get(node)?.get(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
