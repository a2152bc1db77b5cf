//! Drag-to-connect session tracking.
//!
//! Two states: idle (no session) and dragging (a session recorded from the
//! source handle). While dragging, every candidate target port is checked
//! against the recorded source capability/type.

use tracing::debug;

use weft_core::types::{HandleType, NodeId};

use crate::compat::is_compatible;
use crate::handles::HandleRegistry;
use crate::store::GraphStore;

/// Raw connect-start gesture as emitted by the canvas.
#[derive(Debug, Clone, Default)]
pub struct ConnectGesture {
    pub node_id: Option<String>,
    pub handle_id: Option<String>,
    pub handle_type: Option<HandleType>,
}

impl ConnectGesture {
    pub fn source(node_id: &str, handle_id: &str) -> Self {
        Self {
            node_id: Some(node_id.to_string()),
            handle_id: Some(handle_id.to_string()),
            handle_type: Some(HandleType::Source),
        }
    }
}

/// The in-progress drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSession {
    pub source_node_id: NodeId,
    pub source_handle_id: String,
    pub source_output_capability: Option<String>,
    pub source_output_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionTracker {
    session: Option<ConnectionSession>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ConnectionSession> {
        self.session.as_ref()
    }

    /// Start a drag from a source handle.
    ///
    /// Any previous session is discarded. Target handles, missing ids and
    /// handles the registry doesn't know leave the tracker idle. Dragging from
    /// a node's default output expands the node. Returns whether a drag began.
    pub fn on_connect_start(
        &mut self,
        gesture: &ConnectGesture,
        handles: &HandleRegistry,
        store: &mut GraphStore,
    ) -> bool {
        self.session = None;

        let (Some(node_id), Some(handle_id)) = (&gesture.node_id, &gesture.handle_id) else {
            debug!(?gesture, "Ignoring connect start without node or handle");
            return false;
        };
        if gesture.handle_type != Some(HandleType::Source) {
            return false;
        }
        let Some(resolved) = handles.resolve(node_id, handle_id) else {
            debug!(node_id = %node_id, handle_id = %handle_id, "Ignoring connect start from unknown handle");
            return false;
        };

        if resolved.is_default {
            if let Err(e) = store.set_node_expanded(node_id, true) {
                debug!(node_id = %node_id, error = %e, "Could not expand drag source");
            }
        }

        self.session = Some(ConnectionSession {
            source_node_id: NodeId::from(node_id.as_str()),
            source_handle_id: handle_id.clone(),
            source_output_capability: resolved.capability.clone(),
            source_output_type: resolved.data_type.clone(),
        });
        true
    }

    /// End the drag, whether or not a drop happened.
    pub fn on_connect_end(&mut self) -> Option<ConnectionSession> {
        self.session.take()
    }

    /// Drop any session, e.g. on tab switch.
    pub fn reset(&mut self) {
        self.session = None;
    }

    /// Whether dropping on `(target_node, target_handle)` would be accepted.
    pub fn is_valid_target(&self, store: &GraphStore, target_node: &str, target_handle: &str) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if session.source_node_id.as_str() == target_node {
            return false;
        }
        let Some(node) = store.node(target_node) else {
            return false;
        };
        let Some(input) = store
            .schemas()
            .schema(&node.kind)
            .and_then(|s| s.input(target_handle))
        else {
            return false;
        };

        if !is_compatible(
            session.source_output_capability.as_deref(),
            session.source_output_type.as_deref(),
            &input.capabilities,
            &input.types,
        ) {
            return false;
        }
        input.multiple || !store.is_port_occupied(&node.id, target_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::Node;
    use std::sync::Arc;
    use weft_core::config::EditorConfig;
    use weft_core::schema::BuiltinSchemas;
    use weft_core::types::TabId;

    fn setup() -> (GraphStore, HandleRegistry) {
        let mut store = GraphStore::new(
            TabId::from("t"),
            &EditorConfig::default(),
            Arc::new(BuiltinSchemas::with_builtins()),
        );
        store.add_node(Node::new("a", "agent")).unwrap();
        store.add_node(Node::new("b", "agent")).unwrap();
        store.add_node(Node::new("tool", "tool")).unwrap();
        store.add_node(Node::new("p", "prompt")).unwrap();
        let handles = HandleRegistry::from_store(&store);
        (store, handles)
    }

    #[test]
    fn test_default_handle_expands_node() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();
        assert!(tracker.on_connect_start(&ConnectGesture::source("a", "out"), &handles, &mut store));
        assert!(tracker.is_dragging());
        assert!(store.node("a").unwrap().expanded);

        let session = tracker.session().unwrap();
        assert_eq!(session.source_output_capability.as_deref(), Some("agent"));
        assert_eq!(session.source_output_type.as_deref(), Some("any"));
    }

    #[test]
    fn test_named_handle_does_not_expand() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();
        assert!(tracker.on_connect_start(&ConnectGesture::source("a", "out:text"), &handles, &mut store));
        assert!(!store.node("a").unwrap().expanded);
    }

    #[test]
    fn test_malformed_or_target_start_is_noop() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();

        assert!(!tracker.on_connect_start(&ConnectGesture::default(), &handles, &mut store));
        let target = ConnectGesture {
            handle_type: Some(HandleType::Target),
            ..ConnectGesture::source("a", "out")
        };
        assert!(!tracker.on_connect_start(&target, &handles, &mut store));
        assert!(!tracker.on_connect_start(&ConnectGesture::source("a", "stale"), &handles, &mut store));
        assert!(!tracker.is_dragging());
        assert!(!store.node("a").unwrap().expanded);
    }

    #[test]
    fn test_no_self_loop() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();
        tracker.on_connect_start(&ConnectGesture::source("a", "out"), &handles, &mut store);
        for handle in ["in", "tools", "system"] {
            assert!(!tracker.is_valid_target(&store, "a", handle));
        }
        assert!(tracker.is_valid_target(&store, "b", "in"));
    }

    #[test]
    fn test_validity_follows_types_and_multiplicity() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();

        tracker.on_connect_start(&ConnectGesture::source("tool", "out"), &handles, &mut store);
        assert!(tracker.is_valid_target(&store, "a", "tools"));
        assert!(!tracker.is_valid_target(&store, "a", "system"));
        assert!(!tracker.is_valid_target(&store, "a", "nonexistent"));
        assert!(!tracker.is_valid_target(&store, "ghost", "tools"));

        tracker.on_connect_start(&ConnectGesture::source("p", "out"), &handles, &mut store);
        assert!(tracker.is_valid_target(&store, "a", "system"));
        store.connect(Edge::new("p", "out", "a", "system")).unwrap();
        assert!(!tracker.is_valid_target(&store, "a", "system"));
    }

    #[test]
    fn test_end_always_clears() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();
        assert!(tracker.on_connect_end().is_none());

        tracker.on_connect_start(&ConnectGesture::source("a", "out"), &handles, &mut store);
        let ended = tracker.on_connect_end().unwrap();
        assert_eq!(ended.source_node_id.as_str(), "a");
        assert!(!tracker.is_dragging());
        assert!(!tracker.is_valid_target(&store, "b", "in"));
    }

    #[test]
    fn test_new_start_replaces_session() {
        let (mut store, handles) = setup();
        let mut tracker = ConnectionTracker::new();
        tracker.on_connect_start(&ConnectGesture::source("a", "out"), &handles, &mut store);
        tracker.on_connect_start(&ConnectGesture::source("tool", "out"), &handles, &mut store);
        assert_eq!(tracker.session().unwrap().source_node_id.as_str(), "tool");

        // A failed start still discards the previous drag.
        tracker.on_connect_start(&ConnectGesture::default(), &handles, &mut store);
        assert!(!tracker.is_dragging());
    }
}
