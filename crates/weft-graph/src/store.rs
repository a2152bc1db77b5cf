//! The graph store: single source of truth for one tab's graph.
//!
//! Collections are replaced wholesale on every mutation (`Arc` swap), never
//! edited in place. Mutations tagged [`Change::Commit`] push the pre-mutation
//! snapshot onto the history manager; [`Change::Transient`] ones (drag
//! frames, panning) do not.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use weft_core::config::EditorConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::SchemaRegistry;
use weft_core::types::{EdgeId, NodeId, Position, Size, TabId, Viewport};

use crate::compat::ports_compatible;
use crate::dialog::{GroupDeleteMode, PendingDialog};
use crate::document::WorkflowDocument;
use crate::edge::Edge;
use crate::history::HistoryManager;
use crate::node::Node;
use crate::snapshot::{prune_dangling, GraphSnapshot};

/// Whether a mutation is a committed, undoable change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// User-meaningful: recorded in history.
    Commit,
    /// Intermediate state (drag frame, pan, expansion): not recorded.
    Transient,
}

/// Result of asking to delete a node.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The listed nodes were removed.
    Deleted(Vec<NodeId>),
    /// The node is a group with children; a `GroupDelete` dialog is pending.
    NeedsConfirmation { group_id: NodeId, child_count: usize },
}

pub struct GraphStore {
    tab_id: TabId,
    schemas: Arc<dyn SchemaRegistry>,
    nodes: Arc<Vec<Node>>,
    edges: Arc<Vec<Edge>>,
    viewport: Viewport,
    dialog: PendingDialog,
    mouse_position: Position,
    snap_to_grid: bool,
    grid_size: f64,
    name_conflicts: HashMap<NodeId, bool>,
    history: HistoryManager,
    drag_origin: Option<GraphSnapshot>,
}

impl GraphStore {
    pub fn new(tab_id: TabId, config: &EditorConfig, schemas: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            tab_id,
            schemas,
            nodes: Arc::new(vec![]),
            edges: Arc::new(vec![]),
            viewport: Viewport::default(),
            dialog: PendingDialog::None,
            mouse_position: Position::default(),
            snap_to_grid: config.canvas.snap_to_grid,
            grid_size: config.canvas.grid_size,
            name_conflicts: HashMap::new(),
            history: HistoryManager::new(config.history.capacity),
            drag_origin: None,
        }
    }

    /// Build a store from a persisted document. Loading is not undoable.
    pub fn from_document(
        tab_id: TabId,
        doc: WorkflowDocument,
        config: &EditorConfig,
        schemas: Arc<dyn SchemaRegistry>,
    ) -> Self {
        let mut store = Self::new(tab_id, config, schemas);
        store.restore(GraphSnapshot::from_document(doc));
        store
    }

    // ── Read accessors ─────────────────────────────────────────

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn schemas(&self) -> &dyn SchemaRegistry {
        self.schemas.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id.as_str() == id)
    }

    pub fn dialog(&self) -> &PendingDialog {
        &self.dialog
    }

    pub fn mouse_position(&self) -> Position {
        self.mouse_position
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    /// Advisory: node id → whether its name collides with a sibling's.
    pub fn name_conflicts(&self) -> &HashMap<NodeId, bool> {
        &self.name_conflicts
    }

    pub fn has_name_conflict(&self, id: &str) -> bool {
        self.name_conflicts.get(id).copied().unwrap_or(false)
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone(), self.viewport)
    }

    pub fn to_document(&self) -> WorkflowDocument {
        self.snapshot().to_document()
    }

    /// Direct children of a group.
    pub fn children_of(&self, group: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id.as_ref().is_some_and(|p| p.as_str() == group))
            .collect()
    }

    /// All nodes nested under `group`, at any depth.
    pub fn descendants_of(&self, group: &str) -> HashSet<NodeId> {
        let mut found = HashSet::new();
        let mut frontier = vec![NodeId::from(group)];
        while let Some(current) = frontier.pop() {
            for child in self.children_of(current.as_str()) {
                if found.insert(child.id.clone()) {
                    frontier.push(child.id.clone());
                }
            }
        }
        found
    }

    /// Whether a non-multiple target port already has an incoming edge.
    pub fn is_port_occupied(&self, node: &NodeId, handle: &str) -> bool {
        self.edges.iter().any(|e| e.ends_at(node, handle))
    }

    // ── Wholesale setters ──────────────────────────────────────

    /// Replace the node list. Edges left without an endpoint are dropped.
    pub fn set_nodes(&mut self, nodes: Vec<Node>, change: Change) {
        self.record(change);
        self.replace_nodes(nodes);
        self.rebase_drag(change);
    }

    /// Replace the edge list. Dangling edges are dropped.
    pub fn set_edges(&mut self, edges: Vec<Edge>, change: Change) {
        self.record(change);
        self.edges = Arc::new(prune_dangling(&self.nodes, edges));
        self.rebase_drag(change);
    }

    pub fn set_viewport(&mut self, viewport: Viewport, change: Change) {
        self.record(change);
        self.viewport = viewport;
        self.rebase_drag(change);
    }

    // ── Auxiliary UI state ─────────────────────────────────────

    /// Open a dialog, replacing any pending one.
    pub fn request_dialog(&mut self, dialog: PendingDialog) {
        debug!(tab = %self.tab_id, dialog = dialog.kind(), "Dialog requested");
        self.dialog = dialog;
    }

    /// Close the pending dialog, returning it.
    pub fn close_dialog(&mut self) -> PendingDialog {
        std::mem::take(&mut self.dialog)
    }

    pub fn set_mouse_position(&mut self, position: Position) {
        self.mouse_position = position;
    }

    pub fn set_snap_to_grid(&mut self, enabled: bool) {
        self.snap_to_grid = enabled;
    }

    // ── Node operations ────────────────────────────────────────

    pub fn add_node(&mut self, mut node: Node) -> Result<()> {
        if self.node(node.id.as_str()).is_some() {
            return Err(WeftError::DuplicateNode(node.id.to_string()));
        }
        if self.snap_to_grid {
            node.position = node.position.snapped(self.grid_size);
        }
        debug!(tab = %self.tab_id, node_id = %node.id, kind = %node.kind, "Adding node");
        let mut nodes = self.nodes.as_ref().clone();
        nodes.push(node);
        self.set_nodes(nodes, Change::Commit);
        Ok(())
    }

    /// Set one configuration field. Locked nodes refuse.
    pub fn update_node_config(
        &mut self,
        id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let node = self.require_node(id)?;
        if node.locked {
            return Err(WeftError::NodeLocked(id.to_string()));
        }
        self.write_field(id, field, value);
        Ok(())
    }

    /// Merge content from an external file into a node's field.
    ///
    /// Returns `false` when the field already holds the value. The file on
    /// disk is authoritative, so the lock flag does not apply here.
    pub fn apply_file_sync(&mut self, id: &str, field: &str, content: &str) -> Result<bool> {
        let node = self.require_node(id)?;
        if node.field_str(field) == Some(content) {
            return Ok(false);
        }
        self.write_field(id, field, serde_json::Value::String(content.to_string()));
        Ok(true)
    }

    pub fn set_node_locked(&mut self, id: &str, locked: bool) -> Result<()> {
        let node = self.require_node(id)?;
        if node.locked == locked {
            return Ok(());
        }
        self.map_node(id, Change::Commit, |n| n.locked = locked);
        Ok(())
    }

    /// Expand or collapse a node. Presentation state: not recorded.
    pub fn set_node_expanded(&mut self, id: &str, expanded: bool) -> Result<()> {
        let node = self.require_node(id)?;
        if node.expanded == expanded {
            return Ok(());
        }
        self.map_node(id, Change::Transient, |n| n.expanded = expanded);
        Ok(())
    }

    /// Move a node. Use `Change::Transient` for drag frames between
    /// `begin_drag` and `end_drag`.
    pub fn move_node(&mut self, id: &str, position: Position, change: Change) -> Result<()> {
        let node = self.require_node(id)?;
        if node.locked {
            return Err(WeftError::NodeLocked(id.to_string()));
        }
        let position = if self.snap_to_grid {
            position.snapped(self.grid_size)
        } else {
            position
        };
        self.map_node(id, change, |n| n.position = position);
        Ok(())
    }

    pub fn resize_node(&mut self, id: &str, size: Size) -> Result<()> {
        let node = self.require_node(id)?;
        if node.locked {
            return Err(WeftError::NodeLocked(id.to_string()));
        }
        self.map_node(id, Change::Commit, |n| n.size = Some(size));
        Ok(())
    }

    /// Start a drag gesture; the current state becomes the undo point.
    pub fn begin_drag(&mut self) {
        self.drag_origin = Some(self.snapshot());
    }

    /// Finish a drag gesture. Records one history entry if anything moved.
    pub fn end_drag(&mut self) -> bool {
        let Some(origin) = self.drag_origin.take() else {
            return false;
        };
        if Arc::ptr_eq(&origin.nodes, &self.nodes) {
            return false;
        }
        self.history.record(origin);
        true
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    /// Delete a node, deferring to the user when it is a group with children.
    pub fn request_delete(&mut self, id: &str) -> Result<DeleteOutcome> {
        let node = self.require_node(id)?;
        let node_id = node.id.clone();
        if node.is_group() {
            let child_count = self.children_of(id).len();
            if child_count >= 1 {
                self.request_dialog(PendingDialog::GroupDelete {
                    group_id: node_id.clone(),
                    child_count,
                });
                return Ok(DeleteOutcome::NeedsConfirmation {
                    group_id: node_id,
                    child_count,
                });
            }
        }
        self.remove_nodes(&[node_id.clone()]);
        Ok(DeleteOutcome::Deleted(vec![node_id]))
    }

    /// Resolve a pending `GroupDelete` dialog.
    pub fn confirm_group_delete(&mut self, mode: GroupDeleteMode) -> Result<Vec<NodeId>> {
        let group_id = match &self.dialog {
            PendingDialog::GroupDelete { group_id, .. } => group_id.clone(),
            other => return Err(WeftError::NoPendingDialog(other.kind().to_string())),
        };
        self.close_dialog();
        self.delete_group(group_id.as_str(), mode)
    }

    /// Delete a group with an explicit mode.
    pub fn delete_group(&mut self, id: &str, mode: GroupDeleteMode) -> Result<Vec<NodeId>> {
        let group = self.require_node(id)?.clone();
        match mode {
            GroupDeleteMode::GroupOnly => {
                let nodes: Vec<Node> = self
                    .nodes
                    .iter()
                    .filter(|n| n.id != group.id)
                    .map(|n| {
                        let mut n = n.clone();
                        if n.parent_id.as_ref() == Some(&group.id) {
                            n.parent_id = group.parent_id.clone();
                            n.position = n.position.offset(group.position);
                        }
                        n
                    })
                    .collect();
                info!(tab = %self.tab_id, group = %group.id, "Deleting group wrapper only");
                self.set_nodes(nodes, Change::Commit);
                Ok(vec![group.id])
            }
            GroupDeleteMode::All => {
                let mut doomed: Vec<NodeId> = self.descendants_of(id).into_iter().collect();
                doomed.sort();
                doomed.insert(0, group.id.clone());
                info!(tab = %self.tab_id, group = %group.id, removed = doomed.len(), "Deleting group and children");
                self.remove_nodes(&doomed);
                Ok(doomed)
            }
        }
    }

    /// Remove nodes and every edge touching them in one committed change.
    /// Children of a removed group move up to that group's parent scope.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        let doomed: HashSet<&NodeId> = ids.iter().collect();
        let parents: HashMap<&NodeId, (Option<NodeId>, Position)> = self
            .nodes
            .iter()
            .filter(|n| doomed.contains(&n.id))
            .map(|n| (&n.id, (n.parent_id.clone(), n.position)))
            .collect();

        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| !doomed.contains(&n.id))
            .map(|n| {
                let mut n = n.clone();
                while let Some((grand, offset)) = n.parent_id.as_ref().and_then(|p| parents.get(p)) {
                    n.position = n.position.offset(*offset);
                    n.parent_id = grand.clone();
                }
                n
            })
            .collect();
        if nodes.len() == self.nodes.len() {
            return;
        }
        self.set_nodes(nodes, Change::Commit);
    }

    // ── Edge operations ────────────────────────────────────────

    /// Check a prospective edge against the schemas of both endpoints.
    pub fn check_connection(
        &self,
        source: &NodeId,
        source_handle: &str,
        target: &NodeId,
        target_handle: &str,
    ) -> Result<()> {
        let source_node = self.require_node(source.as_str())?;
        let target_node = self.require_node(target.as_str())?;
        if source == target {
            return Err(WeftError::SelfLoop(source.to_string()));
        }

        let output = self
            .schemas
            .schema(&source_node.kind)
            .and_then(|s| s.output(source_handle))
            .ok_or_else(|| WeftError::UnknownHandle {
                node: source.to_string(),
                handle: source_handle.to_string(),
            })?;
        let input = self
            .schemas
            .schema(&target_node.kind)
            .and_then(|s| s.input(target_handle))
            .ok_or_else(|| WeftError::UnknownHandle {
                node: target.to_string(),
                handle: target_handle.to_string(),
            })?;

        if !ports_compatible(output, input) {
            return Err(WeftError::IncompatibleConnection {
                source_node: source.to_string(),
                source_handle: source_handle.to_string(),
                target_node: target.to_string(),
                target_handle: target_handle.to_string(),
            });
        }
        if !input.multiple && self.is_port_occupied(target, target_handle) {
            return Err(WeftError::PortOccupied {
                node: target.to_string(),
                handle: target_handle.to_string(),
            });
        }
        Ok(())
    }

    /// Validate and add an edge.
    pub fn connect(&mut self, edge: Edge) -> Result<EdgeId> {
        self.check_connection(
            &edge.source,
            &edge.source_handle,
            &edge.target,
            &edge.target_handle,
        )?;
        if let Some(existing) = self.edges.iter().find(|e| {
            e.source == edge.source
                && e.source_handle == edge.source_handle
                && e.ends_at(&edge.target, &edge.target_handle)
        }) {
            return Ok(existing.id.clone());
        }
        debug!(tab = %self.tab_id, source = %edge.source, target = %edge.target, "Connecting");
        let id = edge.id.clone();
        let mut edges = self.edges.as_ref().clone();
        edges.push(edge);
        self.set_edges(edges, Change::Commit);
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<()> {
        if self.edge(id).is_none() {
            return Err(WeftError::EdgeNotFound(id.to_string()));
        }
        let edges = self
            .edges
            .iter()
            .filter(|e| e.id.as_str() != id)
            .cloned()
            .collect();
        self.set_edges(edges, Change::Commit);
        Ok(())
    }

    // ── History ────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.snapshot()) {
            Some(previous) => {
                info!(tab = %self.tab_id, remaining = self.history.undo_depth(), "Undo");
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.snapshot()) {
            Some(next) => {
                info!(tab = %self.tab_id, remaining = self.history.redo_depth(), "Redo");
                self.restore(next);
                true
            }
            None => false,
        }
    }

    // ── Internals ──────────────────────────────────────────────

    /// Push the undo point for a committed change. During a drag the undo
    /// point is the pre-drag state, so no drag frame ever enters history.
    fn record(&mut self, change: Change) {
        if change != Change::Commit {
            return;
        }
        let before = match &self.drag_origin {
            Some(origin) => origin.clone(),
            None => self.snapshot(),
        };
        self.history.record(before);
    }

    /// After a commit lands mid-drag, move the drag's undo point to the
    /// committed state with the dragged nodes back at their pre-drag
    /// positions. Undo then reverts the drag and the commit separately, in
    /// the order they happened.
    fn rebase_drag(&mut self, change: Change) {
        if change != Change::Commit {
            return;
        }
        let Some(origin) = self.drag_origin.take() else {
            return;
        };
        let before: HashMap<&NodeId, Position> =
            origin.nodes.iter().map(|n| (&n.id, n.position)).collect();
        let moved = self
            .nodes
            .iter()
            .any(|n| before.get(&n.id).is_some_and(|p| *p != n.position));
        let nodes = if moved {
            let rebased: Vec<Node> = self
                .nodes
                .iter()
                .map(|n| {
                    let mut n = n.clone();
                    if let Some(position) = before.get(&n.id) {
                        n.position = *position;
                    }
                    n
                })
                .collect();
            Arc::new(rebased)
        } else {
            self.nodes.clone()
        };
        debug!(tab = %self.tab_id, moved, "Commit landed during drag");
        self.drag_origin = Some(GraphSnapshot::new(nodes, self.edges.clone(), self.viewport));
    }

    fn restore(&mut self, snapshot: GraphSnapshot) {
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        self.viewport = snapshot.viewport;
        self.drag_origin = None;
        self.refresh_name_conflicts();
    }

    fn replace_nodes(&mut self, nodes: Vec<Node>) {
        let ids: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
        if self
            .edges
            .iter()
            .any(|e| !ids.contains(&e.source) || !ids.contains(&e.target))
        {
            let edges = self
                .edges
                .iter()
                .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
                .cloned()
                .collect();
            self.edges = Arc::new(edges);
        }
        self.nodes = Arc::new(nodes);
        self.refresh_name_conflicts();
    }

    fn require_node(&self, id: &str) -> Result<&Node> {
        self.node(id)
            .ok_or_else(|| WeftError::NodeNotFound(id.to_string()))
    }

    fn map_node(&mut self, id: &str, change: Change, f: impl FnOnce(&mut Node)) {
        let mut nodes = self.nodes.as_ref().clone();
        if let Some(node) = nodes.iter_mut().find(|n| n.id.as_str() == id) {
            f(node);
        }
        self.set_nodes(nodes, change);
    }

    fn write_field(&mut self, id: &str, field: &str, value: serde_json::Value) {
        let field = field.to_string();
        self.map_node(id, Change::Commit, move |n| {
            n.config.insert(field, value);
        });
    }

    /// Recompute which nodes share a derived name with a sibling.
    fn refresh_name_conflicts(&mut self) {
        let mut by_scope: HashMap<(Option<&NodeId>, String), Vec<&NodeId>> = HashMap::new();
        for node in self.nodes.iter() {
            let name_field = self
                .schemas
                .schema(&node.kind)
                .map(|s| s.name_field.as_str())
                .unwrap_or("name");
            if let Some(name) = node.derived_name(name_field) {
                by_scope
                    .entry((node.parent_id.as_ref(), name))
                    .or_default()
                    .push(&node.id);
            }
        }

        let mut conflicts = HashMap::new();
        for ids in by_scope.values() {
            let clash = ids.len() > 1;
            for id in ids {
                conflicts.insert((*id).clone(), clash);
            }
        }
        self.name_conflicts = conflicts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_core::schema::BuiltinSchemas;

    fn store() -> GraphStore {
        GraphStore::new(
            TabId::from("t1"),
            &EditorConfig::default(),
            Arc::new(BuiltinSchemas::with_builtins()),
        )
    }

    fn grouped_store() -> GraphStore {
        let mut s = store();
        s.add_node(Node::new("g", "group").at(100.0, 100.0)).unwrap();
        for (i, id) in ["c1", "c2", "c3"].iter().enumerate() {
            s.add_node(Node::new(*id, "agent").at(10.0 * i as f64, 5.0).with_parent("g"))
                .unwrap();
        }
        s.add_node(Node::new("outside", "probe")).unwrap();
        s.connect(Edge::new("c1", "out", "c2", "in").with_id("inner")).unwrap();
        s.connect(Edge::new("c3", "out", "outside", "in").with_id("outer")).unwrap();
        s
    }

    #[test]
    fn test_history_roundtrip() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        s.add_node(Node::new("b", "agent")).unwrap();
        s.connect(Edge::new("a", "out", "b", "in")).unwrap();

        assert!(s.undo());
        assert!(s.undo());
        assert_eq!(s.nodes().len(), 1);
        assert_eq!(s.nodes()[0].id.as_str(), "a");

        assert!(s.redo());
        assert_eq!(s.nodes().len(), 2);
        assert!(s.edges().is_empty());

        assert!(s.redo());
        assert_eq!(s.edges().len(), 1);
        assert!(!s.redo());
    }

    #[test]
    fn test_undo_restores_viewport() {
        let mut s = store();
        let framed = Viewport {
            x: 40.0,
            y: 0.0,
            zoom: 1.5,
        };
        s.set_viewport(framed, Change::Transient);
        s.add_node(Node::new("a", "agent")).unwrap();
        s.set_viewport(Viewport::default(), Change::Transient);
        assert!(s.undo());
        assert_eq!(s.viewport(), framed);
    }

    #[test]
    fn test_drag_records_once() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        let depth = s.history().undo_depth();

        s.begin_drag();
        for i in 0..10 {
            s.move_node("a", Position::new(i as f64, 0.0), Change::Transient)
                .unwrap();
        }
        assert!(s.end_drag());
        assert_eq!(s.history().undo_depth(), depth + 1);

        s.undo();
        assert_eq!(s.node("a").unwrap().position, Position::default());
    }

    #[test]
    fn test_commit_during_drag_keeps_arrival_order() {
        let mut s = store();
        s.add_node(Node::new("a", "prompt")).unwrap();

        s.begin_drag();
        s.move_node("a", Position::new(50.0, 0.0), Change::Transient)
            .unwrap();
        assert!(s.apply_file_sync("a", "code", "x").unwrap());
        s.move_node("a", Position::new(100.0, 0.0), Change::Transient)
            .unwrap();
        assert!(s.end_drag());

        // The drag goes first, keeping the synced content.
        assert!(s.undo());
        let a = s.node("a").unwrap();
        assert_eq!(a.position, Position::default());
        assert_eq!(a.field_str("code"), Some("x"));

        // Then the sync, straight back to the pre-drag state.
        assert!(s.undo());
        let a = s.node("a").unwrap();
        assert_eq!(a.position, Position::default());
        assert_eq!(a.field_str("code"), None);

        assert!(s.redo());
        assert!(s.redo());
        let a = s.node("a").unwrap();
        assert_eq!(a.position, Position::new(100.0, 0.0));
        assert_eq!(a.field_str("code"), Some("x"));
    }

    #[test]
    fn test_commit_during_still_drag_records_once() {
        let mut s = store();
        s.add_node(Node::new("a", "prompt")).unwrap();
        let depth = s.history().undo_depth();

        s.begin_drag();
        s.apply_file_sync("a", "code", "x").unwrap();
        assert!(!s.end_drag());
        assert_eq!(s.history().undo_depth(), depth + 1);
        assert!(s.undo());
        assert_eq!(s.node("a").unwrap().field_str("code"), None);
    }

    #[test]
    fn test_drag_without_movement_records_nothing() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        let depth = s.history().undo_depth();
        s.begin_drag();
        assert!(!s.end_drag());
        assert_eq!(s.history().undo_depth(), depth);
    }

    #[test]
    fn test_transient_changes_not_recorded() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        let depth = s.history().undo_depth();
        s.set_node_expanded("a", true).unwrap();
        s.set_viewport(Viewport::default(), Change::Transient);
        s.request_dialog(PendingDialog::DeleteConfirm { node_ids: vec![] });
        s.set_mouse_position(Position::new(3.0, 4.0));
        assert_eq!(s.history().undo_depth(), depth);
    }

    #[test]
    fn test_lock_policy() {
        let mut s = store();
        s.add_node(Node::new("a", "agent").locked()).unwrap();

        let err = s.update_node_config("a", "name", json!("x")).unwrap_err();
        assert!(matches!(err, WeftError::NodeLocked(_)));
        let err = s
            .move_node("a", Position::new(1.0, 1.0), Change::Commit)
            .unwrap_err();
        assert!(matches!(err, WeftError::NodeLocked(_)));
        assert!(s
            .resize_node("a", Size { width: 1.0, height: 1.0 })
            .is_err());

        s.set_node_locked("a", false).unwrap();
        s.update_node_config("a", "name", json!("x")).unwrap();
        assert_eq!(s.node("a").unwrap().field_str("name"), Some("x"));
    }

    #[test]
    fn test_locked_node_still_connects() {
        let mut s = store();
        s.add_node(Node::new("a", "tool").locked()).unwrap();
        s.add_node(Node::new("b", "agent")).unwrap();
        assert!(s.connect(Edge::new("a", "out", "b", "tools")).is_ok());
    }

    #[test]
    fn test_connect_validation() {
        let mut s = store();
        s.add_node(Node::new("agent", "agent")).unwrap();
        s.add_node(Node::new("tool", "tool")).unwrap();
        s.add_node(Node::new("p1", "prompt")).unwrap();
        s.add_node(Node::new("p2", "prompt")).unwrap();

        let err = s.connect(Edge::new("tool", "out", "agent", "system")).unwrap_err();
        assert!(matches!(err, WeftError::IncompatibleConnection { .. }));

        let err = s.connect(Edge::new("agent", "out", "agent", "in")).unwrap_err();
        assert!(matches!(err, WeftError::SelfLoop(_)));

        let err = s.connect(Edge::new("tool", "bogus", "agent", "tools")).unwrap_err();
        assert!(matches!(err, WeftError::UnknownHandle { .. }));

        s.connect(Edge::new("p1", "out", "agent", "system")).unwrap();
        let err = s.connect(Edge::new("p2", "out", "agent", "system")).unwrap_err();
        assert!(matches!(err, WeftError::PortOccupied { .. }));
    }

    #[test]
    fn test_connect_duplicate_returns_existing() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        s.add_node(Node::new("b", "agent")).unwrap();
        let first = s.connect(Edge::new("a", "out", "b", "in")).unwrap();
        let second = s.connect(Edge::new("a", "out", "b", "in")).unwrap();
        assert_eq!(first, second);
        assert_eq!(s.edges().len(), 1);
    }

    #[test]
    fn test_delete_node_removes_incident_edges() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        s.add_node(Node::new("b", "agent")).unwrap();
        s.add_node(Node::new("c", "probe")).unwrap();
        s.connect(Edge::new("a", "out", "b", "in")).unwrap();
        s.connect(Edge::new("b", "out", "c", "in")).unwrap();

        let outcome = s.request_delete("b").unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted(vec![NodeId::from("b")]));
        assert!(s.edges().is_empty());
        assert_eq!(s.nodes().len(), 2);
    }

    #[test]
    fn test_empty_group_deletes_silently() {
        let mut s = store();
        s.add_node(Node::new("g", "group")).unwrap();
        let outcome = s.request_delete("g").unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(!s.dialog().is_open());
        assert!(s.nodes().is_empty());
    }

    #[test]
    fn test_group_with_children_requires_confirmation() {
        let mut s = grouped_store();
        let outcome = s.request_delete("g").unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::NeedsConfirmation {
                group_id: NodeId::from("g"),
                child_count: 3
            }
        );
        assert_eq!(s.dialog().kind(), "group_delete");
        assert_eq!(s.nodes().len(), 5);
    }

    #[test]
    fn test_group_only_promotes_children() {
        let mut s = grouped_store();
        s.request_delete("g").unwrap();
        let removed = s.confirm_group_delete(GroupDeleteMode::GroupOnly).unwrap();
        assert_eq!(removed, vec![NodeId::from("g")]);
        assert!(!s.dialog().is_open());

        assert!(s.node("g").is_none());
        for id in ["c1", "c2", "c3"] {
            let child = s.node(id).unwrap();
            assert!(child.parent_id.is_none());
        }
        assert_eq!(s.node("c2").unwrap().position, Position::new(110.0, 105.0));
        assert!(s.edge("inner").is_some());
        assert!(s.edge("outer").is_some());
    }

    #[test]
    fn test_group_delete_all() {
        let mut s = grouped_store();
        s.request_delete("g").unwrap();
        let removed = s.confirm_group_delete(GroupDeleteMode::All).unwrap();
        assert_eq!(removed.len(), 4);
        assert_eq!(s.nodes().len(), 1);
        assert_eq!(s.nodes()[0].id.as_str(), "outside");
        assert!(s.edges().is_empty());
    }

    #[test]
    fn test_group_threshold_ignores_grandchildren_only() {
        let mut s = store();
        s.add_node(Node::new("outer", "group")).unwrap();
        s.add_node(Node::new("inner", "group").with_parent("outer"))
            .unwrap();
        s.add_node(Node::new("leaf", "agent").with_parent("inner"))
            .unwrap();

        // One direct child is enough to ask.
        assert!(matches!(
            s.request_delete("outer").unwrap(),
            DeleteOutcome::NeedsConfirmation { child_count: 1, .. }
        ));
        let removed = s.confirm_group_delete(GroupDeleteMode::All).unwrap();
        assert_eq!(removed.len(), 3);
    }

    #[test]
    fn test_confirm_without_dialog() {
        let mut s = store();
        assert!(matches!(
            s.confirm_group_delete(GroupDeleteMode::All),
            Err(WeftError::NoPendingDialog(_))
        ));
    }

    #[test]
    fn test_name_conflicts_are_per_scope() {
        let mut s = store();
        s.add_node(Node::new("a", "agent").with_name("Writer")).unwrap();
        s.add_node(Node::new("b", "agent").with_name("writer")).unwrap();
        s.add_node(Node::new("c", "agent").with_name("Writer").with_parent("g"))
            .unwrap();

        assert!(s.has_name_conflict("a"));
        assert!(s.has_name_conflict("b"));
        assert!(!s.has_name_conflict("c"));

        s.update_node_config("b", "name", json!("Editor")).unwrap();
        assert!(!s.has_name_conflict("a"));
    }

    #[test]
    fn test_set_nodes_prunes_edges() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        s.add_node(Node::new("b", "agent")).unwrap();
        s.connect(Edge::new("a", "out", "b", "in")).unwrap();
        s.set_nodes(vec![Node::new("a", "agent")], Change::Commit);
        assert!(s.edges().is_empty());

        s.set_edges(vec![Edge::new("a", "out", "zzz", "in")], Change::Commit);
        assert!(s.edges().is_empty());
    }

    #[test]
    fn test_snap_to_grid() {
        let mut s = store();
        s.set_snap_to_grid(true);
        s.add_node(Node::new("a", "agent").at(22.0, 7.0)).unwrap();
        assert_eq!(s.node("a").unwrap().position, Position::new(15.0, 0.0));
    }

    #[test]
    fn test_file_sync_bypasses_lock_and_skips_noop() {
        let mut s = store();
        s.add_node(Node::new("t", "tool").locked()).unwrap();
        assert!(s.apply_file_sync("t", "code", "print(1)").unwrap());
        assert!(!s.apply_file_sync("t", "code", "print(1)").unwrap());
        assert_eq!(s.node("t").unwrap().field_str("code"), Some("print(1)"));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut s = store();
        s.add_node(Node::new("a", "agent")).unwrap();
        assert!(matches!(
            s.add_node(Node::new("a", "tool")),
            Err(WeftError::DuplicateNode(_))
        ));
    }
}
