//! The open workflow: tabs plus the registries that span them.
//!
//! A `Workflow` is constructed when a workflow is opened and torn down by
//! [`Workflow::close`]. Gesture and editing entry points act on the active
//! tab and keep the handle and teleporter registries in step with the store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use weft_core::config::EditorConfig;
use weft_core::error::{Result, WeftError};
use weft_core::event::EventBus;
use weft_core::schema::NodeKind;
use weft_core::traits::SchemaRegistry;
use weft_core::types::{EdgeId, EditorEvent, NodeId, TabId, TeleportDirection};

use crate::connection::{ConnectGesture, ConnectionTracker};
use crate::dialog::{GroupDeleteMode, PendingDialog};
use crate::document::{DocumentStore, WorkflowDocument};
use crate::edge::Edge;
use crate::handles::HandleRegistry;
use crate::node::Node;
use crate::store::{DeleteOutcome, GraphStore};
use crate::teleport::{self, TeleportEntry, TeleportRegistry};

/// One editor tab.
pub struct Tab {
    pub id: TabId,
    pub store: GraphStore,
    /// Directory that file-backed fields resolve against. File sync is off
    /// for the tab while unset.
    pub project_path: Option<PathBuf>,
}

pub struct Workflow {
    config: EditorConfig,
    schemas: Arc<dyn SchemaRegistry>,
    tabs: Vec<Tab>,
    active: Option<TabId>,
    teleports: TeleportRegistry,
    tracker: ConnectionTracker,
    handles: HandleRegistry,
    events: Arc<EventBus>,
}

impl Workflow {
    /// An open workflow with no tabs.
    pub fn new(config: EditorConfig, schemas: Arc<dyn SchemaRegistry>, events: Arc<EventBus>) -> Self {
        let teleports = TeleportRegistry::new(config.teleport.clone());
        Self {
            config,
            schemas,
            tabs: Vec::new(),
            active: None,
            teleports,
            tracker: ConnectionTracker::new(),
            handles: HandleRegistry::new(),
            events,
        }
    }

    /// Open a workflow from in-memory documents. The first tab becomes active.
    pub fn open(
        config: EditorConfig,
        schemas: Arc<dyn SchemaRegistry>,
        events: Arc<EventBus>,
        docs: Vec<(TabId, WorkflowDocument)>,
    ) -> Self {
        let mut workflow = Self::new(config, schemas, events);
        for (id, doc) in docs {
            workflow.load_tab(id, doc);
        }
        let tabs = workflow.tab_ids();
        info!(tabs = tabs.len(), teleporters = workflow.teleports.len(), "Workflow opened");
        workflow.events.publish(EditorEvent::WorkflowOpened { tabs });
        workflow
    }

    /// Open a workflow by loading each tab from a document store.
    pub async fn open_from(
        store: &dyn DocumentStore,
        tab_ids: &[TabId],
        config: EditorConfig,
        schemas: Arc<dyn SchemaRegistry>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let mut docs = Vec::with_capacity(tab_ids.len());
        for id in tab_ids {
            docs.push((id.clone(), store.load(id).await?));
        }
        Ok(Self::open(config, schemas, events, docs))
    }

    /// Persist every tab.
    pub async fn save_to(&self, store: &dyn DocumentStore) -> Result<()> {
        for tab in &self.tabs {
            store.save(&tab.id, &tab.store.to_document()).await?;
        }
        Ok(())
    }

    /// Tear down every registry and drop all tabs.
    pub fn close(&mut self) {
        self.tracker.reset();
        self.handles = HandleRegistry::new();
        self.teleports.clear();
        self.tabs.clear();
        self.active = None;
        info!("Workflow closed");
        self.events.publish(EditorEvent::WorkflowClosed);
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn schemas(&self) -> &Arc<dyn SchemaRegistry> {
        &self.schemas
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.id.clone()).collect()
    }

    pub fn tab(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == *id)
    }

    pub fn tab_mut(&mut self, id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == *id)
    }

    pub fn active_tab_id(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active.as_ref()?)
    }

    pub fn teleports(&self) -> &TeleportRegistry {
        &self.teleports
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    // ── Tab lifecycle ──────────────────────────────────────────

    /// Load (or reload) a tab from a document. The tab's teleporters are
    /// re-derived from its nodes.
    pub fn load_tab(&mut self, id: TabId, doc: WorkflowDocument) -> &mut Tab {
        let store = GraphStore::from_document(id.clone(), doc, &self.config, self.schemas.clone());
        let idx = match self.tabs.iter().position(|t| t.id == id) {
            Some(idx) => {
                self.tabs[idx].store = store;
                idx
            }
            None => {
                self.tabs.push(Tab {
                    id: id.clone(),
                    store,
                    project_path: None,
                });
                self.tabs.len() - 1
            }
        };
        debug!(tab = %id, nodes = self.tabs[idx].store.nodes().len(), "Tab loaded");

        self.refresh_teleports(idx);
        if self.active.as_ref().map_or(true, |active| *active == id) {
            self.activate(idx);
        }
        &mut self.tabs[idx]
    }

    pub fn close_tab(&mut self, id: &TabId) -> Result<Tab> {
        let idx = self.tab_index(id)?;
        let tab = self.tabs.remove(idx);
        for entry in self.teleports.clear_tab(id) {
            self.events
                .publish(EditorEvent::TeleportUnregistered {
                    id: entry.id,
                    tab_id: entry.tab_id,
                });
        }
        if self.active.as_ref() == Some(id) {
            self.active = None;
            self.tracker.reset();
            self.handles = HandleRegistry::new();
            if !self.tabs.is_empty() {
                self.activate(0);
            }
        }
        info!(tab = %id, "Tab closed");
        Ok(tab)
    }

    /// Make another tab active. Any drag in progress is abandoned.
    pub fn switch_tab(&mut self, id: &TabId) -> Result<()> {
        let idx = self.tab_index(id)?;
        self.activate(idx);
        Ok(())
    }

    pub fn set_project_path(&mut self, id: &TabId, path: Option<PathBuf>) -> Result<()> {
        let idx = self.tab_index(id)?;
        debug!(tab = %id, path = ?path, "Project path set");
        self.tabs[idx].project_path = path;
        Ok(())
    }

    // ── Connection gestures ────────────────────────────────────

    pub fn on_connect_start(&mut self, gesture: &ConnectGesture) -> bool {
        let Ok(idx) = self.active_index() else {
            return false;
        };
        self.tracker
            .on_connect_start(gesture, &self.handles, &mut self.tabs[idx].store)
    }

    pub fn is_valid_target(&self, node: &str, handle: &str) -> bool {
        self.active_tab()
            .is_some_and(|tab| self.tracker.is_valid_target(&tab.store, node, handle))
    }

    /// End the drag. When it ended over a valid target port, the edge is
    /// created and its id returned.
    pub fn on_connect_end(&mut self, dropped_on: Option<(&str, &str)>) -> Option<EdgeId> {
        let valid = dropped_on.is_some_and(|(node, handle)| self.is_valid_target(node, handle));
        let session = self.tracker.on_connect_end()?;
        let (node, handle) = dropped_on?;
        if !valid {
            debug!(node_id = %node, handle_id = %handle, "Drop on invalid target");
            return None;
        }
        let edge = Edge::new(
            session.source_node_id.as_str(),
            &session.source_handle_id,
            node,
            handle,
        );
        self.connect(edge).ok()
    }

    // ── Editing (active tab) ───────────────────────────────────

    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        let idx = self.active_index()?;
        let id = node.id.clone();
        self.tabs[idx].store.add_node(node)?;
        if let Some(node) = self.tabs[idx].store.node(id.as_str()) {
            self.handles.register_node(node, self.schemas.as_ref());
        }
        self.refresh_teleports(idx);
        self.events.publish(EditorEvent::NodeAdded {
            tab_id: self.tabs[idx].id.clone(),
            node_id: id.clone(),
        });
        self.publish_history(idx);
        Ok(id)
    }

    /// Delete a node. Groups with children wait for
    /// [`Workflow::confirm_group_delete`].
    pub fn delete_node(&mut self, id: &str) -> Result<DeleteOutcome> {
        let idx = self.active_index()?;
        let outcome = self.tabs[idx].store.request_delete(id)?;
        if let DeleteOutcome::Deleted(ids) = &outcome {
            self.after_removal(idx, ids.clone());
        }
        Ok(outcome)
    }

    pub fn confirm_group_delete(&mut self, mode: GroupDeleteMode) -> Result<Vec<NodeId>> {
        let idx = self.active_index()?;
        let removed = self.tabs[idx].store.confirm_group_delete(mode)?;
        self.after_removal(idx, removed.clone());
        Ok(removed)
    }

    pub fn connect(&mut self, edge: Edge) -> Result<EdgeId> {
        let idx = self.active_index()?;
        let before = self.tabs[idx].store.edges().len();
        let id = self.tabs[idx].store.connect(edge)?;
        if self.tabs[idx].store.edges().len() != before {
            self.events.publish(EditorEvent::EdgeConnected {
                tab_id: self.tabs[idx].id.clone(),
                edge_id: id.clone(),
            });
            self.publish_history(idx);
        }
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<()> {
        let idx = self.active_index()?;
        self.tabs[idx].store.remove_edge(id)?;
        self.events.publish(EditorEvent::EdgeRemoved {
            tab_id: self.tabs[idx].id.clone(),
            edge_id: EdgeId::from(id),
        });
        self.publish_history(idx);
        Ok(())
    }

    pub fn update_node_config(&mut self, id: &str, field: &str, value: serde_json::Value) -> Result<()> {
        let idx = self.active_index()?;
        self.tabs[idx].store.update_node_config(id, field, value)?;
        self.refresh_teleports(idx);
        self.publish_history(idx);
        Ok(())
    }

    pub fn set_node_expanded(&mut self, id: &str, expanded: bool) -> Result<()> {
        let idx = self.active_index()?;
        self.tabs[idx].store.set_node_expanded(id, expanded)
    }

    /// Merge external file content into a node of any tab.
    pub fn apply_file_sync(&mut self, tab: &TabId, node: &str, field: &str, content: &str) -> Result<bool> {
        let idx = self.tab_index(tab)?;
        let changed = self.tabs[idx].store.apply_file_sync(node, field, content)?;
        if changed {
            self.publish_history(idx);
        }
        Ok(changed)
    }

    pub fn undo(&mut self) -> bool {
        self.step_history(GraphStore::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(GraphStore::redo)
    }

    // ── Teleporters ────────────────────────────────────────────

    /// Open the name prompt for a connector node on the active tab.
    pub fn request_teleport_rename(&mut self, id: &str) -> Result<()> {
        let idx = self.active_index()?;
        let store = &mut self.tabs[idx].store;
        let node = store
            .node(id)
            .ok_or_else(|| WeftError::NodeNotFound(id.to_string()))?;
        if node.kind != NodeKind::Connector {
            return Err(WeftError::NotATeleporter(id.to_string()));
        }
        let direction = match node.field_str(teleport::DIRECTION_FIELD) {
            Some("in") => TeleportDirection::In,
            _ => TeleportDirection::Out,
        };
        let dialog = PendingDialog::TeleportNamePrompt {
            node_id: node.id.clone(),
            direction,
            current_name: node.field_str(teleport::NAME_FIELD).map(str::to_string),
        };
        store.request_dialog(dialog);
        Ok(())
    }

    /// Answer a pending name prompt. The connector's name field is updated
    /// and the registry follows.
    pub fn submit_teleport_name(&mut self, name: &str) -> Result<()> {
        let idx = self.active_index()?;
        let node_id = match self.tabs[idx].store.dialog() {
            PendingDialog::TeleportNamePrompt { node_id, .. } => node_id.clone(),
            other => return Err(WeftError::NoPendingDialog(other.kind().to_string())),
        };
        self.tabs[idx].store.close_dialog();
        self.update_node_config(
            node_id.as_str(),
            teleport::NAME_FIELD,
            serde_json::Value::String(name.trim().to_string()),
        )
    }

    /// Names a new connector facing `direction` could pick from.
    pub fn available_connections(&self, direction: TeleportDirection) -> Vec<String> {
        self.teleports.available_connections(direction)
    }

    /// Entries linked to a connector of `tab`: same name, any tab,
    /// excluding itself.
    pub fn linked_teleporters(&self, tab: &TabId, id: &str) -> Vec<&TeleportEntry> {
        let Some(entry) = self.teleports.entry(tab, id) else {
            return Vec::new();
        };
        self.teleports
            .matching_connections(&entry.name, None)
            .into_iter()
            .filter(|e| !(e.tab_id == *tab && e.id.as_str() == id))
            .collect()
    }

    // ── Internals ──────────────────────────────────────────────

    fn tab_index(&self, id: &TabId) -> Result<usize> {
        self.tabs
            .iter()
            .position(|t| t.id == *id)
            .ok_or_else(|| WeftError::TabNotFound(id.to_string()))
    }

    fn active_index(&self) -> Result<usize> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| WeftError::TabNotFound("<none>".to_string()))?;
        self.tab_index(active)
    }

    fn activate(&mut self, idx: usize) {
        self.tracker.reset();
        let tab = &self.tabs[idx];
        self.handles.rebuild(&tab.store);
        debug!(tab = %tab.id, "Tab activated");
        self.active = Some(tab.id.clone());
    }

    fn after_removal(&mut self, idx: usize, ids: Vec<NodeId>) {
        for id in &ids {
            self.handles.unregister_node(id.as_str());
        }
        self.refresh_teleports(idx);
        self.events.publish(EditorEvent::NodesRemoved {
            tab_id: self.tabs[idx].id.clone(),
            node_ids: ids,
        });
        self.publish_history(idx);
    }

    fn step_history(&mut self, step: fn(&mut GraphStore) -> bool) -> bool {
        let Ok(idx) = self.active_index() else {
            return false;
        };
        if !step(&mut self.tabs[idx].store) {
            return false;
        }
        self.tracker.reset();
        self.handles.rebuild(&self.tabs[idx].store);
        self.refresh_teleports(idx);
        self.publish_history(idx);
        true
    }

    /// Re-derive a tab's teleporter entries and publish what changed.
    fn refresh_teleports(&mut self, idx: usize) {
        let tab = &self.tabs[idx];
        let before: HashMap<NodeId, TeleportEntry> = self
            .teleports
            .entries_for_tab(&tab.id)
            .into_iter()
            .map(|e| (e.id.clone(), e.clone()))
            .collect();
        self.teleports.rebuild_tab(&tab.id, tab.store.nodes());

        for entry in self.teleports.entries_for_tab(&tab.id) {
            if before.get(&entry.id) != Some(entry) {
                self.events.publish(EditorEvent::TeleportRegistered {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    tab_id: entry.tab_id.clone(),
                });
            }
        }
        for id in before.keys() {
            if self.teleports.entry(&tab.id, id.as_str()).is_none() {
                self.events.publish(EditorEvent::TeleportUnregistered {
                    id: id.clone(),
                    tab_id: tab.id.clone(),
                });
            }
        }
    }

    fn publish_history(&self, idx: usize) {
        let tab = &self.tabs[idx];
        self.events.publish(EditorEvent::HistoryChanged {
            tab_id: tab.id.clone(),
            undo_depth: tab.store.history().undo_depth(),
            redo_depth: tab.store.history().redo_depth(),
        });
    }
}
