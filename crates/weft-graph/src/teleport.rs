//! Teleporters: named connectors that link graph regions across tabs.
//!
//! A link is never an edge. Two connectors are linked when they share a name,
//! and that relation is resolved here at read time, so a tab that isn't loaded
//! never leaves a dangling edge behind.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use weft_core::config::TeleportConfig;
use weft_core::error::{Result, WeftError};
use weft_core::schema::NodeKind;
use weft_core::types::{NodeId, TabId, TeleportDirection};

use crate::node::Node;

/// Config field holding the teleporter name on connector nodes.
pub const NAME_FIELD: &str = "name";
/// Config field holding `"in"` or `"out"`.
pub const DIRECTION_FIELD: &str = "direction";
pub const COLOR_FIELD: &str = "color";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleportEntry {
    /// Id of the connector node that declares this entry.
    pub id: NodeId,
    pub name: String,
    pub tab_id: TabId,
    pub direction: TeleportDirection,
    pub color: String,
}

impl TeleportEntry {
    /// Read an entry from a connector node. Nodes of other kinds, or
    /// connectors without a name, declare nothing.
    pub fn from_node(node: &Node, tab_id: &TabId, config: &TeleportConfig) -> Option<Self> {
        if node.kind != NodeKind::Connector {
            return None;
        }
        let name = node
            .field_str(NAME_FIELD)
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let direction = match node.field_str(DIRECTION_FIELD) {
            Some("in") => TeleportDirection::In,
            _ => TeleportDirection::Out,
        };
        let color = node
            .field_str(COLOR_FIELD)
            .map(str::to_string)
            .unwrap_or_else(|| config.color_for(name));
        Some(Self {
            id: node.id.clone(),
            name: name.to_string(),
            tab_id: tab_id.clone(),
            direction,
            color,
        })
    }
}

/// Registry key: node ids are unique within a tab only.
type EntryKey = (TabId, NodeId);

/// Workflow-wide registry of teleporter entries, spanning all tabs.
#[derive(Debug, Default)]
pub struct TeleportRegistry {
    entries: HashMap<EntryKey, TeleportEntry>,
    by_name: HashMap<String, Vec<EntryKey>>,
    config: TeleportConfig,
}

impl TeleportRegistry {
    pub fn new(config: TeleportConfig) -> Self {
        Self {
            entries: HashMap::new(),
            by_name: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TeleportConfig {
        &self.config
    }

    /// Add an entry. A node holds at most one entry, so a previous entry for
    /// the same node of the same tab is replaced.
    pub fn register(&mut self, entry: TeleportEntry) {
        self.unregister(&entry.tab_id, entry.id.as_str());
        debug!(id = %entry.id, name = %entry.name, tab = %entry.tab_id, "Teleporter registered");
        let key = (entry.tab_id.clone(), entry.id.clone());
        self.by_name
            .entry(entry.name.clone())
            .or_default()
            .push(key.clone());
        self.entries.insert(key, entry);
    }

    pub fn unregister(&mut self, tab: &TabId, id: &str) -> Option<TeleportEntry> {
        let key = (tab.clone(), NodeId::from(id));
        let entry = self.entries.remove(&key)?;
        if let Some(keys) = self.by_name.get_mut(&entry.name) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_name.remove(&entry.name);
            }
        }
        Some(entry)
    }

    /// Rename an entry: an unregister followed by a register.
    pub fn rename(&mut self, tab: &TabId, id: &str, name: &str) -> Result<()> {
        let mut entry = self
            .unregister(tab, id)
            .ok_or_else(|| WeftError::NotATeleporter(id.to_string()))?;
        info!(tab = %tab, id = %id, from = %entry.name, to = %name, "Teleporter renamed");
        entry.name = name.to_string();
        self.register(entry);
        Ok(())
    }

    pub fn entry(&self, tab: &TabId, id: &str) -> Option<&TeleportEntry> {
        self.entries.get(&(tab.clone(), NodeId::from(id)))
    }

    /// Every entry named `name`, optionally leaving out one tab's entries.
    /// Ordered by tab then id.
    pub fn matching_connections(&self, name: &str, exclude_tab: Option<&TabId>) -> Vec<&TeleportEntry> {
        let mut matches: Vec<&TeleportEntry> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|key| self.entries.get(key))
            .filter(|e| exclude_tab != Some(&e.tab_id))
            .collect();
        matches.sort_by(|a, b| (&a.tab_id, &a.id).cmp(&(&b.tab_id, &b.id)));
        matches
    }

    /// Distinct other tabs holding an entry named `name`.
    pub fn linked_tabs(&self, name: &str, from_tab: &TabId) -> Vec<TabId> {
        let tabs: BTreeSet<&TabId> = self
            .matching_connections(name, Some(from_tab))
            .into_iter()
            .map(|e| &e.tab_id)
            .collect();
        tabs.into_iter().cloned().collect()
    }

    /// Names a connector facing `direction` could link to: the distinct,
    /// sorted names of entries facing the other way.
    pub fn available_connections(&self, direction: TeleportDirection) -> Vec<String> {
        let wanted = direction.opposite();
        let names: BTreeSet<&str> = self
            .entries
            .values()
            .filter(|e| e.direction == wanted)
            .map(|e| e.name.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn entries_for_tab(&self, tab: &TabId) -> Vec<&TeleportEntry> {
        let mut entries: Vec<&TeleportEntry> =
            self.entries.values().filter(|e| e.tab_id == *tab).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Drop every entry declared by a tab.
    pub fn clear_tab(&mut self, tab: &TabId) -> Vec<TeleportEntry> {
        let ids: Vec<NodeId> = self
            .entries
            .keys()
            .filter(|(t, _)| t == tab)
            .map(|(_, id)| id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| self.unregister(tab, id.as_str()))
            .collect()
    }

    /// Re-derive a tab's entries from its nodes.
    pub fn rebuild_tab(&mut self, tab: &TabId, nodes: &[Node]) {
        self.clear_tab(tab);
        let entries: Vec<TeleportEntry> = nodes
            .iter()
            .filter_map(|n| TeleportEntry::from_node(n, tab, &self.config))
            .collect();
        for entry in entries {
            self.register(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, name: &str, tab: &str, direction: TeleportDirection) -> TeleportEntry {
        TeleportEntry {
            id: NodeId::from(id),
            name: name.to_string(),
            tab_id: TabId::from(tab),
            direction,
            color: "#fff".to_string(),
        }
    }

    #[test]
    fn test_matching_across_tabs() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("o", "shared-ctx", "T1", TeleportDirection::Out));
        registry.register(entry("i", "shared-ctx", "T2", TeleportDirection::In));
        registry.register(entry("x", "other", "T2", TeleportDirection::In));

        let all = registry.matching_connections("shared-ctx", None);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.name == "shared-ctx"));

        for (asking, counterpart, direction) in [
            ("T1", "i", TeleportDirection::In),
            ("T2", "o", TeleportDirection::Out),
        ] {
            let others = registry.matching_connections("shared-ctx", Some(&TabId::from(asking)));
            assert_eq!(others.len(), 1, "asked from {}", asking);
            assert_eq!(others[0].id.as_str(), counterpart);
            assert_eq!(others[0].direction, direction);
            assert_ne!(others[0].tab_id, TabId::from(asking));
        }

        assert!(registry.matching_connections("shared", None).is_empty());
    }

    #[test]
    fn test_same_node_id_in_two_tabs() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("connector-1", "shared-ctx", "T1", TeleportDirection::Out));
        registry.register(entry("connector-1", "shared-ctx", "T2", TeleportDirection::In));
        assert_eq!(registry.len(), 2);

        let matches: Vec<(&str, TeleportDirection)> = registry
            .matching_connections("shared-ctx", None)
            .into_iter()
            .map(|e| (e.tab_id.as_str(), e.direction))
            .collect();
        assert_eq!(
            matches,
            vec![("T1", TeleportDirection::Out), ("T2", TeleportDirection::In)]
        );

        let t1 = TabId::from("T1");
        let t2 = TabId::from("T2");
        registry.rename(&t1, "connector-1", "renamed").unwrap();
        assert_eq!(registry.entry(&t1, "connector-1").unwrap().name, "renamed");
        assert_eq!(registry.entry(&t2, "connector-1").unwrap().name, "shared-ctx");

        registry.clear_tab(&t1);
        assert!(registry.entry(&t1, "connector-1").is_none());
        assert!(registry.entry(&t2, "connector-1").is_some());
    }

    #[test]
    fn test_fan_out() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("o", "ctx", "T1", TeleportDirection::Out));
        registry.register(entry("i1", "ctx", "T2", TeleportDirection::In));
        registry.register(entry("i2", "ctx", "T3", TeleportDirection::In));
        registry.register(entry("i3", "ctx", "T3", TeleportDirection::In));

        let linked = registry.linked_tabs("ctx", &TabId::from("T1"));
        assert_eq!(linked, vec![TabId::from("T2"), TabId::from("T3")]);
    }

    #[test]
    fn test_one_entry_per_node() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("n", "a", "T1", TeleportDirection::Out));
        registry.register(entry("n", "b", "T1", TeleportDirection::Out));
        assert_eq!(registry.len(), 1);
        assert!(registry.matching_connections("a", None).is_empty());
        assert_eq!(registry.matching_connections("b", None).len(), 1);
    }

    #[test]
    fn test_rename() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("n", "old", "T1", TeleportDirection::In));
        let t1 = TabId::from("T1");
        registry.rename(&t1, "n", "new").unwrap();
        assert!(registry.matching_connections("old", None).is_empty());
        assert_eq!(registry.entry(&t1, "n").unwrap().name, "new");
        assert!(matches!(
            registry.rename(&t1, "missing", "x"),
            Err(WeftError::NotATeleporter(_))
        ));
        assert!(registry.rename(&TabId::from("T2"), "n", "x").is_err());
    }

    #[test]
    fn test_available_connections() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("o1", "beta", "T1", TeleportDirection::Out));
        registry.register(entry("o2", "alpha", "T2", TeleportDirection::Out));
        registry.register(entry("o3", "alpha", "T3", TeleportDirection::Out));
        registry.register(entry("i1", "gamma", "T1", TeleportDirection::In));

        assert_eq!(
            registry.available_connections(TeleportDirection::In),
            vec!["alpha".to_string(), "beta".to_string()]
        );
        assert_eq!(
            registry.available_connections(TeleportDirection::Out),
            vec!["gamma".to_string()]
        );
    }

    #[test]
    fn test_rebuild_tab_from_nodes() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("stale", "ctx", "T1", TeleportDirection::Out));
        registry.register(entry("keep", "ctx", "T2", TeleportDirection::In));

        let nodes = vec![
            Node::new("c1", "connector")
                .with_field("name", json!("ctx"))
                .with_field("direction", json!("out")),
            Node::new("c2", "connector").with_field("direction", json!("in")),
            Node::new("a", "agent").with_name("ctx"),
        ];
        let t1 = TabId::from("T1");
        registry.rebuild_tab(&t1, &nodes);

        assert!(registry.entry(&t1, "stale").is_none());
        assert!(registry.entry(&t1, "c2").is_none());
        assert!(registry.entry(&t1, "a").is_none());
        let c1 = registry.entry(&t1, "c1").unwrap();
        assert_eq!(c1.direction, TeleportDirection::Out);
        assert_eq!(c1.color, registry.config().color_for("ctx"));
        assert_eq!(registry.matching_connections("ctx", None).len(), 2);
    }

    #[test]
    fn test_clear_tab() {
        let mut registry = TeleportRegistry::default();
        registry.register(entry("a", "x", "T1", TeleportDirection::Out));
        registry.register(entry("b", "x", "T2", TeleportDirection::In));
        let removed = registry.clear_tab(&TabId::from("T1"));
        assert_eq!(removed.len(), 1);
        assert_eq!(registry.entries_for_tab(&TabId::from("T2")).len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }
}
