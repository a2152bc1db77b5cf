use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use weft_core::schema::NodeKind;
use weft_core::types::{NodeId, Position, Size};

/// A node on the canvas.
///
/// The configuration map is free-form; its shape is declared by the schema of
/// the node's kind. Grouping is expressed by `parent_id`, and a child's
/// position is relative to its parent group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// Built-in or schema-driven kind.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Field id → value.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Locked nodes reject moves and configuration edits.
    #[serde(default)]
    pub locked: bool,
    /// Enclosing group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Whether the node shows its typed sub-outputs and editors.
    #[serde(default)]
    pub expanded: bool,
}

impl Node {
    /// Create a new node with minimal configuration.
    pub fn new(id: impl Into<NodeId>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position: Position::default(),
            size: None,
            config: BTreeMap::new(),
            locked: false,
            parent_id: None,
            expanded: false,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(field.into(), value);
        self
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_field("name", serde_json::Value::String(name.to_string()))
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn expanded(mut self) -> Self {
        self.expanded = true;
        self
    }

    pub fn field(&self, field: &str) -> Option<&serde_json::Value> {
        self.config.get(field)
    }

    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.config.get(field).and_then(|v| v.as_str())
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    /// Name used for duplicate detection: the value of `name_field`, trimmed.
    /// Blank names never conflict.
    pub fn derived_name(&self, name_field: &str) -> Option<String> {
        self.field_str(name_field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
    }
}
