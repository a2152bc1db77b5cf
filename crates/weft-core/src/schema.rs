//! Node schemas: the port and field declarations behind each node kind.
//!
//! The connection validator and the handle registry never look at node
//! configuration directly; they ask the schema registry which outputs a kind
//! exposes and which capabilities/types its inputs accept.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::traits::SchemaRegistry;

/// Wildcard accepted by both capability and type sets.
pub const WILDCARD: &str = "*";
/// Type-only wildcard.
pub const ANY_TYPE: &str = "any";

/// Node kind: a closed set of built-ins plus schema-driven custom kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Agent,
    Tool,
    Prompt,
    Probe,
    /// Cross-tab teleporter.
    Connector,
    Group,
    Custom(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Probe => "probe",
            Self::Connector => "connector",
            Self::Group => "group",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "agent" => Self::Agent,
            "tool" => Self::Tool,
            "prompt" => Self::Prompt,
            "probe" => Self::Probe,
            "connector" => Self::Connector,
            "group" => Self::Group,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of accepted capabilities or data types.
///
/// Membership is a hash lookup; the wildcard flags are computed once at
/// construction so the drag hot path never scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AcceptSet {
    items: HashSet<String>,
    wildcard: bool,
    any_type: bool,
}

impl AcceptSet {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: HashSet<String> = items.into_iter().map(Into::into).collect();
        let wildcard = items.contains(WILDCARD);
        let any_type = items.contains(ANY_TYPE);
        Self {
            items,
            wildcard,
            any_type,
        }
    }

    /// Contains `*`.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Contains `*` or `any`.
    pub fn accepts_any_type(&self) -> bool {
        self.wildcard || self.any_type
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl From<Vec<String>> for AcceptSet {
    fn from(items: Vec<String>) -> Self {
        Self::new(items)
    }
}

impl From<AcceptSet> for Vec<String> {
    fn from(set: AcceptSet) -> Self {
        let mut items: Vec<String> = set.items.into_iter().collect();
        items.sort();
        items
    }
}

/// A source handle declared by a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPort {
    pub id: String,
    #[serde(default)]
    pub capability: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    /// The generic output: dragging from it expands the node to reveal
    /// the narrowly-typed outputs.
    #[serde(default)]
    pub default: bool,
}

impl OutputPort {
    pub fn new(id: impl Into<String>, capability: &str, data_type: &str) -> Self {
        Self {
            id: id.into(),
            capability: Some(capability.to_string()),
            data_type: Some(data_type.to_string()),
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// A target handle declared by a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub id: String,
    #[serde(default)]
    pub capabilities: AcceptSet,
    #[serde(default)]
    pub types: AcceptSet,
    /// Whether more than one edge may terminate here.
    #[serde(default)]
    pub multiple: bool,
}

impl InputPort {
    pub fn new(id: impl Into<String>, capabilities: &[&str], types: &[&str]) -> Self {
        Self {
            id: id.into(),
            capabilities: AcceptSet::new(capabilities.iter().copied()),
            types: AcceptSet::new(types.iter().copied()),
            multiple: false,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Binds a configuration field holding a relative path to the field that
/// receives the file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBinding {
    pub path_field: String,
    pub content_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub kind: NodeKind,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    /// Field whose value names the node for duplicate detection.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default)]
    pub file_binding: Option<FileBinding>,
}

fn default_name_field() -> String {
    "name".to_string()
}

impl NodeSchema {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            outputs: vec![],
            inputs: vec![],
            name_field: default_name_field(),
            file_binding: None,
        }
    }

    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_file_binding(mut self, path_field: &str, content_field: &str) -> Self {
        self.file_binding = Some(FileBinding {
            path_field: path_field.to_string(),
            content_field: content_field.to_string(),
        });
        self
    }

    pub fn output(&self, id: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.id == id)
    }

    pub fn input(&self, id: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.id == id)
    }
}

/// In-memory schema registry seeded with the built-in node kinds.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSchemas {
    schemas: HashMap<NodeKind, NodeSchema>,
}

impl BuiltinSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the schema for its kind.
    pub fn register(&mut self, schema: NodeSchema) {
        self.schemas.insert(schema.kind.clone(), schema);
    }

    pub fn unregister(&mut self, kind: &NodeKind) -> bool {
        self.schemas.remove(kind).is_some()
    }

    /// Registry with every built-in kind registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            NodeSchema::new(NodeKind::Agent)
                .with_output(OutputPort::new("out", "agent", ANY_TYPE).as_default())
                .with_output(OutputPort::new("out:text", "agent", "str"))
                .with_output(OutputPort::new("out:handoff", "agent", "agent"))
                .with_input(InputPort::new("in", &["agent", "prompt"], &[WILDCARD]).multiple())
                .with_input(InputPort::new("tools", &["tool"], &["callable"]).multiple())
                .with_input(InputPort::new("system", &["prompt"], &["str"])),
        );
        registry.register(
            NodeSchema::new(NodeKind::Tool)
                .with_output(OutputPort::new("out", "tool", "callable").as_default())
                .with_file_binding("file", "code"),
        );
        registry.register(
            NodeSchema::new(NodeKind::Prompt)
                .with_output(OutputPort::new("out", "prompt", "str").as_default())
                .with_input(InputPort::new("vars", &[WILDCARD], &["str", ANY_TYPE]).multiple())
                .with_file_binding("file", "template"),
        );
        registry.register(
            NodeSchema::new(NodeKind::Probe)
                .with_input(InputPort::new("in", &[WILDCARD], &[WILDCARD]).multiple()),
        );
        registry.register(
            NodeSchema::new(NodeKind::Connector)
                .with_output(OutputPort::new("out", WILDCARD, ANY_TYPE).as_default())
                .with_input(InputPort::new("in", &[WILDCARD], &[WILDCARD])),
        );
        registry.register(NodeSchema::new(NodeKind::Group));

        registry
    }

    pub fn kinds(&self) -> Vec<&NodeKind> {
        self.schemas.keys().collect()
    }
}

impl SchemaRegistry for BuiltinSchemas {
    fn schema(&self, kind: &NodeKind) -> Option<&NodeSchema> {
        self.schemas.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_roundtrip() {
        assert_eq!(NodeKind::from("agent"), NodeKind::Agent);
        assert_eq!(NodeKind::from("rag-user"), NodeKind::Custom("rag-user".into()));
        let json = serde_json::to_string(&NodeKind::Connector).unwrap();
        assert_eq!(json, "\"connector\"");
        let parsed: NodeKind = serde_json::from_str("\"my-kind\"").unwrap();
        assert_eq!(parsed.as_str(), "my-kind");
    }

    #[test]
    fn test_accept_set_flags() {
        let set = AcceptSet::new(["str", "any"]);
        assert!(set.accepts_any_type());
        assert!(!set.is_wildcard());
        assert!(set.contains("str"));

        let star = AcceptSet::new(["*"]);
        assert!(star.is_wildcard());
        assert!(star.accepts_any_type());

        let parsed: AcceptSet = serde_json::from_str(r#"["tool","*"]"#).unwrap();
        assert!(parsed.is_wildcard());
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_builtin_schemas() {
        let registry = BuiltinSchemas::with_builtins();
        let agent = registry.schema(&NodeKind::Agent).unwrap();
        assert!(agent.output("out").unwrap().default);
        assert!(!agent.output("out:text").unwrap().default);
        assert!(agent.input("tools").unwrap().multiple);
        assert!(!agent.input("system").unwrap().multiple);

        let tool = registry.schema(&NodeKind::Tool).unwrap();
        assert_eq!(tool.file_binding.as_ref().unwrap().content_field, "code");

        assert!(registry.schema(&NodeKind::Custom("nope".into())).is_none());
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = BuiltinSchemas::with_builtins();
        let kind = NodeKind::from("retriever");
        registry.register(
            NodeSchema::new(kind.clone()).with_output(OutputPort::new("docs", "tool", "str")),
        );
        assert!(registry.schema(&kind).is_some());
        assert!(registry.unregister(&kind));
        assert!(registry.schema(&kind).is_none());
    }
}
