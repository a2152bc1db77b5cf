use std::borrow::Borrow;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique node identifier.
    NodeId
);
string_id!(
    /// Unique edge identifier.
    EdgeId
);
string_id!(
    /// Identifier of an editor tab (one workflow document per tab).
    TabId
);

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise sum, used when re-basing a child onto its parent's frame.
    pub fn offset(&self, by: Position) -> Self {
        Self {
            x: self.x + by.x,
            y: self.y + by.y,
        }
    }

    /// Round both components to the nearest multiple of `grid`.
    pub fn snapped(&self, grid: f64) -> Self {
        if grid <= 0.0 {
            return *self;
        }
        Self {
            x: (self.x / grid).round() * grid,
            y: (self.y / grid).round() * grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Pan/zoom state of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Which end of a connection a handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleType {
    Source,
    Target,
}

/// Direction of a teleporter connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeleportDirection {
    In,
    Out,
}

impl TeleportDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

impl std::fmt::Display for TeleportDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
        }
    }
}

/// Kind of change reported by the file service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// A change notification for a watched file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub file_path: PathBuf,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
}

impl FileChangeEvent {
    pub fn new(file_path: impl Into<PathBuf>, change_type: ChangeType) -> Self {
        Self {
            file_path: file_path.into(),
            change_type,
            timestamp: Utc::now(),
        }
    }
}

/// Content returned by `FileService::read_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

/// Events published on the editor's event bus.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// A workflow was opened with the given tabs.
    WorkflowOpened { tabs: Vec<TabId> },
    /// The workflow was closed and its registries torn down.
    WorkflowClosed,
    /// A node was added to a tab.
    NodeAdded { tab_id: TabId, node_id: NodeId },
    /// Nodes were removed from a tab.
    NodesRemoved { tab_id: TabId, node_ids: Vec<NodeId> },
    /// An edge was created.
    EdgeConnected { tab_id: TabId, edge_id: EdgeId },
    /// An edge was removed.
    EdgeRemoved { tab_id: TabId, edge_id: EdgeId },
    /// Undo/redo availability changed.
    HistoryChanged {
        tab_id: TabId,
        undo_depth: usize,
        redo_depth: usize,
    },
    /// External file content was merged into a node.
    FileSynced {
        node_id: NodeId,
        field_id: String,
        file_path: PathBuf,
    },
    /// Fetching external file content failed; node left untouched.
    FileSyncFailed {
        node_id: NodeId,
        file_path: PathBuf,
        error: String,
    },
    /// A teleporter entry joined the registry.
    TeleportRegistered { id: NodeId, name: String, tab_id: TabId },
    /// A teleporter entry left the registry.
    TeleportUnregistered { id: NodeId, tab_id: TabId },
}
