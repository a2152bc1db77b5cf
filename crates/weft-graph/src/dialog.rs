use weft_core::types::{NodeId, Position, TeleportDirection};

/// The single dialog the editor may be asking the user about.
///
/// Dialogs are mutually exclusive: requesting one replaces whatever was
/// pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PendingDialog {
    #[default]
    None,
    /// Right-click menu on a node, or on the pane when `node_id` is `None`.
    ContextMenu {
        node_id: Option<NodeId>,
        position: Position,
    },
    /// Plain delete confirmation for one or more nodes.
    DeleteConfirm { node_ids: Vec<NodeId> },
    /// A group with children is being deleted; the user picks the mode.
    GroupDelete { group_id: NodeId, child_count: usize },
    /// Ask for a teleporter name (new connector or rename).
    TeleportNamePrompt {
        node_id: NodeId,
        direction: TeleportDirection,
        current_name: Option<String>,
    },
}

impl PendingDialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ContextMenu { .. } => "context_menu",
            Self::DeleteConfirm { .. } => "delete_confirm",
            Self::GroupDelete { .. } => "group_delete",
            Self::TeleportNamePrompt { .. } => "teleport_name_prompt",
        }
    }
}

/// How a confirmed group delete treats the group's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDeleteMode {
    /// Remove only the wrapper; children move to the group's parent scope.
    GroupOnly,
    /// Remove the group and every descendant.
    All,
}
