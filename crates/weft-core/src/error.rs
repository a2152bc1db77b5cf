use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Graph errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Node is locked: {0}")]
    NodeLocked(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Node is not a teleporter: {0}")]
    NotATeleporter(String),

    // Connection errors
    #[error("Unknown handle {handle} on node {node}")]
    UnknownHandle { node: String, handle: String },

    #[error("Incompatible connection: {source_node}.{source_handle} -> {target_node}.{target_handle}")]
    IncompatibleConnection {
        source_node: String,
        source_handle: String,
        target_node: String,
        target_handle: String,
    },

    #[error("Self-loop on node {0}")]
    SelfLoop(String),

    #[error("Port already occupied: {node}.{handle}")]
    PortOccupied { node: String, handle: String },

    // Workflow errors
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("No dialog pending for: {0}")]
    NoPendingDialog(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Collaborator errors
    #[error("File service error: {path}: {message}")]
    FileService { path: String, message: String },

    #[error("Document error: {0}")]
    Document(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;
