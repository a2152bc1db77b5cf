//! Workflow graph editing engine.
//!
//! A workflow is a set of tabs, each holding a graph of typed `Node`s wired
//! by `Edge`s between compatible ports. The `GraphStore` owns one tab's graph
//! and funnels every mutation through a `HistoryManager`. Around it sit the
//! `ConnectionTracker` (drag-to-connect validation), the `TeleportRegistry`
//! (name-linked connectors across tabs) and the `FileSyncReconciler`
//! (merging on-disk edits into file-backed nodes).

pub mod check;
pub mod compat;
pub mod connection;
pub mod dialog;
pub mod document;
pub mod edge;
pub mod handles;
pub mod history;
pub mod node;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod teleport;
pub mod workflow;

pub use check::{check_document, DocumentReport};
pub use compat::is_compatible;
pub use connection::{ConnectGesture, ConnectionSession, ConnectionTracker};
pub use dialog::{GroupDeleteMode, PendingDialog};
pub use document::{DocumentStore, JsonDocumentStore, WorkflowDocument};
pub use edge::Edge;
pub use handles::{HandleRegistry, ResolvedHandle};
pub use history::HistoryManager;
pub use node::Node;
pub use snapshot::GraphSnapshot;
pub use store::{Change, DeleteOutcome, GraphStore};
pub use sync::{FileSyncReconciler, LocalFileService, SyncDriver, SyncOutcome};
pub use teleport::{TeleportEntry, TeleportRegistry};
pub use workflow::{Tab, Workflow};
