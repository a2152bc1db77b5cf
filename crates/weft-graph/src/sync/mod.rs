//! Keeping file-backed nodes in step with files on disk.
//!
//! [`FileSyncReconciler`] owns the subscriptions and the three-step
//! begin/fetch/complete protocol, [`SyncDriver`] runs it as an async loop
//! against a shared workflow, and [`LocalFileService`] is the `notify`-based
//! filesystem backend.

pub mod driver;
pub mod local;
pub mod reconciler;

pub use driver::SyncDriver;
pub use local::LocalFileService;
pub use reconciler::{FetchedContent, FileSyncReconciler, PendingFetch, SyncOutcome, SyncTicket};
