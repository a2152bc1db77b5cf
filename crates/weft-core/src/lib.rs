pub mod config;
pub mod error;
pub mod event;
pub mod schema;
pub mod traits;
pub mod types;

pub use config::EditorConfig;
pub use error::{Result, WeftError};
pub use event::EventBus;
pub use types::*;
