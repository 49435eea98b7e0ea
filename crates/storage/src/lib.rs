pub mod backend;
pub mod error;
mod models;
pub mod path;

pub use crate::backend::ShareBackend;
pub use crate::models::{
    AccountRef, ChildEntry, DiscoveredScope, ResourceType, ShareScope, format_timestamp, parse_timestamp,
};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn ShareBackend + Send + Sync>;
