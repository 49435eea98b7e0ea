//! Breadth-first item search across a file share and its snapshots.
//!
//! A search resolves the scopes of a share (the live share and/or its
//! snapshots, see [`Breadth`]), then walks each one breadth-first from its
//! root looking for entries named exactly like the target. What happens
//! after a match depends on the [`MatchBehavior`]:
//!
//! | Behavior   | Rest of the scope | Remaining scopes |
//! |------------|-------------------|------------------|
//! | `End`      | skipped           | skipped          |
//! | `ScopeEnd` | searched          | skipped          |
//! | `Continue` | searched          | searched         |
//!
//! Every directory listing obtained from the share is recorded in the
//! [cache](sharefind_cache) before its children are examined.

pub mod error;
mod request;
mod resolve;
mod search;
mod traverse;

pub use crate::request::{Breadth, MatchBehavior, SearchRequest};
pub use crate::resolve::{candidates, select_scopes};
pub use crate::search::{CacheLocation, SearchEvent, SearchOptions, search};
pub use crate::traverse::{Flow, MatchRecord, ScopeWalk, Traversal, TraversalOptions};
