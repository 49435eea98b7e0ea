//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The directory that should contain the cache file can't be created.
    #[display("unable to create cache location: {}", _0.display())]
    Path(#[error(not(source))] PathBuf),
    /// The cache database can't be opened.
    #[display("unable to open cache database: {_0}")]
    Connection(#[error(not(source))] String),
    /// A statement failed; carries the offending SQL.
    #[display("cache query failed: {_0}")]
    Query(#[error(not(source))] String),
    /// The persisted structure of a table couldn't be read.
    #[display("unable to inspect cache table: {_0}")]
    Introspection(#[error(not(source))] String),
    /// A persisted row couldn't be converted back into a model.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
