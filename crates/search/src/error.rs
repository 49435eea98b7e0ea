//! Search Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! Failures from the storage and cache crates are raised into one of these
//! kinds, so the original error stays available as a child in the tree.

use derive_more::{Display, Error};

/// A search error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies why a search stopped.
///
/// ### Request Errors
/// - [`ErrorKind::InvalidRequest`]
///
/// ### Resolution Errors
/// - [`ErrorKind::ScopeNotFound`]
/// - [`ErrorKind::NoSnapshots`]
/// - [`ErrorKind::ScopeListing`]
///
/// ### Dependency Errors
/// - [`ErrorKind::CacheInit`]
/// - [`ErrorKind::RemoteListing`]
/// - [`ErrorKind::CacheWrite`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request was rejected before any I/O happened.
    #[display("invalid search request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    /// No live share with this exact name exists in the storage account.
    #[display("file share not found: {_0}")]
    ScopeNotFound(#[error(not(source))] String),
    /// Only snapshots were requested, but the share has none.
    #[display("file share has no snapshots: {_0}")]
    NoSnapshots(#[error(not(source))] String),
    /// The scopes of the storage account couldn't be enumerated.
    #[display("unable to enumerate file share scopes")]
    ScopeListing,
    /// The cache database couldn't be opened or reconciled.
    #[display("unable to initialize cache")]
    CacheInit,
    /// A directory listing failed; carries `scope:path`.
    #[display("unable to list directory {_0}")]
    RemoteListing(#[error(not(source))] String),
    /// A listing or scope couldn't be recorded in the cache; carries what
    /// was being written.
    #[display("unable to update cache for {_0}")]
    CacheWrite(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing is retried during a search; this is for the caller deciding
    /// whether to run it again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ScopeListing | Self::RemoteListing(_))
    }
}
