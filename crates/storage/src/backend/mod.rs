//! Share backend trait and implementations.
//!
//! This module defines the `ShareBackend` trait, which provides a unified
//! interface over the two remote capabilities a search needs: enumerating the
//! scopes (live share and snapshots) of a storage account, and listing the
//! immediate children of a directory within one scope.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::{AccountRef, ChildEntry, DiscoveredScope, ShareScope};
use async_trait::async_trait;

/// Unified interface for file share backends.
///
/// Backends own nothing but their connection details; every call is a fresh
/// observation of the remote state. Nothing is retried here: a failure is
/// reported to the caller as-is.
///
/// # Path Handling
/// Directory paths are `/`-rooted and end with a separator (see
/// [`path`](crate::path)). Implementations should normalize them with
/// [`validate_directory`](crate::path::validate_directory) before use.
///
/// # Examples
///
/// ```
/// use sharefind_storage::{ShareBackend, ShareScope, error::Result, path};
///
/// async fn count_root_entries(backend: &dyn ShareBackend, scope: &ShareScope) -> Result<usize> {
///     let children = backend.list_directory(scope, path::ROOT).await?;
///     Ok(children.len())
/// }
/// ```
#[async_trait]
pub trait ShareBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Enumerate every scope of `account` whose share name starts with
    /// `name_prefix`, including snapshots and scopes marked as deleted.
    ///
    /// # Notes
    /// - The prefix is a network-level optimization only. Callers must
    ///   filter the result down to the exact share name they want.
    /// - An account that doesn't exist yields an empty list, not an error.
    async fn list_scopes(&self, account: &AccountRef, name_prefix: &str) -> Result<Vec<DiscoveredScope>>;

    /// List the immediate children (files and sub-directories) of
    /// `directory` within `scope`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// directory does not exist in that scope.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use sharefind_storage::{ShareBackend, ShareScope, error::Result};
    /// # async fn example(backend: &dyn ShareBackend, scope: &ShareScope) -> Result<()> {
    /// for child in backend.list_directory(scope, "/reports/").await? {
    ///     println!("{} (directory: {})", child.name, child.is_directory);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn list_directory(&self, scope: &ShareScope, directory: &str) -> Result<Vec<ChildEntry>>;
}
