//! Local filesystem share backend.
//!
//! This module provides a backend for file shares that are mounted (or
//! mirrored) onto the local filesystem. Directories are listed with
//! `tokio::fs` for async I/O.
//!
//! # Layout
//!
//! ```text
//! <root>/<storage-account>/<share>/                         live share
//! <root>/<storage-account>/.snapshots/<share>/<RFC 3339>/   one snapshot
//! ```

use crate::backend::ShareBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{AccountRef, ChildEntry, DiscoveredScope, ResourceType, ShareScope, parse_timestamp};
use crate::path::{self, validate_directory, validate_name};
use async_trait::async_trait;
use exn::OptionExt;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use uuid::Uuid;

/// Directory (inside each storage account) holding share snapshots.
const SNAPSHOT_DIR: &str = ".snapshots";
const ENDPOINT_SCHEME: &str = "file://";

/// Local filesystem share backend.
///
/// The data-plane endpoint of every scope is a `file://` URI pointing at the
/// scope's base directory, and the file share ID is derived from the live
/// share's endpoint so it stays stable between runs (and therefore between
/// cache entries).
///
/// # Examples
///
/// ```no_run
/// use sharefind_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("mounted", "/mnt/shares")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory containing one sub-directory per storage account
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not an existing
    /// directory. This backend never writes, so it never creates the root.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if !root.is_dir() {
            exn::bail!(ErrorKind::NotFound(root.display().to_string()));
        }
        Ok(Self { name: name.into(), root })
    }

    fn account_dir(&self, account: &AccountRef) -> Result<PathBuf> {
        let account = validate_name(&account.storage_account)?;
        Ok(self.root.join(account))
    }

    fn endpoint(base: &Path) -> String {
        format!("{ENDPOINT_SCHEME}{}", base.display())
    }

    /// Resolve a scope back to its base directory, refusing endpoints that
    /// weren't produced by this backend's root.
    fn base_dir(&self, scope: &ShareScope) -> Result<PathBuf> {
        scope
            .data_plane_endpoint
            .strip_prefix(ENDPOINT_SCHEME)
            .map(PathBuf::from)
            .filter(|base| base.starts_with(&self.root))
            .filter(|base| !base.components().any(|c| matches!(c, Component::ParentDir)))
            .ok_or_raise(|| ErrorKind::InvalidPath(scope.data_plane_endpoint.clone()))
    }

    fn map_io_error(e: std::io::Error, path: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Named sub-directories of `dir`, sorted by name. A directory that
    /// doesn't exist has no sub-directories.
    async fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let label = dir.display().to_string();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(Self::map_io_error(err, &label)),
        };
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &label))? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &label))?;
            if file_type.is_dir() {
                found.push((name, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }

    async fn scope(
        &self,
        base: &Path,
        share_name: &str,
        live_endpoint: &str,
        snapshot_time: Option<OffsetDateTime>,
    ) -> Result<ShareScope> {
        let label = base.display().to_string();
        let metadata = fs::metadata(base).await.map_err(|e| Self::map_io_error(e, &label))?;
        let created = metadata.created().or_else(|_| metadata.modified()).map_err(ErrorKind::Io)?;
        Ok(ShareScope {
            file_share_id: Uuid::new_v5(&Uuid::NAMESPACE_URL, live_endpoint.as_bytes()),
            data_plane_endpoint: Self::endpoint(base),
            resource_name: share_name.to_string(),
            resource_type: match snapshot_time {
                Some(_) => ResourceType::ShareSnapshot,
                None => ResourceType::Share,
            },
            resource_create_time: created.into(),
            share_name: share_name.to_string(),
            snapshot_time,
        })
    }
}

#[async_trait]
impl ShareBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_scopes(&self, account: &AccountRef, name_prefix: &str) -> Result<Vec<DiscoveredScope>> {
        let account_dir = self.account_dir(account)?;
        let mut scopes = Vec::new();
        for (share_name, base) in Self::subdirectories(&account_dir).await? {
            if share_name == SNAPSHOT_DIR || !share_name.starts_with(name_prefix) {
                continue;
            }
            let endpoint = Self::endpoint(&base);
            let scope = self.scope(&base, &share_name, &endpoint, None).await?;
            scopes.push(DiscoveredScope { scope, deleted: false });
        }
        for (share_name, share_dir) in Self::subdirectories(&account_dir.join(SNAPSHOT_DIR)).await? {
            if !share_name.starts_with(name_prefix) {
                continue;
            }
            let live_endpoint = Self::endpoint(&account_dir.join(&share_name));
            for (stamp, base) in Self::subdirectories(&share_dir).await? {
                let Ok(snapshot_time) = parse_timestamp(&stamp) else {
                    tracing::warn!(backend = %self.name, share = %share_name, directory = %stamp, "Skipping snapshot directory that isn't an RFC 3339 timestamp");
                    continue;
                };
                let scope = self.scope(&base, &share_name, &live_endpoint, Some(snapshot_time)).await?;
                scopes.push(DiscoveredScope { scope, deleted: false });
            }
        }
        tracing::debug!(backend = %self.name, account = %account.storage_account, prefix = name_prefix, count = scopes.len(), "Enumerated scopes");
        Ok(scopes)
    }

    async fn list_directory(&self, scope: &ShareScope, directory: &str) -> Result<Vec<ChildEntry>> {
        let directory = validate_directory(directory)?;
        let target = self.base_dir(scope)?.join(path::relative(&directory));
        let mut entries = fs::read_dir(&target).await.map_err(|e| Self::map_io_error(e, &directory))?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &directory))? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(scope = %scope, directory = %directory, name = ?raw, "Skipping entry with a non UTF-8 name");
                    continue;
                },
            };
            let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &directory))?;
            let is_directory = match file_type.is_symlink() {
                true => match fs::metadata(entry.path()).await {
                    Ok(metadata) => metadata.is_dir(),
                    // Note: silently drop what is most likely a broken symlink.
                    Err(_) => continue,
                },
                false => file_type.is_dir(),
            };
            children.push(ChildEntry { name, is_directory });
        }
        // read_dir order is filesystem-dependent; listings must be deterministic.
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}
