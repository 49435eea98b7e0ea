//! In-memory share backend for testing.

use crate::backend::ShareBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{AccountRef, ChildEntry, DiscoveredScope, ResourceType, ShareScope, format_timestamp};
use crate::path::{self, validate_directory, validate_name};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

struct MockScope {
    share_name: String,
    snapshot_time: Option<OffsetDateTime>,
    deleted: bool,
    /// Directory path (trailing separator) to its children, in listing order.
    tree: HashMap<String, Vec<ChildEntry>>,
}
impl MockScope {
    /// Build a tree from entry paths. A trailing separator marks a directory;
    /// intermediate directories are implied.
    ///
    /// Panics if any path is invalid. If test setup is wrong, then the test
    /// should not pass.
    fn new<'a>(
        share_name: &str,
        snapshot_time: Option<OffsetDateTime>,
        deleted: bool,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut tree: HashMap<String, Vec<ChildEntry>> = HashMap::new();
        tree.insert(path::ROOT.to_string(), Vec::new());
        for entry in entries {
            let is_directory = entry.ends_with(path::SEPARATOR);
            let Ok(normalized) = validate_directory(entry) else {
                panic!("MockBackend: invalid path {entry}");
            };
            let segments: Vec<&str> = normalized.split(path::SEPARATOR).filter(|s| !s.is_empty()).collect();
            let mut parent = path::ROOT.to_string();
            for (i, segment) in segments.iter().enumerate() {
                let leaf = i + 1 == segments.len();
                let child = ChildEntry {
                    name: segment.to_string(),
                    is_directory: !leaf || is_directory,
                };
                let listing = tree.entry(parent.clone()).or_default();
                if !listing.iter().any(|c| c.name == child.name) {
                    listing.push(child.clone());
                }
                let child_path = path::child(&parent, segment);
                if child.is_directory {
                    parent = path::as_directory(&child_path);
                    tree.entry(parent.clone()).or_default();
                }
            }
        }
        Self {
            share_name: share_name.to_string(),
            snapshot_time,
            deleted,
            tree,
        }
    }

    fn label(&self) -> Result<String> {
        Ok(match &self.snapshot_time {
            Some(time) => format!("{}@{}", self.share_name, format_timestamp(time)?),
            None => self.share_name.clone(),
        })
    }

    fn to_scope(&self, account: &AccountRef) -> Result<ShareScope> {
        let live_endpoint = format!("https://{}.file.core.windows.net/{}", account.storage_account, self.share_name);
        let data_plane_endpoint = match &self.snapshot_time {
            Some(time) => format!("{live_endpoint}?sharesnapshot={}", format_timestamp(time)?),
            None => live_endpoint.clone(),
        };
        Ok(ShareScope {
            file_share_id: Uuid::new_v5(&Uuid::NAMESPACE_URL, live_endpoint.as_bytes()),
            data_plane_endpoint,
            resource_name: self.share_name.clone(),
            resource_type: match self.snapshot_time {
                Some(_) => ResourceType::ShareSnapshot,
                None => ResourceType::Share,
            },
            resource_create_time: OffsetDateTime::UNIX_EPOCH,
            share_name: self.share_name.clone(),
            snapshot_time: self.snapshot_time,
        })
    }
}

/// In-memory share backend for testing.
///
/// Shares and snapshots are declared up front as lists of entry paths. Every
/// directory listing is recorded (behind a [`RwLock`], so all trait methods
/// operate on `&self`) so tests can assert which directories a search did or
/// did not visit.
///
/// # Examples
///
/// ```ignore
/// use sharefind_storage::backend::MockBackend;
/// use time::OffsetDateTime;
///
/// let backend = MockBackend::default()
///     .with_share("data", ["/reports/2024/summary.pdf", "/empty/"])
///     .with_snapshot("data", OffsetDateTime::UNIX_EPOCH, ["/reports/"]);
/// ```
pub struct MockBackend {
    name: String,
    scopes: Vec<MockScope>,
    failures: HashSet<String>,
    listed: RwLock<Vec<(String, String)>>,
}

impl MockBackend {
    /// Add a live share.
    pub fn with_share<'a>(mut self, share_name: &str, entries: impl IntoIterator<Item = &'a str>) -> Self {
        self.scopes.push(MockScope::new(share_name, None, false, entries));
        self
    }

    /// Add a snapshot of a share.
    pub fn with_snapshot<'a>(
        mut self,
        share_name: &str,
        time: OffsetDateTime,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.scopes.push(MockScope::new(share_name, Some(time), false, entries));
        self
    }

    /// Add a snapshot that the management lookup reports as deleted.
    pub fn with_deleted_snapshot<'a>(
        mut self,
        share_name: &str,
        time: OffsetDateTime,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.scopes.push(MockScope::new(share_name, Some(time), true, entries));
        self
    }

    /// Make every listing of `directory` (in any scope) fail with a network error.
    pub fn with_listing_failure(mut self, directory: &str) -> Self {
        let Ok(normalized) = validate_directory(directory) else {
            panic!("MockBackend::with_listing_failure: invalid path {directory}");
        };
        self.failures.insert(normalized);
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every `(scope, directory)` listed so far, in call order. Scopes are
    /// labelled `share` or `share@<RFC 3339 snapshot time>`.
    pub async fn listed(&self) -> Vec<(String, String)> {
        self.listed.read().await.clone()
    }

    fn find(&self, scope: &ShareScope) -> Option<&MockScope> {
        self.scopes
            .iter()
            .find(|s| s.share_name == scope.share_name && s.snapshot_time == scope.snapshot_time)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            scopes: Vec::new(),
            failures: HashSet::new(),
            listed: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ShareBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_scopes(&self, account: &AccountRef, name_prefix: &str) -> Result<Vec<DiscoveredScope>> {
        validate_name(&account.storage_account)?;
        self.scopes
            .iter()
            .filter(|s| s.share_name.starts_with(name_prefix))
            .map(|s| Ok(DiscoveredScope { scope: s.to_scope(account)?, deleted: s.deleted }))
            .collect()
    }

    async fn list_directory(&self, scope: &ShareScope, directory: &str) -> Result<Vec<ChildEntry>> {
        let directory = validate_directory(directory)?;
        let mock = self.find(scope).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(scope.to_string())))?;
        self.listed.write().await.push((mock.label()?, directory.clone()));
        if self.failures.contains(&directory) {
            exn::bail!(ErrorKind::Network(format!("injected failure listing {directory}")));
        }
        mock.tree.get(&directory).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(directory)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountRef {
        AccountRef {
            subscription: Uuid::nil(),
            resource_group: "rg".to_string(),
            storage_account: "account".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tree_from_paths() {
        let backend = MockBackend::default().with_share("data", ["/a/b/target.txt", "/a/c/", "/top.txt"]);
        let scope = backend.list_scopes(&account(), "data").await.unwrap().remove(0).scope;
        assert_eq!(
            backend.list_directory(&scope, "/").await.unwrap(),
            vec![ChildEntry::directory("a"), ChildEntry::file("top.txt")]
        );
        assert_eq!(
            backend.list_directory(&scope, "/a/").await.unwrap(),
            vec![ChildEntry::directory("b"), ChildEntry::directory("c")]
        );
        assert!(backend.list_directory(&scope, "/a/c/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_recorded() {
        let backend = MockBackend::default().with_share("data", ["/a/"]);
        let scope = backend.list_scopes(&account(), "data").await.unwrap().remove(0).scope;
        backend.list_directory(&scope, "/").await.unwrap();
        backend.list_directory(&scope, "/a").await.unwrap();
        assert_eq!(
            backend.listed().await,
            vec![("data".to_string(), "/".to_string()), ("data".to_string(), "/a/".to_string())]
        );
    }

    #[tokio::test]
    async fn test_scopes_by_prefix() {
        let backend = MockBackend::default()
            .with_share("data", ["/x"])
            .with_share("data-archive", ["/x"])
            .with_share("other", ["/x"])
            .with_deleted_snapshot("data", OffsetDateTime::UNIX_EPOCH, ["/x"]);
        let scopes = backend.list_scopes(&account(), "data").await.unwrap();
        assert_eq!(scopes.len(), 3);
        assert!(scopes[2].deleted);
        assert!(scopes[2].scope.data_plane_endpoint.contains("?sharesnapshot=1970-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let backend = MockBackend::default().with_share("data", ["/x"]);
        let scope = backend.list_scopes(&account(), "data").await.unwrap().remove(0).scope;
        let err = backend.list_directory(&scope, "/nope/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = MockBackend::default().with_share("data", ["/a/"]).with_listing_failure("/a/");
        let scope = backend.list_scopes(&account(), "data").await.unwrap().remove(0).scope;
        let err = backend.list_directory(&scope, "/a/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_share_panics_on_bad_path() {
        let _ = MockBackend::default().with_share("data", ["relative/path"]);
    }
}
