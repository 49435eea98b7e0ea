//! Turning a share name into the ordered list of scopes to search.

use crate::error::{ErrorKind, Result};
use crate::request::Breadth;
use exn::ResultExt;
use sharefind_cache::Repository;
use sharefind_storage::{AccountRef, DiscoveredScope, ShareBackend, ShareScope};

/// Scopes belonging to exactly `share_name` that still exist.
///
/// The management lookup matches by prefix, so `data-archive` comes back
/// when asking for `data`.
pub fn candidates(share_name: &str, discovered: Vec<DiscoveredScope>) -> Vec<ShareScope> {
    discovered
        .into_iter()
        .filter(|d| !d.deleted && d.scope.share_name == share_name)
        .map(|d| d.scope)
        .collect()
}

/// Order the candidate scopes for searching: the live share first (if
/// requested), then snapshots from newest to oldest (if requested).
///
/// The live share must exist even when only snapshots are searched;
/// snapshots of a share that is gone are not searched.
pub fn select_scopes(share_name: &str, candidates: Vec<ShareScope>, breadth: Breadth) -> Result<Vec<ShareScope>> {
    let (mut snapshots, live): (Vec<_>, Vec<_>) = candidates.into_iter().partition(ShareScope::is_snapshot);
    let Some(live) = live.into_iter().next() else {
        exn::bail!(ErrorKind::ScopeNotFound(share_name.to_string()));
    };
    if breadth == Breadth::SnapshotsOnly && snapshots.is_empty() {
        exn::bail!(ErrorKind::NoSnapshots(share_name.to_string()));
    }
    snapshots.sort_by(|a, b| b.snapshot_time.cmp(&a.snapshot_time));

    let mut scopes = Vec::with_capacity(snapshots.len() + 1);
    if breadth.includes_live() {
        scopes.push(live);
    }
    if breadth.includes_snapshots() {
        scopes.extend(snapshots);
    }
    Ok(scopes)
}

/// Enumerate, record and select the scopes of a share.
///
/// Every scope that exists is recorded in the cache, including ones the
/// requested breadth leaves out.
pub(crate) async fn resolve(
    backend: &dyn ShareBackend,
    cache: &Repository,
    account: &AccountRef,
    share_name: &str,
    breadth: Breadth,
    tolerate_write_errors: bool,
) -> Result<Vec<ShareScope>> {
    let discovered = backend.list_scopes(account, share_name).await.or_raise(|| ErrorKind::ScopeListing)?;
    tracing::debug!(backend = backend.name(), share = share_name, discovered = discovered.len(), "Listed scopes");
    let candidates = candidates(share_name, discovered);
    let recorded = cache
        .upsert_scopes(&candidates)
        .await
        .or_raise(|| ErrorKind::CacheWrite(share_name.to_string()));
    match recorded {
        Ok(()) => {},
        Err(err) if tolerate_write_errors => {
            tracing::warn!(share = share_name, error = ?err, "Unable to record scopes in cache");
        },
        Err(err) => return Err(err),
    }
    select_scopes(share_name, candidates, breadth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sharefind_cache::Database;
    use sharefind_storage::backend::MockBackend;
    use sharefind_storage::{ResourceType, parse_timestamp};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn scope(share_name: &str, snapshot: Option<&str>) -> ShareScope {
        ShareScope {
            file_share_id: Uuid::nil(),
            data_plane_endpoint: format!("https://account.file.core.windows.net/{share_name}"),
            resource_name: share_name.to_string(),
            resource_type: match snapshot {
                Some(_) => ResourceType::ShareSnapshot,
                None => ResourceType::Share,
            },
            resource_create_time: OffsetDateTime::UNIX_EPOCH,
            share_name: share_name.to_string(),
            snapshot_time: snapshot.map(|time| parse_timestamp(time).unwrap()),
        }
    }

    fn discovered(scope: ShareScope, deleted: bool) -> DiscoveredScope {
        DiscoveredScope { scope, deleted }
    }

    fn labels(scopes: &[ShareScope]) -> Vec<String> {
        scopes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_candidates_exclude_prefix_matches_and_deleted() {
        let found = candidates(
            "data",
            vec![
                discovered(scope("data", None), false),
                discovered(scope("data-archive", None), false),
                discovered(scope("data", Some("2024-01-01T00:00:00Z")), true),
                discovered(scope("data", Some("2024-02-01T00:00:00Z")), false),
            ],
        );
        assert_eq!(labels(&found), vec!["data", "data@2024-02-01T00:00:00Z"]);
    }

    #[rstest]
    #[case(Breadth::Both, vec!["data", "data@2024-03-01T00:00:00Z", "data@2024-02-01T00:00:00Z", "data@2024-01-01T00:00:00Z"])]
    #[case(Breadth::LiveOnly, vec!["data"])]
    #[case(Breadth::SnapshotsOnly, vec!["data@2024-03-01T00:00:00Z", "data@2024-02-01T00:00:00Z", "data@2024-01-01T00:00:00Z"])]
    fn test_select_scopes_order(#[case] breadth: Breadth, #[case] expected: Vec<&str>) {
        let candidates = vec![
            scope("data", Some("2024-02-01T00:00:00Z")),
            scope("data", Some("2024-01-01T00:00:00Z")),
            scope("data", None),
            scope("data", Some("2024-03-01T00:00:00Z")),
        ];
        let selected = select_scopes("data", candidates, breadth).unwrap();
        assert_eq!(labels(&selected), expected);
    }

    #[rstest]
    #[case(Breadth::LiveOnly)]
    #[case(Breadth::SnapshotsOnly)]
    #[case(Breadth::Both)]
    fn test_missing_live_share(#[case] breadth: Breadth) {
        let candidates = vec![scope("data", Some("2024-01-01T00:00:00Z"))];
        let err = select_scopes("data", candidates, breadth).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ScopeNotFound(name) if name == "data"));
    }

    #[test]
    fn test_no_snapshots() {
        let err = select_scopes("data", vec![scope("data", None)], Breadth::SnapshotsOnly).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoSnapshots(_)));
        // Not an error when the live share is searched as well.
        assert_eq!(select_scopes("data", vec![scope("data", None)], Breadth::Both).unwrap().len(), 1);
    }

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    #[tokio::test]
    async fn test_unrecorded_scopes(#[case] tolerate_write_errors: bool, #[case] fails: bool) {
        let backend = MockBackend::default().with_share("data", ["/target"]);
        let account = AccountRef {
            subscription: Uuid::nil(),
            resource_group: "rg".to_string(),
            storage_account: "account".to_string(),
        };
        let db = Database::connect_in_memory().await.unwrap();
        let cache = Repository::from(&db);
        db.close().await;

        let result = resolve(&backend, &cache, &account, "data", Breadth::Both, tolerate_write_errors).await;
        match fails {
            true => assert!(matches!(&*result.unwrap_err(), ErrorKind::CacheWrite(share) if share == "data")),
            false => assert_eq!(labels(&result.unwrap()), vec!["data"]),
        }
    }
}
