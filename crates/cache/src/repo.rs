//! Repository for scopes and the directory listings observed within them.
//!
//! A listing is only meaningful relative to the scope it was taken in, so
//! every entry is keyed by the scope's `(file_share_id, data_plane_endpoint)`
//! pair as well as its own path.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{ChildRow, ScopeRow};
use exn::ResultExt;
use sharefind_storage::{ChildEntry, ShareScope, path};
use sqlx::SqlitePool;
use std::cmp::Ordering;

/// Live scope first, then snapshots from newest to oldest.
fn search_order(a: &ShareScope, b: &ShareScope) -> Ordering {
    match (&a.snapshot_time, &b.snapshot_time) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(a),
    }
}

/// Repository for managing scopes and directory entries in the cache database.
///
/// Writes are idempotent: recording the same scope or listing twice leaves
/// the cache as if it were recorded once.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    /// Record the given scopes, replacing any previously recorded row with
    /// the same identity.
    pub async fn upsert_scopes(&self, scopes: &[ShareScope]) -> Result<()> {
        let sql = include_str!("../queries/upsert_scope.sql");
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Query("BEGIN".to_string()))?;
        for scope in scopes {
            let row = ScopeRow::try_from(scope)?;
            sqlx::query(sql)
                .bind(row.file_share_id)
                .bind(row.data_plane_endpoint)
                .bind(row.resource_name)
                .bind(row.resource_type)
                .bind(row.resource_create_time)
                .bind(row.share_name)
                .bind(row.is_snapshot)
                .bind(row.snapshot_time)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Query(sql.to_string()))?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Query("COMMIT".to_string()))?;
        Ok(())
    }

    /// Every recorded scope of a share, live scope first and then snapshots
    /// from newest to oldest.
    pub async fn scopes_for_share(&self, share_name: &str) -> Result<Vec<ShareScope>> {
        let sql = include_str!("../queries/scopes_for_share.sql");
        let rows: Vec<ScopeRow> = sqlx::query_as(sql)
            .bind(share_name)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Query(sql.to_string()))?;
        let mut scopes = rows.into_iter().map(ShareScope::try_from).collect::<Result<Vec<_>>>()?;
        // RFC 3339 text with varying offsets doesn't sort lexically.
        scopes.sort_by(search_order);
        Ok(scopes)
    }

    // =========================================================================
    // Directory Entries
    // =========================================================================

    /// Record the children observed when listing `directory` within `scope`.
    ///
    /// All children are written in one transaction: a listing is either
    /// cached completely or not at all.
    pub async fn record_listing(&self, scope: &ShareScope, directory: &str, children: &[ChildEntry]) -> Result<()> {
        let sql = include_str!("../queries/insert_entry.sql");
        let file_share_id = scope.file_share_id.to_string();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Query("BEGIN".to_string()))?;
        for child in children {
            sqlx::query(sql)
                .bind(&file_share_id)
                .bind(&scope.data_plane_endpoint)
                .bind(path::child(directory, &child.name))
                .bind(&child.name)
                .bind(i64::from(child.is_directory))
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Query(sql.to_string()))?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Query("COMMIT".to_string()))?;
        Ok(())
    }

    /// The children previously recorded for `directory` within `scope`.
    ///
    /// Returns `None` when nothing is recorded. An empty directory and one
    /// that was never listed look the same to the cache, so callers must
    /// treat `None` as "list it".
    pub async fn cached_listing(&self, scope: &ShareScope, directory: &str) -> Result<Option<Vec<ChildEntry>>> {
        let sql = include_str!("../queries/cached_listing.sql");
        let rows: Vec<ChildRow> = sqlx::query_as(sql)
            .bind(scope.file_share_id.to_string())
            .bind(&scope.data_plane_endpoint)
            .bind(path::as_directory(directory))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Query(sql.to_string()))?;
        if rows.is_empty() {
            return Ok(None);
        }
        rows.into_iter().map(ChildEntry::try_from).collect::<Result<Vec<_>>>().map(Some)
    }

    /// Number of directory entries recorded for `scope`.
    pub async fn count_entries(&self, scope: &ShareScope) -> Result<u64> {
        let sql = include_str!("../queries/count_entries.sql");
        let count: i64 = sqlx::query_scalar(sql)
            .bind(scope.file_share_id.to_string())
            .bind(&scope.data_plane_endpoint)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Query(sql.to_string()))?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("entry count"))
    }

    /// Remove every recorded scope and entry. The schema is left in place.
    pub async fn clear(&self) -> Result<()> {
        let sql = include_str!("../queries/clear.sql");
        sqlx::query(sql).execute(&self.pool).await.or_raise(|| ErrorKind::Query(sql.to_string()))?;
        Ok(())
    }
}
