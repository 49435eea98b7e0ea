//! Database connection, pool management and schema reconciliation.

use crate::error::{ErrorKind, Result};
use crate::schema::{self, ActualColumn, DIRECTORY_ENTRIES, FILE_SHARES, Reconciliation, Table};
use exn::ResultExt;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, Transaction};
use std::path::Path;
use tracing::instrument;

// Only one writer ever, but a reader may look at the cache mid-search.
const MAX_CONNECTIONS: u32 = 5;

/// Database connection pool for the cache.
///
/// This is the main entry point for interacting with the cache database.
/// Opening it reconciles the persisted schema with the expected one, so a
/// `Database` always has usable tables.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    reconciliation: Reconciliation,
}

impl Database {
    async fn new(options: SqliteConnectOptions, location: &str, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // This is IMPORTANT to apply the query-based PRAGMAs to EVERY
            // connection (set by max connections) instead of only the
            // first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Connection(location.to_string()))?;
        let reconciliation = Self::reconcile(&pool).await?;
        Ok(Self { pool, reconciliation })
    }

    /// Connect to the cache database at the given path.
    ///
    /// Creates the containing directory and the database file if they don't
    /// exist, then reconciles the schema.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            // Non-async; happens once per run and isn't worth the hassle.
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Path(parent.to_path_buf()))?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, &path.display().to_string(), None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // In-memory database must either use the same cache `.shared_cache(true)`,
        // or be limited to one connection. Otherwise parallel connections will
        // see different databases that contain different data.
        Self::new(options, ":memory:", Some(1)).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Concurrent readers while the (single) search writes.
            .journal_mode(SqliteJournalMode::Wal)
            // PRAGMA synchronous = NORMAL (balance between safety and speed)
            .synchronous(SqliteSynchronous::Normal)
            // PRAGMA busy_timeout = 1500ms
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn introspect(tx: &mut Transaction<'_, sqlx::Sqlite>, table: &Table) -> Result<Vec<ActualColumn>> {
        sqlx::query_as(schema::INTROSPECT_SQL)
            .bind(table.name)
            .fetch_all(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Introspection(table.name.to_string()))
    }

    async fn execute(tx: &mut Transaction<'_, sqlx::Sqlite>, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut **tx).await.or_raise(|| ErrorKind::Query(sql.to_string()))?;
        Ok(())
    }

    /// Bring both tables in line with the expected schema.
    ///
    /// Directory entries are meaningless without the scope they belong to,
    /// so resetting `file_shares` always resets `directory_entries` too.
    /// Runs in a single transaction; a failure leaves the file untouched.
    #[instrument("reconciling cache schema", skip_all)]
    async fn reconcile(pool: &SqlitePool) -> Result<Reconciliation> {
        let mut tx = pool.begin().await.or_raise(|| ErrorKind::Query("BEGIN".to_string()))?;
        let shares_ok = schema::is_compatible(&FILE_SHARES, &Self::introspect(&mut tx, &FILE_SHARES).await?);
        let entries_ok =
            schema::is_compatible(&DIRECTORY_ENTRIES, &Self::introspect(&mut tx, &DIRECTORY_ENTRIES).await?);
        let outcome = Reconciliation {
            shares_reset: !shares_ok,
            entries_reset: !shares_ok || !entries_ok,
        };
        if outcome.shares_reset {
            Self::execute(&mut tx, &DIRECTORY_ENTRIES.drop_sql()).await?;
            Self::execute(&mut tx, &FILE_SHARES.drop_sql()).await?;
            Self::execute(&mut tx, &FILE_SHARES.create_sql()).await?;
        }
        if outcome.entries_reset {
            Self::execute(&mut tx, &DIRECTORY_ENTRIES.drop_sql()).await?;
            Self::execute(&mut tx, &DIRECTORY_ENTRIES.create_sql()).await?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Query("COMMIT".to_string()))?;
        match outcome.is_clean() {
            true => tracing::debug!("Cache schema is up to date"),
            false => tracing::info!(
                shares_reset = outcome.shares_reset,
                entries_reset = outcome.entries_reset,
                "Cache schema changed; discarded incompatible tables"
            ),
        }
        Ok(outcome)
    }

    /// What reconciliation did when this database was opened.
    pub fn reconciliation(&self) -> Reconciliation {
        self.reconciliation
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn columns(db: &Database, table: &Table) -> Vec<ActualColumn> {
        sqlx::query_as(schema::INTROSPECT_SQL).bind(table.name).fetch_all(db.pool()).await.unwrap()
    }

    /// A raw connection to a cache file, bypassing reconciliation.
    async fn raw(path: &Path) -> SqlitePool {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        SqlitePool::connect_with(options).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_in_memory_creates_tables() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        assert_eq!(db.reconciliation(), Reconciliation { shares_reset: true, entries_reset: true });
        assert!(schema::is_compatible(&FILE_SHARES, &columns(&db, &FILE_SHARES).await));
        assert!(schema::is_compatible(&DIRECTORY_ENTRIES, &columns(&db, &DIRECTORY_ENTRIES).await));
        db.close().await;
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        let again = Database::reconcile(db.pool()).await.unwrap();
        assert!(again.is_clean());
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory().await.unwrap();
        // Verify a PRAGMA set by after_connect().
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 800, "WAL checkpoint should be 800");
        let row: (i64,) = sqlx::query_as("PRAGMA busy_timeout").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1500);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = TempDir::new().unwrap();
        let db = Database::connect(dir.path().join("nested/cache.sqlite")).await.unwrap();
        let row: (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0.to_lowercase(), "wal");
        db.close().await;
    }

    #[tokio::test]
    async fn test_unusable_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"").unwrap();
        let err = Database::connect(blocker.join("cache.sqlite")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Path(_)));
    }

    #[tokio::test]
    async fn test_stale_shares_table_resets_both() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");
        let pool = raw(&path).await;
        // An older layout: no resource_type column.
        sqlx::query(
            "CREATE TABLE file_shares (file_share_id TEXT NOT NULL, data_plane_endpoint TEXT NOT NULL, \
             resource_name TEXT NOT NULL, resource_create_time TEXT NOT NULL, share_name TEXT NOT NULL, \
             is_snapshot INTEGER NOT NULL, snapshot_time TEXT, PRIMARY KEY (file_share_id, data_plane_endpoint))",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(&DIRECTORY_ENTRIES.create_sql()).execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO directory_entries VALUES ('id', 'endpoint', '/a', 'a', 0)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let db = Database::connect(&path).await.unwrap();
        assert_eq!(db.reconciliation(), Reconciliation { shares_reset: true, entries_reset: true });
        assert!(schema::is_compatible(&FILE_SHARES, &columns(&db, &FILE_SHARES).await));
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM directory_entries").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0, "entries of a reset shares table are discarded");
        db.close().await;
    }

    #[tokio::test]
    async fn test_stale_entries_table_keeps_shares() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");
        let pool = raw(&path).await;
        sqlx::query(&FILE_SHARES.create_sql()).execute(&pool).await.unwrap();
        // An unknown NOT NULL column makes inserts impossible.
        sqlx::query(
            "CREATE TABLE directory_entries (file_share_id TEXT NOT NULL, data_plane_endpoint TEXT NOT NULL, \
             path TEXT NOT NULL, entry_name TEXT NOT NULL, is_directory INTEGER NOT NULL, size INTEGER NOT NULL, \
             PRIMARY KEY (file_share_id, data_plane_endpoint, path))",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let db = Database::connect(&path).await.unwrap();
        assert_eq!(db.reconciliation(), Reconciliation { shares_reset: false, entries_reset: true });
        assert!(schema::is_compatible(&DIRECTORY_ENTRIES, &columns(&db, &DIRECTORY_ENTRIES).await));
        db.close().await;
    }

    #[tokio::test]
    async fn test_unknown_nullable_column_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");
        Database::connect(&path).await.unwrap().close().await;
        let pool = raw(&path).await;
        sqlx::query("ALTER TABLE directory_entries ADD COLUMN note TEXT").execute(&pool).await.unwrap();
        pool.close().await;

        let db = Database::connect(&path).await.unwrap();
        assert!(db.reconciliation().is_clean());
        db.close().await;
    }
}
