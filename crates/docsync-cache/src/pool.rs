//! SQLite pool for the state database
//!
//! File databases run in WAL mode with a 5 s busy timeout and enforced
//! foreign keys, so deleting a binding cascades to its pairs. The schema
//! script is idempotent and runs on every open.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

/// Embedded schema
const SCHEMA: &str = include_str!("migrations/20260301_initial.sql");

/// Writers wait this long for a lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections kept for a file database
const MAX_CONNECTIONS: u32 = 5;

/// Handle to the state database
///
/// Cloning shares the underlying pool.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (or creates) the database at `db_path`, creating missing parents
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = Self::connect(options, MAX_CONNECTIONS)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{}: {e}", db_path.display())))?;

        let db = Self::initialized(pool).await?;
        info!(path = %db_path.display(), "State database opened");
        Ok(db)
    }

    /// Private in-memory database
    ///
    /// Limited to one connection: each SQLite memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let pool = Self::connect(options, 1)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        let db = Self::initialized(pool).await?;
        debug!("In-memory state database opened");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<SqlitePool, sqlx::Error> {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT))
            .await
    }

    /// Applies the schema
    async fn initialized(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("docsync.db");

        let pool = DatabasePool::new(&db_path).await.unwrap();
        assert!(db_path.exists());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_pairs")
            .fetch_one(pool.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        pool.pool().close().await;

        // Reopening applies the schema again without error
        let reopened = DatabasePool::new(&db_path).await.unwrap();
        let counter: i64 =
            sqlx::query_scalar("SELECT value FROM counters WHERE name = 'last_transfer_event'")
                .fetch_one(reopened.pool())
                .await
                .unwrap();
        assert_eq!(counter, 0);
    }

    #[tokio::test]
    async fn test_in_memory_enforces_foreign_keys() {
        let pool = DatabasePool::in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO root_bindings (local_root, local_folder, remote_root, remote_repository, bound_at) \
             VALUES ('/r', '/missing', 'root', 'default', '2026-01-01T00:00:00Z')",
        )
        .execute(pool.pool())
        .await;
        assert!(result.is_err());
    }
}
