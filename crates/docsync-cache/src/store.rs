//! SQLite implementation of IStateStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! state store port defined in docsync-core. It handles all domain type
//! conversion and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                   |
//! |----------------------|----------|--------------------------------------------|
//! | PathBuf              | TEXT     | `to_string_lossy()` / `PathBuf::from`      |
//! | LocalPath            | TEXT     | `.as_str()` / `LocalPath::new()`           |
//! | RemoteRef            | TEXT     | `.as_str()` / `RemoteRef::new()`           |
//! | PairState            | TEXT     | `.as_str()` / `FromStr`                    |
//! | DateTime<Utc>        | TEXT     | ISO 8601 via `to_rfc3339()`                |
//! | bool                 | INTEGER  | 0 / 1                                      |
//!
//! Every pair write runs in its own transaction that also bumps the
//! `last_transfer_event` counter, so the sequence is store-wide and gap-free
//! with respect to committed writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use docsync_core::domain::{
    LocalPath, PairId, PairState, RemoteRef, RootBinding, ServerBinding, StoreIntegrityError,
    SyncPair,
};
use docsync_core::ports::{IStateStore, PairFilter};

use crate::CacheError;

/// SQLite-based implementation of the state store port
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Increments and returns the store-wide transfer sequence
    async fn next_transfer_event(tx: &mut Transaction<'_, Sqlite>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE counters SET value = value + 1 \
             WHERE name = 'last_transfer_event' RETURNING value",
        )
        .fetch_one(&mut **tx)
        .await
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite default format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn local_path_from_string(s: Option<String>) -> Result<Option<LocalPath>, CacheError> {
    s.map(|p| {
        LocalPath::new(p.clone()).map_err(|e| {
            CacheError::SerializationError(format!("Invalid LocalPath '{}': {}", p, e))
        })
    })
    .transpose()
}

fn remote_ref_from_string(s: Option<String>) -> Result<Option<RemoteRef>, CacheError> {
    s.map(|r| {
        RemoteRef::new(r.clone()).map_err(|e| {
            CacheError::SerializationError(format!("Invalid RemoteRef '{}': {}", r, e))
        })
    })
    .transpose()
}

fn pair_state_from_string(s: &str) -> Result<PairState, CacheError> {
    PairState::from_str(s).map_err(|e| CacheError::SerializationError(e.to_string()))
}

/// Converts uniqueness violations into [`StoreIntegrityError`]
fn write_error(e: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return StoreIntegrityError(db.message().to_string()).into();
        }
    }
    anyhow::Error::new(CacheError::from(e))
}

/// `"/a/b"` -> `"/a/b/"`, root stays `"/"`
fn child_prefix(path: &LocalPath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        format!("{}/", path.as_str())
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn server_binding_from_row(row: &SqliteRow) -> Result<ServerBinding, CacheError> {
    let bound_at: String = row.get("bound_at");
    Ok(ServerBinding {
        local_folder: PathBuf::from(row.get::<String, _>("local_folder")),
        server_url: row.get("server_url"),
        username: row.get("username"),
        token: row.get("token"),
        bound_at: parse_datetime(&bound_at)?,
    })
}

fn root_binding_from_row(row: &SqliteRow) -> Result<RootBinding, CacheError> {
    let bound_at: String = row.get("bound_at");
    let remote_root: String = row.get("remote_root");
    Ok(RootBinding {
        local_root: PathBuf::from(row.get::<String, _>("local_root")),
        local_folder: PathBuf::from(row.get::<String, _>("local_folder")),
        remote_root: RemoteRef::new(remote_root.clone()).map_err(|e| {
            CacheError::SerializationError(format!("Invalid RemoteRef '{}': {}", remote_root, e))
        })?,
        remote_repository: row.get("remote_repository"),
        bound_at: parse_datetime(&bound_at)?,
    })
}

fn sync_pair_from_row(row: &SqliteRow) -> Result<SyncPair, CacheError> {
    let state_str: String = row.get("pair_state");
    let folderish: i64 = row.get("folderish");
    let error_count: i64 = row.get("error_count");
    let local_missing: i64 = row.get("local_missing_cycles");
    let remote_missing: i64 = row.get("remote_missing_cycles");

    Ok(SyncPair {
        id: Some(PairId::new(row.get("id"))),
        local_root: PathBuf::from(row.get::<String, _>("local_root")),
        local_path: local_path_from_string(row.get("local_path"))?,
        remote_ref: remote_ref_from_string(row.get("remote_ref"))?,
        remote_repository: row.get("remote_repository"),
        local_digest: row.get("local_digest"),
        remote_digest: row.get("remote_digest"),
        local_name: row.get("local_name"),
        remote_name: row.get("remote_name"),
        folderish: folderish != 0,
        local_marker: row.get("local_marker"),
        remote_parent_ref: remote_ref_from_string(row.get("remote_parent_ref"))?,
        pair_state: pair_state_from_string(&state_str)?,
        last_sync_date: parse_optional_datetime(row.get("last_sync_date"))?,
        last_error: row.get("last_error"),
        error_count: error_count.max(0) as u32,
        local_missing_cycles: local_missing.max(0) as u32,
        remote_missing_cycles: remote_missing.max(0) as u32,
        last_transfer_event: row.get("last_transfer_event"),
    })
}

fn rows_to_pairs(rows: &[SqliteRow]) -> Result<Vec<SyncPair>, CacheError> {
    rows.iter().map(sync_pair_from_row).collect()
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    // --- Server bindings ---

    async fn save_server_binding(&self, binding: &ServerBinding) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO server_bindings (local_folder, server_url, username, token, bound_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(local_folder) DO UPDATE SET \
               server_url = excluded.server_url, \
               username = excluded.username, \
               token = excluded.token, \
               bound_at = excluded.bound_at",
        )
        .bind(path_to_string(&binding.local_folder))
        .bind(&binding.server_url)
        .bind(&binding.username)
        .bind(&binding.token)
        .bind(binding.bound_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            local_folder = %binding.local_folder.display(),
            server_url = %binding.server_url,
            "Saved server binding"
        );
        Ok(())
    }

    async fn get_server_binding(&self, local_folder: &Path) -> anyhow::Result<Option<ServerBinding>> {
        let row = sqlx::query("SELECT * FROM server_bindings WHERE local_folder = ?")
            .bind(path_to_string(local_folder))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(server_binding_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_server_bindings(&self) -> anyhow::Result<Vec<ServerBinding>> {
        let rows = sqlx::query("SELECT * FROM server_bindings ORDER BY local_folder")
            .fetch_all(&self.pool)
            .await?;

        let mut bindings = Vec::with_capacity(rows.len());
        for row in &rows {
            bindings.push(server_binding_from_row(row)?);
        }
        Ok(bindings)
    }

    async fn delete_server_binding(&self, local_folder: &Path) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM server_bindings WHERE local_folder = ?")
            .bind(path_to_string(local_folder))
            .execute(&self.pool)
            .await?;

        tracing::debug!(local_folder = %local_folder.display(), "Deleted server binding");
        Ok(result.rows_affected() > 0)
    }

    // --- Root bindings ---

    async fn save_root_binding(&self, binding: &RootBinding) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO root_bindings \
             (local_root, local_folder, remote_root, remote_repository, bound_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(local_root) DO UPDATE SET \
               local_folder = excluded.local_folder, \
               remote_root = excluded.remote_root, \
               remote_repository = excluded.remote_repository, \
               bound_at = excluded.bound_at",
        )
        .bind(path_to_string(&binding.local_root))
        .bind(path_to_string(&binding.local_folder))
        .bind(binding.remote_root.as_str())
        .bind(&binding.remote_repository)
        .bind(binding.bound_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            local_root = %binding.local_root.display(),
            remote_root = %binding.remote_root,
            "Saved root binding"
        );
        Ok(())
    }

    async fn get_root_binding(&self, local_root: &Path) -> anyhow::Result<Option<RootBinding>> {
        let row = sqlx::query("SELECT * FROM root_bindings WHERE local_root = ?")
            .bind(path_to_string(local_root))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(root_binding_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_root_bindings(
        &self,
        local_folder: Option<&Path>,
    ) -> anyhow::Result<Vec<RootBinding>> {
        let rows = match local_folder {
            Some(folder) => {
                sqlx::query("SELECT * FROM root_bindings WHERE local_folder = ? ORDER BY local_root")
                    .bind(path_to_string(folder))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM root_bindings ORDER BY local_root")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut bindings = Vec::with_capacity(rows.len());
        for row in &rows {
            bindings.push(root_binding_from_row(row)?);
        }
        Ok(bindings)
    }

    async fn delete_root_binding(&self, local_root: &Path) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM root_bindings WHERE local_root = ?")
            .bind(path_to_string(local_root))
            .execute(&self.pool)
            .await?;

        tracing::debug!(local_root = %local_root.display(), "Deleted root binding");
        Ok(result.rows_affected() > 0)
    }

    // --- Sync pairs ---

    async fn insert_pair(&self, pair: &SyncPair) -> anyhow::Result<PairId> {
        let mut tx = self.pool.begin().await?;
        let event = Self::next_transfer_event(&mut tx).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sync_pairs \
             (local_root, local_path, remote_ref, remote_repository, \
              local_digest, remote_digest, local_name, remote_name, folderish, \
              local_marker, remote_parent_ref, pair_state, last_sync_date, last_error, \
              error_count, local_missing_cycles, remote_missing_cycles, last_transfer_event) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(path_to_string(&pair.local_root))
        .bind(pair.local_path.as_ref().map(LocalPath::as_str))
        .bind(pair.remote_ref.as_ref().map(RemoteRef::as_str))
        .bind(&pair.remote_repository)
        .bind(&pair.local_digest)
        .bind(&pair.remote_digest)
        .bind(&pair.local_name)
        .bind(&pair.remote_name)
        .bind(i64::from(pair.folderish))
        .bind(&pair.local_marker)
        .bind(pair.remote_parent_ref.as_ref().map(RemoteRef::as_str))
        .bind(pair.pair_state.as_str())
        .bind(pair.last_sync_date.map(|dt| dt.to_rfc3339()))
        .bind(&pair.last_error)
        .bind(i64::from(pair.error_count))
        .bind(i64::from(pair.local_missing_cycles))
        .bind(i64::from(pair.remote_missing_cycles))
        .bind(event)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await?;

        tracing::trace!(
            pair_id = id,
            state = %pair.pair_state,
            local_path = ?pair.local_path,
            remote_ref = ?pair.remote_ref,
            "Inserted sync pair"
        );
        Ok(PairId::new(id))
    }

    async fn update_pair(&self, pair: &SyncPair) -> anyhow::Result<i64> {
        let id = pair
            .id
            .ok_or_else(|| anyhow::anyhow!("Cannot update a sync pair that was never inserted"))?;

        let mut tx = self.pool.begin().await?;
        let event = Self::next_transfer_event(&mut tx).await?;

        let result = sqlx::query(
            "UPDATE sync_pairs SET \
               local_path = ?, remote_ref = ?, remote_repository = ?, \
               local_digest = ?, remote_digest = ?, local_name = ?, remote_name = ?, \
               folderish = ?, local_marker = ?, remote_parent_ref = ?, pair_state = ?, \
               last_sync_date = ?, last_error = ?, error_count = ?, \
               local_missing_cycles = ?, remote_missing_cycles = ?, last_transfer_event = ? \
             WHERE id = ?",
        )
        .bind(pair.local_path.as_ref().map(LocalPath::as_str))
        .bind(pair.remote_ref.as_ref().map(RemoteRef::as_str))
        .bind(&pair.remote_repository)
        .bind(&pair.local_digest)
        .bind(&pair.remote_digest)
        .bind(&pair.local_name)
        .bind(&pair.remote_name)
        .bind(i64::from(pair.folderish))
        .bind(&pair.local_marker)
        .bind(pair.remote_parent_ref.as_ref().map(RemoteRef::as_str))
        .bind(pair.pair_state.as_str())
        .bind(pair.last_sync_date.map(|dt| dt.to_rfc3339()))
        .bind(&pair.last_error)
        .bind(i64::from(pair.error_count))
        .bind(i64::from(pair.local_missing_cycles))
        .bind(i64::from(pair.remote_missing_cycles))
        .bind(event)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            anyhow::bail!("Sync pair {} not found", id);
        }

        tx.commit().await?;

        tracing::trace!(pair_id = %id, state = %pair.pair_state, event, "Updated sync pair");
        Ok(event)
    }

    async fn get_pair(&self, id: PairId) -> anyhow::Result<Option<SyncPair>> {
        let row = sqlx::query("SELECT * FROM sync_pairs WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(sync_pair_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_pair_by_local_path(
        &self,
        local_root: &Path,
        path: &LocalPath,
    ) -> anyhow::Result<Option<SyncPair>> {
        // Live pairs first, then the most recently written one
        let row = sqlx::query(
            "SELECT * FROM sync_pairs WHERE local_root = ? AND local_path = ? \
             ORDER BY pair_state IN ('locally_deleted', 'remotely_deleted'), \
                      last_transfer_event DESC \
             LIMIT 1",
        )
        .bind(path_to_string(local_root))
        .bind(path.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(sync_pair_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_pair_by_remote_ref(
        &self,
        local_root: &Path,
        remote_ref: &RemoteRef,
    ) -> anyhow::Result<Option<SyncPair>> {
        let row = sqlx::query(
            "SELECT * FROM sync_pairs WHERE local_root = ? AND remote_ref = ? \
             ORDER BY pair_state IN ('locally_deleted', 'remotely_deleted'), \
                      last_transfer_event DESC \
             LIMIT 1",
        )
        .bind(path_to_string(local_root))
        .bind(remote_ref.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(sync_pair_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pairs(&self, filter: &PairFilter) -> anyhow::Result<Vec<SyncPair>> {
        let mut sql = String::from("SELECT * FROM sync_pairs WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref local_root) = filter.local_root {
            sql.push_str(" AND local_root = ?");
            binds.push(path_to_string(local_root));
        }

        if let Some(state) = filter.state {
            sql.push_str(" AND pair_state = ?");
            binds.push(state.as_str().to_string());
        }

        // Narrow to the subtree in SQL, direct children are picked below
        if let Some(ref parent) = filter.local_parent {
            let prefix = child_prefix(parent);
            sql.push_str(" AND substr(local_path, 1, length(?)) = ?");
            binds.push(prefix.clone());
            binds.push(prefix);
        }

        sql.push_str(" ORDER BY local_path, id");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut pairs = rows_to_pairs(&rows)?;

        if filter.local_parent.is_some() {
            pairs.retain(|p| filter.matches(p));
        }

        Ok(pairs)
    }

    async fn delete_pair(&self, id: PairId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_pairs WHERE id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        tracing::trace!(pair_id = %id, "Deleted sync pair");
        Ok(())
    }

    async fn delete_pairs_under(&self, local_root: &Path, path: &LocalPath) -> anyhow::Result<u64> {
        let prefix = child_prefix(path);

        let result = sqlx::query(
            "DELETE FROM sync_pairs WHERE local_root = ? \
             AND (local_path = ? OR substr(local_path, 1, length(?)) = ?)",
        )
        .bind(path_to_string(local_root))
        .bind(path.as_str())
        .bind(&prefix)
        .bind(&prefix)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            local_root = %local_root.display(),
            path = %path,
            removed = result.rows_affected(),
            "Deleted sync pairs under path"
        );
        Ok(result.rows_affected())
    }

    async fn rebase_local_paths(
        &self,
        local_root: &Path,
        old: &LocalPath,
        new: &LocalPath,
    ) -> anyhow::Result<u64> {
        let prefix = child_prefix(old);
        let root = path_to_string(local_root);

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, local_path FROM sync_pairs \
             WHERE local_root = ? AND substr(local_path, 1, length(?)) = ?",
        )
        .bind(&root)
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&mut *tx)
        .await?;

        let mut updated = 0u64;
        for row in &rows {
            let id: i64 = row.get("id");
            let current = local_path_from_string(row.get("local_path"))?;
            let Some(rebased) = current.and_then(|p| p.rebase(old, new)) else {
                continue;
            };

            let event = Self::next_transfer_event(&mut tx).await?;
            sqlx::query(
                "UPDATE sync_pairs SET local_path = ?, last_transfer_event = ? WHERE id = ?",
            )
            .bind(rebased.as_str())
            .bind(event)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;
            updated += 1;
        }

        tx.commit().await?;

        tracing::debug!(
            local_root = %local_root.display(),
            from = %old,
            to = %new,
            updated,
            "Rebased local paths"
        );
        Ok(updated)
    }

    async fn count_pairs_by_state(
        &self,
        local_root: Option<&Path>,
    ) -> anyhow::Result<HashMap<String, u64>> {
        let rows = match local_root {
            Some(root) => {
                sqlx::query(
                    "SELECT pair_state, COUNT(*) as count FROM sync_pairs \
                     WHERE local_root = ? GROUP BY pair_state",
                )
                .bind(path_to_string(root))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT pair_state, COUNT(*) as count FROM sync_pairs GROUP BY pair_state",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut counts = HashMap::new();
        for row in &rows {
            let state_str: String = row.get("pair_state");
            let count: i64 = row.get("count");

            let state = pair_state_from_string(&state_str)?;
            counts.insert(state.as_str().to_string(), count as u64);
        }

        Ok(counts)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("State store closed");
    }
}
