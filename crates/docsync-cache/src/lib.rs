//! docsync Cache - SQLite state store
//!
//! Persists server bindings (with the token obtained at bind time), root
//! bindings and sync pairs with their last synchronized snapshots. Store
//! methods return `anyhow::Result`; a unique-constraint violation on pair
//! paths or ids surfaces as a `StoreIntegrityError` inside it.
//!
//! - [`DatabasePool`] opens the database and applies the schema
//! - [`SqliteStateStore`] implements `IStateStore`
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use docsync_cache::{DatabasePool, SqliteStateStore};
//! use docsync_core::ports::IStateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.docsync/docsync.db")).await?;
//! let store = SqliteStateStore::new(pool.pool().clone());
//! let roots = store.list_root_bindings(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteStateStore;

/// Storage failures other than integrity violations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cannot open state database: {0}")]
    ConnectionFailed(String),

    #[error("State query failed: {0}")]
    QueryFailed(String),

    #[error("Cannot apply state schema: {0}")]
    MigrationFailed(String),

    /// A stored value does not parse back into its domain type
    #[error("Corrupt stored value: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
