//! State store port (driven/secondary port)
//!
//! This module defines the interface for persisting bindings and sync pairs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//!   The one failure callers must react to, a uniqueness violation, is
//!   carried as a [`StoreIntegrityError`](crate::domain::StoreIntegrityError)
//!   inside the `anyhow::Error`.
//! - Every pair write is committed on its own, so an interrupted cycle
//!   resumes from the last committed pair.
//! - `update_pair` assigns a new store-wide `last_transfer_event` value and
//!   returns it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::{
    LocalPath, PairId, PairState, RemoteRef, RootBinding, ServerBinding, SyncPair,
};

// ============================================================================
// PairFilter struct
// ============================================================================

/// Filter criteria for listing pairs
///
/// All fields are optional; unset fields do not filter. Set fields are
/// combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct PairFilter {
    /// Only pairs of this bound root
    pub local_root: Option<PathBuf>,
    /// Only pairs in this state
    pub state: Option<PairState>,
    /// Only direct children of this local path
    pub local_parent: Option<LocalPath>,
}

impl PairFilter {
    /// Creates a new empty filter (matches all pairs)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root filter
    pub fn with_local_root(mut self, local_root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(local_root.into());
        self
    }

    /// Sets the state filter
    pub fn with_state(mut self, state: PairState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the parent folder filter
    pub fn with_local_parent(mut self, parent: LocalPath) -> Self {
        self.local_parent = Some(parent);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.local_root.is_none() && self.state.is_none() && self.local_parent.is_none()
    }

    /// Returns true if `pair` satisfies every set criterion
    pub fn matches(&self, pair: &SyncPair) -> bool {
        if let Some(root) = &self.local_root {
            if &pair.local_root != root {
                return false;
            }
        }
        if let Some(state) = self.state {
            if pair.pair_state != state {
                return false;
            }
        }
        if let Some(parent) = &self.local_parent {
            let parent_matches = pair
                .local_path
                .as_ref()
                .and_then(LocalPath::parent)
                .is_some_and(|p| &p == parent);
            if !parent_matches {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// IStateStore trait
// ============================================================================

/// Port trait for persistent synchronizer state
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    // --- Server bindings ---

    /// Saves a server binding (insert or update)
    async fn save_server_binding(&self, binding: &ServerBinding) -> anyhow::Result<()>;

    async fn get_server_binding(&self, local_folder: &Path)
        -> anyhow::Result<Option<ServerBinding>>;

    async fn list_server_bindings(&self) -> anyhow::Result<Vec<ServerBinding>>;

    /// Deletes a server binding with its roots and their pairs
    ///
    /// Returns true if a binding was removed.
    async fn delete_server_binding(&self, local_folder: &Path) -> anyhow::Result<bool>;

    // --- Root bindings ---

    /// Saves a root binding (insert or update)
    async fn save_root_binding(&self, binding: &RootBinding) -> anyhow::Result<()>;

    async fn get_root_binding(&self, local_root: &Path) -> anyhow::Result<Option<RootBinding>>;

    /// Lists root bindings, optionally only those of one server binding
    async fn list_root_bindings(&self, local_folder: Option<&Path>)
        -> anyhow::Result<Vec<RootBinding>>;

    /// Deletes a root binding with its pairs
    async fn delete_root_binding(&self, local_root: &Path) -> anyhow::Result<bool>;

    // --- Sync pairs ---

    /// Inserts a new pair and returns its id
    ///
    /// # Errors
    /// A `StoreIntegrityError` when another live pair of the same root owns
    /// the local path or the remote ref.
    async fn insert_pair(&self, pair: &SyncPair) -> anyhow::Result<PairId>;

    /// Updates an existing pair and returns its new `last_transfer_event`
    async fn update_pair(&self, pair: &SyncPair) -> anyhow::Result<i64>;

    async fn get_pair(&self, id: PairId) -> anyhow::Result<Option<SyncPair>>;

    async fn find_pair_by_local_path(
        &self,
        local_root: &Path,
        path: &LocalPath,
    ) -> anyhow::Result<Option<SyncPair>>;

    async fn find_pair_by_remote_ref(
        &self,
        local_root: &Path,
        remote_ref: &RemoteRef,
    ) -> anyhow::Result<Option<SyncPair>>;

    /// Lists pairs matching the filter, ordered by local path
    async fn list_pairs(&self, filter: &PairFilter) -> anyhow::Result<Vec<SyncPair>>;

    async fn delete_pair(&self, id: PairId) -> anyhow::Result<()>;

    /// Deletes every pair of `local_root` located at or below `path`
    ///
    /// Returns the number of removed rows.
    async fn delete_pairs_under(&self, local_root: &Path, path: &LocalPath)
        -> anyhow::Result<u64>;

    /// Rewrites the local paths of every pair below `old` so they sit below
    /// `new` (the pair at `old` itself is not touched)
    async fn rebase_local_paths(
        &self,
        local_root: &Path,
        old: &LocalPath,
        new: &LocalPath,
    ) -> anyhow::Result<u64>;

    /// Counts pairs by state name
    async fn count_pairs_by_state(
        &self,
        local_root: Option<&Path>,
    ) -> anyhow::Result<HashMap<String, u64>>;

    /// Releases the underlying resources
    async fn close(&self);
}
