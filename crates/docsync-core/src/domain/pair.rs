//! SyncPair domain entity
//!
//! A [`SyncPair`] is the store's unit of tracked correspondence between a
//! local path and a remote reference. It keeps the last synchronized
//! snapshot of both sides so that the next scan can tell which side moved.
//!
//! ## State Machine
//!
//! ```text
//!   locally_*  ──apply──►                         ◄──apply──  remotely_*
//!   (created, modified,      ┌──────────────┐        (created, modified,
//!    moved, deleted)         │ synchronized │         moved, deleted)
//!                            └──────────────┘
//!                               │        ▲
//!                both sides     │        │  both sides changed
//!                changed        ▼        │  to the same content
//!                            ┌────────────┐
//!                            │ conflicted │   (never auto-applied)
//!                            └────────────┘
//!
//!   any pending state ──(denied or retry budget spent)──► unsynchronized
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::info::FileSystemInfo;
use super::newtypes::{LocalPath, PairId, RemoteRef};

// ============================================================================
// PairState enum
// ============================================================================

/// Lifecycle state of a pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    /// Both sides match the recorded snapshot
    #[default]
    Synchronized,
    LocallyCreated,
    LocallyModified,
    LocallyDeleted,
    LocallyMoved,
    RemotelyCreated,
    RemotelyModified,
    RemotelyDeleted,
    RemotelyMoved,
    /// Both sides changed since the last snapshot
    Conflicted,
    /// Permanently skipped until changed externally
    Unsynchronized,
}

impl PairState {
    /// All states, in declaration order
    pub const ALL: [PairState; 11] = [
        PairState::Synchronized,
        PairState::LocallyCreated,
        PairState::LocallyModified,
        PairState::LocallyDeleted,
        PairState::LocallyMoved,
        PairState::RemotelyCreated,
        PairState::RemotelyModified,
        PairState::RemotelyDeleted,
        PairState::RemotelyMoved,
        PairState::Conflicted,
        PairState::Unsynchronized,
    ];

    /// Returns the snake_case name used in the store and the status output
    pub fn as_str(&self) -> &'static str {
        match self {
            PairState::Synchronized => "synchronized",
            PairState::LocallyCreated => "locally_created",
            PairState::LocallyModified => "locally_modified",
            PairState::LocallyDeleted => "locally_deleted",
            PairState::LocallyMoved => "locally_moved",
            PairState::RemotelyCreated => "remotely_created",
            PairState::RemotelyModified => "remotely_modified",
            PairState::RemotelyDeleted => "remotely_deleted",
            PairState::RemotelyMoved => "remotely_moved",
            PairState::Conflicted => "conflicted",
            PairState::Unsynchronized => "unsynchronized",
        }
    }

    /// Returns true if the state asks for an apply
    pub fn is_pending(&self) -> bool {
        !matches!(
            self,
            PairState::Synchronized | PairState::Conflicted | PairState::Unsynchronized
        )
    }

    /// Returns true if the pair must never be auto-applied
    pub fn excluded_from_apply(&self) -> bool {
        matches!(self, PairState::Conflicted | PairState::Unsynchronized)
    }

    /// Returns true for the two deletion states
    pub fn is_deletion(&self) -> bool {
        matches!(self, PairState::LocallyDeleted | PairState::RemotelyDeleted)
    }

    /// Returns true for creation and move states
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PairState::LocallyCreated
                | PairState::RemotelyCreated
                | PairState::LocallyMoved
                | PairState::RemotelyMoved
        )
    }

    /// Returns true for content modification states
    pub fn is_modification(&self) -> bool {
        matches!(self, PairState::LocallyModified | PairState::RemotelyModified)
    }

    /// Returns true if the change originated on the local side
    pub fn is_local_change(&self) -> bool {
        matches!(
            self,
            PairState::LocallyCreated
                | PairState::LocallyModified
                | PairState::LocallyDeleted
                | PairState::LocallyMoved
        )
    }
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PairState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PairState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::UnknownState(s.to_string()))
    }
}

// ============================================================================
// SyncPair entity
// ============================================================================

/// One tracked entity, with the snapshot of both sides at the last sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPair {
    /// Store-assigned identifier, `None` until inserted
    pub id: Option<PairId>,
    /// Absolute host path of the bound root this pair belongs to
    pub local_root: PathBuf,
    pub local_path: Option<LocalPath>,
    pub remote_ref: Option<RemoteRef>,
    pub remote_repository: String,

    pub local_digest: Option<String>,
    pub remote_digest: Option<String>,
    pub local_name: Option<String>,
    pub remote_name: Option<String>,
    pub folderish: bool,
    pub local_marker: Option<String>,
    pub remote_parent_ref: Option<RemoteRef>,

    pub pair_state: PairState,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: u32,
    pub local_missing_cycles: u32,
    pub remote_missing_cycles: u32,

    /// Store-wide write sequence, assigned by the store
    pub last_transfer_event: i64,
}

impl SyncPair {
    fn empty(local_root: PathBuf, remote_repository: String, folderish: bool) -> Self {
        Self {
            id: None,
            local_root,
            local_path: None,
            remote_ref: None,
            remote_repository,
            local_digest: None,
            remote_digest: None,
            local_name: None,
            remote_name: None,
            folderish,
            local_marker: None,
            remote_parent_ref: None,
            pair_state: PairState::Synchronized,
            last_sync_date: None,
            last_error: None,
            error_count: 0,
            local_missing_cycles: 0,
            remote_missing_cycles: 0,
            last_transfer_event: 0,
        }
    }

    /// Creates the root pair of a binding, already synchronized
    pub fn root(local_root: PathBuf, remote_root: RemoteRef, remote_repository: String) -> Self {
        let mut pair = Self::empty(local_root, remote_repository, true);
        pair.local_path = Some(LocalPath::root());
        pair.remote_ref = Some(remote_root);
        pair.last_sync_date = Some(Utc::now());
        pair
    }

    /// Creates a pair for a local entity that has no matching row
    pub fn locally_created(
        local_root: PathBuf,
        remote_repository: String,
        path: LocalPath,
        info: &FileSystemInfo,
    ) -> Self {
        let mut pair = Self::empty(local_root, remote_repository, info.folderish);
        pair.local_path = Some(path);
        pair.refresh_local(info);
        pair.pair_state = PairState::LocallyCreated;
        pair
    }

    /// Creates a pair for a remote entity that has no matching row
    ///
    /// `digest` is the effective remote digest (possibly computed locally).
    pub fn remotely_created(
        local_root: PathBuf,
        remote_repository: String,
        remote_ref: RemoteRef,
        info: &FileSystemInfo,
        digest: Option<String>,
    ) -> Self {
        let mut pair = Self::empty(local_root, remote_repository, info.folderish);
        pair.remote_ref = Some(remote_ref);
        pair.refresh_remote(info, digest);
        pair.pair_state = PairState::RemotelyCreated;
        pair
    }

    /// Copies the local snapshot fields from a scan result
    pub fn refresh_local(&mut self, info: &FileSystemInfo) {
        self.local_name = Some(info.name.clone());
        self.local_digest = if info.folderish {
            None
        } else {
            info.digest.clone()
        };
        self.local_marker = info.marker.clone();
        self.local_missing_cycles = 0;
    }

    /// Copies the remote snapshot fields from a scan result
    pub fn refresh_remote(&mut self, info: &FileSystemInfo, digest: Option<String>) {
        self.remote_name = Some(info.name.clone());
        self.remote_digest = if info.folderish { None } else { digest };
        self.remote_parent_ref = info
            .parent_id
            .as_ref()
            .and_then(|p| RemoteRef::new(p.clone()).ok());
        self.remote_missing_cycles = 0;
    }

    /// Returns true if this is the root pair of its binding
    pub fn is_root(&self) -> bool {
        self.local_path.as_ref().is_some_and(LocalPath::is_root)
    }

    /// Depth of the local path, or 0 when the pair has no local side yet
    pub fn depth(&self) -> usize {
        self.local_path.as_ref().map_or(0, LocalPath::depth)
    }

    /// A pair is fully synchronized when both sides exist, the state says so
    /// and the recorded digests agree
    pub fn is_fully_synchronized(&self) -> bool {
        self.pair_state == PairState::Synchronized
            && self.local_path.is_some()
            && self.remote_ref.is_some()
            && (self.folderish
                || (self.local_digest.is_some() && self.local_digest == self.remote_digest))
    }

    /// Records a successful apply
    pub fn mark_synchronized(&mut self) {
        self.pair_state = PairState::Synchronized;
        self.last_sync_date = Some(Utc::now());
        self.last_error = None;
        self.error_count = 0;
        self.local_missing_cycles = 0;
        self.remote_missing_cycles = 0;
    }

    /// Records a failed apply, returns true when the retry budget is spent
    /// and the pair became `unsynchronized`
    pub fn record_failure(&mut self, error: impl Into<String>, max_error_count: u32) -> bool {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(error.into());
        if self.error_count >= max_error_count {
            self.pair_state = PairState::Unsynchronized;
            true
        } else {
            false
        }
    }

    /// Skips the pair permanently
    pub fn mark_unsynchronized(&mut self, reason: impl Into<String>) {
        self.pair_state = PairState::Unsynchronized;
        self.last_error = Some(reason.into());
    }

    /// Moves the pair to `state` after a classification
    ///
    /// # Errors
    /// Conflicted pairs only leave their state through [`mark_synchronized`]
    /// (both sides converged) and folders never become `*_modified`.
    ///
    /// [`mark_synchronized`]: SyncPair::mark_synchronized
    pub fn transition_to(&mut self, state: PairState) -> Result<(), DomainError> {
        let invalid = (self.pair_state == PairState::Conflicted
            && state != PairState::Conflicted
            && !state.is_deletion())
            || (self.folderish && state.is_modification());

        if invalid {
            return Err(DomainError::InvalidState {
                from: self.pair_state.to_string(),
                to: state.to_string(),
            });
        }
        self.pair_state = state;
        Ok(())
    }

    /// Name to show for this pair (local name first)
    pub fn display_name(&self) -> &str {
        self.local_name
            .as_deref()
            .or(self.remote_name.as_deref())
            .unwrap_or_default()
    }
}
