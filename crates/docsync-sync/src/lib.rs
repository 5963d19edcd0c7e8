//! docsync-sync - Synchronization engine for docsync
//!
//! This crate provides:
//! - [`LocalFileSystemClient`], the local side of a binding
//! - [`Synchronizer`], which scans both sides, classifies pairs and applies
//!   the pending ones
//! - [`Controller`], the entry point for binding servers and roots

use std::path::PathBuf;

use docsync_core::domain::{ClientError, StoreIntegrityError};
use thiserror::Error;

pub mod classify;
pub mod controller;
pub mod digest;
pub mod engine;
pub mod local_client;

pub use controller::{Controller, ControllerError};
pub use engine::{CycleOutcome, CycleReport, SyncSettings, Synchronizer};
pub use local_client::LocalFileSystemClient;

/// Errors that end a synchronization cycle early
///
/// Failures of a single pair are recorded on that pair instead; only
/// [`SyncError::PairFailed`] carries one, and only when `stop_on_error` is
/// set.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local root directory or the remote root item is gone
    #[error("Root {root} is unavailable: {reason}")]
    RootUnavailable { root: PathBuf, reason: String },

    /// Walking one of the trees failed
    #[error("Scan failed: {0}")]
    Scan(#[source] ClientError),

    /// The state store failed
    #[error("State store error: {0:#}")]
    Store(anyhow::Error),

    /// The state store refused a write that would duplicate a pair
    #[error(transparent)]
    Integrity(#[from] StoreIntegrityError),

    /// The server rejected the stored credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No server binding owns this root
    #[error("No server binding for {0}")]
    NotBound(PathBuf),

    /// The synchronizer was asked to stop
    #[error("Synchronizer stopped")]
    Stopped,

    /// A pair failed while `stop_on_error` is set
    #[error("Failed to synchronize {pair}: {source}")]
    PairFailed {
        pair: String,
        #[source]
        source: ClientError,
    },
}

impl SyncError {
    /// Wraps a store failure, surfacing integrity violations as such
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreIntegrityError>() {
            Some(integrity) => SyncError::Integrity(integrity.clone()),
            None => SyncError::Store(err),
        }
    }

    /// Wraps a client failure raised outside of any pair
    pub fn from_client(err: ClientError) -> Self {
        if err.aborts_cycle() {
            SyncError::Unauthorized(err.to_string())
        } else {
            SyncError::Scan(err)
        }
    }
}
