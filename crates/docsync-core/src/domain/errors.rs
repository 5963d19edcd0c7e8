//! Domain error types
//!
//! This module defines the error taxonomy shared by every adapter:
//!
//! - [`DomainError`] - validation failures and invalid state transitions
//! - [`ClientError`] - failures reported by a local or remote client
//! - [`StoreIntegrityError`] - uniqueness violations raised by a state store
//!
//! A pair changed on both sides is a classified state (`conflicted`), not an
//! error, so there is no conflict variant here.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid local path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote reference
    #[error("Invalid remote reference: {0}")]
    InvalidRemoteRef(String),

    /// Unknown pair state name
    #[error("Unknown pair state: {0}")]
    UnknownState(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// ClientError
// ============================================================================

/// Errors surfaced by [`ILocalClient`](crate::ports::ILocalClient) and
/// [`IRemoteClient`](crate::ports::IRemoteClient) implementations
///
/// The synchronizer decides how to treat a failed apply from the variant
/// alone, so adapters must map their native errors carefully:
///
/// | Variant            | Retried | Effect on the pair / cycle              |
/// |--------------------|---------|-----------------------------------------|
/// | `NotFound`         | yes     | error recorded, next scan reclassifies  |
/// | `Unauthorized`     | no      | aborts the current cycle                |
/// | `TransientIo`      | yes     | error recorded, bounded attempts        |
/// | `CapabilityDenied` | no      | pair marked `unsynchronized` at once    |
/// | `InvalidName`      | yes     | error recorded, bounded attempts        |
/// | `Io` / `Remote`    | yes     | error recorded, bounded attempts        |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The addressed entity (local path or remote id) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network failure, timeout, throttling or a locked file
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// A capability probe returned false for the requested operation
    #[error("Operation '{operation}' not permitted on {target}")]
    CapabilityDenied {
        /// The refused operation (`rename`, `update`, `delete`, `create_child`)
        operation: String,
        /// The path or id the operation targeted
        target: String,
    },

    /// A name or path was rejected (traversal, empty component, ...)
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Non-transient local I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Non-transient remote failure (unexpected status, malformed payload)
    #[error("Remote error: {0}")]
    Remote(String),
}

impl ClientError {
    /// Builds a [`ClientError::CapabilityDenied`]
    pub fn denied(operation: impl Into<String>, target: impl Into<String>) -> Self {
        ClientError::CapabilityDenied {
            operation: operation.into(),
            target: target.into(),
        }
    }

    /// Returns true for the not-found variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Returns true if the failed operation may be attempted again next cycle
    pub fn is_retryable(&self) -> bool {
        !self.is_permanent() && !self.aborts_cycle()
    }

    /// Returns true if retrying can never succeed without outside action
    pub fn is_permanent(&self) -> bool {
        matches!(self, ClientError::CapabilityDenied { .. })
    }

    /// Returns true if the failure concerns every pair alike and the
    /// current cycle should stop instead of recording it on one pair
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => ClientError::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => ClientError::Io(err.to_string()),
            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                ClientError::TransientIo(err.to_string())
            }
            _ => ClientError::Io(err.to_string()),
        }
    }
}

// ============================================================================
// StoreIntegrityError
// ============================================================================

/// A state store refused a write because it would break a uniqueness rule
///
/// Stores return it wrapped in `anyhow::Error`; callers detect it with
/// `err.downcast_ref::<StoreIntegrityError>()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("State store integrity violation: {0}")]
pub struct StoreIntegrityError(pub String);
