//! Domain entities and business logic
//!
//! This module contains the core domain types for docsync:
//! - Newtypes for type-safe identifiers and validated paths
//! - Backend-independent item descriptions
//! - Sync pairs and their state machine
//! - Server and root bindings
//! - Domain-specific error types

pub mod binding;
pub mod errors;
pub mod info;
pub mod newtypes;
pub mod pair;

// Re-export commonly used types
pub use binding::{RootBinding, ServerBinding};
pub use errors::{ClientError, DomainError, StoreIntegrityError};
pub use info::{Capabilities, FileSystemInfo};
pub use newtypes::*;
pub use pair::{PairState, SyncPair};
