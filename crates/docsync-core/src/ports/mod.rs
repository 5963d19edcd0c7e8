//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the synchronizer
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalClient`] - Path-addressed operations on a bound local root
//! - [`IRemoteClient`] - Id-addressed operations on the remote repository
//! - [`IRemoteConnector`] - Authentication and remote client construction
//! - [`IStateStore`] - Persistent storage for bindings and sync pairs

pub mod local_client;
pub mod remote_client;
pub mod state_store;

pub use local_client::ILocalClient;
pub use remote_client::{IRemoteClient, IRemoteConnector};
pub use state_store::{IStateStore, PairFilter};
