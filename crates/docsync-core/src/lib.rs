//! docsync Core - Domain model and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncPair`, `PairState`, `FileSystemInfo`, server and root bindings
//! - **Port definitions** - Traits for adapters: `ILocalClient`, `IRemoteClient`,
//!   `IRemoteConnector`, `IStateStore`
//! - **Configuration** - YAML-backed settings for the synchronizer, remote calls and logging
//!
//! # Architecture
//!
//! The domain module contains pure data types and state rules with no I/O.
//! Ports define the trait interfaces that adapter crates implement: the
//! filesystem client lives in `docsync-sync`, the HTTP remote client in
//! `docsync-remote` and the SQLite store in `docsync-cache`.

pub mod config;
pub mod domain;
pub mod ports;
