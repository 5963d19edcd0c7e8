//! Server and root bindings
//!
//! A [`ServerBinding`] ties a local folder to one server account. Each
//! [`RootBinding`] below it maps a remote folder to a local directory that
//! the synchronizer keeps in sync.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteRef;

/// Link between a local folder and a server account
///
/// Only the token obtained at bind time is kept, never the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBinding {
    /// Absolute local folder, the primary key
    pub local_folder: PathBuf,
    pub server_url: String,
    pub username: String,
    pub token: String,
    pub bound_at: DateTime<Utc>,
}

impl ServerBinding {
    pub fn new(
        local_folder: PathBuf,
        server_url: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            local_folder,
            server_url: server_url.into(),
            username: username.into(),
            token: token.into(),
            bound_at: Utc::now(),
        }
    }
}

/// A synchronized remote folder and its local directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootBinding {
    /// Absolute local directory, the primary key
    pub local_root: PathBuf,
    /// The owning server binding
    pub local_folder: PathBuf,
    pub remote_root: RemoteRef,
    pub remote_repository: String,
    pub bound_at: DateTime<Utc>,
}

impl RootBinding {
    pub fn new(
        local_root: PathBuf,
        local_folder: PathBuf,
        remote_root: RemoteRef,
        remote_repository: impl Into<String>,
    ) -> Self {
        Self {
            local_root,
            local_folder,
            remote_root,
            remote_repository: remote_repository.into(),
            bound_at: Utc::now(),
        }
    }
}
