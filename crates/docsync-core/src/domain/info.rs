//! Backend-independent item description
//!
//! Both the local and the remote client describe what they see with
//! [`FileSystemInfo`]. The synchronizer only ever compares these values, so
//! everything a classification rule needs must be carried here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::DigestAlgorithm;

/// Operations an item allows on its own backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_rename: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_create_child: bool,
}

impl Capabilities {
    /// Every operation permitted (local items)
    pub fn all() -> Self {
        Self {
            can_rename: true,
            can_update: true,
            can_delete: true,
            can_create_child: true,
        }
    }

    /// No operation permitted
    pub fn none() -> Self {
        Self {
            can_rename: false,
            can_update: false,
            can_delete: false,
            can_create_child: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Snapshot of one file or folder as reported by a client
///
/// For local items `id` equals `path` (the root-relative path). For remote
/// items `id` is the opaque reference and `path` the download locator, which
/// may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub path: Option<String>,
    pub folderish: bool,
    /// Hex digest, `None` when unknown or for folders
    pub digest: Option<String>,
    pub digest_algorithm: Option<DigestAlgorithm>,
    pub last_modified: DateTime<Utc>,
    pub capabilities: Capabilities,
    /// Stable local identity surviving renames (inode number)
    pub marker: Option<String>,
}

impl FileSystemInfo {
    /// Creates a folder description
    pub fn folder(id: impl Into<String>, parent_id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id,
            name: name.into(),
            path: None,
            folderish: true,
            digest: None,
            digest_algorithm: None,
            last_modified: Utc::now(),
            capabilities: Capabilities::all(),
            marker: None,
        }
    }

    /// Creates a file description with a known digest
    pub fn file(
        id: impl Into<String>,
        parent_id: Option<String>,
        name: impl Into<String>,
        digest: Option<String>,
        digest_algorithm: Option<DigestAlgorithm>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            name: name.into(),
            path: None,
            folderish: false,
            digest,
            digest_algorithm,
            last_modified: Utc::now(),
            capabilities: Capabilities::all(),
            marker: None,
        }
    }

    /// Sets the path or download locator
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the capability flags
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the local marker
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Sets the modification time
    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }

    /// Returns the digest only when it was computed with `algorithm`
    ///
    /// Folders and unknown digests yield `None`, which never matches.
    pub fn digest_for(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        if self.folderish {
            return None;
        }
        match (&self.digest, self.digest_algorithm) {
            (Some(digest), Some(algo)) if algo == algorithm => Some(digest.as_str()),
            _ => None,
        }
    }
}
