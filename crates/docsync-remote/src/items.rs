//! Wire representation of file system items
//!
//! Every `NuxeoDrive.*` operation that returns an item uses the same JSON
//! shape. [`RemoteItem::into_info`] turns it into the backend-independent
//! [`FileSystemInfo`].

use chrono::{TimeZone, Utc};
use docsync_core::domain::{Capabilities, DigestAlgorithm, FileSystemInfo};
use serde::Deserialize;
use tracing::debug;

/// One file system item as returned by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    /// Opaque id, `<factory>#<repository>#<uid>` or similar
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub folder: bool,
    pub digest: Option<String>,
    pub digest_algorithm: Option<String>,
    /// Server-relative download locator, absent for folders and empty documents
    #[serde(rename = "downloadURL")]
    pub download_url: Option<String>,
    /// Epoch milliseconds
    pub last_modification_date: Option<i64>,
    #[serde(default)]
    pub can_rename: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_update: bool,
    #[serde(default)]
    pub can_create_child: bool,
}

impl RemoteItem {
    /// True for a file that has no downloadable content
    pub fn is_empty_document(&self) -> bool {
        !self.folder && self.download_url.as_deref().map_or(true, str::is_empty)
    }

    pub fn into_info(self) -> FileSystemInfo {
        let capabilities = Capabilities {
            can_rename: self.can_rename,
            can_update: self.can_update,
            can_delete: self.can_delete,
            can_create_child: self.can_create_child,
        };
        let modified = self
            .last_modification_date
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        let mut info = if self.folder {
            FileSystemInfo::folder(self.id, self.parent_id, self.name)
        } else {
            // An algorithm we cannot compute leaves the digest unknown
            let algorithm = self
                .digest_algorithm
                .as_deref()
                .and_then(|a| a.parse::<DigestAlgorithm>().ok());
            let digest = match algorithm {
                Some(_) => self.digest.map(|d| d.to_lowercase()),
                None => {
                    if self.digest.is_some() {
                        debug!(id = %self.id, algorithm = ?self.digest_algorithm, "Unsupported digest algorithm");
                    }
                    None
                }
            };
            FileSystemInfo::file(self.id, self.parent_id, self.name, digest, algorithm)
        };

        info = info
            .with_capabilities(capabilities)
            .with_last_modified(modified);
        if let Some(url) = self.download_url.filter(|u| !u.is_empty()) {
            info = info.with_path(url);
        }
        info
    }
}
