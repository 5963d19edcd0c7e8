//! Local client port (driven/secondary port)
//!
//! This module defines the path-addressed interface over one bound local
//! root directory.
//!
//! ## Design Notes
//!
//! - Every path is a [`LocalPath`], relative to the root and `/`-separated
//!   on every host. Implementations must refuse anything that would resolve
//!   outside the root.
//! - Returns [`ClientError`] rather than `anyhow::Result`: the synchronizer
//!   picks retry or skip behavior from the variant.
//! - Names passed to the creating operations are sanitized and
//!   de-duplicated; the returned path is the one actually used.

use std::path::Path;

use crate::domain::{ClientError, DigestAlgorithm, FileSystemInfo, LocalPath};

/// Port trait for the local side of a binding
#[async_trait::async_trait]
pub trait ILocalClient: Send + Sync {
    /// Absolute host directory this client is scoped to
    fn base_folder(&self) -> &Path;

    /// Describes the entry at `path`
    ///
    /// # Errors
    /// [`ClientError::NotFound`] when the path does not exist.
    async fn get_info(&self, path: &LocalPath) -> Result<FileSystemInfo, ClientError>;

    /// Like [`get_info`](ILocalClient::get_info) but returns `None` for a
    /// missing path
    async fn try_get_info(&self, path: &LocalPath) -> Result<Option<FileSystemInfo>, ClientError> {
        match self.get_info(path).await {
            Ok(info) => Ok(Some(info)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads the full content of a file
    async fn get_content(&self, path: &LocalPath) -> Result<Vec<u8>, ClientError>;

    /// Replaces the content of an existing file atomically
    async fn update_content(&self, path: &LocalPath, content: &[u8]) -> Result<(), ClientError>;

    /// Deletes a file, or a folder with everything below it
    async fn delete(&self, path: &LocalPath) -> Result<(), ClientError>;

    /// Returns true if the path exists
    async fn exists(&self, path: &LocalPath) -> bool;

    /// Lists the visible children of a folder
    ///
    /// Ordered case-insensitively by name, ties broken by the raw name.
    /// Ignored names are skipped.
    async fn get_children_info(&self, path: &LocalPath) -> Result<Vec<FileSystemInfo>, ClientError>;

    /// Creates a folder below `parent` and returns its path
    async fn make_folder(&self, parent: &LocalPath, name: &str) -> Result<LocalPath, ClientError>;

    /// Creates a file below `parent` and returns its path
    ///
    /// `None` content creates an empty file.
    async fn make_file(
        &self,
        parent: &LocalPath,
        name: &str,
        content: Option<&[u8]>,
    ) -> Result<LocalPath, ClientError>;

    /// Renames an entry in place and returns its new path
    async fn rename(&self, path: &LocalPath, new_name: &str) -> Result<LocalPath, ClientError>;

    /// Moves an entry below `new_parent` and returns its new path
    async fn move_item(
        &self,
        path: &LocalPath,
        new_parent: &LocalPath,
    ) -> Result<LocalPath, ClientError>;

    /// Computes the hex digest of a file
    async fn get_digest(
        &self,
        path: &LocalPath,
        algorithm: DigestAlgorithm,
    ) -> Result<String, ClientError>;
}
