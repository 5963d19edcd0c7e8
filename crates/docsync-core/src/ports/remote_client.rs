//! Remote client port (driven/secondary port)
//!
//! This module defines the id-addressed interface over a remote content
//! repository, plus the connector that authenticates and hands out clients.
//!
//! ## Design Notes
//!
//! - Ids are [`RemoteRef`] values; callers never look inside them.
//! - Mutating operations return the fresh [`FileSystemInfo`] of the item so
//!   the synchronizer can record the new snapshot without another round trip.
//! - The capability probes have default implementations reading
//!   [`FileSystemInfo::capabilities`]; adapters with a cheaper probe may
//!   override them.

use std::sync::Arc;

use crate::domain::{ClientError, FileSystemInfo, RemoteRef, ServerBinding};

// ============================================================================
// IRemoteClient trait
// ============================================================================

/// Port trait for the remote side of a binding
#[async_trait::async_trait]
pub trait IRemoteClient: Send + Sync {
    /// Describes the item with the given id
    ///
    /// # Errors
    /// [`ClientError::NotFound`] when the id does not resolve.
    async fn get_info(&self, id: &RemoteRef) -> Result<FileSystemInfo, ClientError>;

    /// Like [`get_info`](IRemoteClient::get_info) but returns `None` for a
    /// missing id
    async fn try_get_info(&self, id: &RemoteRef) -> Result<Option<FileSystemInfo>, ClientError> {
        match self.get_info(id).await {
            Ok(info) => Ok(Some(info)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Downloads the content of a file
    ///
    /// # Errors
    /// [`ClientError::NotFound`] when the item is missing or has no blob.
    async fn get_content(&self, id: &RemoteRef) -> Result<Vec<u8>, ClientError>;

    /// Lists the children of a folder, in server order
    async fn get_children_info(&self, id: &RemoteRef) -> Result<Vec<FileSystemInfo>, ClientError>;

    /// Creates a folder below `parent`
    async fn make_folder(&self, parent: &RemoteRef, name: &str)
        -> Result<FileSystemInfo, ClientError>;

    /// Creates a file below `parent` with the given content
    async fn make_file(
        &self,
        parent: &RemoteRef,
        name: &str,
        content: &[u8],
    ) -> Result<FileSystemInfo, ClientError>;

    /// Replaces the content of a file
    async fn update_content(&self, id: &RemoteRef, content: &[u8])
        -> Result<FileSystemInfo, ClientError>;

    /// Deletes an item (folders recursively)
    async fn delete(&self, id: &RemoteRef) -> Result<(), ClientError>;

    /// Returns false when the id is missing or is a file without content
    async fn exists(&self, id: &RemoteRef) -> Result<bool, ClientError>;

    /// Renames an item in place
    async fn rename(&self, id: &RemoteRef, new_name: &str) -> Result<FileSystemInfo, ClientError>;

    /// Moves an item below `new_parent`
    async fn move_item(
        &self,
        id: &RemoteRef,
        new_parent: &RemoteRef,
    ) -> Result<FileSystemInfo, ClientError>;

    // --- Capability probes ---

    async fn can_rename(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        Ok(self.get_info(id).await?.capabilities.can_rename)
    }

    async fn can_update(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        Ok(self.get_info(id).await?.capabilities.can_update)
    }

    async fn can_delete(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        Ok(self.get_info(id).await?.capabilities.can_delete)
    }

    async fn can_create_child(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        Ok(self.get_info(id).await?.capabilities.can_create_child)
    }
}

// ============================================================================
// IRemoteConnector trait
// ============================================================================

/// Authenticates against a server and builds clients for bound roots
#[async_trait::async_trait]
pub trait IRemoteConnector: Send + Sync {
    /// Exchanges credentials for a long-lived token
    ///
    /// # Errors
    /// [`ClientError::Unauthorized`] when the credentials are rejected.
    async fn authenticate(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ClientError>;

    /// Builds a client for `repository` using the token stored in `binding`
    fn connect(
        &self,
        binding: &ServerBinding,
        repository: &str,
    ) -> Result<Arc<dyn IRemoteClient>, ClientError>;
}
