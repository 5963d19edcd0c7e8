//! HTTP remote client
//!
//! [`HttpRemoteClient`] calls the `NuxeoDrive.*` automation operations of a
//! server. Every operation is a `POST {server}/site/automation/NuxeoDrive.<Op>`
//! with a `{"params": {...}}` body and the `X-Authentication-Token` header.
//! Content is fetched from the item's download URL.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docsync_core::domain::RemoteRef;
//! use docsync_core::ports::IRemoteClient;
//! use docsync_remote::client::HttpRemoteClient;
//!
//! # async fn example() -> Result<(), docsync_core::domain::ClientError> {
//! let client = HttpRemoteClient::with_base_url("http://localhost:8080/nuxeo", "token");
//! let root = RemoteRef::new("defaultSyncRootFolderItemFactory#default#ws".into()).unwrap();
//! for child in client.get_children_info(&root).await? {
//!     println!("{}", child.name);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use base64::Engine as _;
use docsync_core::domain::{ClientError, FileSystemInfo, RemoteRef};
use docsync_core::ports::IRemoteClient;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::items::RemoteItem;
use crate::RemoteError;

/// Header carrying the long-lived token
pub const TOKEN_HEADER: &str = "X-Authentication-Token";

/// Prefix of every synchronization operation
const OPERATION_PREFIX: &str = "site/automation/NuxeoDrive.";

// ============================================================================
// HttpRemoteClient
// ============================================================================

/// Remote client bound to one server, token and repository
pub struct HttpRemoteClient {
    /// The underlying HTTP client
    client: Client,
    /// Server URL without trailing slash
    base_url: String,
    token: String,
    repository: String,
}

impl HttpRemoteClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            repository: repository.into(),
        }
    }

    /// Creates a client with default HTTP settings (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(Client::new(), base_url, token, "default")
    }

    /// Builds an HTTP client bounded by a connect and a per-request timeout
    pub fn build_http_client(
        timeout: Duration,
        handshake_timeout: Duration,
    ) -> Result<Client, RemoteError> {
        Ok(Client::builder()
            .timeout(timeout)
            .connect_timeout(handshake_timeout)
            .user_agent(concat!("docsync/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}{}", self.base_url, OPERATION_PREFIX, operation)
    }

    /// Runs an operation and returns the successful response
    async fn execute(&self, operation: &str, params: Value) -> Result<Response, RemoteError> {
        debug!(operation, repository = %self.repository, "Executing operation");

        let response = self
            .client
            .post(self.operation_url(operation))
            .header(TOKEN_HEADER, &self.token)
            .json(&json!({ "params": params }))
            .send()
            .await?;
        check_status(response).await
    }

    /// Runs an operation and parses its JSON result
    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: Value,
    ) -> Result<T, RemoteError> {
        let body = self.execute(operation, params).await?.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| RemoteError::InvalidResponse(format!("{operation}: {e}")))
    }

    /// Fetches an item, `None` when the server answers `null`
    async fn get_item(&self, id: &RemoteRef) -> Result<Option<RemoteItem>, RemoteError> {
        let body = self
            .execute("GetFileSystemItem", json!({ "id": id.as_str() }))
            .await?
            .bytes()
            .await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map_err(|e| RemoteError::InvalidResponse(format!("GetFileSystemItem: {e}")))
    }

    async fn require_item(&self, id: &RemoteRef) -> Result<RemoteItem, ClientError> {
        self.get_item(id)
            .await?
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    /// Downloads the blob behind a server-relative download URL
    pub async fn download(&self, download_url: &str) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/{}", self.base_url, download_url.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;

        debug!(bytes = bytes.len(), "Downloaded content");
        Ok(bytes.to_vec())
    }
}

/// Turns an error status into a [`RemoteError`], keeping the body
pub(crate) async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(status, body))
}

fn encode(content: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(content)
}

// ============================================================================
// IRemoteClient implementation
// ============================================================================

#[async_trait::async_trait]
impl IRemoteClient for HttpRemoteClient {
    #[instrument(skip(self), fields(id = %id))]
    async fn get_info(&self, id: &RemoteRef) -> Result<FileSystemInfo, ClientError> {
        Ok(self.require_item(id).await?.into_info())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_content(&self, id: &RemoteRef) -> Result<Vec<u8>, ClientError> {
        let item = self.require_item(id).await?;
        if item.folder {
            return Err(ClientError::NotFound(format!("{id} is a folder")));
        }
        match item.download_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(self.download(url).await?),
            None => Err(ClientError::NotFound(format!("{id} has no content"))),
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_children_info(&self, id: &RemoteRef) -> Result<Vec<FileSystemInfo>, ClientError> {
        let children: Vec<RemoteItem> = self
            .execute_json("GetChildren", json!({ "id": id.as_str() }))
            .await?;
        debug!(count = children.len(), "Listed children");
        Ok(children.into_iter().map(RemoteItem::into_info).collect())
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn make_folder(
        &self,
        parent: &RemoteRef,
        name: &str,
    ) -> Result<FileSystemInfo, ClientError> {
        let item: RemoteItem = self
            .execute_json(
                "CreateFolder",
                json!({ "parentId": parent.as_str(), "name": name }),
            )
            .await?;
        Ok(item.into_info())
    }

    #[instrument(skip(self, content), fields(parent = %parent, bytes = content.len()))]
    async fn make_file(
        &self,
        parent: &RemoteRef,
        name: &str,
        content: &[u8],
    ) -> Result<FileSystemInfo, ClientError> {
        let item: RemoteItem = self
            .execute_json(
                "CreateFile",
                json!({
                    "parentId": parent.as_str(),
                    "name": name,
                    "content": encode(content),
                }),
            )
            .await?;
        Ok(item.into_info())
    }

    #[instrument(skip(self, content), fields(id = %id, bytes = content.len()))]
    async fn update_content(
        &self,
        id: &RemoteRef,
        content: &[u8],
    ) -> Result<FileSystemInfo, ClientError> {
        let item: RemoteItem = self
            .execute_json(
                "UpdateFile",
                json!({ "id": id.as_str(), "content": encode(content) }),
            )
            .await?;
        Ok(item.into_info())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &RemoteRef) -> Result<(), ClientError> {
        self.execute("Delete", json!({ "id": id.as_str() })).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn exists(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        let exists: bool = self
            .execute_json("FileSystemItemExists", json!({ "id": id.as_str() }))
            .await?;
        if !exists {
            return Ok(false);
        }
        Ok(self
            .get_item(id)
            .await?
            .is_some_and(|item| !item.is_empty_document()))
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn rename(&self, id: &RemoteRef, new_name: &str) -> Result<FileSystemInfo, ClientError> {
        let item: RemoteItem = self
            .execute_json("Rename", json!({ "id": id.as_str(), "name": new_name }))
            .await?;
        Ok(item.into_info())
    }

    #[instrument(skip(self), fields(id = %id, destination = %new_parent))]
    async fn move_item(
        &self,
        id: &RemoteRef,
        new_parent: &RemoteRef,
    ) -> Result<FileSystemInfo, ClientError> {
        let item: RemoteItem = self
            .execute_json(
                "Move",
                json!({ "srcId": id.as_str(), "destId": new_parent.as_str() }),
            )
            .await?;
        Ok(item.into_info())
    }
}
