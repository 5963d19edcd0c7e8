//! docsync Remote - HTTP client for automation-style document servers
//!
//! Provides:
//! - [`HttpRemoteClient`], the [`IRemoteClient`] adapter over the
//!   `NuxeoDrive.*` automation operations
//! - [`HttpRemoteConnector`], which exchanges credentials for a token and
//!   builds clients for bound roots
//!
//! ## Modules
//!
//! - [`client`] - Request plumbing and the remote client adapter
//! - [`connector`] - Login, token acquisition and client construction
//! - [`items`] - Wire representation of file system items
//!
//! [`IRemoteClient`]: docsync_core::ports::IRemoteClient

pub mod client;
pub mod connector;
pub mod items;

pub use client::HttpRemoteClient;
pub use connector::HttpRemoteConnector;

use docsync_core::domain::ClientError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the server
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credentials are missing, invalid or expired (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The token is valid but the operation is refused (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The addressed item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server asked us to slow down (429)
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// A server-side error or request timeout (5xx, 408)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other unexpected status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The server URL is malformed
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Maps an error status and its body to the matching variant
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(body),
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(body),
            StatusCode::FORBIDDEN => RemoteError::Forbidden(body),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::TooManyRequests(body),
            StatusCode::REQUEST_TIMEOUT => RemoteError::ServerError(body),
            s if s.is_server_error() => RemoteError::ServerError(format!("{s}: {body}")),
            s => RemoteError::UnexpectedStatus {
                status: s.as_u16(),
                body,
            },
        }
    }
}

impl From<RemoteError> for ClientError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(m) => ClientError::NotFound(m),
            RemoteError::Unauthorized(m) | RemoteError::Forbidden(m) => {
                ClientError::Unauthorized(m)
            }
            RemoteError::TooManyRequests(m) | RemoteError::ServerError(m) => {
                ClientError::TransientIo(m)
            }
            RemoteError::NetworkError(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                ClientError::TransientIo(e.to_string())
            }
            other => ClientError::Remote(other.to_string()),
        }
    }
}
