//! Authentication and client construction
//!
//! ## Token flow
//!
//! 1. `POST {server}/site/automation/login` with basic credentials checks
//!    the password.
//! 2. `GET {server}/authentication/token` with basic credentials, the
//!    application name and this device's id returns a long-lived token as
//!    plain text.
//! 3. Every later call sends that token in `X-Authentication-Token`; the
//!    password is never stored.

use std::sync::Arc;
use std::time::Duration;

use docsync_core::config::RemoteConfig;
use docsync_core::domain::{ClientError, ServerBinding};
use docsync_core::ports::{IRemoteClient, IRemoteConnector};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::{check_status, HttpRemoteClient};
use crate::RemoteError;

/// Application name registered with each token
pub const APPLICATION_NAME: &str = "docsync";

/// Builds [`HttpRemoteClient`]s from stored server bindings
pub struct HttpRemoteConnector {
    timeout: Duration,
    handshake_timeout: Duration,
    device_id: String,
}

impl HttpRemoteConnector {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            device_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Overrides the generated device id
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn http_client(&self) -> Result<Client, RemoteError> {
        HttpRemoteClient::build_http_client(self.timeout, self.handshake_timeout)
    }

    /// Checks the credentials against the login endpoint
    async fn login(
        &self,
        client: &Client,
        server: &Url,
        username: &str,
        password: &str,
    ) -> Result<(), RemoteError> {
        let url = endpoint(server, "site/automation/login")?;
        let response = client
            .post(url)
            .basic_auth(username, Some(password))
            .send()
            .await?;
        check_status(response).await?;
        debug!("Login accepted");
        Ok(())
    }

    /// Requests a read-write token for this device
    async fn request_token(
        &self,
        client: &Client,
        server: &Url,
        username: &str,
        password: &str,
    ) -> Result<String, RemoteError> {
        let url = endpoint(server, "authentication/token")?;
        let response = client
            .get(url)
            .basic_auth(username, Some(password))
            .query(&[
                ("userName", username),
                ("applicationName", APPLICATION_NAME),
                ("deviceId", self.device_id.as_str()),
                ("permission", "ReadWrite"),
            ])
            .send()
            .await?;
        let token = check_status(response).await?.text().await?;
        let token = token.trim();
        if token.is_empty() {
            return Err(RemoteError::InvalidResponse("empty token".into()));
        }
        Ok(token.to_string())
    }
}

/// Parses a server URL, keeping a trailing slash so joins stay below it
fn parse_server_url(server_url: &str) -> Result<Url, RemoteError> {
    let mut url =
        Url::parse(server_url).map_err(|e| RemoteError::InvalidUrl(format!("{server_url}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(server: &Url, path: &str) -> Result<Url, RemoteError> {
    server
        .join(path)
        .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
}

#[async_trait::async_trait]
impl IRemoteConnector for HttpRemoteConnector {
    #[instrument(skip(self, password), fields(server = %server_url, user = %username))]
    async fn authenticate(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        let server = parse_server_url(server_url)?;
        let client = self.http_client()?;

        if let Err(e) = self.login(&client, &server, username, password).await {
            warn!(error = %e, "Login failed");
            return Err(e.into());
        }
        let token = self
            .request_token(&client, &server, username, password)
            .await?;

        info!(device_id = %self.device_id, "Token acquired");
        Ok(token)
    }

    fn connect(
        &self,
        binding: &ServerBinding,
        repository: &str,
    ) -> Result<Arc<dyn IRemoteClient>, ClientError> {
        parse_server_url(&binding.server_url)?;
        let client = HttpRemoteClient::new(
            self.http_client()?,
            binding.server_url.as_str(),
            binding.token.as_str(),
            repository,
        );
        Ok(Arc::new(client))
    }
}
