//! Tests for token acquisition and client construction

use std::path::PathBuf;

use docsync_core::config::RemoteConfig;
use docsync_core::domain::{ClientError, ServerBinding};
use docsync_core::ports::{IRemoteClient, IRemoteConnector};
use docsync_remote::client::TOKEN_HEADER;
use docsync_remote::HttpRemoteConnector;
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{rref, ROOT_ID};

fn connector() -> HttpRemoteConnector {
    HttpRemoteConnector::new(&RemoteConfig::default()).with_device_id("device-1")
}

async fn mount_login(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/nuxeo/site/automation/login"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/nuxeo/authentication/token"))
        .and(header_exists("Authorization"))
        .and(query_param("userName", "Administrator"))
        .and(query_param("applicationName", "docsync"))
        .and(query_param("deviceId", "device-1"))
        .and(query_param("permission", "ReadWrite"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authenticate_returns_token() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    mount_token(&server, "a1b2c3\n").await;

    let token = connector()
        .authenticate(&format!("{}/nuxeo", server.uri()), "Administrator", "secret")
        .await
        .unwrap();
    assert_eq!(token, "a1b2c3");
}

#[tokio::test]
async fn test_authenticate_rejected_credentials() {
    let server = MockServer::start().await;
    mount_login(&server, 401).await;
    mount_token(&server, "never").await;

    let err = connector()
        .authenticate(&format!("{}/nuxeo", server.uri()), "Administrator", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));

    // No token is requested once login fails
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_authenticate_empty_token_is_rejected() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    mount_token(&server, "  ").await;

    let err = connector()
        .authenticate(&format!("{}/nuxeo/", server.uri()), "Administrator", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Remote(_)));
}

#[tokio::test]
async fn test_authenticate_invalid_url() {
    let err = connector()
        .authenticate("localhost without scheme", "Administrator", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Remote(_)));
}

#[tokio::test]
async fn test_connect_uses_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/nuxeo/site/automation/NuxeoDrive.GetChildren"))
        .and(header(TOKEN_HEADER, "stored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let binding = ServerBinding::new(
        PathBuf::from("/tmp/Nuxeo Drive"),
        format!("{}/nuxeo", server.uri()),
        "Administrator".to_string(),
        "stored-token".to_string(),
    );
    let client = connector().connect(&binding, "default").unwrap();
    assert!(client
        .get_children_info(&rref(ROOT_ID))
        .await
        .unwrap()
        .is_empty());
}
