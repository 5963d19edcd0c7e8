//! Tests for HTTP status handling

use docsync_core::domain::ClientError;
use docsync_core::ports::IRemoteClient;
use docsync_remote::client::TOKEN_HEADER;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_failure, rref, setup_remote_mock, ROOT_ID, TOKEN};

#[tokio::test]
async fn test_unauthorized_maps_to_unauthorized() {
    let (server, client) = setup_remote_mock().await;
    mount_failure(&server, "GetChildren", 401).await;

    let err = client.get_children_info(&rref(ROOT_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
}

#[tokio::test]
async fn test_forbidden_maps_to_unauthorized() {
    let (server, client) = setup_remote_mock().await;
    mount_failure(&server, "Delete", 403).await;

    let err = client.delete(&rref(ROOT_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    let (server, client) = setup_remote_mock().await;
    mount_failure(&server, "GetChildren", 503).await;
    mount_failure(&server, "CreateFolder", 429).await;

    let err = client.get_children_info(&rref(ROOT_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::TransientIo(_)));
    assert!(err.is_retryable());

    let err = client.make_folder(&rref(ROOT_ID), "x").await.unwrap_err();
    assert!(matches!(err, ClientError::TransientIo(_)));
}

#[tokio::test]
async fn test_malformed_body_is_remote_error() {
    let (server, client) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/site/automation/NuxeoDrive.GetChildren"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.get_children_info(&rref(ROOT_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote(_)));
}

#[tokio::test]
async fn test_token_header_is_sent() {
    let (server, client) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/site/automation/NuxeoDrive.GetChildren"))
        .and(header(TOKEN_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let children = client.get_children_info(&rref(ROOT_ID)).await.unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let client = docsync_remote::HttpRemoteClient::with_base_url("http://127.0.0.1:9", TOKEN);
    let err = client.get_children_info(&rref(ROOT_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::TransientIo(_)));
}
