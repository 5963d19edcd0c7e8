//! Shared wiremock helpers for remote client tests

use docsync_core::domain::RemoteRef;
use docsync_remote::client::{HttpRemoteClient, TOKEN_HEADER};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";
pub const ROOT_ID: &str = "defaultSyncRootFolderItemFactory#default#ws";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_remote_mock() -> (MockServer, HttpRemoteClient) {
    let server = MockServer::start().await;
    let client = HttpRemoteClient::with_base_url(server.uri(), TOKEN);
    (server, client)
}

pub fn rref(id: &str) -> RemoteRef {
    RemoteRef::new(id.to_string()).unwrap()
}

/// JSON for a file item
pub fn file_item(id: &str, parent: &str, name: &str, digest: &str) -> Value {
    json!({
        "id": id,
        "parentId": parent,
        "name": name,
        "folder": false,
        "digest": digest,
        "digestAlgorithm": "md5",
        "downloadURL": format!("nxfile/default/{id}/blobholder:0/{name}"),
        "lastModificationDate": 1_700_000_000_000_i64,
        "canRename": true,
        "canDelete": true,
        "canUpdate": true,
        "canCreateChild": false
    })
}

/// JSON for a folder item
pub fn folder_item(id: &str, parent: Option<&str>, name: &str) -> Value {
    json!({
        "id": id,
        "parentId": parent,
        "name": name,
        "folder": true,
        "canRename": true,
        "canDelete": true,
        "canUpdate": false,
        "canCreateChild": true
    })
}

/// Mounts an operation that answers `response` when its params contain `params`
pub async fn mount_operation(server: &MockServer, operation: &str, params: Value, response: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/site/automation/NuxeoDrive.{operation}")))
        .and(header(TOKEN_HEADER, TOKEN))
        .and(body_partial_json(json!({ "params": params })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

/// Mounts an operation that fails with `status`
pub async fn mount_failure(server: &MockServer, operation: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("/site/automation/NuxeoDrive.{operation}")))
        .respond_with(ResponseTemplate::new(status).set_body_string("failure"))
        .mount(server)
        .await;
}

/// Mounts a blob download
pub async fn mount_download(server: &MockServer, id: &str, name: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/nxfile/default/{id}/blobholder:0/{name}")))
        .and(header(TOKEN_HEADER, TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}
