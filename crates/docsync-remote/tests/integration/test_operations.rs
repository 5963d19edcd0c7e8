//! Tests for the file system item operations

use docsync_core::domain::{ClientError, DigestAlgorithm};
use docsync_core::ports::IRemoteClient;
use serde_json::{json, Value};

use crate::common::{
    file_item, folder_item, mount_download, mount_operation, rref, setup_remote_mock, ROOT_ID,
};

const FILE_ID: &str = "defaultFileSystemItemFactory#default#uid-1";
const FOLDER_ID: &str = "defaultFileSystemItemFactory#default#uid-2";
const HELLO_MD5: &str = "8b1a9953c4611296a827abf8c47804d7";

// ----------------------------------------------------------------------------
// Reading
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_get_info_returns_item() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "GetFileSystemItem",
        json!({ "id": FILE_ID }),
        file_item(FILE_ID, ROOT_ID, "Hello.txt", "8B1A9953C4611296A827ABF8C47804D7"),
    )
    .await;

    let info = client.get_info(&rref(FILE_ID)).await.unwrap();
    assert_eq!(info.name, "Hello.txt");
    assert_eq!(info.parent_id.as_deref(), Some(ROOT_ID));
    assert!(!info.folderish);
    assert_eq!(info.digest.as_deref(), Some(HELLO_MD5));
    assert_eq!(info.digest_algorithm, Some(DigestAlgorithm::Md5));
    assert!(info.capabilities.can_update);
}

#[tokio::test]
async fn test_get_info_null_is_not_found() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(&server, "GetFileSystemItem", json!({ "id": "gone" }), Value::Null).await;

    let err = client.get_info(&rref("gone")).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
    assert!(client.try_get_info(&rref("gone")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_children_info() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "GetChildren",
        json!({ "id": ROOT_ID }),
        json!([
            folder_item(FOLDER_ID, Some(ROOT_ID), "Folder 1"),
            file_item(FILE_ID, ROOT_ID, "Hello.txt", HELLO_MD5),
        ]),
    )
    .await;

    let children = client.get_children_info(&rref(ROOT_ID)).await.unwrap();
    assert_eq!(children.len(), 2);
    assert!(children[0].folderish);
    assert_eq!(children[0].name, "Folder 1");
    assert_eq!(children[1].name, "Hello.txt");
}

#[tokio::test]
async fn test_get_content_downloads_blob() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "GetFileSystemItem",
        json!({ "id": FILE_ID }),
        file_item(FILE_ID, ROOT_ID, "Hello.txt", HELLO_MD5),
    )
    .await;
    mount_download(&server, FILE_ID, "Hello.txt", b"Hello").await;

    let content = client.get_content(&rref(FILE_ID)).await.unwrap();
    assert_eq!(content, b"Hello");
}

#[tokio::test]
async fn test_get_content_without_blob_is_not_found() {
    let (server, client) = setup_remote_mock().await;
    let mut item = file_item(FILE_ID, ROOT_ID, "empty.txt", HELLO_MD5);
    item["downloadURL"] = Value::Null;
    mount_operation(&server, "GetFileSystemItem", json!({ "id": FILE_ID }), item).await;

    let err = client.get_content(&rref(FILE_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn test_exists_rejects_empty_documents() {
    let (server, client) = setup_remote_mock().await;
    let mut empty = file_item(FILE_ID, ROOT_ID, "empty.txt", HELLO_MD5);
    empty["downloadURL"] = Value::Null;
    mount_operation(&server, "FileSystemItemExists", json!({ "id": FILE_ID }), json!(true)).await;
    mount_operation(&server, "GetFileSystemItem", json!({ "id": FILE_ID }), empty).await;
    mount_operation(&server, "FileSystemItemExists", json!({ "id": FOLDER_ID }), json!(true)).await;
    mount_operation(
        &server,
        "GetFileSystemItem",
        json!({ "id": FOLDER_ID }),
        folder_item(FOLDER_ID, Some(ROOT_ID), "Folder 1"),
    )
    .await;
    mount_operation(&server, "FileSystemItemExists", json!({ "id": "gone" }), json!(false)).await;

    assert!(!client.exists(&rref(FILE_ID)).await.unwrap());
    assert!(client.exists(&rref(FOLDER_ID)).await.unwrap());
    assert!(!client.exists(&rref("gone")).await.unwrap());
}

// ----------------------------------------------------------------------------
// Writing
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_make_folder() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "CreateFolder",
        json!({ "parentId": ROOT_ID, "name": "Folder 1" }),
        folder_item(FOLDER_ID, Some(ROOT_ID), "Folder 1"),
    )
    .await;

    let info = client.make_folder(&rref(ROOT_ID), "Folder 1").await.unwrap();
    assert_eq!(info.id, FOLDER_ID);
    assert!(info.folderish);
}

#[tokio::test]
async fn test_make_file_sends_base64_content() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "CreateFile",
        json!({ "parentId": ROOT_ID, "name": "Hello.txt", "content": "SGVsbG8=" }),
        file_item(FILE_ID, ROOT_ID, "Hello.txt", HELLO_MD5),
    )
    .await;

    let info = client
        .make_file(&rref(ROOT_ID), "Hello.txt", b"Hello")
        .await
        .unwrap();
    assert_eq!(info.id, FILE_ID);
    assert_eq!(info.digest.as_deref(), Some(HELLO_MD5));
}

#[tokio::test]
async fn test_update_content() {
    let (server, client) = setup_remote_mock().await;
    let updated_md5 = "5d41402abc4b2a76b9719d911017c592";
    mount_operation(
        &server,
        "UpdateFile",
        json!({ "id": FILE_ID, "content": "aGVsbG8=" }),
        file_item(FILE_ID, ROOT_ID, "Hello.txt", updated_md5),
    )
    .await;

    let info = client.update_content(&rref(FILE_ID), b"hello").await.unwrap();
    assert_eq!(info.digest.as_deref(), Some(updated_md5));
}

#[tokio::test]
async fn test_delete() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(&server, "Delete", json!({ "id": FILE_ID }), Value::Null).await;

    client.delete(&rref(FILE_ID)).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_rename_and_move() {
    let (server, client) = setup_remote_mock().await;
    mount_operation(
        &server,
        "Rename",
        json!({ "id": FILE_ID, "name": "Renamed.txt" }),
        file_item(FILE_ID, ROOT_ID, "Renamed.txt", HELLO_MD5),
    )
    .await;
    mount_operation(
        &server,
        "Move",
        json!({ "srcId": FILE_ID, "destId": FOLDER_ID }),
        file_item(FILE_ID, FOLDER_ID, "Renamed.txt", HELLO_MD5),
    )
    .await;

    let renamed = client.rename(&rref(FILE_ID), "Renamed.txt").await.unwrap();
    assert_eq!(renamed.name, "Renamed.txt");

    let moved = client
        .move_item(&rref(FILE_ID), &rref(FOLDER_ID))
        .await
        .unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(FOLDER_ID));
}
