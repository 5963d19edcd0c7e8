//! End-to-end cycles over a temporary directory and an in-memory remote

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{md5_hex, EditingLocal, Harness, ROOT_ID};
use docsync_core::domain::{Capabilities, ClientError, PairState};
use docsync_sync::{CycleOutcome, SyncError, SyncSettings};

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_local_creations_reach_remote() {
    let h = Harness::new().await;
    h.write("Docs/a.txt", b"alpha");
    h.write("b.txt", b"bravo");

    let report = h.cycle().await;
    assert_eq!(report.created_pairs, 3);
    assert_eq!(report.applied, 3);
    assert_eq!(report.failed, 0);

    assert_eq!(h.remote.child_names(ROOT_ID), vec!["Docs", "b.txt"]);
    let docs = h.remote.find(ROOT_ID, "Docs").unwrap();
    let a = h.remote.find(&docs, "a.txt").unwrap();
    assert_eq!(h.remote.content_of(&a).unwrap(), b"alpha");

    let pair = h.pair_at("/Docs/a.txt").await.unwrap();
    assert!(pair.is_fully_synchronized());
    assert_eq!(pair.local_digest.as_deref(), Some(md5_hex(b"alpha").as_str()));
}

#[tokio::test]
async fn test_remote_creations_reach_local() {
    let h = Harness::new().await;
    let reports = h.remote.add_folder(ROOT_ID, "Reports");
    h.remote.add_file(&reports, "q1.txt", b"quarter one");
    h.remote.add_file(ROOT_ID, "readme.md", b"# hello");

    let report = h.cycle().await;
    assert_eq!(report.applied, 3);

    assert_eq!(h.read("Reports/q1.txt"), b"quarter one");
    assert_eq!(h.read("readme.md"), b"# hello");
    let pair = h.pair_for(&reports).await.unwrap();
    assert_eq!(pair.local_path.unwrap().as_str(), "/Reports");
    assert_eq!(pair.pair_state, PairState::Synchronized);
}

#[tokio::test]
async fn test_second_cycle_is_idle() {
    let h = Harness::new().await;
    h.write("Docs/a.txt", b"alpha");
    h.remote.add_file(ROOT_ID, "remote.txt", b"from server");
    h.cycle().await;
    let writes = h.remote.writes();

    let report = h.cycle().await;
    assert!(report.is_idle(), "unexpected work: {report:?}");
    assert_eq!(h.remote.writes(), writes);
}

#[tokio::test]
async fn test_modifications_flow_both_ways() {
    let h = Harness::new().await;
    h.write("local.txt", b"v1");
    let remote_id = h.remote.add_file(ROOT_ID, "remote.txt", b"r1");
    h.cycle().await;

    h.write("local.txt", b"v2");
    h.remote.set_content(&remote_id, b"r2");
    let report = h.cycle().await;
    assert_eq!(report.applied, 2);

    let local_id = h.remote.find(ROOT_ID, "local.txt").unwrap();
    assert_eq!(h.remote.content_of(&local_id).unwrap(), b"v2");
    assert_eq!(h.read("remote.txt"), b"r2");
    assert!(h.cycle().await.is_idle());
}

#[tokio::test]
async fn test_missing_remote_digest_is_computed() {
    let h = Harness::new().await;
    h.remote.omit_digests();
    let id = h.remote.add_file(ROOT_ID, "nodigest.bin", b"payload");

    h.cycle().await;
    let pair = h.pair_for(&id).await.unwrap();
    assert_eq!(pair.remote_digest.as_deref(), Some(md5_hex(b"payload").as_str()));
    assert!(pair.is_fully_synchronized());
    assert!(h.cycle().await.is_idle());
}

// ============================================================================
// Names
// ============================================================================

#[tokio::test]
async fn test_remote_name_collisions_are_suffixed() {
    let h = Harness::new().await;
    h.remote.add_folder(ROOT_ID, "Title");
    h.remote.add_folder(ROOT_ID, "Title");
    h.remote.add_folder(ROOT_ID, "Title");

    h.cycle().await;
    assert!(h.path("Title").is_dir());
    assert!(h.path("Title__1").is_dir());
    assert!(h.path("Title__2").is_dir());
    assert!(h.cycle().await.is_idle());
}

#[tokio::test]
async fn test_same_named_entries_are_paired() {
    let h = Harness::new().await;
    h.write("same.txt", b"identical");
    h.write("other.txt", b"local version");
    h.remote.add_file(ROOT_ID, "same.txt", b"identical");
    h.remote.add_file(ROOT_ID, "other.txt", b"remote version");

    let report = h.cycle().await;
    assert_eq!(report.created_pairs, 2);
    assert_eq!(h.remote.writes(), 0);
    assert_eq!(
        h.pair_at("/same.txt").await.unwrap().pair_state,
        PairState::Synchronized
    );
    assert_eq!(
        h.pair_at("/other.txt").await.unwrap().pair_state,
        PairState::Conflicted
    );
}

#[tokio::test]
async fn test_unsafe_remote_names_are_sanitized() {
    let h = Harness::new().await;
    h.remote.add_file(ROOT_ID, "a/b\\c.doc", b"doc");

    h.cycle().await;
    assert_eq!(h.read("a-b-c.doc"), b"doc");
    assert!(h.cycle().await.is_idle());
}

#[tokio::test]
async fn test_remote_entries_with_ignored_names_are_not_tracked() {
    let h = Harness::new().await;
    h.remote.add_file(ROOT_ID, ".hidden", b"x");
    h.remote.add_file(ROOT_ID, "draft.swp", b"x");

    let report = h.cycle().await;
    assert_eq!(report.created_pairs, 0);
    assert!(!h.path(".hidden").exists());
}

// ============================================================================
// Conflicts
// ============================================================================

#[tokio::test]
async fn test_concurrent_edits_conflict_then_converge() {
    let h = Harness::new().await;
    h.write("notes.txt", b"base");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "notes.txt").unwrap();

    h.write("notes.txt", b"mine");
    h.remote.set_content(&id, b"theirs");
    let report = h.cycle().await;
    assert_eq!(report.conflicted, 1);
    assert_eq!(report.operations(), 0);

    let pair = h.pair_at("/notes.txt").await.unwrap();
    assert_eq!(pair.pair_state, PairState::Conflicted);
    assert_eq!(pair.local_digest.as_deref(), Some(md5_hex(b"base").as_str()));
    assert_eq!(pair.remote_digest.as_deref(), Some(md5_hex(b"base").as_str()));
    assert_eq!(h.read("notes.txt"), b"mine");
    assert_eq!(h.remote.content_of(&id).unwrap(), b"theirs");

    // Resolved by hand
    h.write("notes.txt", b"theirs");
    h.cycle().await;
    let pair = h.pair_at("/notes.txt").await.unwrap();
    assert!(pair.is_fully_synchronized());
}

#[tokio::test]
async fn test_identical_edits_converge() {
    let h = Harness::new().await;
    h.write("notes.txt", b"base");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "notes.txt").unwrap();

    h.write("notes.txt", b"same");
    h.remote.set_content(&id, b"same");
    let report = h.cycle().await;
    assert_eq!(report.operations(), 0);
    assert!(h.pair_at("/notes.txt").await.unwrap().is_fully_synchronized());
}

// ============================================================================
// Moves
// ============================================================================

#[tokio::test]
async fn test_local_move_is_detected_by_marker() {
    let h = Harness::new().await;
    h.write("a.txt", b"moving");
    h.mkdir("Dest");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "a.txt").unwrap();
    let dest = h.remote.find(ROOT_ID, "Dest").unwrap();

    std::fs::rename(h.path("a.txt"), h.path("Dest/a.txt")).unwrap();
    let report = h.cycle().await;
    assert_eq!(report.created_pairs, 0);
    assert_eq!(report.applied, 1);

    assert_eq!(h.remote.find(&dest, "a.txt"), Some(id.clone()));
    assert!(h.pair_at("/a.txt").await.is_none());
    let pair = h.pair_at("/Dest/a.txt").await.unwrap();
    assert_eq!(pair.remote_ref.unwrap().as_str(), id);
    assert!(h.cycle().await.is_idle());
}

#[tokio::test]
async fn test_local_folder_rename_carries_its_content() {
    let h = Harness::new().await;
    h.write("Docs/x.txt", b"inside");
    h.cycle().await;
    let docs = h.remote.find(ROOT_ID, "Docs").unwrap();

    std::fs::rename(h.path("Docs"), h.path("Archive")).unwrap();
    let report = h.cycle().await;
    assert_eq!(report.created_pairs, 0);
    assert_eq!(report.applied, 1);

    assert_eq!(h.remote.child_names(ROOT_ID), vec!["Archive"]);
    assert_eq!(h.remote.find(ROOT_ID, "Archive"), Some(docs));
    let child = h.pair_at("/Archive/x.txt").await.unwrap();
    assert_eq!(child.pair_state, PairState::Synchronized);
    assert!(h.cycle().await.is_idle());
}

#[tokio::test]
async fn test_remote_rename_and_move_apply_locally() {
    let h = Harness::new().await;
    let sub = h.remote.add_folder(ROOT_ID, "Sub");
    let id = h.remote.add_file(ROOT_ID, "old.txt", b"content");
    h.cycle().await;

    h.remote.rename_node(&id, "new.txt");
    h.remote.move_node(&id, &sub);
    h.cycle().await;

    assert!(!h.path("old.txt").exists());
    assert_eq!(h.read("Sub/new.txt"), b"content");
    let pair = h.pair_for(&id).await.unwrap();
    assert_eq!(pair.local_path.unwrap().as_str(), "/Sub/new.txt");
    assert_eq!(pair.pair_state, PairState::Synchronized);
}

// ============================================================================
// Deletions
// ============================================================================

#[tokio::test]
async fn test_local_deletion_waits_for_debounce() {
    let h = Harness::new().await;
    h.write("gone.txt", b"bye");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "gone.txt").unwrap();

    std::fs::remove_file(h.path("gone.txt")).unwrap();
    h.cycle().await;
    assert!(h.remote.contains(&id));
    assert_eq!(h.pair_at("/gone.txt").await.unwrap().local_missing_cycles, 1);

    h.cycle().await;
    assert!(!h.remote.contains(&id));
    assert!(h.pair_at("/gone.txt").await.is_none());
}

#[tokio::test]
async fn test_remote_folder_deletion_removes_local_tree() {
    let h = Harness::new().await;
    let folder = h.remote.add_folder(ROOT_ID, "Old");
    h.remote.add_file(&folder, "f.txt", b"x");
    h.cycle().await;
    assert!(h.path("Old/f.txt").exists());

    h.remote.remove_node(&folder);
    h.cycle().await;
    h.cycle().await;
    assert!(!h.path("Old").exists());
    assert!(h.pair_at("/Old/f.txt").await.is_none());
}

#[tokio::test]
async fn test_deleted_locally_but_modified_remotely_is_recreated() {
    let h = Harness::new().await;
    let id = h.remote.add_file(ROOT_ID, "keep.txt", b"v1");
    h.cycle().await;

    std::fs::remove_file(h.path("keep.txt")).unwrap();
    h.remote.set_content(&id, b"v2");
    h.cycle().await;
    h.cycle().await;

    assert_eq!(h.read("keep.txt"), b"v2");
    assert!(h.remote.contains(&id));
}

#[tokio::test]
async fn test_deleted_folder_with_remote_changes_is_restored() {
    let h = Harness::new().await;
    let folder = h.remote.add_folder(ROOT_ID, "Shared");
    let file = h.remote.add_file(&folder, "f.txt", b"v1");
    h.cycle().await;

    std::fs::remove_dir_all(h.path("Shared")).unwrap();
    h.remote.set_content(&file, b"v2");
    h.settle(6).await;

    assert!(h.remote.contains(&folder));
    assert_eq!(h.read("Shared/f.txt"), b"v2");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failures_are_retried_then_abandoned() {
    let h = Harness::new().await;
    h.write("flaky.txt", b"x");
    h.remote.fail("make_file", ClientError::TransientIo("timeout".into()), 10);

    for expected in 1..=3u32 {
        let report = h.cycle().await;
        assert_eq!(report.failed, 1);
        let pair = h.pair_at("/flaky.txt").await.unwrap();
        assert_eq!(pair.error_count, expected);
    }
    let pair = h.pair_at("/flaky.txt").await.unwrap();
    assert_eq!(pair.pair_state, PairState::Unsynchronized);
    assert!(pair.last_error.unwrap().contains("timeout"));

    let report = h.cycle().await;
    assert_eq!(report.operations(), 0);
    assert_eq!(report.unsynchronized, 1);
}

#[tokio::test]
async fn test_capability_denied_skips_pair() {
    let h = Harness::new().await;
    h.write("locked.txt", b"v1");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "locked.txt").unwrap();
    h.remote.set_capabilities(&id, Capabilities::none());

    h.write("locked.txt", b"v2");
    let report = h.cycle().await;
    assert_eq!(report.failed, 1);

    let pair = h.pair_at("/locked.txt").await.unwrap();
    assert_eq!(pair.pair_state, PairState::Unsynchronized);
    assert_eq!(h.remote.content_of(&id).unwrap(), b"v1");
}

#[tokio::test]
async fn test_unauthorized_aborts_cycle() {
    let h = Harness::new().await;
    h.write("a.txt", b"x");
    h.remote.fail("make_file", ClientError::Unauthorized("expired".into()), 1);

    let err = h.try_cycle(None).await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    let pair = h.pair_at("/a.txt").await.unwrap();
    assert_eq!(pair.error_count, 0);
}

#[tokio::test]
async fn test_failed_scan_classifies_nothing() {
    let h = Harness::new().await;
    h.remote.add_file(ROOT_ID, "kept.txt", b"x");
    h.cycle().await;

    h.remote.fail("get_children", ClientError::TransientIo("reset".into()), 1);
    let err = h.try_cycle(None).await.unwrap_err();
    assert!(matches!(err, SyncError::Scan(_)));
    assert!(h.states().await.iter().all(|s| *s == PairState::Synchronized));
}

#[tokio::test]
async fn test_stop_on_error_reraises() {
    let settings = SyncSettings {
        stop_on_error: true,
        ..SyncSettings::default()
    };
    let h = Harness::with_settings(settings).await;
    h.write("a.txt", b"x");
    h.remote.fail("make_file", ClientError::Io("disk full".into()), 1);

    let err = h.try_cycle(None).await.unwrap_err();
    assert!(matches!(err, SyncError::PairFailed { .. }));
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_max_sync_step_bounds_applies() {
    let h = Harness::new().await;
    for name in ["1.txt", "2.txt", "3.txt"] {
        h.write(name, name.as_bytes());
    }

    let report = h.try_cycle(Some(2)).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(h.remote.child_names(ROOT_ID).len(), 2);

    let report = h.try_cycle(Some(2)).await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(h.remote.child_names(ROOT_ID).len(), 3);
}

#[tokio::test]
async fn test_concurrent_trigger_is_skipped() {
    let h = Harness::new().await;
    h.write("a.txt", b"x");

    let (first, second) = tokio::join!(
        h.synchronizer
            .synchronize_root(&h.binding, h.local.clone(), h.remote.clone(), None),
        h.synchronizer
            .synchronize_root(&h.binding, h.local.clone(), h.remote.clone(), None),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.is_skipped() != second.is_skipped());
    assert_eq!(h.remote.child_names(ROOT_ID), vec!["a.txt"]);
}

#[tokio::test]
async fn test_stop_halts_at_pair_boundary() {
    let h = Harness::new().await;
    for name in ["1.txt", "2.txt", "3.txt"] {
        h.write(name, b"x");
    }
    let token = h.synchronizer.shutdown_token();
    h.remote.on_write(move || token.cancel());

    let report = h.cycle().await;
    assert!(report.stopped);
    assert_eq!(report.applied, 1);
    assert_eq!(h.remote.child_names(ROOT_ID).len(), 1);

    let synced = h.states().await;
    assert_eq!(
        synced.iter().filter(|s| **s == PairState::LocallyCreated).count(),
        2
    );
    assert!(matches!(h.try_cycle(None).await, Err(SyncError::Stopped)));
}

#[tokio::test]
async fn test_synchronize_all_uses_bindings() {
    let h = Harness::new().await;
    h.write("a.txt", b"x");

    let results = h.synchronizer.synchronize_all(None).await.unwrap();
    assert_eq!(results.len(), 1);
    let (root, outcome) = &results[0];
    assert_eq!(root, &h.binding.local_root);
    assert!(matches!(outcome, Ok(CycleOutcome::Completed(r)) if r.applied == 1));
}

#[tokio::test]
async fn test_run_loop_until_stopped() {
    let h = Harness::new().await;
    h.write("a.txt", b"x");

    let token = h.synchronizer.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });
    h.synchronizer
        .run_loop(Duration::from_millis(50), 10)
        .await
        .unwrap();

    assert!(h.synchronizer.is_stopped());
    assert_eq!(h.remote.child_names(ROOT_ID), vec!["a.txt"]);
}

// ============================================================================
// Root scoping
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_to_outside_folder_is_not_synchronized() {
    let h = Harness::new().await;
    let outside = h.tmp.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::fs::write(outside.join("secret.txt"), b"top secret").unwrap();
    std::os::unix::fs::symlink(&outside, h.path("link")).unwrap();
    h.write("a.txt", b"alpha");

    let report = h.cycle().await;
    assert_eq!(report.failed, 0);
    assert_eq!(h.remote.child_names(ROOT_ID), vec!["a.txt"]);
    assert!(h.pair_at("/link").await.is_none());
    assert!(h.cycle().await.is_idle());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_loop_does_not_break_the_scan() {
    let h = Harness::new().await;
    std::os::unix::fs::symlink(h.root(), h.path("loop")).unwrap();
    h.write("a.txt", b"alpha");

    h.cycle().await;
    assert_eq!(h.remote.child_names(ROOT_ID), vec!["a.txt"]);
    let pair = h.pair_at("/a.txt").await.unwrap();
    assert!(pair.is_fully_synchronized());
}

// ============================================================================
// Edits racing a transfer
// ============================================================================

#[tokio::test]
async fn test_edit_during_upload_is_sent_next_cycle() {
    let h = Harness::new().await;
    h.write("doc.txt", b"v1");
    h.cycle().await;
    let id = h.remote.find(ROOT_ID, "doc.txt").unwrap();

    h.write("doc.txt", b"v2");
    let editing = Arc::new(EditingLocal::new(
        h.local.clone(),
        "get_content",
        "/doc.txt",
        b"v3 edited during upload",
    ));
    h.try_cycle_with(editing.clone(), None).await.unwrap();
    assert!(editing.fired());
    assert_eq!(h.remote.content_of(&id).unwrap(), b"v2");

    let pair = h.pair_at("/doc.txt").await.unwrap();
    assert_eq!(pair.local_digest.as_deref(), Some(md5_hex(b"v2").as_str()));

    h.settle(3).await;
    assert_eq!(h.remote.content_of(&id).unwrap(), b"v3 edited during upload");
    let pair = h.pair_at("/doc.txt").await.unwrap();
    assert!(pair.is_fully_synchronized());
    assert_eq!(
        pair.local_digest.as_deref(),
        Some(md5_hex(b"v3 edited during upload").as_str())
    );
}

#[tokio::test]
async fn test_edit_during_first_upload_is_sent_next_cycle() {
    let h = Harness::new().await;
    h.write("new.txt", b"first");
    let editing = Arc::new(EditingLocal::new(
        h.local.clone(),
        "get_content",
        "/new.txt",
        b"second",
    ));
    h.try_cycle_with(editing.clone(), None).await.unwrap();
    assert!(editing.fired());

    h.settle(3).await;
    let id = h.remote.find(ROOT_ID, "new.txt").unwrap();
    assert_eq!(h.remote.content_of(&id).unwrap(), b"second");
    assert!(h.pair_at("/new.txt").await.unwrap().is_fully_synchronized());
}

#[tokio::test]
async fn test_edit_right_after_download_is_uploaded() {
    let h = Harness::new().await;
    let id = h.remote.add_file(ROOT_ID, "shared.txt", b"r1");
    h.cycle().await;

    h.remote.set_content(&id, b"r2");
    let editing = Arc::new(EditingLocal::new(
        h.local.clone(),
        "update_content",
        "/shared.txt",
        b"local edit",
    ));
    h.try_cycle_with(editing.clone(), None).await.unwrap();
    assert!(editing.fired());

    h.settle(3).await;
    assert_eq!(h.read("shared.txt"), b"local edit");
    assert_eq!(h.remote.content_of(&id).unwrap(), b"local edit");
    assert!(h.pair_at("/shared.txt").await.unwrap().is_fully_synchronized());
}
