//! End-to-end scenarios through the orchestrator on the path backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use storax_backend::{BackendRouter, PathBackend};
use storax_core::{ConflictPolicy, EngineConfig, NodeType, OpError};
use storax_ops::{CopyStarted, EngineEvent, Storax};

fn engine_with_config(dir: &TempDir, tweak: impl FnOnce(&mut EngineConfig)) -> (Storax, PathBuf) {
    let mut config = EngineConfig::new(dir.path().join("data"));
    tweak(&mut config);
    let router = BackendRouter::new(Arc::new(PathBackend::new(config.trash_dir())), None);
    let engine = Storax::new(config, router).unwrap();

    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    (engine, work)
}

fn engine(dir: &TempDir) -> (Storax, PathBuf) {
    engine_with_config(dir, |_| {})
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within timeout");
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_with_rename_new_conflict() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    fs::write(work.join("a.txt"), b"").unwrap();

    let mut events = engine.subscribe();
    let outcome = engine
        .create(
            &lossy(&work),
            "a.txt",
            NodeType::File,
            ConflictPolicy::RenameNew,
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.final_name, "a.txt (1)");
    assert!(work.join("a.txt (1)").exists());
    assert_eq!(engine.undo_count().await, 1);
    assert_eq!(engine.redo_count().await, 0);

    match events.recv().await.unwrap() {
        EngineEvent::UndoStateChanged { can_undo, can_redo } => {
            assert!(can_undo);
            assert!(!can_redo);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_fail_policy_declines() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    fs::write(work.join("a.txt"), b"old").unwrap();

    let err = engine
        .create(
            &lossy(&work),
            "a.txt",
            NodeType::File,
            ConflictPolicy::Fail,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OpError::ConflictDeclined { .. }));
    assert_eq!(engine.undo_count().await, 0);
    assert_eq!(fs::read(work.join("a.txt")).unwrap(), b"old");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rename_undo_redo_round_trip() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    fs::write(work.join("x.txt"), b"payload").unwrap();

    let renamed = engine
        .rename(
            &lossy(&work.join("x.txt")),
            "y.txt",
            ConflictPolicy::Fail,
            None,
        )
        .await
        .unwrap();
    assert!(renamed.ends_with("y.txt"));
    assert!(!work.join("x.txt").exists());

    assert!(engine.undo().await);
    assert!(work.join("x.txt").exists());
    assert!(!work.join("y.txt").exists());
    assert_eq!(fs::read(work.join("x.txt")).unwrap(), b"payload");

    assert!(engine.redo().await);
    assert!(work.join("y.txt").exists());
    assert!(!work.join("x.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn move_same_backend_is_atomic_and_reversible() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    let sub = work.join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(work.join("a.txt"), b"data").unwrap();

    let location = engine
        .move_item(
            &lossy(&work.join("a.txt")),
            &lossy(&sub),
            "a.txt",
            ConflictPolicy::Fail,
            None,
        )
        .await
        .unwrap();

    // Exactly one of source and destination exists.
    assert!(!work.join("a.txt").exists());
    assert!(sub.join("a.txt").exists());
    assert_eq!(location, lossy(&sub.join("a.txt")));

    assert!(engine.undo().await);
    assert!(work.join("a.txt").exists());
    assert!(!sub.join("a.txt").exists());

    assert!(engine.redo().await);
    assert!(!work.join("a.txt").exists());
    assert!(sub.join("a.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quick_copy_preserves_contents_and_is_undoable() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    fs::write(work.join("src.bin"), &payload).unwrap();
    let dest = work.join("dest");
    fs::create_dir(&dest).unwrap();

    let started = engine
        .copy(
            &lossy(&work.join("src.bin")),
            &lossy(&dest),
            "src.bin",
            ConflictPolicy::Fail,
            None,
            false,
        )
        .await
        .unwrap();

    let location = match started {
        CopyStarted::Completed { location } => location,
        CopyStarted::Job { job_id } => panic!("expected quick path, got job {job_id}"),
    };
    assert_eq!(fs::read(&location).unwrap(), payload);
    assert_eq!(engine.undo_count().await, 1);

    // Undo a copy trashes the created node.
    assert!(engine.undo().await);
    assert!(!dest.join("src.bin").exists());

    // Copy is not redoable.
    assert!(!engine.redo().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forced_transactional_copy_completes_with_progress() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    let payload: Vec<u8> = (0..2 * 1024 * 1024u32).map(|i| (i % 249) as u8).collect();
    fs::write(work.join("big.bin"), &payload).unwrap();
    let dest = work.join("dest");
    fs::create_dir(&dest).unwrap();

    let mut events = engine.subscribe();
    let started = engine
        .copy(
            &lossy(&work.join("big.bin")),
            &lossy(&dest),
            "big.bin",
            ConflictPolicy::Fail,
            None,
            true,
        )
        .await
        .unwrap();

    let job_id = match started {
        CopyStarted::Job { job_id } => job_id,
        CopyStarted::Completed { .. } => panic!("force_progress must go transactional"),
    };

    let target = dest.join("big.bin");
    let wal_dir = engine.config().copy_wal_dir();
    wait_until(|| {
        target.exists()
            && fs::read(&target).map(|b| b == payload).unwrap_or(false)
            && fs::read_dir(&wal_dir).map(|d| d.count() == 0).unwrap_or(false)
    })
    .await;

    // The undo action lands once the background driver sees completion.
    for _ in 0..500 {
        if engine.undo_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(engine.undo_count().await, 1);

    let mut saw_progress = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::TransferProgress {
            job_id: event_job, ..
        } = event
        {
            assert_eq!(event_job, job_id);
            saw_progress = true;
        }
    }
    assert!(saw_progress, "expected transferProgress events");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn directory_copy_is_transactional_and_complete() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    let src = work.join("tree");
    fs::create_dir_all(src.join("inner")).unwrap();
    fs::write(src.join("a.txt"), b"alpha").unwrap();
    fs::write(src.join("inner/b.txt"), b"beta").unwrap();
    let dest = work.join("dest");
    fs::create_dir(&dest).unwrap();

    let started = engine
        .copy(
            &lossy(&src),
            &lossy(&dest),
            "tree",
            ConflictPolicy::Fail,
            None,
            false,
        )
        .await
        .unwrap();
    assert!(matches!(started, CopyStarted::Job { .. }));

    let copied = dest.join("tree");
    wait_until(|| {
        fs::read(copied.join("a.txt")).map(|b| b == b"alpha").unwrap_or(false)
            && fs::read(copied.join("inner/b.txt")).map(|b| b == b"beta").unwrap_or(false)
    })
    .await;
    wait_until(|| engine.active_jobs().is_empty()).await;

    let wal_dir = engine.config().copy_wal_dir();
    assert_eq!(fs::read_dir(&wal_dir).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undo_log_capacity_drops_oldest_creates() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine_with_config(&dir, |c| c.undo_capacity = 3);

    for name in ["c1.txt", "c2.txt", "c3.txt", "c4.txt"] {
        engine
            .create(&lossy(&work), name, NodeType::File, ConflictPolicy::Fail, None)
            .await
            .unwrap();
    }
    assert_eq!(engine.undo_count().await, 3);

    // Undoing three times trashes c4, c3, c2 in that order; c1 fell off.
    assert!(engine.undo().await);
    assert!(!work.join("c4.txt").exists());
    assert!(work.join("c3.txt").exists());

    assert!(engine.undo().await);
    assert!(!work.join("c3.txt").exists());

    assert!(engine.undo().await);
    assert!(!work.join("c2.txt").exists());
    assert!(work.join("c1.txt").exists());

    assert!(!engine.undo().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn permanent_delete_bypasses_trash() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    fs::write(work.join("gone.txt"), b"x").unwrap();

    engine
        .permanently_delete(&lossy(&work.join("gone.txt")))
        .await
        .unwrap();
    assert!(!work.join("gone.txt").exists());
    assert!(engine.list_trash().await.unwrap().is_empty());
    assert_eq!(engine.undo_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listing_and_traversal() {
    let dir = TempDir::new().unwrap();
    let (engine, work) = engine(&dir);
    fs::create_dir_all(work.join("a/b")).unwrap();
    fs::write(work.join("a/b/deep.txt"), b"x").unwrap();
    fs::write(work.join("top.txt"), b"x").unwrap();

    let listed = engine.list_directory(&lossy(&work)).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["a", "top.txt"]);

    let all = engine.traverse_directory(&lossy(&work), -1).await.unwrap();
    assert_eq!(all.len(), 4);

    let shallow = engine.traverse_directory(&lossy(&work), 1).await.unwrap();
    assert_eq!(shallow.len(), 2);
}
