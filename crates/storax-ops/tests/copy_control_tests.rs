//! Cooperative pause/resume/cancel at chunk boundaries.
//!
//! These tests drive the copy engine directly so the test owns the event
//! stream; the bounded channel gives deterministic control over how far the
//! chunk loop can run ahead.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use storax_backend::{BackendRouter, PathBackend};
use storax_core::{ConflictPolicy, EngineConfig};
use storax_ops::{CopyEngine, CopyEvent, CopyOutcome, JobRegistry, LockManager};
use storax_store::WalDir;

struct Fixture {
    engine: CopyEngine,
    jobs: Arc<JobRegistry>,
    config: EngineConfig,
    work: PathBuf,
}

fn fixture(dir: &TempDir) -> Fixture {
    let mut config = EngineConfig::new(dir.path().join("data"));
    // Tiny chunks so one file spans far more chunks than the channel buffers.
    config.copy_chunk_bytes = 1024;
    fs::create_dir_all(&config.data_dir).unwrap();

    let router = BackendRouter::new(Arc::new(PathBackend::new(config.trash_dir())), None);
    let locks = Arc::new(LockManager::new(Duration::from_secs(10)));
    let jobs = Arc::new(JobRegistry::new());
    let wal = Arc::new(WalDir::open(config.copy_wal_dir()).unwrap());
    let engine = CopyEngine::new(
        config.clone(),
        router,
        locks,
        Arc::clone(&jobs),
        wal,
    );

    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    Fixture {
        engine,
        jobs,
        config,
        work,
    }
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn payload() -> Vec<u8> {
    (0..300 * 1024u32).map(|i| (i % 251) as u8).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_takes_effect_at_chunk_boundary_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let f = fixture(&dir);
    fs::write(f.work.join("src.bin"), payload()).unwrap();
    let dest = f.work.join("dest");
    fs::create_dir(&dest).unwrap();

    let outcome = f
        .engine
        .copy_adaptive(
            &lossy(&f.work.join("src.bin")),
            &lossy(&dest),
            "src.bin",
            ConflictPolicy::Fail,
            None,
            true,
        )
        .await
        .unwrap();
    let (job_id, mut events) = match outcome {
        CopyOutcome::Streaming { job_id, events } => (job_id, events),
        CopyOutcome::Completed { .. } => panic!("force_progress must stream"),
    };

    // Let a few chunks through, then flip the flag.
    for _ in 0..5 {
        let event = events.recv().await.unwrap();
        assert!(!event.is_terminal(), "copy finished before cancellation");
    }
    assert!(f.jobs.cancel(&job_id));

    let mut terminal = None;
    while let Some(event) = events.recv().await {
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    assert!(matches!(terminal, Some(CopyEvent::Cancelled { .. })));

    // Partial destination and WAL are both gone; source is untouched.
    assert!(!dest.join("src.bin").exists());
    assert_eq!(fs::read_dir(f.config.copy_wal_dir()).unwrap().count(), 0);
    assert!(f.work.join("src.bin").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_stalls_the_stream_until_resume() {
    let dir = TempDir::new().unwrap();
    let f = fixture(&dir);
    let bytes = payload();
    fs::write(f.work.join("src.bin"), &bytes).unwrap();
    let dest = f.work.join("dest");
    fs::create_dir(&dest).unwrap();

    let outcome = f
        .engine
        .copy_adaptive(
            &lossy(&f.work.join("src.bin")),
            &lossy(&dest),
            "src.bin",
            ConflictPolicy::Fail,
            None,
            true,
        )
        .await
        .unwrap();
    let (job_id, mut events) = match outcome {
        CopyOutcome::Streaming { job_id, events } => (job_id, events),
        CopyOutcome::Completed { .. } => panic!("force_progress must stream"),
    };

    let first = events.recv().await.unwrap();
    assert!(!first.is_terminal());
    assert!(f.jobs.pause(&job_id));

    // Drain whatever was in flight; once the loop parks on the pause poll,
    // the stream goes quiet without a terminal event.
    let mut saw_terminal = false;
    loop {
        match tokio::time::timeout(Duration::from_millis(400), events.recv()).await {
            Ok(Some(event)) => saw_terminal |= event.is_terminal(),
            Ok(None) => break,
            Err(_) => break,
        }
    }
    assert!(!saw_terminal, "paused copy must not reach a terminal state");

    assert!(f.jobs.resume(&job_id));
    let mut completed = None;
    while let Some(event) = events.recv().await {
        if let CopyEvent::Completed { location, .. } = event {
            completed = Some(location);
        }
    }
    let location = completed.expect("resumed copy completes");
    assert_eq!(fs::read(&location).unwrap(), bytes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn controls_return_false_for_unknown_jobs() {
    let dir = TempDir::new().unwrap();
    let f = fixture(&dir);
    assert!(!f.jobs.cancel("unknown"));
    assert!(!f.jobs.pause("unknown"));
    assert!(!f.jobs.resume("unknown"));
}
