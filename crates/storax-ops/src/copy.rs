//! Adaptive, WAL-backed, resumable copy engine.
//!
//! Small files take the quick path: one native copy plus a checksum. A
//! directory source, a large total, or an explicit request goes
//! transactional: the job gets a WAL record, a control registered under its
//! job id, and a bounded event stream whose consumer drives the chunk loop.
//! Cancellation is tested before every read; pause is a poll loop at chunk
//! granularity; the WAL is rewritten atomically every time enough new bytes
//! have landed.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use storax_backend::{Backend, BackendRouter};
use storax_core::{
    display_name, join_location, parent_of, resolve_name, BackendKind, ConflictPolicy,
    EngineConfig, NodeType, OpError, OpResult,
};
use storax_store::{CopyWalRecord, WalDir};

use crate::job::{CopyControl, JobRegistry};
use crate::lock::{LockGuard, LockManager};
use crate::progress::{CopyEvent, CopyProgress, OPERATION_CHANNEL_SIZE};
use crate::speed::adaptive_threshold;
use crate::task_error;
use crate::validate::validate_filename;

/// Result of starting a copy.
pub enum CopyOutcome {
    /// Quick path; the copy is already complete and verified.
    Completed { location: String },
    /// Transactional path; consuming the stream drives the copy.
    Streaming {
        job_id: String,
        events: mpsc::Receiver<CopyEvent>,
    },
}

#[derive(Clone)]
struct ExecCtx {
    config: EngineConfig,
    router: BackendRouter,
    wal: Arc<WalDir<CopyWalRecord>>,
}

pub struct CopyEngine {
    config: EngineConfig,
    router: BackendRouter,
    locks: Arc<LockManager>,
    jobs: Arc<JobRegistry>,
    wal: Arc<WalDir<CopyWalRecord>>,
}

impl CopyEngine {
    pub fn new(
        config: EngineConfig,
        router: BackendRouter,
        locks: Arc<LockManager>,
        jobs: Arc<JobRegistry>,
        wal: Arc<WalDir<CopyWalRecord>>,
    ) -> Self {
        Self {
            config,
            router,
            locks,
            jobs,
            wal,
        }
    }

    /// Copy `source` into `dest_parent` under `new_name`, picking quick or
    /// transactional mode adaptively.
    pub async fn copy_adaptive(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
        force_progress: bool,
    ) -> OpResult<CopyOutcome> {
        self.copy_with_job(None, source, dest_parent, new_name, policy, manual, force_progress)
            .await
    }

    /// Like [`Self::copy_adaptive`] but reusing a caller-allocated job id, so
    /// a wrapping transaction (the move engine) shares the id space.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn copy_with_job(
        &self,
        job_id: Option<String>,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
        force_progress: bool,
    ) -> OpResult<CopyOutcome> {
        validate_filename(new_name)?;
        if let Some(manual) = manual {
            validate_filename(manual)?;
        }

        let lock = self
            .locks
            .acquire(&format!("copy::{source}->{dest_parent}/{new_name}"))
            .await?;

        let src_backend = self.router.backend_for(source)?;
        let dst_backend = self.router.backend_for(dest_parent)?;

        let source_owned = source.to_string();
        let dest_parent_owned = dest_parent.to_string();
        let name_owned = new_name.to_string();
        let manual_owned = manual.map(str::to_string);
        let src_for_prep = Arc::clone(&src_backend);
        let dst_for_prep = Arc::clone(&dst_backend);
        let (is_directory, final_name, total) = tokio::task::spawn_blocking(move || {
            let node = src_for_prep.stat(&source_owned)?;
            if !dst_for_prep.exists(&dest_parent_owned) {
                return Err(OpError::NotFound {
                    location: dest_parent_owned.clone(),
                });
            }
            let final_name = resolve_name(
                |n| dst_for_prep.exists(&join_location(&dest_parent_owned, n)),
                &name_owned,
                policy,
                manual_owned.as_deref(),
            )
            .ok_or_else(|| OpError::ConflictDeclined {
                name: name_owned.clone(),
            })?;
            let total = src_for_prep.size_of(&source_owned)?;
            Ok::<_, OpError>((node.is_directory, final_name, total))
        })
        .await
        .map_err(task_error)??;

        let target = join_location(dest_parent, &final_name);
        let threshold = adaptive_threshold(&self.config);
        let transactional = is_directory || total > threshold || force_progress;

        if !transactional {
            let source_owned = source.to_string();
            let target_owned = target.clone();
            let location = tokio::task::spawn_blocking(move || {
                quick_copy_file(&*src_backend, &source_owned, &*dst_backend, &target_owned)
            })
            .await
            .map_err(task_error)??;
            return Ok(CopyOutcome::Completed { location });
        }

        let job_id = job_id.unwrap_or_else(|| self.jobs.new_job_id());
        let record = CopyWalRecord {
            job_id: job_id.clone(),
            source: source.to_string(),
            target,
            total_bytes: total,
            copied_bytes: 0,
            is_directory,
        };
        self.wal.write(&job_id, &record)?;

        let control = self.jobs.register(&job_id);
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        self.spawn_execution(lock, record, control, tx);
        Ok(CopyOutcome::Streaming { job_id, events: rx })
    }

    /// The outstanding WAL record for a job, if any.
    pub(crate) fn pending_record(&self, job_id: &str) -> Option<CopyWalRecord> {
        self.wal.load(job_id)
    }

    /// Resume a WAL record into a live job stream; used by recovery.
    pub(crate) async fn resume_record(
        &self,
        record: CopyWalRecord,
    ) -> OpResult<(String, mpsc::Receiver<CopyEvent>)> {
        let lock = self
            .locks
            .acquire(&format!("copy::{}->{}", record.source, record.target))
            .await?;
        let job_id = record.job_id.clone();
        let control = self.jobs.register(&job_id);
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        self.spawn_execution(lock, record, control, tx);
        Ok((job_id, rx))
    }

    /// Restore every outstanding copy WAL into a resumable stream,
    /// skipping jobs owned by a wrapping move transaction.
    pub async fn recover(
        &self,
        exclude: &HashSet<String>,
    ) -> OpResult<Vec<(String, mpsc::Receiver<CopyEvent>)>> {
        let mut recovered = Vec::new();
        for (job_id, record) in self.wal.load_all()? {
            if exclude.contains(&job_id) {
                continue;
            }
            debug!(%job_id, copied = record.copied_bytes, "resuming copy from wal");
            recovered.push(self.resume_record(record).await?);
        }
        Ok(recovered)
    }

    fn spawn_execution(
        &self,
        lock: LockGuard,
        record: CopyWalRecord,
        control: Arc<CopyControl>,
        tx: mpsc::Sender<CopyEvent>,
    ) {
        let ctx = ExecCtx {
            config: self.config.clone(),
            router: self.router.clone(),
            wal: Arc::clone(&self.wal),
        };
        let jobs = Arc::clone(&self.jobs);

        tokio::spawn(async move {
            let _lock = lock;
            let job_id = record.job_id.clone();
            let tx_terminal = tx.clone();

            let result =
                tokio::task::spawn_blocking(move || execute(&ctx, record, &control, &tx)).await;

            let event = match result {
                Ok(Ok(location)) => CopyEvent::Completed {
                    job_id: job_id.clone(),
                    location,
                },
                Ok(Err(OpError::Cancelled)) => CopyEvent::Cancelled {
                    job_id: job_id.clone(),
                },
                Ok(Err(error)) => CopyEvent::Failed {
                    job_id: job_id.clone(),
                    error,
                },
                Err(join_err) => CopyEvent::Failed {
                    job_id: job_id.clone(),
                    error: task_error(join_err),
                },
            };
            let _ = tx_terminal.send(event).await;
            jobs.deregister(&job_id);
        });
    }
}

/// Run one transactional job to its terminal state. On success the WAL is
/// gone; on cancel or integrity failure the partial target and the WAL are
/// gone; on an unknown outcome the WAL survives for recovery.
fn execute(
    ctx: &ExecCtx,
    record: CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
) -> OpResult<String> {
    let src_backend = ctx.router.backend_for(&record.source)?;
    let dst_backend = ctx.router.backend_for(&record.target)?;
    let seekable =
        src_backend.kind() == BackendKind::Path && dst_backend.kind() == BackendKind::Path;

    let result = if record.is_directory {
        if seekable {
            copy_dir_seekable(ctx, &record, control, tx)
        } else {
            copy_tree_streaming(ctx, &*src_backend, &*dst_backend, &record, control, tx)
        }
    } else if seekable {
        copy_file_seekable(ctx, &record, control, tx)
    } else {
        copy_file_streaming(ctx, &*src_backend, &*dst_backend, &record, control, tx)
    };

    match result {
        Ok(location) => {
            ctx.wal.remove(&record.job_id)?;
            Ok(location)
        }
        Err(err @ (OpError::Cancelled | OpError::IntegrityMismatch { .. })) => {
            cleanup_partial(&*dst_backend, &record.target);
            ctx.wal.remove(&record.job_id)?;
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Block until the job may proceed; cancellation wins over pause.
fn wait_for_go(control: &CopyControl, config: &EngineConfig) -> OpResult<()> {
    loop {
        if control.is_cancelled() {
            return Err(OpError::Cancelled);
        }
        if !control.is_paused() {
            return Ok(());
        }
        std::thread::sleep(config.pause_poll());
    }
}

fn send_progress(tx: &mpsc::Sender<CopyEvent>, record: &CopyWalRecord, copied: u64) {
    let _ = tx.blocking_send(CopyEvent::Progress(CopyProgress {
        job_id: record.job_id.clone(),
        source: record.source.clone(),
        target: record.target.clone(),
        copied_bytes: copied,
        total_bytes: record.total_bytes,
    }));
}

fn copy_file_seekable(
    ctx: &ExecCtx,
    record: &CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
) -> OpResult<String> {
    let src_path = Path::new(&record.source);
    let dst_path = Path::new(&record.target);

    // A prior attempt resumes from whatever the target already holds.
    let mut copied = if record.copied_bytes > 0 && dst_path.exists() {
        let target_len = fs::metadata(dst_path)
            .map_err(|e| OpError::io(&record.target, e))?
            .len();
        target_len.min(record.total_bytes)
    } else {
        0
    };

    let mut src = File::open(src_path).map_err(|e| OpError::io(&record.source, e))?;
    src.seek(SeekFrom::Start(copied))
        .map_err(|e| OpError::io(&record.source, e))?;

    let mut dst = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dst_path)
        .map_err(|e| OpError::io(&record.target, e))?;
    dst.set_len(copied).map_err(|e| OpError::io(&record.target, e))?;
    dst.seek(SeekFrom::Start(copied))
        .map_err(|e| OpError::io(&record.target, e))?;

    let mut last_sync = copied;
    let mut buf = vec![0u8; ctx.config.copy_chunk_bytes];
    loop {
        wait_for_go(control, &ctx.config)?;

        let n = src.read(&mut buf).map_err(|e| OpError::io(&record.source, e))?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])
            .map_err(|e| OpError::io(&record.target, e))?;
        copied += n as u64;
        send_progress(tx, record, copied);

        if copied - last_sync >= ctx.config.wal_sync_bytes {
            let mut snapshot = record.clone();
            snapshot.copied_bytes = copied;
            ctx.wal.write(&record.job_id, &snapshot)?;
            last_sync = copied;
        }
    }

    dst.sync_all().map_err(|e| OpError::io(&record.target, e))?;
    drop(dst);
    drop(src);

    verify_file_integrity(src_path, dst_path, &record.source, &record.target)?;
    Ok(record.target.clone())
}

fn copy_dir_seekable(
    ctx: &ExecCtx,
    record: &CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
) -> OpResult<String> {
    let src_root = Path::new(&record.source);
    let dst_root = Path::new(&record.target);
    let resuming = record.copied_bytes > 0;

    fs::create_dir_all(dst_root).map_err(|e| OpError::io(&record.target, e))?;

    let mut copied = 0u64;
    let mut last_sync = 0u64;
    let mut buf = vec![0u8; ctx.config.copy_chunk_bytes];

    for entry in walkdir::WalkDir::new(src_root)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        let rel = match entry.path().strip_prefix(src_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target_path = dst_root.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let src_len = entry
            .metadata()
            .map_err(|e| OpError::io(entry.path().to_string_lossy(), e.into()))?
            .len();

        // Per-file resume: complete files are counted and skipped, a
        // partial tail continues where it stopped.
        let mut start = 0u64;
        if resuming && target_path.exists() {
            let have = fs::metadata(&target_path)
                .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?
                .len();
            if have >= src_len {
                copied += src_len;
                send_progress(tx, record, copied);
                continue;
            }
            start = have;
            copied += have;
        }

        let mut src =
            File::open(entry.path()).map_err(|e| OpError::io(entry.path().to_string_lossy(), e))?;
        src.seek(SeekFrom::Start(start))
            .map_err(|e| OpError::io(entry.path().to_string_lossy(), e))?;
        let mut dst = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&target_path)
            .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;
        dst.set_len(start)
            .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;
        dst.seek(SeekFrom::Start(start))
            .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;

        loop {
            wait_for_go(control, &ctx.config)?;
            let n = src
                .read(&mut buf)
                .map_err(|e| OpError::io(entry.path().to_string_lossy(), e))?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])
                .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;
            copied += n as u64;
            send_progress(tx, record, copied);

            if copied - last_sync >= ctx.config.wal_sync_bytes {
                let mut snapshot = record.clone();
                snapshot.copied_bytes = copied;
                ctx.wal.write(&record.job_id, &snapshot)?;
                last_sync = copied;
            }
        }
        dst.sync_all()
            .map_err(|e| OpError::io(target_path.to_string_lossy(), e))?;
    }

    let src_total = dir_bytes(src_root);
    let dst_total = dir_bytes(dst_root);
    if src_total != dst_total {
        return Err(OpError::IntegrityMismatch {
            source_path: record.source.clone(),
            target: record.target.clone(),
        });
    }
    Ok(record.target.clone())
}

fn copy_file_streaming(
    ctx: &ExecCtx,
    src_backend: &dyn Backend,
    dst_backend: &dyn Backend,
    record: &CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
) -> OpResult<String> {
    let dest_parent = parent_of(&record.target).ok_or_else(|| OpError::InvalidName {
        message: format!("'{}' has no parent", record.target),
    })?;
    let name = display_name(&record.target).to_string();

    // Handle streams cannot seek, so a resumed attempt restarts from zero.
    let mut reader = src_backend.open_source(&record.source)?;
    let mut sink = dst_backend.create_sink(&dest_parent, &name)?;

    let mut copied = 0u64;
    let mut last_sync = 0u64;
    let mut buf = vec![0u8; ctx.config.copy_chunk_bytes];
    loop {
        wait_for_go(control, &ctx.config)?;
        let n = reader
            .read(&mut buf)
            .map_err(|e| OpError::io(&record.source, e))?;
        if n == 0 {
            break;
        }
        sink.writer
            .write_all(&buf[..n])
            .map_err(|e| OpError::io(&sink.location, e))?;
        copied += n as u64;
        send_progress(tx, record, copied);

        if copied - last_sync >= ctx.config.wal_sync_bytes {
            let mut snapshot = record.clone();
            snapshot.copied_bytes = copied;
            ctx.wal.write(&record.job_id, &snapshot)?;
            last_sync = copied;
        }
    }
    sink.writer
        .flush()
        .map_err(|e| OpError::io(&sink.location, e))?;
    let location = sink.location.clone();
    drop(sink);
    drop(reader);

    verify_backend_integrity(src_backend, &record.source, dst_backend, &location)?;
    Ok(location)
}

fn copy_tree_streaming(
    ctx: &ExecCtx,
    src_backend: &dyn Backend,
    dst_backend: &dyn Backend,
    record: &CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
) -> OpResult<String> {
    let dest_parent = parent_of(&record.target).ok_or_else(|| OpError::InvalidName {
        message: format!("'{}' has no parent", record.target),
    })?;
    let name = display_name(&record.target).to_string();

    let mut copied = 0u64;
    let mut last_sync = 0u64;
    let location = stream_tree(
        ctx,
        src_backend,
        &record.source,
        dst_backend,
        &dest_parent,
        &name,
        record,
        control,
        tx,
        &mut copied,
        &mut last_sync,
    )?;

    let src_total = src_backend.size_of(&record.source)?;
    let dst_total = dst_backend.size_of(&location)?;
    if src_total != dst_total {
        return Err(OpError::IntegrityMismatch {
            source_path: record.source.clone(),
            target: location,
        });
    }
    Ok(location)
}

#[allow(clippy::too_many_arguments)]
fn stream_tree(
    ctx: &ExecCtx,
    src_backend: &dyn Backend,
    source: &str,
    dst_backend: &dyn Backend,
    dest_parent: &str,
    name: &str,
    record: &CopyWalRecord,
    control: &CopyControl,
    tx: &mpsc::Sender<CopyEvent>,
    copied: &mut u64,
    last_sync: &mut u64,
) -> OpResult<String> {
    let node = src_backend.stat(source)?;
    if !node.is_directory {
        // Skip files a prior attempt already landed whole.
        let existing = join_location(dest_parent, name);
        if record.copied_bytes > 0 && dst_backend.exists(&existing) {
            if let Ok(have) = dst_backend.size_of(&existing) {
                if have == node.size {
                    *copied += have;
                    send_progress(tx, record, *copied);
                    return Ok(existing);
                }
            }
        }

        let mut reader = src_backend.open_source(source)?;
        let mut sink = dst_backend.create_sink(dest_parent, name)?;
        let mut buf = vec![0u8; ctx.config.copy_chunk_bytes];
        loop {
            wait_for_go(control, &ctx.config)?;
            let n = reader.read(&mut buf).map_err(|e| OpError::io(source, e))?;
            if n == 0 {
                break;
            }
            sink.writer
                .write_all(&buf[..n])
                .map_err(|e| OpError::io(&sink.location, e))?;
            *copied += n as u64;
            send_progress(tx, record, *copied);

            if *copied - *last_sync >= ctx.config.wal_sync_bytes {
                let mut snapshot = record.clone();
                snapshot.copied_bytes = *copied;
                ctx.wal.write(&record.job_id, &snapshot)?;
                *last_sync = *copied;
            }
        }
        sink.writer
            .flush()
            .map_err(|e| OpError::io(&sink.location, e))?;
        return Ok(sink.location);
    }

    let dir_location = ensure_directory(dst_backend, dest_parent, name)?;
    for child in src_backend.list(source)? {
        stream_tree(
            ctx,
            src_backend,
            &child.location,
            dst_backend,
            &dir_location,
            &child.name,
            record,
            control,
            tx,
            copied,
            last_sync,
        )?;
    }
    Ok(dir_location)
}

/// Quick path: native copy primitive plus checksum verification. Only files
/// arrive here; directories are always transactional.
fn quick_copy_file(
    src_backend: &dyn Backend,
    source: &str,
    dst_backend: &dyn Backend,
    target: &str,
) -> OpResult<String> {
    let seekable =
        src_backend.kind() == BackendKind::Path && dst_backend.kind() == BackendKind::Path;

    let location = if seekable {
        fs::copy(source, target).map_err(|e| OpError::io(target, e))?;
        target.to_string()
    } else {
        let dest_parent = parent_of(target).ok_or_else(|| OpError::InvalidName {
            message: format!("'{target}' has no parent"),
        })?;
        let name = display_name(target).to_string();
        transfer_file(src_backend, source, dst_backend, &dest_parent, &name)?
    };

    if let Err(err) = verify_backend_integrity(src_backend, source, dst_backend, &location) {
        cleanup_partial(dst_backend, &location);
        return Err(err);
    }
    debug!(source, %location, "quick copy verified");
    Ok(location)
}

/// Stream one file between backends without progress or WAL bookkeeping.
/// Used by the trash fallback and restore paths.
pub(crate) fn transfer_file(
    src_backend: &dyn Backend,
    source: &str,
    dst_backend: &dyn Backend,
    dest_parent: &str,
    name: &str,
) -> OpResult<String> {
    let mut reader = src_backend.open_source(source)?;
    let mut sink = dst_backend.create_sink(dest_parent, name)?;
    std::io::copy(&mut reader, &mut sink.writer).map_err(|e| OpError::io(source, e))?;
    sink.writer
        .flush()
        .map_err(|e| OpError::io(&sink.location, e))?;
    Ok(sink.location)
}

/// Recursively transfer a node between backends; see [`transfer_file`].
pub(crate) fn transfer_node(
    src_backend: &dyn Backend,
    source: &str,
    dst_backend: &dyn Backend,
    dest_parent: &str,
    name: &str,
) -> OpResult<String> {
    let node = src_backend.stat(source)?;
    if !node.is_directory {
        return transfer_file(src_backend, source, dst_backend, dest_parent, name);
    }
    let dir_location = ensure_directory(dst_backend, dest_parent, name)?;
    for child in src_backend.list(source)? {
        transfer_node(
            src_backend,
            &child.location,
            dst_backend,
            &dir_location,
            &child.name,
        )?;
    }
    Ok(dir_location)
}

fn ensure_directory(backend: &dyn Backend, parent: &str, name: &str) -> OpResult<String> {
    let location = join_location(parent, name);
    if backend.exists(&location) {
        if backend.stat(&location)?.is_directory {
            return Ok(location);
        }
        backend.delete(&location)?;
    }
    let outcome = backend.create(parent, name, NodeType::Directory, ConflictPolicy::Fail, None)?;
    Ok(outcome.location)
}

fn cleanup_partial(dst_backend: &dyn Backend, target: &str) {
    if dst_backend.exists(target) {
        if let Err(err) = dst_backend.delete(target) {
            warn!(target, %err, "failed to remove partial destination");
        }
    }
}

fn sha256_reader(mut reader: impl Read) -> std::io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

fn verify_file_integrity(
    src_path: &Path,
    dst_path: &Path,
    source: &str,
    target: &str,
) -> OpResult<()> {
    let src_hash = File::open(src_path)
        .and_then(sha256_reader)
        .map_err(|e| OpError::io(source, e))?;
    let dst_hash = File::open(dst_path)
        .and_then(sha256_reader)
        .map_err(|e| OpError::io(target, e))?;
    if src_hash != dst_hash {
        return Err(OpError::IntegrityMismatch {
            source_path: source.to_string(),
            target: target.to_string(),
        });
    }
    Ok(())
}

fn verify_backend_integrity(
    src_backend: &dyn Backend,
    source: &str,
    dst_backend: &dyn Backend,
    target: &str,
) -> OpResult<()> {
    let src_hash =
        sha256_reader(src_backend.open_source(source)?).map_err(|e| OpError::io(source, e))?;
    let dst_hash =
        sha256_reader(dst_backend.open_source(target)?).map_err(|e| OpError::io(target, e))?;
    if src_hash != dst_hash {
        return Err(OpError::IntegrityMismatch {
            source_path: source.to_string(),
            target: target.to_string(),
        });
    }
    Ok(())
}

fn dir_bytes(root: &Path) -> u64 {
    let mut total = 0u64;
    for entry in walkdir::WalkDir::new(root).into_iter().flatten() {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                total += metadata.len();
            }
        }
    }
    total
}
