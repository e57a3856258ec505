//! Move engine: same-backend rename shortcut or WAL-backed copy+delete.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use storax_backend::BackendRouter;
use storax_core::{
    display_name, join_location, parent_of, resolve_name, ConflictPolicy, OpError, OpResult,
};
use storax_store::{MovePhase, MoveWalRecord, WalDir};

use crate::copy::{CopyEngine, CopyOutcome};
use crate::job::JobRegistry;
use crate::lock::{LockGuard, LockManager};
use crate::progress::{CopyEvent, OPERATION_CHANNEL_SIZE};
use crate::task_error;
use crate::validate::validate_filename;

/// Result of starting a move.
pub enum MoveOutcome {
    /// Same-backend rename; already durable.
    Completed { location: String },
    /// Cross-backend transaction; consuming the stream drives it.
    Streaming {
        job_id: String,
        events: mpsc::Receiver<CopyEvent>,
    },
}

pub struct MoveEngine {
    router: BackendRouter,
    locks: Arc<LockManager>,
    jobs: Arc<JobRegistry>,
    copy: Arc<CopyEngine>,
    wal: Arc<WalDir<MoveWalRecord>>,
}

impl MoveEngine {
    pub fn new(
        router: BackendRouter,
        locks: Arc<LockManager>,
        jobs: Arc<JobRegistry>,
        copy: Arc<CopyEngine>,
        wal: Arc<WalDir<MoveWalRecord>>,
    ) -> Self {
        Self {
            router,
            locks,
            jobs,
            copy,
            wal,
        }
    }

    pub async fn move_node(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<MoveOutcome> {
        validate_filename(new_name)?;
        if let Some(manual) = manual {
            validate_filename(manual)?;
        }

        let lock = self
            .locks
            .acquire(&format!("move::{source}->{dest_parent}/{new_name}"))
            .await?;

        if self.router.same_backend(source, dest_parent) {
            let backend = self.router.backend_for(source)?;
            let source_owned = source.to_string();
            let dest_owned = dest_parent.to_string();
            let name_owned = new_name.to_string();
            let manual_owned = manual.map(str::to_string);
            let result = tokio::task::spawn_blocking(move || {
                backend.relocate(
                    &source_owned,
                    &dest_owned,
                    &name_owned,
                    policy,
                    manual_owned.as_deref(),
                )
            })
            .await
            .map_err(task_error)?;

            match result {
                Ok(location) => return Ok(MoveOutcome::Completed { location }),
                // An atomic rename can fail across filesystem boundaries
                // even inside one backend; degrade to the transaction.
                Err(OpError::Io { .. }) => {
                    debug!(source, "same-backend rename failed, falling back to copy+delete");
                }
                Err(err) => return Err(err),
            }
        }

        self.start_transaction(lock, source, dest_parent, new_name, policy, manual)
            .await
    }

    async fn start_transaction(
        &self,
        lock: LockGuard,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<MoveOutcome> {
        let dst_backend = self.router.backend_for(dest_parent)?;
        let dest_owned = dest_parent.to_string();
        let name_owned = new_name.to_string();
        let manual_owned = manual.map(str::to_string);
        let final_name = tokio::task::spawn_blocking(move || {
            resolve_name(
                |n| dst_backend.exists(&join_location(&dest_owned, n)),
                &name_owned,
                policy,
                manual_owned.as_deref(),
            )
            .ok_or_else(|| OpError::ConflictDeclined {
                name: name_owned.clone(),
            })
        })
        .await
        .map_err(task_error)??;

        let destination = join_location(dest_parent, &final_name);
        let job_id = self.jobs.new_job_id();
        self.wal.write(
            &job_id,
            &MoveWalRecord {
                job_id: job_id.clone(),
                source: source.to_string(),
                destination: destination.clone(),
                phase: MovePhase::Copying,
            },
        )?;

        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        self.spawn_transaction(lock, job_id.clone(), source.to_string(), destination, None, tx);
        Ok(MoveOutcome::Streaming { job_id, events: rx })
    }

    /// Job ids with an outstanding move WAL. Copy recovery skips these:
    /// the move transaction re-drives its own inner copy.
    pub fn pending_job_ids(&self) -> OpResult<std::collections::HashSet<String>> {
        Ok(self
            .wal
            .load_all()?
            .into_iter()
            .map(|(job_id, _)| job_id)
            .collect())
    }

    /// Restore every outstanding move WAL. `COPYING` restarts the copy
    /// (idempotent through the copy engine's own WAL); `DELETING` retries
    /// the source delete.
    pub async fn recover(&self) -> OpResult<Vec<(String, mpsc::Receiver<CopyEvent>)>> {
        let mut recovered = Vec::new();
        for (job_id, record) in self.wal.load_all()? {
            let lock = self
                .locks
                .acquire(&format!("move::{}->{}", record.source, record.destination))
                .await?;
            let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
            debug!(%job_id, phase = ?record.phase, "resuming move from wal");

            match record.phase {
                MovePhase::Copying => {
                    let pending_copy = self.copy.pending_record(&job_id);
                    self.spawn_transaction(
                        lock,
                        job_id.clone(),
                        record.source,
                        record.destination,
                        pending_copy,
                        tx,
                    );
                }
                MovePhase::Deleting => {
                    let engine = self.parts();
                    let source = record.source.clone();
                    let destination = record.destination.clone();
                    let job = job_id.clone();
                    tokio::spawn(async move {
                        let _lock = lock;
                        delete_phase(&engine, &job, &source, &destination, &tx).await;
                    });
                }
            }
            recovered.push((job_id, rx));
        }
        Ok(recovered)
    }

    fn parts(&self) -> MoveParts {
        MoveParts {
            router: self.router.clone(),
            wal: Arc::clone(&self.wal),
            copy: Arc::clone(&self.copy),
        }
    }

    /// Drive copy phase then delete phase, emitting forwarded progress and
    /// one terminal event.
    fn spawn_transaction(
        &self,
        lock: LockGuard,
        job_id: String,
        source: String,
        destination: String,
        resume_copy: Option<storax_store::CopyWalRecord>,
        tx: mpsc::Sender<CopyEvent>,
    ) {
        let engine = self.parts();

        tokio::spawn(async move {
            let _lock = lock;

            let dest_parent = match parent_of(&destination) {
                Some(parent) => parent,
                None => {
                    let _ = engine.wal.remove(&job_id);
                    let _ = tx
                        .send(CopyEvent::Failed {
                            job_id: job_id.clone(),
                            error: OpError::InvalidName {
                                message: format!("'{destination}' has no parent"),
                            },
                        })
                        .await;
                    return;
                }
            };
            let name = display_name(&destination).to_string();

            let started = match resume_copy {
                Some(record) => engine
                    .copy
                    .resume_record(record)
                    .await
                    .map(|(job_id, events)| CopyOutcome::Streaming { job_id, events }),
                None => {
                    engine
                        .copy
                        .copy_with_job(
                            Some(job_id.clone()),
                            &source,
                            &dest_parent,
                            &name,
                            ConflictPolicy::Replace,
                            None,
                            false,
                        )
                        .await
                }
            };

            let copied = match started {
                Ok(CopyOutcome::Completed { location }) => Ok(location),
                Ok(CopyOutcome::Streaming { mut events, .. }) => {
                    let mut outcome = Err(OpError::Interrupted);
                    while let Some(event) = events.recv().await {
                        match event {
                            CopyEvent::Progress(progress) => {
                                let _ = tx.send(CopyEvent::Progress(progress)).await;
                            }
                            CopyEvent::Completed { location, .. } => outcome = Ok(location),
                            CopyEvent::Cancelled { .. } => outcome = Err(OpError::Cancelled),
                            CopyEvent::Failed { error, .. } => outcome = Err(error),
                        }
                    }
                    outcome
                }
                Err(err) => Err(err),
            };

            match copied {
                Ok(location) => {
                    delete_phase(&engine, &job_id, &source, &location, &tx).await;
                }
                Err(OpError::Cancelled) => {
                    // Inner copy already removed the partial destination.
                    let _ = engine.wal.remove(&job_id);
                    let _ = tx.send(CopyEvent::Cancelled { job_id }).await;
                }
                Err(error) => {
                    let _ = engine.wal.remove(&job_id);
                    let _ = tx.send(CopyEvent::Failed { job_id, error }).await;
                }
            }
        });
    }
}

struct MoveParts {
    router: BackendRouter,
    wal: Arc<WalDir<MoveWalRecord>>,
    copy: Arc<CopyEngine>,
}

/// Second phase: durable `DELETING` marker, then drop the source. A failed
/// delete rolls the destination back best-effort so at most one copy of the
/// object survives.
async fn delete_phase(
    engine: &MoveParts,
    job_id: &str,
    source: &str,
    destination: &str,
    tx: &mpsc::Sender<CopyEvent>,
) {
    let record = MoveWalRecord {
        job_id: job_id.to_string(),
        source: source.to_string(),
        destination: destination.to_string(),
        phase: MovePhase::Deleting,
    };
    if let Err(err) = engine.wal.write(job_id, &record) {
        let _ = tx
            .send(CopyEvent::Failed {
                job_id: job_id.to_string(),
                error: err,
            })
            .await;
        return;
    }

    let delete_result = match engine.router.backend_for(source) {
        Ok(backend) => {
            let source_owned = source.to_string();
            tokio::task::spawn_blocking(move || {
                if backend.exists(&source_owned) {
                    backend.delete(&source_owned)
                } else {
                    // Recovery retry: the delete already happened.
                    Ok(())
                }
            })
            .await
            .map_err(task_error)
            .and_then(|r| r)
        }
        Err(err) => Err(err),
    };

    match delete_result {
        Ok(()) => {
            let _ = engine.wal.remove(job_id);
            let _ = tx
                .send(CopyEvent::Completed {
                    job_id: job_id.to_string(),
                    location: destination.to_string(),
                })
                .await;
        }
        Err(error) => {
            warn!(source, %error, "source delete failed, rolling back destination");
            if let Ok(backend) = engine.router.backend_for(destination) {
                let dest_owned = destination.to_string();
                let _ = tokio::task::spawn_blocking(move || backend.delete(&dest_owned)).await;
            }
            let _ = engine.wal.remove(job_id);
            let _ = tx
                .send(CopyEvent::Failed {
                    job_id: job_id.to_string(),
                    error,
                })
                .await;
        }
    }
}
