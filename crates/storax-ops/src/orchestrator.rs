//! Orchestrator: the engine facade.
//!
//! Owns every component, is the sole registrant of undo actions, emits
//! engine events after each method completion, and drains the journal and
//! WAL directories at startup before admitting new work.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use storax_backend::{BackendRouter, CreateOutcome};
use storax_core::{
    display_name, parent_of, BackendKind, ConflictPolicy, EngineConfig, Node, NodeType, OpError,
    OpResult,
};
use storax_store::{Journal, TrashEntry, TrashStore, UndoAction, UndoLog, WalDir};

use crate::copy::{CopyEngine, CopyOutcome};
use crate::create::CreateEngine;
use crate::delete::DeleteEngine;
use crate::job::JobRegistry;
use crate::list;
use crate::lock::LockManager;
use crate::move_op::{MoveEngine, MoveOutcome};
use crate::progress::CopyEvent;
use crate::recovery::recover_journal;
use crate::rename::RenameEngine;
use crate::trash::TrashManager;
use crate::{now_ms, task_error};

/// Server-to-client event channel items.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TransferProgress { job_id: String, percent: u8 },
    UndoStateChanged { can_undo: bool, can_redo: bool },
}

/// Result of starting a copy through the facade.
#[derive(Debug)]
pub enum CopyStarted {
    /// Quick path; already complete and verified.
    Completed { location: String },
    /// Transactional job running in the background; progress arrives on the
    /// event channel under this id.
    Job { job_id: String },
}

/// A transfer restored from its WAL; consuming `events` drives it.
pub struct RecoveredJob {
    pub job_id: String,
    pub events: mpsc::Receiver<CopyEvent>,
}

/// Outcome of startup recovery.
pub struct RecoveryReport {
    pub journal_resolved: usize,
    pub copies: Vec<RecoveredJob>,
    pub moves: Vec<RecoveredJob>,
}

pub struct Storax {
    config: EngineConfig,
    router: BackendRouter,
    jobs: Arc<JobRegistry>,
    journal: Arc<Journal>,
    undo: Arc<UndoLog>,
    trash: Arc<TrashManager>,
    create_engine: CreateEngine,
    rename_engine: RenameEngine,
    delete_engine: DeleteEngine,
    copy_engine: Arc<CopyEngine>,
    move_engine: MoveEngine,
    events: broadcast::Sender<EngineEvent>,
}

impl Storax {
    pub fn new(config: EngineConfig, router: BackendRouter) -> OpResult<Self> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| OpError::io(config.data_dir.to_string_lossy(), e))?;

        let locks = Arc::new(LockManager::new(config.lock_timeout()));
        let jobs = Arc::new(JobRegistry::new());
        let journal = Arc::new(Journal::open(config.journal_dir())?);
        let undo = Arc::new(UndoLog::open(config.undo_dir(), config.undo_capacity)?);
        let trash_store = Arc::new(TrashStore::open(config.trash_index_path())?);
        let trash = Arc::new(TrashManager::new(
            trash_store,
            router.clone(),
            config.clone(),
        ));
        let copy_wal = Arc::new(WalDir::open(config.copy_wal_dir())?);
        let move_wal = Arc::new(WalDir::open(config.move_wal_dir())?);

        let create_engine =
            CreateEngine::new(router.clone(), Arc::clone(&journal), Arc::clone(&locks));
        let rename_engine =
            RenameEngine::new(router.clone(), Arc::clone(&journal), Arc::clone(&locks));
        let delete_engine =
            DeleteEngine::new(router.clone(), Arc::clone(&locks), Arc::clone(&trash));
        let copy_engine = Arc::new(CopyEngine::new(
            config.clone(),
            router.clone(),
            Arc::clone(&locks),
            Arc::clone(&jobs),
            copy_wal,
        ));
        let move_engine = MoveEngine::new(
            router.clone(),
            Arc::clone(&locks),
            Arc::clone(&jobs),
            Arc::clone(&copy_engine),
            move_wal,
        );

        let (events, _) = broadcast::channel(256);

        Ok(Self {
            config,
            router,
            jobs,
            journal,
            undo,
            trash,
            create_engine,
            rename_engine,
            delete_engine,
            copy_engine,
            move_engine,
            events,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to the engine event channel.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    async fn emit_undo_state(&self) {
        self.emit(EngineEvent::UndoStateChanged {
            can_undo: self.undo.can_undo().await,
            can_redo: self.undo.can_redo().await,
        });
    }

    // ----- listing -----

    pub async fn list_directory(&self, target: &str) -> OpResult<Vec<Node>> {
        let router = self.router.clone();
        let target = target.to_string();
        tokio::task::spawn_blocking(move || list::list_directory(&router, &target))
            .await
            .map_err(task_error)?
    }

    pub async fn traverse_directory(&self, target: &str, max_depth: i32) -> OpResult<Vec<Node>> {
        let router = self.router.clone();
        let target = target.to_string();
        tokio::task::spawn_blocking(move || list::traverse_directory(&router, &target, max_depth))
            .await
            .map_err(task_error)?
    }

    // ----- short mutations -----

    pub async fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<CreateOutcome> {
        let result = self
            .create_engine
            .create(parent, name, node_type, policy, manual)
            .await;
        if let Ok(outcome) = &result {
            self.undo
                .register(UndoAction::Create {
                    location: outcome.location.clone(),
                    node_type,
                })
                .await?;
        }
        self.emit_undo_state().await;
        result
    }

    /// Returns the post-rename location.
    pub async fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let result = self
            .rename_engine
            .rename(source, new_name, policy, manual)
            .await;
        if let Ok(location) = &result {
            if location != source {
                self.undo
                    .register(UndoAction::Rename {
                        from: location.clone(),
                        to: source.to_string(),
                    })
                    .await?;
            }
        }
        self.emit_undo_state().await;
        result
    }

    // ----- copy -----

    pub async fn copy(
        &self,
        source: &str,
        destination_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
        force_progress: bool,
    ) -> OpResult<CopyStarted> {
        let result = self
            .copy_engine
            .copy_adaptive(
                source,
                destination_parent,
                new_name,
                policy,
                manual,
                force_progress,
            )
            .await;

        let started = match result {
            Ok(CopyOutcome::Completed { location }) => {
                self.undo
                    .register(UndoAction::Copy {
                        location: location.clone(),
                    })
                    .await?;
                Ok(CopyStarted::Completed { location })
            }
            Ok(CopyOutcome::Streaming { job_id, events }) => {
                self.spawn_copy_driver(events);
                Ok(CopyStarted::Job { job_id })
            }
            Err(err) => Err(err),
        };
        self.emit_undo_state().await;
        started
    }

    /// Consume a transfer stream in the background: forward progress to the
    /// event channel and register the undo action on completion.
    fn spawn_copy_driver(&self, mut events: mpsc::Receiver<CopyEvent>) {
        let broadcaster = self.events.clone();
        let undo = Arc::clone(&self.undo);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    CopyEvent::Progress(progress) => {
                        let _ = broadcaster.send(EngineEvent::TransferProgress {
                            job_id: progress.job_id.clone(),
                            percent: progress.percent(),
                        });
                    }
                    CopyEvent::Completed { location, .. } => {
                        let _ = undo.register(UndoAction::Copy { location }).await;
                        let _ = broadcaster.send(EngineEvent::UndoStateChanged {
                            can_undo: undo.can_undo().await,
                            can_redo: undo.can_redo().await,
                        });
                    }
                    CopyEvent::Cancelled { job_id } => {
                        debug!(%job_id, "copy cancelled");
                    }
                    CopyEvent::Failed { job_id, error } => {
                        debug!(%job_id, %error, "copy failed");
                    }
                }
            }
        });
    }

    pub fn cancel_copy(&self, job_id: &str) -> bool {
        self.jobs.cancel(job_id)
    }

    pub fn pause_copy(&self, job_id: &str) -> bool {
        self.jobs.pause(job_id)
    }

    pub fn resume_copy(&self, job_id: &str) -> bool {
        self.jobs.resume(job_id)
    }

    /// Ids of transfers currently in flight.
    pub fn active_jobs(&self) -> Vec<String> {
        self.jobs.active()
    }

    // ----- move -----

    /// Move to `dest_parent/new_name`; blocks until the transfer transaction
    /// finishes, emitting progress on the event channel along the way.
    /// Returns the final location.
    pub async fn move_item(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let result = self
            .drive_move(source, dest_parent, new_name, policy, manual)
            .await;
        if let Ok(location) = &result {
            self.undo
                .register(UndoAction::Move {
                    from: location.clone(),
                    to: source.to_string(),
                })
                .await?;
        }
        self.emit_undo_state().await;
        result
    }

    async fn drive_move(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        match self
            .move_engine
            .move_node(source, dest_parent, new_name, policy, manual)
            .await?
        {
            MoveOutcome::Completed { location } => Ok(location),
            MoveOutcome::Streaming { mut events, .. } => {
                let mut outcome = Err(OpError::Interrupted);
                while let Some(event) = events.recv().await {
                    match event {
                        CopyEvent::Progress(progress) => {
                            self.emit(EngineEvent::TransferProgress {
                                job_id: progress.job_id.clone(),
                                percent: progress.percent(),
                            });
                        }
                        CopyEvent::Completed { location, .. } => outcome = Ok(location),
                        CopyEvent::Cancelled { .. } => outcome = Err(OpError::Cancelled),
                        CopyEvent::Failed { error, .. } => outcome = Err(error),
                    }
                }
                outcome
            }
        }
    }

    // ----- delete and trash -----

    /// Move a node to the trash; the inverse is kept on the undo log.
    pub async fn delete(&self, target: &str) -> OpResult<()> {
        let result = self.delete_engine.to_trash(target).await;
        if let Ok(entry) = &result {
            self.undo
                .register(UndoAction::Delete {
                    original_location: entry.original_location.clone(),
                    parked_location: entry.parked_location.clone(),
                })
                .await?;
        }
        self.emit_undo_state().await;
        result.map(|_| ())
    }

    pub async fn permanently_delete(&self, path: &str) -> OpResult<()> {
        let result = self.delete_engine.permanent_delete(path).await;
        self.emit_undo_state().await;
        result
    }

    pub async fn list_trash(&self) -> OpResult<Vec<TrashEntry>> {
        self.trash.list().await
    }

    pub async fn restore_from_trash(&self, entry: &TrashEntry) -> OpResult<()> {
        let result = self.trash.restore(entry).await;
        self.emit_undo_state().await;
        result
    }

    pub async fn permanently_delete_from_trash(&self, entry: &TrashEntry) -> OpResult<bool> {
        let result = self.delete_engine.permanent_delete_from_trash(entry).await;
        self.emit_undo_state().await;
        result
    }

    /// Purge every trash entry; returns the conjunction of outcomes.
    pub async fn empty_trash(&self) -> OpResult<bool> {
        let result = self.trash.empty().await;
        self.emit_undo_state().await;
        result
    }

    // ----- undo/redo -----

    pub async fn undo(&self) -> bool {
        let result = self
            .undo
            .undo_last(|action| self.invert_action(action))
            .await
            .unwrap_or(false);
        self.emit_undo_state().await;
        result
    }

    pub async fn redo(&self) -> bool {
        let result = self
            .undo
            .redo_last(|action| self.replay_action(action))
            .await
            .unwrap_or(false);
        self.emit_undo_state().await;
        result
    }

    pub async fn can_undo(&self) -> bool {
        self.undo.can_undo().await
    }

    pub async fn can_redo(&self) -> bool {
        self.undo.can_redo().await
    }

    pub async fn undo_count(&self) -> usize {
        self.undo.undo_count().await
    }

    pub async fn redo_count(&self) -> usize {
        self.undo.redo_count().await
    }

    pub async fn clear_undo(&self) -> OpResult<()> {
        let result = self.undo.clear().await;
        self.emit_undo_state().await;
        result
    }

    /// Apply the inverse of a recorded action. `Rename`/`Move` store the
    /// post-operation side in `from`, so inversion re-runs the operation
    /// from `from` back to `to`.
    async fn invert_action(&self, action: UndoAction) -> bool {
        match action {
            UndoAction::Create { location, .. } | UndoAction::Copy { location } => {
                self.trash.move_to_trash(&location).await.is_ok()
            }
            UndoAction::Rename { from, to } => {
                let old_name = display_name(&to).to_string();
                self.rename_engine
                    .rename(&from, &old_name, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Move { from, to } => {
                let Some(parent) = parent_of(&to) else {
                    return false;
                };
                let name = display_name(&to).to_string();
                self.drive_move(&from, &parent, &name, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Delete {
                original_location,
                parked_location,
            } => match self.synthesize_entry(&original_location, &parked_location).await {
                Some(entry) => self.trash.restore(&entry).await.is_ok(),
                None => false,
            },
        }
    }

    /// Re-apply a previously undone action.
    async fn replay_action(&self, action: UndoAction) -> bool {
        match action {
            UndoAction::Create {
                location,
                node_type,
            } => {
                let Some(parent) = parent_of(&location) else {
                    return false;
                };
                let name = display_name(&location).to_string();
                self.create_engine
                    .create(&parent, &name, node_type, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Rename { from, to } => {
                let new_name = display_name(&from).to_string();
                self.rename_engine
                    .rename(&to, &new_name, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Move { from, to } => {
                let Some(parent) = parent_of(&from) else {
                    return false;
                };
                let name = display_name(&from).to_string();
                self.drive_move(&to, &parent, &name, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Copy { .. } => false,
            UndoAction::Delete {
                original_location, ..
            } => self.trash.move_to_trash(&original_location).await.is_ok(),
        }
    }

    /// Rebuild a trash entry from the locations recorded in a `Delete`
    /// action. The parked name carries the id as its prefix.
    async fn synthesize_entry(&self, original: &str, parked: &str) -> Option<TrashEntry> {
        let backend = self.router.backend_for(parked).ok()?;
        let parked_owned = parked.to_string();
        let node = tokio::task::spawn_blocking(move || backend.stat(&parked_owned))
            .await
            .ok()?
            .ok()?;

        let parked_name = display_name(parked);
        let id = parked_name.split('_').next()?.to_string();
        Some(TrashEntry {
            id,
            display_name: display_name(original).to_string(),
            backend_kind: BackendKind::of(parked),
            is_directory: node.is_directory,
            trashed_at: now_ms(),
            size: None,
            original_location: original.to_string(),
            parked_location: parked.to_string(),
        })
    }

    // ----- recovery -----

    /// Drain the journal, then restore every copy and move WAL into
    /// resumable streams. Call once at startup before new requests.
    pub async fn recover_pending_operations(&self) -> OpResult<RecoveryReport> {
        let journal_resolved = recover_journal(&self.journal, &self.router).await?;

        let move_jobs: HashSet<String> = self.move_engine.pending_job_ids()?;
        let copies = self
            .copy_engine
            .recover(&move_jobs)
            .await?
            .into_iter()
            .map(|(job_id, events)| RecoveredJob { job_id, events })
            .collect::<Vec<_>>();
        let moves = self
            .move_engine
            .recover()
            .await?
            .into_iter()
            .map(|(job_id, events)| RecoveredJob { job_id, events })
            .collect::<Vec<_>>();

        info!(
            journal_resolved,
            copies = copies.len(),
            moves = moves.len(),
            "recovery complete"
        );
        Ok(RecoveryReport {
            journal_resolved,
            copies,
            moves,
        })
    }

    /// Drive one recovered job to its terminal state, emitting progress.
    pub async fn drive_recovered(&self, mut job: RecoveredJob) -> OpResult<String> {
        let mut outcome = Err(OpError::Interrupted);
        while let Some(event) = job.events.recv().await {
            match event {
                CopyEvent::Progress(progress) => {
                    self.emit(EngineEvent::TransferProgress {
                        job_id: progress.job_id.clone(),
                        percent: progress.percent(),
                    });
                }
                CopyEvent::Completed { location, .. } => outcome = Ok(location),
                CopyEvent::Cancelled { .. } => outcome = Err(OpError::Cancelled),
                CopyEvent::Failed { error, .. } => outcome = Err(error),
            }
        }
        outcome
    }
}
