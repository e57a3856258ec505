//! Journal-guarded create engine.

use std::sync::Arc;

use tracing::debug;

use storax_backend::{BackendRouter, CreateOutcome};
use storax_core::{join_location, ConflictPolicy, NodeType, OpError, OpResult};
use storax_store::{Journal, JournalPayload};

use crate::lock::LockManager;
use crate::validate::validate_filename;
use crate::task_error;

/// Creates files and directories with conflict resolution, guarded by an
/// intent journal record.
pub struct CreateEngine {
    router: BackendRouter,
    journal: Arc<Journal>,
    locks: Arc<LockManager>,
}

impl CreateEngine {
    pub fn new(router: BackendRouter, journal: Arc<Journal>, locks: Arc<LockManager>) -> Self {
        Self {
            router,
            journal,
            locks,
        }
    }

    pub async fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<CreateOutcome> {
        validate_filename(name)?;
        if let Some(manual) = manual {
            validate_filename(manual)?;
        }

        let _lock = self
            .locks
            .acquire(&format!("create::{parent}/{name}"))
            .await?;

        let backend = self.router.backend_for(parent)?;
        let target = join_location(parent, name);
        let ticket = self.journal.begin(JournalPayload::Create {
            parent: parent.to_string(),
            name: name.to_string(),
            node_type,
            target: target.clone(),
        })?;

        let parent_owned = parent.to_string();
        let name_owned = name.to_string();
        let manual_owned = manual.map(str::to_string);
        let backend_for_task = Arc::clone(&backend);
        let result = tokio::task::spawn_blocking(move || {
            backend_for_task.create(
                &parent_owned,
                &name_owned,
                node_type,
                policy,
                manual_owned.as_deref(),
            )
        })
        .await
        .map_err(task_error)?;

        match result {
            Ok(outcome) => {
                ticket.commit()?;
                debug!(location = %outcome.location, "create committed");
                Ok(outcome)
            }
            Err(err) => {
                // A clean decline leaves the pre-state intact; only an
                // unknown outcome stays behind for recovery.
                match &err {
                    OpError::Io { .. } | OpError::PermissionDenied { .. } => ticket.abandon(),
                    _ => {
                        ticket.discard()?;
                    }
                }
                Err(err)
            }
        }
    }
}
