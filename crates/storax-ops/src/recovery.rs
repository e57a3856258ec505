//! Startup reconciliation of the intent journal.
//!
//! Runs once before new work is admitted. Each surviving record is resolved
//! by inspecting the filesystem state it describes; only a genuinely
//! ambiguous rename is left behind (with a diagnostic) for the next startup.

use std::sync::Arc;

use tracing::{debug, warn};

use storax_backend::BackendRouter;
use storax_core::{ConflictPolicy, OpResult};
use storax_store::{Journal, JournalPayload};

use crate::task_error;

/// Apply the journal decision table; returns how many records were resolved.
pub async fn recover_journal(journal: &Journal, router: &BackendRouter) -> OpResult<usize> {
    let entries = journal.entries()?;
    let mut resolved = 0usize;

    for (path, record) in entries {
        let Some(record) = record else {
            debug!(path = %path.display(), "removing unparsable journal record");
            journal.remove(&path)?;
            resolved += 1;
            continue;
        };

        if record.completed {
            debug!(path = %path.display(), "removing completed journal record");
            journal.remove(&path)?;
            resolved += 1;
            continue;
        }

        match record.payload {
            JournalPayload::Rename {
                source,
                new_name,
                target,
            } => {
                let backend = match router.backend_for(&source) {
                    Ok(backend) => backend,
                    Err(err) => {
                        warn!(%source, %err, "no backend for journaled rename");
                        continue;
                    }
                };
                let source_exists = backend.exists(&source);
                let target_exists = backend.exists(&target);

                match (source_exists, target_exists) {
                    (true, false) => {
                        // The rename never landed; re-drive it.
                        let backend_for_task = Arc::clone(&backend);
                        let src = source.clone();
                        let name = new_name.clone();
                        let outcome = tokio::task::spawn_blocking(move || {
                            backend_for_task.rename(&src, &name, ConflictPolicy::Replace, None)
                        })
                        .await
                        .map_err(task_error)?;
                        match outcome {
                            Ok(_) => {
                                debug!(%source, %target, "journaled rename re-driven");
                                journal.remove(&path)?;
                                resolved += 1;
                            }
                            Err(err) => warn!(%source, %err, "journaled rename retry failed"),
                        }
                    }
                    (false, true) => {
                        // Already effective.
                        journal.remove(&path)?;
                        resolved += 1;
                    }
                    (false, false) => {
                        // Neither side exists; nothing to reconcile.
                        journal.remove(&path)?;
                        resolved += 1;
                    }
                    (true, true) => {
                        warn!(
                            %source,
                            %target,
                            "ambiguous rename journal record, leaving for next startup"
                        );
                    }
                }
            }
            JournalPayload::Create {
                parent,
                name,
                node_type,
                target,
            } => {
                let backend = match router.backend_for(&parent) {
                    Ok(backend) => backend,
                    Err(err) => {
                        warn!(%parent, %err, "no backend for journaled create");
                        continue;
                    }
                };
                if backend.exists(&target) {
                    journal.remove(&path)?;
                    resolved += 1;
                    continue;
                }

                let backend_for_task = Arc::clone(&backend);
                let parent_owned = parent.clone();
                let name_owned = name.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    backend_for_task.create(
                        &parent_owned,
                        &name_owned,
                        node_type,
                        ConflictPolicy::Fail,
                        None,
                    )
                })
                .await
                .map_err(task_error)?;
                match outcome {
                    Ok(created) => {
                        debug!(location = %created.location, "journaled create re-driven");
                        journal.remove(&path)?;
                        resolved += 1;
                    }
                    Err(err) => warn!(%target, %err, "journaled create retry failed"),
                }
            }
        }
    }
    Ok(resolved)
}
