//! Journal-guarded rename engine.

use std::sync::Arc;

use tracing::debug;

use storax_backend::BackendRouter;
use storax_core::{join_location, parent_of, ConflictPolicy, OpError, OpResult};
use storax_store::{Journal, JournalPayload};

use crate::lock::LockManager;
use crate::validate::validate_filename;
use crate::task_error;

/// Renames nodes in place, guarded by an intent journal record.
pub struct RenameEngine {
    router: BackendRouter,
    journal: Arc<Journal>,
    locks: Arc<LockManager>,
}

impl RenameEngine {
    pub fn new(router: BackendRouter, journal: Arc<Journal>, locks: Arc<LockManager>) -> Self {
        Self {
            router,
            journal,
            locks,
        }
    }

    /// Rename `source` to `new_name` within its parent; returns the
    /// post-rename location.
    pub async fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        validate_filename(new_name)?;
        if let Some(manual) = manual {
            validate_filename(manual)?;
        }

        let _lock = self.locks.acquire(&format!("rename::{source}")).await?;

        let backend = self.router.backend_for(source)?;
        let parent = parent_of(source).ok_or_else(|| OpError::InvalidName {
            message: format!("'{source}' has no parent"),
        })?;
        let ticket = self.journal.begin(JournalPayload::Rename {
            source: source.to_string(),
            new_name: new_name.to_string(),
            target: join_location(&parent, new_name),
        })?;

        let source_owned = source.to_string();
        let name_owned = new_name.to_string();
        let manual_owned = manual.map(str::to_string);
        let backend_for_task = Arc::clone(&backend);
        let result = tokio::task::spawn_blocking(move || {
            backend_for_task.rename(&source_owned, &name_owned, policy, manual_owned.as_deref())
        })
        .await
        .map_err(task_error)?;

        match result {
            Ok(location) => {
                ticket.commit()?;
                debug!(source, %location, "rename committed");
                Ok(location)
            }
            Err(err) => {
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
