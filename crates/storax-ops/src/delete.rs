//! Delete engine: trash move or permanent delete.

use std::sync::Arc;

use tracing::debug;

use storax_backend::BackendRouter;
use storax_core::OpResult;
use storax_store::TrashEntry;

use crate::lock::LockManager;
use crate::trash::TrashManager;
use crate::task_error;

pub struct DeleteEngine {
    router: BackendRouter,
    locks: Arc<LockManager>,
    trash: Arc<TrashManager>,
}

impl DeleteEngine {
    pub fn new(router: BackendRouter, locks: Arc<LockManager>, trash: Arc<TrashManager>) -> Self {
        Self {
            router,
            locks,
            trash,
        }
    }

    /// Park the node in the trash; returns the entry for undo registration.
    pub async fn to_trash(&self, location: &str) -> OpResult<TrashEntry> {
        let _lock = self.locks.acquire(&format!("delete::{location}")).await?;
        let entry = self.trash.move_to_trash(location).await?;
        debug!(location, parked = %entry.parked_location, "moved to trash");
        Ok(entry)
    }

    /// Delete a node outright, bypassing the trash.
    pub async fn permanent_delete(&self, location: &str) -> OpResult<()> {
        let _lock = self
            .locks
            .acquire(&format!("permanent_delete::{location}"))
            .await?;

        let backend = self.router.backend_for(location)?;
        let location_owned = location.to_string();
        tokio::task::spawn_blocking(move || backend.delete(&location_owned))
            .await
            .map_err(task_error)?
    }

    /// Purge a single trash entry (parked object plus index row).
    pub async fn permanent_delete_from_trash(&self, entry: &TrashEntry) -> OpResult<bool> {
        let _lock = self
            .locks
            .acquire(&format!("trash_delete::{}", entry.parked_location))
            .await?;
        self.trash.purge(entry).await
    }
}
