//! Trash manager: parks deleted objects and enforces retention policies.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use storax_backend::{Backend, BackendRouter};
use storax_core::{parent_of, ConflictPolicy, EngineConfig, NodeType, OpError, OpResult};
use storax_store::{TrashEntry, TrashStore};

use crate::copy::transfer_node;
use crate::{now_ms, task_error};

/// Moves objects into the backend's private trash area and keeps the index
/// and the parked files eventually consistent.
pub struct TrashManager {
    store: Arc<TrashStore>,
    router: BackendRouter,
    config: EngineConfig,
}

impl TrashManager {
    pub fn new(store: Arc<TrashStore>, router: BackendRouter, config: EngineConfig) -> Self {
        Self {
            store,
            router,
            config,
        }
    }

    /// Park an object under `.storax_trash` on its own backend, append the
    /// index entry, and enforce age and quota policies.
    pub async fn move_to_trash(&self, location: &str) -> OpResult<TrashEntry> {
        let backend = self.router.backend_for(location)?;
        let location_owned = location.to_string();

        let entry = tokio::task::spawn_blocking(move || park(backend, location_owned))
            .await
            .map_err(task_error)??;

        self.store.append(entry.clone()).await?;
        self.enforce_policies().await?;
        Ok(entry)
    }

    /// Purge entries past the age limit, then evict oldest-first while the
    /// parked total exceeds the quota.
    pub async fn enforce_policies(&self) -> OpResult<()> {
        let entries = self.store.list().await;
        let now = now_ms();

        let mut kept = Vec::new();
        for entry in entries {
            if now.saturating_sub(entry.trashed_at) > self.config.trash_max_age_ms {
                debug!(id = %entry.id, name = %entry.display_name, "age eviction");
                self.purge(&entry).await?;
            } else {
                kept.push(entry);
            }
        }

        let mut total: u64 = kept.iter().filter_map(|e| e.size).sum();
        for entry in kept {
            if total <= self.config.trash_max_bytes {
                break;
            }
            debug!(id = %entry.id, name = %entry.display_name, total, "quota eviction");
            total = total.saturating_sub(entry.size.unwrap_or(0));
            self.purge(&entry).await?;
        }
        Ok(())
    }

    /// Remove the parked object (if the backend still has it) and drop the
    /// index row.
    pub async fn purge(&self, entry: &TrashEntry) -> OpResult<bool> {
        if let Ok(backend) = self.router.backend_for(&entry.parked_location) {
            let parked = entry.parked_location.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                if backend.exists(&parked) {
                    backend.delete(&parked)
                } else {
                    Ok(())
                }
            })
            .await
            .map_err(task_error)?;
            if let Err(err) = outcome {
                warn!(parked = %entry.parked_location, %err, "failed to delete parked object");
            }
        }
        self.store.remove(&entry.id).await
    }

    /// Put a parked object back at its original location, recreating the
    /// parent chain first. Best-effort on the handle backend.
    pub async fn restore(&self, entry: &TrashEntry) -> OpResult<()> {
        let backend = self.router.backend_for(&entry.parked_location)?;
        let entry_owned = entry.clone();

        tokio::task::spawn_blocking(move || unpark(backend, &entry_owned))
            .await
            .map_err(task_error)??;

        self.store.remove(&entry.id).await?;
        Ok(())
    }

    /// Index entries whose parked object still exists; stale rows are
    /// dropped from the index as they are discovered.
    pub async fn list(&self) -> OpResult<Vec<TrashEntry>> {
        let entries = self.store.list().await;
        let router = self.router.clone();
        let entries_checked = tokio::task::spawn_blocking(move || {
            let mut live = Vec::new();
            let mut dropped = false;
            for entry in entries {
                let present = router
                    .backend_for(&entry.parked_location)
                    .map(|b| b.exists(&entry.parked_location))
                    .unwrap_or(false);
                if present {
                    live.push(entry);
                } else {
                    debug!(id = %entry.id, "dropping index row without parked object");
                    dropped = true;
                }
            }
            (live, dropped)
        })
        .await
        .map_err(task_error)?;

        let (live, dropped) = entries_checked;
        if dropped {
            self.store.replace(live.clone()).await?;
        }
        Ok(live)
    }

    /// Purge every entry and sweep orphaned parked objects that have no
    /// index row. Returns the conjunction of outcomes.
    pub async fn empty(&self) -> OpResult<bool> {
        let entries = self.store.list().await;
        let mut all_ok = true;
        for entry in &entries {
            all_ok &= self.purge(entry).await.unwrap_or(false);
        }

        for backend in self.router.backends() {
            let ok = tokio::task::spawn_blocking(move || sweep_orphans(backend))
                .await
                .map_err(task_error)?;
            all_ok &= ok;
        }
        Ok(all_ok)
    }
}

fn park(backend: Arc<dyn Backend>, location: String) -> OpResult<TrashEntry> {
    let node = backend.stat(&location)?;
    let size = backend.size_of(&location).ok();
    let id = Uuid::new_v4().simple().to_string();
    let trash_area = backend.trash_area()?;
    let parked_name = format!("{id}_{}", node.name);

    // Rename keeps the park atomic; fall back to copy-then-delete when the
    // storage refuses (e.g. crossing filesystems into the trash area).
    let parked_location = match backend.relocate(
        &location,
        &trash_area,
        &parked_name,
        ConflictPolicy::Replace,
        None,
    ) {
        Ok(parked) => parked,
        Err(err) => {
            debug!(%location, %err, "rename into trash failed, copying");
            let parked = transfer_node(&*backend, &location, &*backend, &trash_area, &parked_name)?;
            backend.delete(&location)?;
            parked
        }
    };

    Ok(TrashEntry {
        id,
        display_name: node.name.to_string(),
        backend_kind: backend.kind(),
        is_directory: node.is_directory,
        trashed_at: now_ms(),
        size,
        original_location: location,
        parked_location,
    })
}

fn unpark(backend: Arc<dyn Backend>, entry: &TrashEntry) -> OpResult<()> {
    let parent = parent_of(&entry.original_location).ok_or_else(|| OpError::InvalidName {
        message: format!("'{}' has no parent", entry.original_location),
    })?;
    ensure_parent_chain(&*backend, &parent)?;

    // RenameNew never declines and never clobbers whatever took the
    // original name in the meantime.
    match backend.relocate(
        &entry.parked_location,
        &parent,
        &entry.display_name,
        ConflictPolicy::RenameNew,
        None,
    ) {
        Ok(_) => Ok(()),
        Err(err) => {
            debug!(parked = %entry.parked_location, %err, "rename restore failed, copying");
            transfer_node(
                &*backend,
                &entry.parked_location,
                &*backend,
                &parent,
                &entry.display_name,
            )?;
            backend.delete(&entry.parked_location)?;
            Ok(())
        }
    }
}

fn ensure_parent_chain(backend: &dyn Backend, location: &str) -> OpResult<()> {
    if backend.exists(location) {
        return Ok(());
    }
    let mut missing = Vec::new();
    let mut cursor = location.to_string();
    loop {
        missing.push(cursor.clone());
        match parent_of(&cursor) {
            Some(parent) if !backend.exists(&parent) => cursor = parent,
            _ => break,
        }
    }
    for dir in missing.iter().rev() {
        let parent = parent_of(dir).ok_or_else(|| OpError::NotFound {
            location: dir.clone(),
        })?;
        let name = storax_core::display_name(dir).to_string();
        match backend.create(&parent, &name, NodeType::Directory, ConflictPolicy::Fail, None) {
            Ok(_) => {}
            Err(OpError::ConflictDeclined { .. }) | Err(OpError::AlreadyExists { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn sweep_orphans(backend: Arc<dyn Backend>) -> bool {
    let Ok(area) = backend.trash_area() else {
        return false;
    };
    let Ok(children) = backend.list(&area) else {
        return false;
    };
    let mut ok = true;
    for child in children {
        debug!(location = %child.location, "purging orphaned parked object");
        ok &= backend.delete(&child.location).is_ok();
    }
    ok
}
