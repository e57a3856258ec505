//! Trash index: a single JSON-array file of parked objects.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use storax_core::{read_json, write_json_atomic, BackendKind, OpError, OpResult};

/// One parked object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    /// Unique opaque id; also prefixes the parked name.
    pub id: String,
    pub display_name: String,
    pub backend_kind: BackendKind,
    pub is_directory: bool,
    /// Epoch milliseconds at park time.
    pub trashed_at: u64,
    pub size: Option<u64>,
    pub original_location: String,
    pub parked_location: String,
}

/// Mutex-serialized whole-file store of trash entries. Corrupt or partial
/// files parse to empty and are rewritten on the next mutation.
pub struct TrashStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TrashStore {
    pub fn open(path: impl Into<PathBuf>) -> OpResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| OpError::io(parent.to_string_lossy(), e))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Vec<TrashEntry> {
        read_json(&self.path).unwrap_or_default()
    }

    fn save(&self, entries: &[TrashEntry]) -> OpResult<()> {
        write_json_atomic(&self.path, &entries)
            .map_err(|e| OpError::io(self.path.to_string_lossy(), e))
    }

    /// All entries, oldest first.
    pub async fn list(&self) -> Vec<TrashEntry> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load();
        entries.sort_by_key(|e| e.trashed_at);
        entries
    }

    /// Append a new entry.
    pub async fn append(&self, entry: TrashEntry) -> OpResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load();
        entries.push(entry);
        self.save(&entries)
    }

    /// Remove the entry with the given id; returns whether it was present.
    pub async fn remove(&self, id: &str) -> OpResult<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }

    /// Replace the whole index, used after consistency sweeps.
    pub async fn replace(&self, entries: Vec<TrashEntry>) -> OpResult<()> {
        let _guard = self.lock.lock().await;
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, trashed_at: u64) -> TrashEntry {
        TrashEntry {
            id: id.to_string(),
            display_name: format!("{id}.txt"),
            backend_kind: BackendKind::Path,
            is_directory: false,
            trashed_at,
            size: Some(10),
            original_location: format!("/t/{id}.txt"),
            parked_location: format!("/trash/{id}_{id}.txt"),
        }
    }

    #[tokio::test]
    async fn test_append_list_remove() {
        let dir = TempDir::new().unwrap();
        let store = TrashStore::open(dir.path().join("trash_index.json")).unwrap();

        store.append(entry("b", 2)).await.unwrap();
        store.append(entry("a", 1)).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a"); // oldest first

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_index_parses_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trash_index.json");
        fs::write(&path, b"[{ torn").unwrap();

        let store = TrashStore::open(&path).unwrap();
        assert!(store.list().await.is_empty());

        // Next mutation rewrites a valid file.
        store.append(entry("a", 1)).await.unwrap();
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trash_index.json");
        {
            let store = TrashStore::open(&path).unwrap();
            store.append(entry("a", 1)).await.unwrap();
        }
        let store = TrashStore::open(&path).unwrap();
        assert_eq!(store.list().await.len(), 1);
    }
}
