//! Persistent, bounded undo/redo log.
//!
//! Two stacks mirrored to disk as JSON arrays. Registering a new action
//! clears the redo stack; exceeding capacity drops the oldest undo entry.
//! Inversion is delegated to the caller: the log only moves entries between
//! stacks when the supplied closure reports success.

use std::collections::VecDeque;
use std::fs;
use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use storax_core::{read_json, write_json_atomic, NodeType, OpError, OpResult};

/// A reversible action. Every variant carries enough to be inverted without
/// consulting external state.
///
/// For `Rename` and `Move`, `from` holds the post-operation location and
/// `to` the pre-operation location; undo re-runs the operation from `from`
/// back to `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UndoAction {
    Create {
        location: String,
        node_type: NodeType,
    },
    Delete {
        original_location: String,
        parked_location: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Move {
        from: String,
        to: String,
    },
    Copy {
        location: String,
    },
}

#[derive(Debug, Default)]
struct Stacks {
    undo: VecDeque<UndoAction>,
    redo: Vec<UndoAction>,
}

/// Dual-stack undo log persisted under a single directory.
pub struct UndoLog {
    dir: PathBuf,
    capacity: usize,
    stacks: Mutex<Stacks>,
}

impl UndoLog {
    /// Open (creating if needed) the log at `dir` with the given capacity.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> OpResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| OpError::io(dir.to_string_lossy(), e))?;

        let undo: VecDeque<UndoAction> = read_json::<Vec<UndoAction>>(&dir.join("undo_stack.json"))
            .unwrap_or_default()
            .into();
        let redo: Vec<UndoAction> =
            read_json(&dir.join("redo_stack.json")).unwrap_or_default();

        Ok(Self {
            dir,
            capacity,
            stacks: Mutex::new(Stacks { undo, redo }),
        })
    }

    fn persist(&self, stacks: &Stacks) -> OpResult<()> {
        let undo: Vec<&UndoAction> = stacks.undo.iter().collect();
        write_json_atomic(&self.dir.join("undo_stack.json"), &undo)
            .map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?;
        write_json_atomic(&self.dir.join("redo_stack.json"), &stacks.redo)
            .map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?;
        Ok(())
    }

    /// Push a completed action; clears redo and evicts the oldest entry when
    /// over capacity.
    pub async fn register(&self, action: UndoAction) -> OpResult<()> {
        let mut stacks = self.stacks.lock().await;
        if stacks.undo.len() >= self.capacity {
            let dropped = stacks.undo.pop_front();
            debug!(?dropped, "undo log at capacity, dropping oldest");
        }
        stacks.undo.push_back(action);
        stacks.redo.clear();
        self.persist(&stacks)
    }

    /// Invert the most recent action. The closure receives the action and
    /// reports whether the inversion took effect; only then does the entry
    /// move to the redo stack. Returns `false` when there is nothing to undo
    /// or the inversion failed.
    pub async fn undo_last<F, Fut>(&self, invert: F) -> OpResult<bool>
    where
        F: FnOnce(UndoAction) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut stacks = self.stacks.lock().await;
        let Some(action) = stacks.undo.pop_back() else {
            return Ok(false);
        };

        if !invert(action.clone()).await {
            stacks.undo.push_back(action);
            return Ok(false);
        }

        stacks.redo.push(action);
        self.persist(&stacks)?;
        Ok(true)
    }

    /// Replay the most recently undone action; symmetric to [`Self::undo_last`].
    pub async fn redo_last<F, Fut>(&self, replay: F) -> OpResult<bool>
    where
        F: FnOnce(UndoAction) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut stacks = self.stacks.lock().await;
        let Some(action) = stacks.redo.pop() else {
            return Ok(false);
        };

        if !replay(action.clone()).await {
            stacks.redo.push(action);
            return Ok(false);
        }

        stacks.undo.push_back(action);
        self.persist(&stacks)?;
        Ok(true)
    }

    pub async fn can_undo(&self) -> bool {
        !self.stacks.lock().await.undo.is_empty()
    }

    pub async fn can_redo(&self) -> bool {
        !self.stacks.lock().await.redo.is_empty()
    }

    pub async fn undo_count(&self) -> usize {
        self.stacks.lock().await.undo.len()
    }

    pub async fn redo_count(&self) -> usize {
        self.stacks.lock().await.redo.len()
    }

    /// Drop both stacks.
    pub async fn clear(&self) -> OpResult<()> {
        let mut stacks = self.stacks.lock().await;
        stacks.undo.clear();
        stacks.redo.clear();
        self.persist(&stacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_action(location: &str) -> UndoAction {
        UndoAction::Create {
            location: location.to_string(),
            node_type: NodeType::File,
        }
    }

    #[tokio::test]
    async fn test_register_and_counts() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 10).unwrap();

        log.register(create_action("/t/a")).await.unwrap();
        log.register(create_action("/t/b")).await.unwrap();

        assert!(log.can_undo().await);
        assert!(!log.can_redo().await);
        assert_eq!(log.undo_count().await, 2);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 3).unwrap();

        for name in ["c1", "c2", "c3", "c4"] {
            log.register(create_action(name)).await.unwrap();
        }
        assert_eq!(log.undo_count().await, 3);

        // Oldest (c1) is gone; undoing drains c4, c3, c2 in that order.
        let mut seen = Vec::new();
        while log
            .undo_last(|action| {
                if let UndoAction::Create { location, .. } = &action {
                    seen.push(location.clone());
                }
                async { true }
            })
            .await
            .unwrap()
        {}
        assert_eq!(seen, vec!["c4", "c3", "c2"]);
    }

    #[tokio::test]
    async fn test_undo_moves_to_redo() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 10).unwrap();
        log.register(create_action("/t/a")).await.unwrap();

        assert!(log.undo_last(|_| async { true }).await.unwrap());
        assert_eq!(log.undo_count().await, 0);
        assert_eq!(log.redo_count().await, 1);

        assert!(log.redo_last(|_| async { true }).await.unwrap());
        assert_eq!(log.undo_count().await, 1);
        assert_eq!(log.redo_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_inversion_keeps_entry() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 10).unwrap();
        log.register(create_action("/t/a")).await.unwrap();

        assert!(!log.undo_last(|_| async { false }).await.unwrap());
        assert_eq!(log.undo_count().await, 1);
        assert_eq!(log.redo_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_clears_redo() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 10).unwrap();

        log.register(create_action("/t/a")).await.unwrap();
        log.undo_last(|_| async { true }).await.unwrap();
        assert_eq!(log.redo_count().await, 1);

        log.register(create_action("/t/b")).await.unwrap();
        assert_eq!(log.redo_count().await, 0);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let log = UndoLog::open(dir.path(), 10).unwrap();
            log.register(create_action("/t/a")).await.unwrap();
            log.register(UndoAction::Rename {
                from: "/t/y".to_string(),
                to: "/t/x".to_string(),
            })
            .await
            .unwrap();
            log.undo_last(|_| async { true }).await.unwrap();
        }

        let log = UndoLog::open(dir.path(), 10).unwrap();
        assert_eq!(log.undo_count().await, 1);
        assert_eq!(log.redo_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_undo_returns_false() {
        let dir = TempDir::new().unwrap();
        let log = UndoLog::open(dir.path(), 10).unwrap();
        assert!(!log.undo_last(|_| async { true }).await.unwrap());
        assert!(!log.redo_last(|_| async { true }).await.unwrap());
    }
}
