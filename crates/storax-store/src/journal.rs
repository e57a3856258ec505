//! Intent journal for non-transactional mutations.
//!
//! Every create and rename writes an intent record before touching the
//! backend, marks it completed on success, and then deletes it. A record
//! that survives on disk therefore describes an operation whose outcome is
//! unknown and must be reconciled by recovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use storax_core::{fsync_dir, read_json, write_json_atomic, NodeType, OpError, OpResult};

/// Operation-specific journal payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalPayload {
    Create {
        parent: String,
        name: String,
        node_type: NodeType,
        /// Intended target location, used by recovery's presence check.
        target: String,
    },
    Rename {
        source: String,
        new_name: String,
        /// Intended post-rename location.
        target: String,
    },
}

/// One journal record, exactly as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub completed: bool,
    #[serde(flatten)]
    pub payload: JournalPayload,
}

/// Journal directory with monotonic record naming.
pub struct Journal {
    dir: PathBuf,
    seq: AtomicU64,
}

impl Journal {
    /// Open (creating if needed) the journal at `dir`, continuing the
    /// sequence after any records already present.
    pub fn open(dir: impl Into<PathBuf>) -> OpResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| OpError::io(dir.to_string_lossy(), e))?;

        let mut max_seq = 0u64;
        for entry in fs::read_dir(&dir)
            .map_err(|e| OpError::io(dir.to_string_lossy(), e))?
            .flatten()
        {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if let Ok(seq) = stem.parse::<u64>() {
                    max_seq = max_seq.max(seq);
                }
            }
        }

        Ok(Self {
            dir,
            seq: AtomicU64::new(max_seq + 1),
        })
    }

    /// Write an intent record; the returned ticket commits or abandons it.
    pub fn begin(&self, payload: JournalPayload) -> OpResult<JournalTicket> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("{seq:08}.json"));
        let record = JournalRecord {
            completed: false,
            payload,
        };
        write_json_atomic(&path, &record)
            .map_err(|e| OpError::io(path.to_string_lossy(), e))?;
        debug!(path = %path.display(), "journal intent recorded");
        Ok(JournalTicket { path, record })
    }

    /// Every record currently on disk; unparsable files yield `None`.
    pub fn entries(&self) -> OpResult<Vec<(PathBuf, Option<JournalRecord>)>> {
        let mut result = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?
            .flatten()
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record = read_json(&path);
            result.push((path, record));
        }
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    /// Remove a record file and fsync the directory.
    pub fn remove(&self, path: &Path) -> OpResult<()> {
        fs::remove_file(path).map_err(|e| OpError::io(path.to_string_lossy(), e))?;
        fsync_dir(&self.dir).map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?;
        Ok(())
    }

    /// Whether any records remain.
    pub fn is_empty(&self) -> bool {
        self.entries().map(|e| e.is_empty()).unwrap_or(true)
    }
}

/// Handle to an open journal record.
pub struct JournalTicket {
    path: PathBuf,
    record: JournalRecord,
}

impl JournalTicket {
    /// Mark the record completed, then delete it. Called after the backend
    /// mutation succeeded; a crash between the two steps is resolved by
    /// recovery, which discards completed records.
    pub fn commit(mut self) -> OpResult<()> {
        self.record.completed = true;
        write_json_atomic(&self.path, &self.record)
            .map_err(|e| OpError::io(self.path.to_string_lossy(), e))?;

        let dir = self.path.parent().map(Path::to_path_buf);
        fs::remove_file(&self.path).map_err(|e| OpError::io(self.path.to_string_lossy(), e))?;
        if let Some(dir) = dir {
            fsync_dir(&dir).map_err(|e| OpError::io(dir.to_string_lossy(), e))?;
        }
        Ok(())
    }

    /// Leave the record on disk for recovery to reconcile. Used when the
    /// backend call failed with an unknown outcome.
    pub fn abandon(self) {
        debug!(path = %self.path.display(), "journal record left for recovery");
    }

    /// Delete the record without marking it completed. Used when the backend
    /// call failed cleanly and the pre-state is known intact.
    pub fn discard(self) -> OpResult<()> {
        let dir = self.path.parent().map(Path::to_path_buf);
        fs::remove_file(&self.path).map_err(|e| OpError::io(self.path.to_string_lossy(), e))?;
        if let Some(dir) = dir {
            fsync_dir(&dir).map_err(|e| OpError::io(dir.to_string_lossy(), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_payload(target: &str) -> JournalPayload {
        JournalPayload::Create {
            parent: "/t".to_string(),
            name: "a.txt".to_string(),
            node_type: NodeType::File,
            target: target.to_string(),
        }
    }

    #[test]
    fn test_begin_commit_leaves_empty_dir() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();

        let ticket = journal.begin(create_payload("/t/a.txt")).unwrap();
        assert_eq!(journal.entries().unwrap().len(), 1);

        ticket.commit().unwrap();
        assert!(journal.is_empty());
    }

    #[test]
    fn test_abandoned_record_survives() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();

        journal.begin(create_payload("/t/a.txt")).unwrap().abandon();
        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 1);
        let record = entries[0].1.as_ref().unwrap();
        assert!(!record.completed);
    }

    #[test]
    fn test_sequence_continues_after_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let journal = Journal::open(dir.path()).unwrap();
            journal.begin(create_payload("/t/a.txt")).unwrap().abandon();
        }
        let journal = Journal::open(dir.path()).unwrap();
        journal.begin(create_payload("/t/b.txt")).unwrap().abandon();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].0 < entries[1].0);
    }

    #[test]
    fn test_unparsable_record_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        fs::write(dir.path().join("00000042.json"), b"garbage").unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].1.is_none());
    }

    #[test]
    fn test_rename_payload_round_trip() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();

        journal
            .begin(JournalPayload::Rename {
                source: "/t/x".to_string(),
                new_name: "y".to_string(),
                target: "/t/y".to_string(),
            })
            .unwrap()
            .abandon();

        let entries = journal.entries().unwrap();
        match &entries[0].1.as_ref().unwrap().payload {
            JournalPayload::Rename { source, target, .. } => {
                assert_eq!(source, "/t/x");
                assert_eq!(target, "/t/y");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
