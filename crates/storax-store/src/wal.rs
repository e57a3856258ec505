//! Per-job write-ahead log records for long-running copies and moves.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use storax_core::{fsync_dir, read_json, write_json_atomic, OpError, OpResult};

/// WAL record of an in-flight transactional copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyWalRecord {
    pub job_id: String,
    pub source: String,
    pub target: String,
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub is_directory: bool,
}

/// Phase of a cross-backend move transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovePhase {
    Copying,
    Deleting,
}

/// WAL record of an in-flight cross-backend move.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveWalRecord {
    pub job_id: String,
    pub source: String,
    pub destination: String,
    pub phase: MovePhase,
}

/// Directory of one WAL file per outstanding job, named `{job_id}.wal`.
pub struct WalDir<T> {
    dir: PathBuf,
    _record: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> WalDir<T> {
    pub fn open(dir: impl Into<PathBuf>) -> OpResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| OpError::io(dir.to_string_lossy(), e))?;
        Ok(Self {
            dir,
            _record: std::marker::PhantomData,
        })
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.wal"))
    }

    /// Atomically (re)write the record for a job.
    pub fn write(&self, job_id: &str, record: &T) -> OpResult<()> {
        let path = self.path_for(job_id);
        write_json_atomic(&path, record).map_err(|e| OpError::io(path.to_string_lossy(), e))
    }

    /// Load the record for a job, if present and parsable.
    pub fn load(&self, job_id: &str) -> Option<T> {
        read_json(&self.path_for(job_id))
    }

    /// Remove a job's record; absent files are fine.
    pub fn remove(&self, job_id: &str) -> OpResult<()> {
        let path = self.path_for(job_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                fsync_dir(&self.dir).map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?;
                debug!(job_id, "wal record removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OpError::io(path.to_string_lossy(), e)),
        }
    }

    /// Every record on disk as `(job_id, record)`; unparsable files are
    /// deleted on sight since they cannot be replayed.
    pub fn load_all(&self) -> OpResult<Vec<(String, T)>> {
        let mut result = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .map_err(|e| OpError::io(self.dir.to_string_lossy(), e))?
            .flatten()
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wal") {
                continue;
            }
            let job_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_json::<T>(&path) {
                Some(record) => result.push((job_id, record)),
                None => {
                    debug!(path = %path.display(), "dropping unparsable wal record");
                    let _ = fs::remove_file(&path);
                }
            }
        }
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    pub fn is_empty(&self) -> bool {
        self.load_all().map(|v| v.is_empty()).unwrap_or(true)
    }
}
