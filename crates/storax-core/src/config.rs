//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the operation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// App-private data directory holding journal, WALs, undo, and trash.
    pub data_dir: PathBuf,

    /// Lock acquisition timeout in milliseconds.
    #[builder(default = "10_000")]
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Maximum undo stack depth; pushing past it drops the oldest entry.
    #[builder(default = "100")]
    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,

    /// Trash entries older than this are purged (milliseconds).
    #[builder(default = "30 * 24 * 60 * 60 * 1000")]
    #[serde(default = "default_trash_max_age_ms")]
    pub trash_max_age_ms: u64,

    /// Total parked bytes allowed before oldest-first eviction.
    #[builder(default = "5 * 1024 * 1024 * 1024")]
    #[serde(default = "default_trash_max_bytes")]
    pub trash_max_bytes: u64,

    /// Copy loop chunk size in bytes.
    #[builder(default = "512 * 1024")]
    #[serde(default = "default_copy_chunk_bytes")]
    pub copy_chunk_bytes: usize,

    /// Rewrite the copy WAL after at least this many new bytes.
    #[builder(default = "1024 * 1024")]
    #[serde(default = "default_wal_sync_bytes")]
    pub wal_sync_bytes: u64,

    /// Poll interval while a job is paused (milliseconds).
    #[builder(default = "100")]
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// Adaptive threshold when the write-speed probe fails (bytes).
    #[builder(default = "50 * 1024 * 1024")]
    #[serde(default = "default_fallback_threshold_bytes")]
    pub fallback_threshold_bytes: u64,

    /// Bytes written by the one-shot write-speed probe.
    #[builder(default = "5 * 1024 * 1024")]
    #[serde(default = "default_speed_probe_bytes")]
    pub speed_probe_bytes: u64,
}

fn default_lock_timeout_ms() -> u64 {
    10_000
}

fn default_undo_capacity() -> usize {
    100
}

fn default_trash_max_age_ms() -> u64 {
    30 * 24 * 60 * 60 * 1000
}

fn default_trash_max_bytes() -> u64 {
    5 * 1024 * 1024 * 1024
}

fn default_copy_chunk_bytes() -> usize {
    512 * 1024
}

fn default_wal_sync_bytes() -> u64 {
    1024 * 1024
}

fn default_pause_poll_ms() -> u64 {
    100
}

fn default_fallback_threshold_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_speed_probe_bytes() -> u64 {
    5 * 1024 * 1024
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref dir) = self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err("Data directory cannot be empty".to_string());
            }
        } else {
            return Err("Data directory is required".to_string());
        }
        if self.undo_capacity == Some(0) {
            return Err("Undo capacity must be at least 1".to_string());
        }
        if self.copy_chunk_bytes == Some(0) {
            return Err("Copy chunk size must be at least 1 byte".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create a config with defaults rooted at the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_timeout_ms: default_lock_timeout_ms(),
            undo_capacity: default_undo_capacity(),
            trash_max_age_ms: default_trash_max_age_ms(),
            trash_max_bytes: default_trash_max_bytes(),
            copy_chunk_bytes: default_copy_chunk_bytes(),
            wal_sync_bytes: default_wal_sync_bytes(),
            pause_poll_ms: default_pause_poll_ms(),
            fallback_threshold_bytes: default_fallback_threshold_bytes(),
            speed_probe_bytes: default_speed_probe_bytes(),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    /// Journal directory for pending create/rename records.
    pub fn journal_dir(&self) -> PathBuf {
        self.data_dir.join("storax_journal")
    }

    /// WAL directory for in-flight transactional copies.
    pub fn copy_wal_dir(&self) -> PathBuf {
        self.data_dir.join("copy_wal")
    }

    /// WAL directory for in-flight cross-backend moves.
    pub fn move_wal_dir(&self) -> PathBuf {
        self.data_dir.join("move_wal")
    }

    /// Directory holding the persisted undo and redo stacks.
    pub fn undo_dir(&self) -> PathBuf {
        self.data_dir.join("storax_undo")
    }

    /// Path of the trash index file.
    pub fn trash_index_path(&self) -> PathBuf {
        self.data_dir.join("trash_index.json")
    }

    /// Parked-object area for the path backend.
    pub fn trash_dir(&self) -> PathBuf {
        self.data_dir.join(".storax_trash")
    }

    /// Scratch area for the write-speed probe.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder().data_dir("/data").build().unwrap();
        assert_eq!(config.lock_timeout_ms, 10_000);
        assert_eq!(config.undo_capacity, 100);
        assert_eq!(config.copy_chunk_bytes, 512 * 1024);
        assert_eq!(config.trash_max_bytes, 5 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_builder_rejects_missing_data_dir() {
        assert!(EngineConfig::builder().build().is_err());
        assert!(EngineConfig::builder().data_dir("").build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = EngineConfig::builder()
            .data_dir("/data")
            .undo_capacity(0usize)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_paths() {
        let config = EngineConfig::new("/data");
        assert_eq!(config.journal_dir(), PathBuf::from("/data/storax_journal"));
        assert_eq!(config.copy_wal_dir(), PathBuf::from("/data/copy_wal"));
        assert_eq!(config.move_wal_dir(), PathBuf::from("/data/move_wal"));
        assert_eq!(config.undo_dir(), PathBuf::from("/data/storax_undo"));
        assert_eq!(
            config.trash_index_path(),
            PathBuf::from("/data/trash_index.json")
        );
        assert_eq!(config.trash_dir(), PathBuf::from("/data/.storax_trash"));
    }
}
