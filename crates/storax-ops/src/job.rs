//! Registry of in-flight transfer jobs and their control flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// Cooperative control flags polled by the copy loop at chunk boundaries.
#[derive(Debug, Default)]
pub struct CopyControl {
    cancelled: AtomicBool,
    paused: AtomicBool,
}

impl CopyControl {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }
}

/// Concurrent map from job id to control flags.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Arc<CopyControl>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an opaque job id.
    pub fn new_job_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Register a fresh control for a job, replacing any stale one.
    pub fn register(&self, job_id: &str) -> Arc<CopyControl> {
        let control = Arc::new(CopyControl::default());
        self.jobs.insert(job_id.to_string(), Arc::clone(&control));
        control
    }

    pub fn deregister(&self, job_id: &str) {
        self.jobs.remove(job_id);
    }

    /// Flip the cancel flag; false for unknown jobs.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.jobs.get(job_id) {
            Some(control) => {
                control.cancel();
                true
            }
            None => false,
        }
    }

    /// Flip the pause flag; false for unknown jobs.
    pub fn pause(&self, job_id: &str) -> bool {
        match self.jobs.get(job_id) {
            Some(control) => {
                control.pause();
                true
            }
            None => false,
        }
    }

    /// Clear the pause flag; false for unknown jobs.
    pub fn resume(&self, job_id: &str) -> bool {
        match self.jobs.get(job_id) {
            Some(control) => {
                control.resume();
                true
            }
            None => false,
        }
    }

    /// Ids of all registered jobs.
    pub fn active(&self) -> Vec<String> {
        self.jobs.iter().map(|e| e.key().clone()).collect()
    }
}
