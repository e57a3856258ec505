//! Progress records for long-running transfers.

use serde::{Deserialize, Serialize};

use storax_core::OpError;

/// Channel capacity for transfer event streams. A bounded channel gives the
/// consumer backpressure over the copy loop.
pub const OPERATION_CHANNEL_SIZE: usize = 100;

/// A single progress snapshot of a transfer job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProgress {
    pub job_id: String,
    pub source: String,
    pub target: String,
    pub copied_bytes: u64,
    pub total_bytes: u64,
}

impl CopyProgress {
    /// Progress in whole percent, clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.copied_bytes.saturating_mul(100) / self.total_bytes;
        pct.min(100) as u8
    }
}

/// Items of a transfer event stream. The stream is single-pass and finite:
/// exactly one terminal event ends it.
#[derive(Debug)]
pub enum CopyEvent {
    Progress(CopyProgress),
    Completed { job_id: String, location: String },
    Failed { job_id: String, error: OpError },
    Cancelled { job_id: String },
}

impl CopyEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}
