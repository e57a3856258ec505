//! Operation engines for storax.
//!
//! Each engine drives a backend through the durable transaction layer: the
//! journal guards short mutations, per-job WALs guard long transfers, the
//! trash manager parks deletions, and the orchestrator wires everything
//! together behind the public method surface.

mod copy;
mod create;
mod delete;
mod job;
mod list;
mod lock;
mod move_op;
mod orchestrator;
mod progress;
mod recovery;
mod rename;
mod speed;
mod trash;
mod validate;

pub use copy::{CopyEngine, CopyOutcome};
pub use create::CreateEngine;
pub use delete::DeleteEngine;
pub use job::{CopyControl, JobRegistry};
pub use list::{list_directory, traverse_directory};
pub use lock::{LockGuard, LockManager};
pub use move_op::{MoveEngine, MoveOutcome};
pub use orchestrator::{CopyStarted, EngineEvent, RecoveredJob, RecoveryReport, Storax};
pub use progress::{CopyEvent, CopyProgress, OPERATION_CHANNEL_SIZE};
pub use recovery::recover_journal;
pub use rename::RenameEngine;
pub use trash::TrashManager;
pub use validate::validate_filename;

/// Epoch milliseconds now.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Map a failed blocking task into the error taxonomy.
pub(crate) fn task_error(err: tokio::task::JoinError) -> storax_core::OpError {
    storax_core::OpError::Io {
        location: String::new(),
        source: std::io::Error::other(err),
    }
}
