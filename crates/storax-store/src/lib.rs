//! Durable state for the storax engine.
//!
//! Four stores live here, each serialized by its own mutex and persisted
//! through the atomic write protocol: the journal of pending short
//! mutations, the dual-stack undo log, the trash index, and the per-job
//! write-ahead logs of long-running copies and moves.

mod journal;
mod trash;
mod undo;
mod wal;

pub use journal::{Journal, JournalPayload, JournalRecord, JournalTicket};
pub use trash::{TrashEntry, TrashStore};
pub use undo::{UndoAction, UndoLog};
pub use wal::{CopyWalRecord, MovePhase, MoveWalRecord, WalDir};
