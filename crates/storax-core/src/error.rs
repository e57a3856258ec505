//! Error taxonomy for engine operations.

use thiserror::Error;

/// Result alias used across the engine.
pub type OpResult<T> = Result<T, OpError>;

/// Errors that can occur during file operations.
#[derive(Debug, Error)]
pub enum OpError {
    /// The addressed node does not exist.
    #[error("Not found: {location}")]
    NotFound { location: String },

    /// A node with the target name already exists.
    #[error("Already exists: {location}")]
    AlreadyExists { location: String },

    /// The backend refused access.
    #[error("Permission denied: {location}")]
    PermissionDenied { location: String },

    /// Lock acquisition timed out.
    #[error("Timed out acquiring lock '{key}'")]
    LockTimeout { key: String },

    /// The conflict resolver declined to produce a name.
    #[error("Target name '{name}' conflicts and the policy declined")]
    ConflictDeclined { name: String },

    /// Checksum or size verification failed after a transfer.
    #[error("Integrity mismatch between {source_path} and {target}")]
    IntegrityMismatch { source_path: String, target: String },

    /// The operation was cancelled by its controller.
    #[error("Operation cancelled")]
    Cancelled,

    /// A paused operation was never resumed before shutdown.
    #[error("Operation interrupted")]
    Interrupted,

    /// The backend cannot perform the requested capability.
    #[error("Backend does not support this operation: {message}")]
    BackendUnsupported { message: String },

    /// Invalid name or argument rejected before any mutation.
    #[error("Invalid name: {message}")]
    InvalidName { message: String },

    /// Generic I/O error with path context.
    #[error("I/O error at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

impl OpError {
    /// Classify an I/O error under the taxonomy, keeping location context.
    pub fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        let location = location.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { location },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { location },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { location },
            _ => Self::Io { location, source },
        }
    }

    /// Short stable code for the surface layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::ConflictDeclined { .. } => "CONFLICT_DECLINED",
            Self::IntegrityMismatch { .. } => "INTEGRITY_MISMATCH",
            Self::Cancelled => "CANCELLED",
            Self::Interrupted => "INTERRUPTED",
            Self::BackendUnsupported { .. } => "BACKEND_UNSUPPORTED",
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::Io { .. } => "IO_ERROR",
        }
    }
}
