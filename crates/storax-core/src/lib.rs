//! Core types and primitives for storax.
//!
//! This crate provides the fundamental data structures shared by every layer
//! of the engine: locations and backend classification, node records,
//! conflict policies, the error taxonomy, engine configuration, the conflict
//! resolver, and the durable-write file protocol.

mod atomic;
mod config;
mod conflict;
mod error;
mod location;
mod node;
mod policy;

pub use atomic::{fsync_dir, read_json, write_atomic, write_json_atomic};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use conflict::resolve_name;
pub use error::{OpError, OpResult};
pub use location::{display_name, join_location, parent_of, BackendKind, HANDLE_SCHEME};
pub use node::{Node, NodeType};
pub use policy::ConflictPolicy;
