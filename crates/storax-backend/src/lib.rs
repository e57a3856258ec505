//! Storage backends for storax.
//!
//! The engines drive every storage through the same small capability set:
//! create, delete, rename, plus listing, stat, and sequential streams. Two
//! drivers satisfy it: [`PathBackend`] over filesystem paths and
//! [`HandleBackend`] over an opaque, permission-scoped document tree.

mod handle;
mod media;
mod path;
mod provider;
mod router;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use storax_core::{BackendKind, ConflictPolicy, Node, NodeType, OpResult};

pub use handle::HandleBackend;
pub use media::{is_media_name, MediaNotifier, NoopMediaNotifier};
pub use path::PathBackend;
pub use provider::{DirTreeProvider, DocMeta, DocumentProvider};
pub use router::BackendRouter;

/// Outcome of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    /// The name that survived conflict resolution.
    pub final_name: String,
    /// Location of the created node.
    pub location: String,
}

/// An opened destination stream together with its final location.
pub struct Sink {
    pub location: String,
    pub writer: Box<dyn Write + Send>,
}

/// Uniform contract over a concrete storage driver.
///
/// Backends own conflict resolution of the target name against their own
/// existence check, and never rename in place when the chosen name equals
/// the current one.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn exists(&self, location: &str) -> bool;

    fn stat(&self, location: &str) -> OpResult<Node>;

    /// Non-recursive listing, directories first, names ascending.
    fn list(&self, location: &str) -> OpResult<Vec<Node>>;

    fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<CreateOutcome>;

    /// Delete a node; directories are removed recursively.
    fn delete(&self, location: &str) -> OpResult<()>;

    /// Rename in place; returns the post-rename location.
    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String>;

    /// Atomically move a node under a different parent on the same backend;
    /// returns the new location. Fails (rather than degrading to copy) when
    /// the storage cannot move atomically, e.g. across filesystems.
    fn relocate(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String>;

    /// The backend's private parked-object area, created on demand.
    fn trash_area(&self) -> OpResult<String>;

    /// Total byte size: file length, or recursive sum for directories.
    fn size_of(&self, location: &str) -> OpResult<u64>;

    /// Sequential reader over a file's bytes.
    fn open_source(&self, location: &str) -> OpResult<Box<dyn Read + Send>>;

    /// Sequential writer creating (or truncating) `parent/name`.
    fn create_sink(&self, parent: &str, name: &str) -> OpResult<Sink>;
}
