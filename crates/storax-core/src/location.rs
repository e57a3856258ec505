//! Location strings and backend classification.

use serde::{Deserialize, Serialize};

/// URI scheme prefix identifying handle-backend locations.
pub const HANDLE_SCHEME: &str = "doc://";

/// Which storage driver a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Direct filesystem paths.
    Path,
    /// Opaque document-tree handles (`doc://` URIs).
    Handle,
}

impl BackendKind {
    /// Classify a location string by its scheme prefix.
    pub fn of(location: &str) -> Self {
        if location.starts_with(HANDLE_SCHEME) {
            Self::Handle
        } else {
            Self::Path
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Handle => write!(f, "handle"),
        }
    }
}

/// The final segment of a location, i.e. the display name of the node.
pub fn display_name(location: &str) -> &str {
    let trimmed = location.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// The parent location, or `None` at a root.
///
/// Handle URIs keep their `doc://<tree>` authority intact; a bare authority
/// has no parent.
pub fn parent_of(location: &str) -> Option<String> {
    let trimmed = location.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix(HANDLE_SCHEME) {
        let idx = rest.rfind('/')?;
        return Some(format!("{HANDLE_SCHEME}{}", &rest[..idx]));
    }
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        if trimmed.len() > 1 {
            return Some("/".to_string());
        }
        return None;
    }
    Some(trimmed[..idx].to_string())
}

/// Join a child name onto a parent location.
pub fn join_location(parent: &str, name: &str) -> String {
    let base = parent.trim_end_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}
