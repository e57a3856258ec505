//! Directory listing and bounded breadth-first traversal.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use storax_backend::BackendRouter;
use storax_core::{BackendKind, Node, OpResult};

/// Non-recursive listing of a directory on either backend.
pub fn list_directory(router: &BackendRouter, target: &str) -> OpResult<Vec<Node>> {
    router.backend_for(target)?.list(target)
}

/// Breadth-first traversal up to `max_depth` levels (`-1` = unlimited),
/// with visited-set protection against symlink cycles.
pub fn traverse_directory(
    router: &BackendRouter,
    target: &str,
    max_depth: i32,
) -> OpResult<Vec<Node>> {
    let backend = router.backend_for(target)?;
    let mut visited = HashSet::new();
    let mut result = Vec::new();
    let mut queue = VecDeque::new();

    visited.insert(canonical_key(target));
    queue.push_back((target.to_string(), 0i32));

    while let Some((location, depth)) = queue.pop_front() {
        if max_depth >= 0 && depth >= max_depth {
            continue;
        }
        let Ok(children) = backend.list(&location) else {
            continue;
        };
        for child in children {
            let key = canonical_key(&child.location);
            if !visited.insert(key) {
                continue;
            }
            if child.is_directory {
                queue.push_back((child.location.clone(), depth + 1));
            }
            result.push(child);
        }
    }
    Ok(result)
}

/// Cycle-protection key: canonicalized for filesystem paths (symlinks can
/// alias), identity for handle URIs (already canonical).
fn canonical_key(location: &str) -> String {
    match BackendKind::of(location) {
        BackendKind::Path => Path::new(location)
            .canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| location.to_string()),
        BackendKind::Handle => location.to_string(),
    }
}
