//! Backend selection by location scheme.

use std::sync::Arc;

use storax_core::{BackendKind, OpError, OpResult};

use crate::Backend;

/// Routes each location to the backend that owns it.
#[derive(Clone)]
pub struct BackendRouter {
    path: Arc<dyn Backend>,
    handle: Option<Arc<dyn Backend>>,
}

impl BackendRouter {
    pub fn new(path: Arc<dyn Backend>, handle: Option<Arc<dyn Backend>>) -> Self {
        Self { path, handle }
    }

    /// The backend responsible for `location`.
    pub fn backend_for(&self, location: &str) -> OpResult<Arc<dyn Backend>> {
        match BackendKind::of(location) {
            BackendKind::Path => Ok(Arc::clone(&self.path)),
            BackendKind::Handle => self.handle.clone().ok_or(OpError::BackendUnsupported {
                message: "no handle backend configured".to_string(),
            }),
        }
    }

    /// Whether both locations resolve to the same backend.
    pub fn same_backend(&self, a: &str, b: &str) -> bool {
        BackendKind::of(a) == BackendKind::of(b)
    }

    /// Every configured backend.
    pub fn backends(&self) -> Vec<Arc<dyn Backend>> {
        let mut all = vec![Arc::clone(&self.path)];
        if let Some(handle) = &self.handle {
            all.push(Arc::clone(handle));
        }
        all
    }
}
