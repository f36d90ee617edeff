//! Keeps a context's run loop alive while outstanding work exists elsewhere.

use std::sync::Arc;

use crate::context::core::Core;

/// While active, [`Context::run`](crate::context::Context::run) blocks for
/// more work instead of returning when its queue drains. Dropping the guard
/// releases it.
pub struct WorkGuard {
    core: Option<Arc<Core>>,
}

impl WorkGuard {
    pub(crate) fn attach(core: Arc<Core>) -> Self {
        core.add_guard();
        WorkGuard { core: Some(core) }
    }

    /// Releases the guard early. Idempotent.
    pub fn reset(&mut self) {
        if let Some(core) = self.core.take() {
            core.release_guard();
        }
    }

    pub fn is_active(&self) -> bool {
        self.core.is_some()
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.reset();
    }
}
