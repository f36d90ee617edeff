/// A guard that executes a closure when it goes out of scope.
///
/// The guard is "armed" on creation and runs its closure on drop unless it is
/// explicitly "disarmed". This covers cleanup on normal exit, early return and
/// unwinding alike.
pub(crate) struct ScopeGuard<F: FnOnce()> {
    // Wrapped in an `Option` so the closure can be taken out exactly once,
    // either on drop or on disarm.
    closure: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    pub(crate) fn new(closure: F) -> Self {
        ScopeGuard {
            closure: Some(closure),
        }
    }

    /// Prevents the closure from being executed on drop.
    #[allow(unused)]
    pub(crate) fn disarm(&mut self) {
        self.closure.take();
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }
}
