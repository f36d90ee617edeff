//! The executor seam between tasks and their scheduling backend.
//!
//! Everything that runs work implements [`Executor`]: the context's own
//! multi-threaded pool and every strand minted from it. Tasks never talk to
//! the run loop directly; they hold an [`ExecutorPtr`] and post closures or
//! frame resumptions through it.

use std::cell::RefCell;
use std::ops::Deref;
use std::sync::Arc;

use crate::context::core::Core;
use crate::task::frame::FrameHandle;

pub(crate) mod strand;

/// Type-erased unit of work handed to [`Executor::post`].
pub type PostFn = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to any executor.
pub type ExecutorPtr = Arc<dyn Executor>;

/// A scheduling surface tasks can be dispatched onto.
///
/// Implementations must be safe to post to from any thread. Whether posted
/// items may run concurrently is the implementation's call: the context
/// executor fans work out across its running threads while a strand
/// serializes everything behind it.
pub trait Executor: Send + Sync + 'static {
    /// Queue a closure for execution.
    fn post(&self, func: PostFn);

    /// Queue a suspended task frame for resumption.
    fn post_resume(&self, frame: FrameHandle);

    /// Whether this executor serializes all posted work.
    fn is_strand(&self) -> bool;

    /// The executor this one schedules onto. A strand returns its parent; a
    /// root executor returns itself.
    fn super_executor(&self) -> ExecutorPtr;

    /// Mint a strand over this executor. Calling this on a strand returns
    /// the strand itself.
    fn make_strand(&self) -> StrandPtr;

    /// Whether the calling thread is currently running work dispatched
    /// through this executor.
    fn running_in_this_thread(&self) -> bool;

    /// The underlying run loop engine this executor feeds.
    fn as_engine(&self) -> Engine;

    /// Keep the engine's run loop alive until the guard is reset.
    fn make_work_guard(&self) -> crate::context::WorkGuard {
        crate::context::WorkGuard::attach(self.as_engine().core)
    }
}

/// Handle to the run loop core behind an executor.
pub struct Engine {
    pub(crate) core: Arc<Core>,
}

/// An [`ExecutorPtr`] known to serialize its work.
///
/// The newtype carries the guarantee in the type so APIs that need ordered
/// dispatch, like [`Timer`](crate::timer::Timer), can demand it instead of
/// asserting at runtime.
#[derive(Clone)]
pub struct StrandPtr(ExecutorPtr);

impl StrandPtr {
    pub(crate) fn new(executor: ExecutorPtr) -> Self {
        debug_assert!(executor.is_strand());
        StrandPtr(executor)
    }

    pub fn as_executor(&self) -> &ExecutorPtr {
        &self.0
    }

    pub fn into_executor(self) -> ExecutorPtr {
        self.0
    }
}

impl Deref for StrandPtr {
    type Target = ExecutorPtr;

    fn deref(&self) -> &ExecutorPtr {
        &self.0
    }
}

thread_local! {
    static CURRENT_EXECUTOR: RefCell<Option<ExecutorPtr>> = const { RefCell::new(None) };
}

/// The executor driving the task currently polled on this thread, if any.
pub fn try_current() -> Option<ExecutorPtr> {
    CURRENT_EXECUTOR.with(|c| c.borrow().clone())
}

/// The executor driving the task currently polled on this thread.
///
/// # Panics
///
/// Panics when called outside of a task poll.
pub fn current() -> ExecutorPtr {
    try_current().expect("executor::current() called outside of a running task")
}

/// Installs an executor as the thread's current one for the duration of a
/// frame poll, restoring the previous value on drop.
pub(crate) struct ExecutorScope {
    prev: Option<ExecutorPtr>,
}

impl ExecutorScope {
    pub(crate) fn enter(executor: ExecutorPtr) -> Self {
        let prev = CURRENT_EXECUTOR.with(|c| c.borrow_mut().replace(executor));
        ExecutorScope { prev }
    }
}

impl Drop for ExecutorScope {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_EXECUTOR.with(|c| *c.borrow_mut() = prev);
    }
}
