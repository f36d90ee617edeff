//! Wait objects: awaitable notification points.
//!
//! A wait object pairs an executor with a registration surface. Tasks park
//! on it with [`WaitObject::wait_cb`] or the future-returning `wait` helpers
//! on the concrete types, and some other party releases them with
//! [`WaitObject::notify_one`]. Every wait resolves with a [`WaitStatus`]
//! saying how it ended.

use std::sync::Arc;
use std::task::Waker;

use parking_lot::Mutex;

use crate::executor::ExecutorPtr;

mod simple;
mod timer;

pub use simple::SimpleWobj;
pub use timer::TimerWobj;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Released by `notify_one`.
    Notified,
    /// The wait's deadline passed first.
    Elapsed,
    /// Superseded by a newer registration, cancelled, or the wait object
    /// went away.
    Cancelled,
}

impl WaitStatus {
    pub fn is_notified(self) -> bool {
        self == WaitStatus::Notified
    }

    pub fn is_elapsed(self) -> bool {
        self == WaitStatus::Elapsed
    }

    pub fn is_cancelled(self) -> bool {
        self == WaitStatus::Cancelled
    }
}

/// Callback form of a wait registration.
pub type WaitFunc = Box<dyn FnOnce(WaitStatus) + Send + 'static>;

pub trait WaitObject {
    /// The executor completions are delivered through.
    fn executor(&self) -> &ExecutorPtr;

    /// Releases one waiter with [`WaitStatus::Notified`]. A notification
    /// with nobody registered is dropped.
    fn notify_one(&self);

    /// Registers a callback invoked exactly once when the wait ends.
    fn wait_cb(&self, cb: WaitFunc);
}

/// Completion slot shared between a wait future and its registered callback.
pub(crate) struct WaitShared {
    pub(crate) status: Option<WaitStatus>,
    pub(crate) waker: Option<Waker>,
}

impl WaitShared {
    pub(crate) fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(WaitShared {
            status: None,
            waker: None,
        }))
    }
}

/// Builds a [`WaitFunc`] that stores the status and wakes the awaiting task.
pub(crate) fn make_wait_cb(shared: Arc<Mutex<WaitShared>>) -> WaitFunc {
    Box::new(move |status| {
        let mut slot = shared.lock();
        slot.status = Some(status);
        let waker = slot.waker.take();
        drop(slot);
        if let Some(waker) = waker {
            waker.wake();
        }
    })
}

#[cfg(test)]
mod tests;
