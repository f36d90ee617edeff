//! Wait object with an optional deadline, built on [`Timer`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use parking_lot::Mutex;

use crate::executor::{ExecutorPtr, StrandPtr};
use crate::timeout::Timeout;
use crate::timer::Timer;
use crate::wobj::{WaitFunc, WaitObject, WaitShared, WaitStatus, make_wait_cb};

/// A notification point whose waits can carry a deadline.
///
/// Each wait resolves [`Notified`](WaitStatus::Notified) when released by
/// [`notify_one`](WaitObject::notify_one) before the deadline,
/// [`Elapsed`](WaitStatus::Elapsed) when the deadline passes first, and
/// [`Cancelled`](WaitStatus::Cancelled) on [`TimerWobj::notify_all`] or
/// drop. All completions are serialized on the timer's strand.
pub struct TimerWobj {
    timer: Timer,
}

impl TimerWobj {
    /// Binds the wait object to the given strand.
    pub fn new(strand: StrandPtr) -> Self {
        TimerWobj {
            timer: Timer::over_strand(strand),
        }
    }

    /// Binds to a fresh strand over `executor`.
    pub fn from_executor(executor: &ExecutorPtr) -> Self {
        TimerWobj {
            timer: Timer::new(executor),
        }
    }

    /// Releases every waiter with [`WaitStatus::Cancelled`] and disarms the
    /// deadline.
    pub fn notify_all(&self) {
        let state = self.timer.state().clone();
        self.timer.strand().post(Box::new(move || {
            state.disarm();
            state.fire_all(WaitStatus::Cancelled);
        }));
    }

    /// Registers a wait bounded by `timeout`.
    pub fn wait_for_cb(&self, timeout: Timeout, cb: WaitFunc) {
        self.timer.set_timeout(timeout);
        self.timer.wait_cb(cb);
    }

    /// Awaits a notification with no deadline.
    pub fn wait(&self) -> TimerWait<'_> {
        self.wait_for(Timeout::never())
    }

    /// Awaits a notification for at most `timeout`.
    pub fn wait_for(&self, timeout: Timeout) -> TimerWait<'_> {
        TimerWait {
            wobj: self,
            timeout,
            shared: WaitShared::new(),
            registered: false,
        }
    }
}

impl WaitObject for TimerWobj {
    fn executor(&self) -> &ExecutorPtr {
        self.timer.strand().as_executor()
    }

    fn notify_one(&self) {
        let state = self.timer.state().clone();
        self.timer.strand().post(Box::new(move || {
            state.fire_one(WaitStatus::Notified);
        }));
    }

    fn wait_cb(&self, cb: WaitFunc) {
        self.timer.expire_never();
        self.timer.wait_cb(cb);
    }
}

pub struct TimerWait<'a> {
    wobj: &'a TimerWobj,
    timeout: Timeout,
    shared: Arc<Mutex<WaitShared>>,
    registered: bool,
}

impl Future for TimerWait<'_> {
    type Output = WaitStatus;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<WaitStatus> {
        let this = &mut *self;
        {
            let mut slot = this.shared.lock();
            if let Some(status) = slot.status.take() {
                return Poll::Ready(status);
            }
            slot.waker = Some(cx.waker().clone());
        }
        if !this.registered {
            this.registered = true;
            this.wobj
                .wait_for_cb(this.timeout, make_wait_cb(this.shared.clone()));
        }
        Poll::Pending
    }
}
