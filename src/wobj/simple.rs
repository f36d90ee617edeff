//! Single-waiter notification point without a deadline.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use parking_lot::Mutex;

use crate::executor::ExecutorPtr;
use crate::wobj::{WaitFunc, WaitObject, WaitShared, WaitStatus, make_wait_cb};

/// Holds at most one registered waiter. A fresh registration supersedes the
/// previous one, which completes with [`WaitStatus::Cancelled`]. Both
/// notification and cancellation are delivered as posts on the executor,
/// never inline.
pub struct SimpleWobj {
    executor: ExecutorPtr,
    slot: Arc<Mutex<Option<WaitFunc>>>,
}

impl SimpleWobj {
    pub fn new(executor: ExecutorPtr) -> Self {
        SimpleWobj {
            executor,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Awaits the next notification.
    pub fn wait(&self) -> SimpleWait<'_> {
        SimpleWait {
            wobj: self,
            shared: WaitShared::new(),
            registered: false,
        }
    }
}

impl WaitObject for SimpleWobj {
    fn executor(&self) -> &ExecutorPtr {
        &self.executor
    }

    fn notify_one(&self) {
        let slot = self.slot.clone();
        self.executor.post(Box::new(move || {
            if let Some(cb) = slot.lock().take() {
                cb(WaitStatus::Notified);
            }
        }));
    }

    fn wait_cb(&self, cb: WaitFunc) {
        let superseded = self.slot.lock().replace(cb);
        if let Some(old) = superseded {
            self.executor
                .post(Box::new(move || old(WaitStatus::Cancelled)));
        }
    }
}

pub struct SimpleWait<'a> {
    wobj: &'a SimpleWobj,
    shared: Arc<Mutex<WaitShared>>,
    registered: bool,
}

impl Future for SimpleWait<'_> {
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
            this.wobj.wait_cb(make_wait_cb(this.shared.clone()));
        }
        Poll::Pending
    }
}
