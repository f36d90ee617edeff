//! Detached task frame: the schedulable half of a spawned task.
//!
//! A frame owns the task's future and the executor it was spawned on. Wakers
//! handed to the future are the frame itself; waking posts a resumption back
//! onto the executor, and [`Frame::resume`] polls the future on whichever
//! thread picked the post up.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context as TaskContext, Poll, Wake, Waker};

use parking_lot::Mutex;
use tracing::error;

use crate::executor::{ExecutorPtr, ExecutorScope};

pub type FrameHandle = Arc<Frame>;

/// No poll in flight, a resume may proceed.
const IDLE: u8 = 0;
/// A poll is running on some thread.
const POLLING: u8 = 1;
/// A wake arrived mid-poll; the polling thread reposts before going idle.
const REPOLL: u8 = 2;
/// The future completed, or was lost to a poison.
const DONE: u8 = 3;

pub struct Frame {
    fut: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send>>>>,
    executor: ExecutorPtr,
    state: AtomicU8,
}

impl Frame {
    pub(crate) fn new<F>(executor: ExecutorPtr, task: F) -> FrameHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Arc::new(Frame {
            fut: Mutex::new(Some(Box::pin(task))),
            executor,
            state: AtomicU8::new(IDLE),
        })
    }

    /// Polls the frame's future once on the calling thread.
    ///
    /// Concurrent resumes collapse onto the thread already polling: they
    /// flip the state to `REPOLL` and return, and that thread reposts the
    /// frame after restoring the future. This keeps the future polled by at
    /// most one thread at a time without blocking any of them.
    pub(crate) fn resume(self: Arc<Self>) {
        loop {
            match self
                .state
                .compare_exchange(IDLE, POLLING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(POLLING) => {
                    if self
                        .state
                        .compare_exchange(POLLING, REPOLL, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                    // State moved under us, decide again.
                }
                Err(_) => return,
            }
        }

        let Some(mut fut) = self.fut.lock().take() else {
            self.state.store(DONE, Ordering::Release);
            return;
        };

        let waker = Waker::from(self.clone());
        let mut cx = TaskContext::from_waker(&waker);
        let _scope = ExecutorScope::enter(self.executor.clone());

        match catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx))) {
            Ok(Poll::Ready(())) => {
                self.state.store(DONE, Ordering::Release);
            }
            Ok(Poll::Pending) => {
                *self.fut.lock() = Some(fut);
                let prev = self.state.swap(IDLE, Ordering::AcqRel);
                if prev == REPOLL {
                    let executor = self.executor.clone();
                    executor.post_resume(self);
                }
            }
            Err(payload) => {
                // A detached task has no awaiter left to observe the
                // failure. Tearing the process down is the contract.
                self.state.store(DONE, Ordering::Release);
                let msg = crate::task::panic_message(&payload);
                error!("detached task panicked: {msg}");
                std::process::abort();
            }
        }
    }
}

impl Wake for Frame {
    fn wake(self: Arc<Self>) {
        let executor = self.executor.clone();
        executor.post_resume(self);
    }
}
