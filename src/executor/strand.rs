//! Serialized sub-executor.
//!
//! A strand owns a FIFO of posted work and guarantees at most one item runs
//! at a time, in posting order, regardless of how many threads drive the
//! parent executor. It holds no thread of its own: whenever items are queued
//! and no drain is in flight, the strand posts a single drain job onto its
//! parent, and that job runs the queue dry.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::context::core::{Core, Work};
use crate::executor::{Engine, Executor, ExecutorPtr, PostFn, StrandPtr};
use crate::task::frame::FrameHandle;
use crate::utils::ScopeGuard;

pub(crate) struct StrandExecutor {
    parent: ExecutorPtr,
    core: Arc<Core>,
    queue: Mutex<StrandQueue>,
    /// Thread currently draining the queue, if any.
    active: Mutex<Option<ThreadId>>,
    weak_self: Weak<StrandExecutor>,
}

struct StrandQueue {
    items: VecDeque<Work>,
    /// A drain job is queued on or running in the parent.
    draining: bool,
}

impl StrandExecutor {
    pub(crate) fn create(parent: ExecutorPtr, core: Arc<Core>) -> StrandPtr {
        let strand = Arc::new_cyclic(|weak_self| StrandExecutor {
            parent,
            core,
            queue: Mutex::new(StrandQueue {
                items: VecDeque::new(),
                draining: false,
            }),
            active: Mutex::new(None),
            weak_self: weak_self.clone(),
        });
        StrandPtr::new(strand)
    }

    fn enqueue(&self, work: Work) {
        let mut queue = self.queue.lock();
        queue.items.push_back(work);
        if !queue.draining {
            queue.draining = true;
            drop(queue);
            self.schedule_drain();
        }
    }

    fn schedule_drain(&self) {
        let this = self
            .weak_self
            .upgrade()
            .expect("strand posted to while being dropped");
        self.parent.post(Box::new(move || this.drain()));
    }

    /// Runs queued items in order until the queue is observed empty.
    ///
    /// Items execute outside the queue lock so they may post back onto the
    /// strand without deadlocking. The cleanup guard also covers a panicking
    /// item: anything still queued gets a fresh drain job instead of being
    /// stranded behind a stale `draining` flag.
    fn drain(self: Arc<Self>) {
        *self.active.lock() = Some(thread::current().id());

        let this = self.clone();
        let cleanup = ScopeGuard::new(move || {
            *this.active.lock() = None;
            let mut queue = this.queue.lock();
            if queue.items.is_empty() {
                queue.draining = false;
            } else {
                drop(queue);
                this.schedule_drain();
            }
        });

        loop {
            let work = self.queue.lock().items.pop_front();
            match work {
                Some(work) => work.run(),
                None => break,
            }
        }

        drop(cleanup);
    }
}

impl Executor for StrandExecutor {
    fn post(&self, func: PostFn) {
        self.enqueue(Work::Call(func));
    }

    fn post_resume(&self, frame: FrameHandle) {
        self.enqueue(Work::Resume(frame));
    }

    fn is_strand(&self) -> bool {
        true
    }

    fn super_executor(&self) -> ExecutorPtr {
        self.parent.clone()
    }

    fn make_strand(&self) -> StrandPtr {
        let this = self
            .weak_self
            .upgrade()
            .expect("make_strand on a dropped strand");
        StrandPtr::new(this)
    }

    fn running_in_this_thread(&self) -> bool {
        *self.active.lock() == Some(thread::current().id())
    }

    fn as_engine(&self) -> Engine {
        Engine {
            core: self.core.clone(),
        }
    }
}
