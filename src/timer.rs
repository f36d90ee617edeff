//! Deadline primitive backing the timed wait objects.
//!
//! A [`Timer`] is bound to a strand so completions, cancellations and
//! expirations reach waiters in a single well-defined order. Arming the
//! timer bumps an epoch; deadline entries queued on the run loop carry the
//! epoch they were armed under and are ignored once it moves on, so a rearm
//! never has to chase its old entry through the heap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use crate::executor::{ExecutorPtr, StrandPtr};
use crate::timeout::Timeout;
use crate::wobj::{WaitFunc, WaitStatus};

pub struct Timer {
    state: Arc<TimerState>,
}

pub(crate) struct TimerState {
    strand: StrandPtr,
    core: Arc<crate::context::core::Core>,
    inner: Mutex<TimerInner>,
}

struct TimerInner {
    deadline: Option<Instant>,
    /// Bumped on every arm and disarm; stale heap entries compare unequal.
    epoch: u64,
    /// The current deadline has passed and waiters were released.
    fired: bool,
    waits: SmallVec<[WaitFunc; 2]>,
}

impl Timer {
    /// Builds a timer on a fresh strand over `executor`. When `executor` is
    /// itself a strand, the timer shares it.
    pub fn new(executor: &ExecutorPtr) -> Self {
        Timer::over_strand(executor.make_strand())
    }

    /// Builds a timer delivering through the given strand.
    pub fn over_strand(strand: StrandPtr) -> Self {
        let core = strand.as_engine().core;
        Timer {
            state: Arc::new(TimerState {
                strand,
                core,
                inner: Mutex::new(TimerInner {
                    deadline: None,
                    epoch: 0,
                    fired: false,
                    waits: SmallVec::new(),
                }),
            }),
        }
    }

    pub fn strand(&self) -> &StrandPtr {
        &self.state.strand
    }

    /// Arms the timer to expire after `d`, cancelling outstanding waits.
    /// Returns the number of waits cancelled.
    pub fn expire_after(&self, d: Duration) -> usize {
        self.arm(Some(Instant::now() + d))
    }

    /// Arms the timer to expire at `when`, cancelling outstanding waits.
    pub fn expire_at(&self, when: Instant) -> usize {
        self.arm(Some(when))
    }

    /// Disarms the deadline so waits block on notification alone.
    pub fn expire_never(&self) -> usize {
        self.arm(None)
    }

    /// Arms from a [`Timeout`]: infinite disarms, zero expires immediately.
    pub fn set_timeout(&self, timeout: Timeout) -> usize {
        match timeout.duration() {
            Some(d) => self.expire_after(d),
            None => self.expire_never(),
        }
    }

    /// The armed deadline, if any.
    pub fn expiry(&self) -> Option<Instant> {
        self.state.inner.lock().deadline
    }

    /// Releases every outstanding wait with [`WaitStatus::Cancelled`].
    pub fn cancel(&self) -> usize {
        self.state.fire_all(WaitStatus::Cancelled)
    }

    /// Releases the oldest outstanding wait with [`WaitStatus::Cancelled`].
    pub fn cancel_one(&self) -> usize {
        self.state.fire_one(WaitStatus::Cancelled)
    }

    /// Registers a wait released on expiry, cancellation or notification.
    /// Registration on an already elapsed deadline completes with
    /// [`WaitStatus::Elapsed`] on the next strand pass.
    pub fn wait_cb(&self, cb: WaitFunc) {
        let state = &self.state;
        let mut inner = state.inner.lock();
        if inner.fired && inner.deadline.is_some() {
            drop(inner);
            state.post(cb, WaitStatus::Elapsed);
            return;
        }
        inner.waits.push(cb);
        drop(inner);
        state.core.add_pending_wait();
    }

    fn arm(&self, deadline: Option<Instant>) -> usize {
        let state = &self.state;
        let mut inner = state.inner.lock();
        inner.epoch += 1;
        inner.fired = false;
        inner.deadline = deadline;
        let epoch = inner.epoch;
        let cancelled: SmallVec<[WaitFunc; 2]> = std::mem::take(&mut inner.waits);
        drop(inner);

        let count = cancelled.len();
        state.core.sub_pending_waits(count);
        for cb in cancelled {
            state.post(cb, WaitStatus::Cancelled);
        }
        if let Some(when) = deadline {
            state
                .core
                .push_timer(when, Arc::downgrade(&self.state), epoch);
        }
        count
    }

    pub(crate) fn state(&self) -> &Arc<TimerState> {
        &self.state
    }
}

impl TimerState {
    /// Delivers `status` to `cb` as a post on the strand, preserving the
    /// order of posts already queued there.
    fn post(&self, cb: WaitFunc, status: WaitStatus) {
        self.strand.post(Box::new(move || cb(status)));
    }

    pub(crate) fn fire_all(&self, status: WaitStatus) -> usize {
        let waits: SmallVec<[WaitFunc; 2]> = std::mem::take(&mut self.inner.lock().waits);
        let count = waits.len();
        self.core.sub_pending_waits(count);
        for cb in waits {
            self.post(cb, status);
        }
        count
    }

    pub(crate) fn fire_one(&self, status: WaitStatus) -> usize {
        let mut inner = self.inner.lock();
        if inner.waits.is_empty() {
            return 0;
        }
        let cb = inner.waits.remove(0);
        drop(inner);
        self.core.sub_pending_waits(1);
        self.post(cb, status);
        1
    }

    /// Invalidates the armed deadline without touching registered waits.
    pub(crate) fn disarm(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.deadline = None;
        inner.fired = false;
    }

    /// Run loop callback for a deadline entry armed under `epoch`.
    pub(crate) fn on_elapsed(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.fired || inner.deadline.is_none() {
            return;
        }
        inner.fired = true;
        let waits: SmallVec<[WaitFunc; 2]> = std::mem::take(&mut inner.waits);
        drop(inner);
        trace!(epoch, waiters = waits.len(), "timer elapsed");

        self.core.sub_pending_waits(waits.len());
        for cb in waits {
            self.post(cb, WaitStatus::Elapsed);
        }
    }
}

impl Drop for TimerState {
    fn drop(&mut self) {
        let waits: SmallVec<[WaitFunc; 2]> = std::mem::take(&mut self.inner.lock().waits);
        self.core.sub_pending_waits(waits.len());
        for cb in waits {
            self.post(cb, WaitStatus::Cancelled);
        }
    }
}
