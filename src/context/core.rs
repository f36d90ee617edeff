//! Run loop core shared by a context and everything minted from it.
//!
//! The core owns the ready queue, the timer heap and the liveness counters.
//! Any number of threads may call [`Core::run`] concurrently; each pulls
//! work under the state lock and executes it unlocked. The loop exits when
//! the core is stopped or when no work, no guards and no pending waits
//! remain.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::executor::PostFn;
use crate::task::frame::FrameHandle;
use crate::timer::TimerState;

/// One queued unit of work.
pub(crate) enum Work {
    Call(PostFn),
    Resume(FrameHandle),
}

impl Work {
    pub(crate) fn run(self) {
        match self {
            Work::Call(func) => func(),
            Work::Resume(frame) => frame.resume(),
        }
    }
}

/// Heap entry for an armed timer deadline.
///
/// Entries are never removed eagerly; rearming a timer bumps its epoch and
/// the stale entry is discarded when popped. Ordering is reversed so the
/// std max-heap pops the earliest deadline, with the sequence number as a
/// FIFO tie-breaker.
struct TimerEntry {
    when: Instant,
    seq: u64,
    epoch: u64,
    timer: Weak<TimerState>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.when, other.seq).cmp(&(self.when, self.seq))
    }
}

struct CoreState {
    queue: VecDeque<Work>,
    stopped: bool,
    /// Active work guards keeping the loop alive with an empty queue.
    guards: usize,
    /// Wait callbacks parked on timers, also keeping the loop alive.
    pending_waits: usize,
    timers: BinaryHeap<TimerEntry>,
    timer_seq: u64,
    running_threads: Vec<ThreadId>,
}

pub(crate) struct Core {
    state: Mutex<CoreState>,
    idle: Condvar,
}

/// Next action decided under the state lock, executed after releasing it.
enum Step {
    Do(Work),
    Fire(Vec<(Arc<TimerState>, u64)>),
    Wait,
    Exit,
}

/// Registers the thread as running this core for `running_in_this_thread`.
struct RunScope<'a> {
    core: &'a Core,
}

impl<'a> RunScope<'a> {
    fn enter(core: &'a Core) -> Self {
        core.state.lock().running_threads.push(thread::current().id());
        RunScope { core }
    }
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        let id = thread::current().id();
        let mut state = self.core.state.lock();
        if let Some(pos) = state.running_threads.iter().position(|t| *t == id) {
            state.running_threads.swap_remove(pos);
        }
    }
}

impl Core {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Core {
            state: Mutex::new(CoreState {
                queue: VecDeque::new(),
                stopped: false,
                guards: 0,
                pending_waits: 0,
                timers: BinaryHeap::new(),
                timer_seq: 0,
                running_threads: Vec::new(),
            }),
            idle: Condvar::new(),
        })
    }

    pub(crate) fn post(&self, work: Work) {
        self.state.lock().queue.push_back(work);
        self.idle.notify_one();
    }

    /// Decides the next step. Callers must not hold the state lock.
    fn next_step(&self, block: bool) -> Step {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.stopped {
            return Step::Exit;
        }
        if let Some(work) = state.queue.pop_front() {
            return Step::Do(work);
        }
        let due = Self::take_due(&mut state, now);
        if !due.is_empty() {
            return Step::Fire(due);
        }
        if state.guards == 0 && state.pending_waits == 0 {
            return Step::Exit;
        }
        if !block {
            return Step::Exit;
        }
        Step::Wait
    }

    /// Pops every entry due at `now`, dropping stale and dead ones.
    fn take_due(state: &mut CoreState, now: Instant) -> Vec<(Arc<TimerState>, u64)> {
        let mut due = Vec::new();
        while state.timers.peek().is_some_and(|e| e.when <= now) {
            if let Some(entry) = state.timers.pop()
                && let Some(timer) = entry.timer.upgrade()
            {
                due.push((timer, entry.epoch));
            }
        }
        due
    }

    /// Runs work until the core stops or runs out of reasons to stay alive.
    /// Returns the number of work items executed on this thread.
    pub(crate) fn run(&self) -> usize {
        let _scope = RunScope::enter(self);
        let mut executed = 0;
        loop {
            match self.next_step(true) {
                Step::Do(work) => {
                    work.run();
                    executed += 1;
                }
                Step::Fire(due) => {
                    // Firing posts through the timer's strand back into this
                    // core, so the state lock must not be held here.
                    for (timer, epoch) in due {
                        timer.on_elapsed(epoch);
                    }
                }
                Step::Wait => self.idle_wait(),
                Step::Exit => break,
            }
        }
        executed
    }

    /// Runs ready work without blocking. Returns the number executed.
    pub(crate) fn poll(&self) -> usize {
        let _scope = RunScope::enter(self);
        let mut executed = 0;
        loop {
            match self.next_step(false) {
                Step::Do(work) => {
                    work.run();
                    executed += 1;
                }
                Step::Fire(due) => {
                    for (timer, epoch) in due {
                        timer.on_elapsed(epoch);
                    }
                }
                Step::Wait | Step::Exit => break,
            }
        }
        executed
    }

    fn idle_wait(&self) {
        let mut state = self.state.lock();
        // Recheck under the lock: work or a timer may have arrived between
        // the decision and reacquiring the lock here.
        let now = Instant::now();
        let woken = !state.queue.is_empty()
            || state.stopped
            || (state.guards == 0 && state.pending_waits == 0)
            || state.timers.peek().is_some_and(|e| e.when <= now);
        if woken {
            return;
        }
        match state.timers.peek().map(|e| e.when) {
            Some(when) => {
                let _ = self.idle.wait_until(&mut state, when);
            }
            None => self.idle.wait(&mut state),
        }
    }

    pub(crate) fn stop(&self) {
        self.state.lock().stopped = true;
        self.idle.notify_all();
    }

    pub(crate) fn stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub(crate) fn restart(&self) {
        self.state.lock().stopped = false;
    }

    pub(crate) fn add_guard(&self) {
        self.state.lock().guards += 1;
    }

    pub(crate) fn release_guard(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.guards > 0);
        state.guards -= 1;
        if state.guards == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn add_pending_wait(&self) {
        self.state.lock().pending_waits += 1;
    }

    pub(crate) fn sub_pending_waits(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.state.lock();
        debug_assert!(state.pending_waits >= n);
        state.pending_waits -= n;
        if state.pending_waits == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn push_timer(&self, when: Instant, timer: Weak<TimerState>, epoch: u64) {
        let mut state = self.state.lock();
        state.timer_seq += 1;
        let seq = state.timer_seq;
        state.timers.push(TimerEntry {
            when,
            seq,
            epoch,
            timer,
        });
        // The new deadline may be earlier than what a sleeper waits on.
        self.idle.notify_all();
    }

    pub(crate) fn running_in_this_thread(&self) -> bool {
        let id = thread::current().id();
        self.state.lock().running_threads.contains(&id)
    }
}
