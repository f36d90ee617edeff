use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use super::*;
use crate::context::Context;
use crate::executor;
use crate::runner::ThreadRunner;
use crate::task::{execute, spawn};
use crate::timeout::Timeout;
use crate::timer::Timer;

assert_impl_all!(WaitStatus: Send, Sync, Copy);
assert_impl_all!(SimpleWobj: Send, Sync);
assert_impl_all!(TimerWobj: Send, Sync);

fn status_slot() -> (Arc<Mutex<Option<WaitStatus>>>, WaitFunc) {
    let slot = Arc::new(Mutex::new(None));
    let sink = slot.clone();
    (slot, Box::new(move |status| *sink.lock() = Some(status)))
}

#[test]
fn test_simple_wobj_notifies_registered_waiter() {
    let ctx = Context::new();
    let wobj = SimpleWobj::new(ctx.executor().clone());

    let (status, cb) = status_slot();
    wobj.wait_cb(cb);
    wobj.notify_one();
    ctx.poll();
    assert_eq!(*status.lock(), Some(WaitStatus::Notified));
}

#[test]
fn test_simple_wobj_supersedes_previous_waiter() {
    let ctx = Context::new();
    let wobj = SimpleWobj::new(ctx.executor().clone());

    let (first, cb1) = status_slot();
    let (second, cb2) = status_slot();
    wobj.wait_cb(cb1);
    wobj.wait_cb(cb2);
    wobj.notify_one();
    ctx.poll();
    assert_eq!(*first.lock(), Some(WaitStatus::Cancelled));
    assert_eq!(*second.lock(), Some(WaitStatus::Notified));
}

#[test]
fn test_simple_wobj_drops_notification_without_waiter() {
    let ctx = Context::new();
    let wobj = SimpleWobj::new(ctx.executor().clone());

    wobj.notify_one();
    ctx.poll();

    // The earlier notification must not leak into a later wait.
    let (status, cb) = status_slot();
    wobj.wait_cb(cb);
    ctx.poll();
    assert_eq!(*status.lock(), None);

    wobj.notify_one();
    ctx.poll();
    assert_eq!(*status.lock(), Some(WaitStatus::Notified));
}

#[test]
fn test_timer_wait_elapses() {
    let ctx = Context::new();
    let timer = Timer::new(ctx.executor());

    let (status, cb) = status_slot();
    timer.expire_after(Duration::from_millis(20));
    timer.wait_cb(cb);

    let started = Instant::now();
    // The pending wait keeps run alive until the deadline fires.
    ctx.run();
    assert_eq!(*status.lock(), Some(WaitStatus::Elapsed));
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_timer_cancel_releases_waiter() {
    let ctx = Context::new();
    let timer = Timer::new(ctx.executor());

    let (status, cb) = status_slot();
    timer.expire_after(Duration::from_secs(60));
    timer.wait_cb(cb);
    assert_eq!(timer.cancel(), 1);
    assert_eq!(timer.cancel(), 0);

    ctx.run();
    assert_eq!(*status.lock(), Some(WaitStatus::Cancelled));
}

#[test]
fn test_timer_rearm_cancels_outstanding_waits() {
    let ctx = Context::new();
    let timer = Timer::new(ctx.executor());

    let (first, cb) = status_slot();
    timer.expire_after(Duration::from_secs(60));
    timer.wait_cb(cb);
    assert_eq!(timer.expire_after(Duration::from_millis(10)), 1);

    let (second, cb) = status_slot();
    timer.wait_cb(cb);
    ctx.run();
    assert_eq!(*first.lock(), Some(WaitStatus::Cancelled));
    assert_eq!(*second.lock(), Some(WaitStatus::Elapsed));
}

#[test]
fn test_timer_armed_while_run_loop_idle() {
    let ctx = Arc::new(Context::new());
    let mut guard = ctx.make_work_guard();
    let run_ctx = ctx.clone();
    let handle = thread::spawn(move || run_ctx.run());
    // Let the run thread reach its idle wait with an empty timer heap.
    thread::sleep(Duration::from_millis(30));

    let timer = Timer::new(ctx.executor());
    let (status, cb) = status_slot();
    timer.expire_after(Duration::from_millis(1));
    timer.wait_cb(cb);

    let deadline = Instant::now() + Duration::from_secs(5);
    while status.lock().is_none() {
        assert!(Instant::now() < deadline, "armed timer never fired");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(*status.lock(), Some(WaitStatus::Elapsed));

    guard.reset();
    handle.join().unwrap();
}

#[test]
fn test_timer_drop_cancels_waiter() {
    let ctx = Context::new();
    let timer = Timer::new(ctx.executor());

    let (status, cb) = status_slot();
    timer.expire_after(Duration::from_secs(60));
    timer.wait_cb(cb);
    drop(timer);

    ctx.run();
    assert_eq!(*status.lock(), Some(WaitStatus::Cancelled));
}

#[test]
fn test_timer_wobj_wait_times_out() {
    let status = execute(async {
        let wobj = TimerWobj::from_executor(&executor::current());
        wobj.wait_for(Timeout::after_ms(20)).await
    });
    assert!(status.is_elapsed());
}

#[test]
fn test_timer_wobj_no_wait_checks_without_blocking() {
    let started = Instant::now();
    let status = execute(async {
        let wobj = TimerWobj::from_executor(&executor::current());
        wobj.wait_for(crate::timeout::NO_WAIT).await
    });
    assert!(status.is_elapsed());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_timer_wobj_notify_beats_deadline() {
    let started = Instant::now();
    let status = execute(async {
        let ex = executor::current();
        let wobj = Arc::new(TimerWobj::from_executor(&ex));
        let notifier = wobj.clone();
        spawn(&ex, async move {
            notifier.notify_one();
        });
        wobj.wait_for(Timeout::after_ms(10_000)).await
    });
    assert!(status.is_notified());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_timer_wobj_notified_expiry_does_not_refire() {
    let ctx = Context::new();
    let wobj = TimerWobj::from_executor(ctx.executor());

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    wobj.wait_for_cb(
        Timeout::after_ms(20),
        Box::new(move |status| sink.lock().push(status)),
    );
    wobj.notify_one();
    ctx.run();
    assert_eq!(*statuses.lock(), vec![WaitStatus::Notified]);

    // Let the superseded deadline pass; draining its expiry must not
    // deliver a second wake.
    thread::sleep(Duration::from_millis(30));
    ctx.run();
    assert_eq!(*statuses.lock(), vec![WaitStatus::Notified]);
}

#[test]
fn test_timer_wobj_notify_all_cancels() {
    let status = execute(async {
        let ex = executor::current();
        let wobj = Arc::new(TimerWobj::from_executor(&ex));
        let canceller = wobj.clone();
        spawn(&ex, async move {
            canceller.notify_all();
        });
        wobj.wait().await
    });
    assert!(status.is_cancelled());
}

struct Worker {
    wobj: TimerWobj,
    a: AtomicI32,
    b: AtomicI32,
    result: AtomicI32,
    request: AtomicBool,
    result_ready: AtomicBool,
    finished: AtomicBool,
}

#[test]
fn test_worker_thread_scenario() {
    let ctx = Arc::new(Context::new());
    let mut guard = ctx.make_work_guard();

    let mut runner = ThreadRunner::new();
    let run_ctx = ctx.clone();
    runner
        .start(1, "worker", move || {
            run_ctx.run();
        })
        .unwrap();

    let worker = Arc::new(Worker {
        wobj: TimerWobj::new(ctx.make_strand()),
        a: AtomicI32::new(0),
        b: AtomicI32::new(0),
        result: AtomicI32::new(0),
        request: AtomicBool::new(false),
        result_ready: AtomicBool::new(false),
        finished: AtomicBool::new(false),
    });

    let w = worker.clone();
    ctx.spawn(async move {
        loop {
            // The deadline bounds each pass so a request posted before the
            // wait registered still gets picked up.
            w.wobj.wait_for(Timeout::after_ms(100)).await;
            if !w.request.swap(false, Ordering::SeqCst) {
                continue;
            }
            let a = w.a.load(Ordering::SeqCst);
            let b = w.b.load(Ordering::SeqCst);
            if a == 0 && b == 0 {
                w.finished.store(true, Ordering::SeqCst);
                break;
            }
            w.result.store(a + b, Ordering::SeqCst);
            w.result_ready.store(true, Ordering::SeqCst);
        }
    });

    let w = worker.clone();
    let last = execute(async move {
        let pacer = TimerWobj::from_executor(&executor::current());
        for (a, b, expect) in [(7, 8, 15), (20, 30, 50)] {
            w.a.store(a, Ordering::SeqCst);
            w.b.store(b, Ordering::SeqCst);
            w.request.store(true, Ordering::SeqCst);
            w.wobj.notify_one();
            while !w.result_ready.swap(false, Ordering::SeqCst) {
                pacer.wait_for(Timeout::after_ms(10)).await;
            }
            assert_eq!(w.result.load(Ordering::SeqCst), expect);
        }

        // A zero request shuts the worker down.
        w.a.store(0, Ordering::SeqCst);
        w.b.store(0, Ordering::SeqCst);
        w.request.store(true, Ordering::SeqCst);
        w.wobj.notify_one();
        while !w.finished.load(Ordering::SeqCst) {
            pacer.wait_for(Timeout::after_ms(10)).await;
        }
        w.a.load(Ordering::SeqCst) + w.b.load(Ordering::SeqCst)
    });
    assert_eq!(last, 0);

    guard.reset();
    runner.join();
}
