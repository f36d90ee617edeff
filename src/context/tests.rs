use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use super::*;
use crate::runner::ThreadRunner;

assert_impl_all!(Context: Send, Sync);
assert_impl_all!(WorkGuard: Send);

#[test]
fn test_run_executes_posted_work() {
    let ctx = Context::new();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let hits = hits.clone();
        ctx.executor().post(Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }));
    }
    assert_eq!(ctx.run(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn test_poll_does_not_block() {
    let ctx = Context::new();
    let _guard = ctx.make_work_guard();
    // With an active guard, run would block; poll returns once drained.
    let hit = Arc::new(AtomicBool::new(false));
    let flag = hit.clone();
    ctx.executor().post(Box::new(move || {
        flag.store(true, Ordering::SeqCst);
    }));
    assert_eq!(ctx.poll(), 1);
    assert!(hit.load(Ordering::SeqCst));
    assert_eq!(ctx.poll(), 0);
}

#[test]
fn test_stop_and_restart() {
    let ctx = Context::new();
    ctx.stop();
    assert!(ctx.stopped());
    ctx.executor().post(Box::new(|| {}));
    assert_eq!(ctx.run(), 0);

    ctx.restart();
    assert!(!ctx.stopped());
    assert_eq!(ctx.run(), 1);
}

#[test]
fn test_work_guard_keeps_run_alive() {
    let ctx = Arc::new(Context::new());
    let mut guard = ctx.make_work_guard();
    assert!(guard.is_active());

    let runner_ctx = ctx.clone();
    let handle = thread::spawn(move || runner_ctx.run());
    thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());

    guard.reset();
    assert!(!guard.is_active());
    handle.join().unwrap();
}

#[test]
fn test_registry_attach_get_detach() {
    let ctx = Context::new();
    ctx.attach("config", Arc::new(41_i32)).unwrap();

    assert!(ctx.attach("config", Arc::new(0_i32)).is_err());
    assert_eq!(ctx.get_as::<i32>("config").as_deref(), Some(&41));
    assert!(ctx.get_as::<String>("config").is_none());
    assert!(ctx.get("missing").is_none());

    let detached = ctx.detach("config").unwrap();
    assert_eq!(detached.downcast_ref::<i32>(), Some(&41));
    assert!(ctx.get("config").is_none());
    // Freed up for reuse.
    ctx.attach("config", Arc::new(7_i32)).unwrap();
}

#[test]
fn test_strand_serializes_and_preserves_order() {
    let ctx = Arc::new(Context::new());
    let mut guard = ctx.make_work_guard();

    let mut runner = ThreadRunner::new();
    let run_ctx = ctx.clone();
    runner
        .start(4, "pool", move || {
            run_ctx.run();
        })
        .unwrap();

    let strand = ctx.make_strand();
    let order = Arc::new(Mutex::new(Vec::new()));
    let inside = Arc::new(AtomicBool::new(false));
    const N: usize = 500;
    for i in 0..N {
        let order = order.clone();
        let inside = inside.clone();
        strand.post(Box::new(move || {
            assert!(!inside.swap(true, Ordering::SeqCst), "strand ran twice at once");
            order.lock().push(i);
            inside.store(false, Ordering::SeqCst);
        }));
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while order.lock().len() < N {
        assert!(Instant::now() < deadline, "strand work did not complete");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(*order.lock(), (0..N).collect::<Vec<_>>());

    guard.reset();
    runner.join();
}

#[test]
fn test_running_in_this_thread() {
    let ctx = Arc::new(Context::new());
    assert!(!ctx.executor().running_in_this_thread());

    let probe = ctx.clone();
    let observed = Arc::new(AtomicBool::new(false));
    let flag = observed.clone();
    ctx.executor().post(Box::new(move || {
        flag.store(probe.executor().running_in_this_thread(), Ordering::SeqCst);
    }));
    ctx.run();
    assert!(observed.load(Ordering::SeqCst));
}

#[test]
fn test_make_strand_on_strand_is_identity() {
    let ctx = Context::new();
    let strand = ctx.make_strand();
    let again = strand.make_strand();
    assert!(Arc::ptr_eq(strand.as_executor(), again.as_executor()));
}

#[test]
fn test_strand_super_executor_is_context_executor() {
    let ctx = Context::new();
    let strand = ctx.make_strand();
    assert!(strand.is_strand());
    assert!(!ctx.executor().is_strand());
    assert!(Arc::ptr_eq(&strand.super_executor(), ctx.executor()));
    // The root executor is its own super executor.
    assert!(Arc::ptr_eq(&ctx.executor().super_executor(), ctx.executor()));
}

#[test]
fn test_distinct_strands_from_one_context() {
    let ctx = Context::new();
    let a = ctx.make_strand();
    let b = ctx.make_strand();
    assert!(!Arc::ptr_eq(a.as_executor(), b.as_executor()));
}
