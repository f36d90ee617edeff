//! Named worker thread pool for driving contexts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use weft::{Context, ThreadRunner};
//!
//! let ctx = Arc::new(Context::new());
//! let guard = ctx.make_work_guard();
//! let mut runner = ThreadRunner::new();
//! let worker = ctx.clone();
//! runner.start(2, "worker", move || {
//!     worker.run();
//! }).unwrap();
//! // ... post work, then release the guard and join.
//! drop(guard);
//! runner.join();
//! ```

use std::thread::{self, JoinHandle};

use anyhow::{Context as _, Result};
use tracing::error;

#[derive(Default)]
pub struct ThreadRunner {
    threads: Vec<JoinHandle<()>>,
}

impl ThreadRunner {
    pub fn new() -> Self {
        ThreadRunner::default()
    }

    /// Starts `n` named threads each running `run` to completion. A single
    /// thread takes `name` as is; several get a `:{index}` suffix; an empty
    /// name falls back to `weft-{index}`.
    pub fn start<F>(&mut self, n: usize, name: &str, run: F) -> Result<()>
    where
        F: Fn() + Clone + Send + 'static,
    {
        for i in 0..n {
            let thread_name = if name.is_empty() {
                format!("weft-{i}")
            } else if n == 1 {
                name.to_owned()
            } else {
                format!("{name}:{i}")
            };
            let run = run.clone();
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(run)
                .with_context(|| format!("failed to spawn thread {thread_name:?}"))?;
            self.threads.push(handle);
        }
        Ok(())
    }

    /// Joins every started thread. Panics on worker threads are logged,
    /// not propagated.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
            if handle.join().is_err() {
                error!("worker thread {name:?} panicked");
            }
        }
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl Drop for ThreadRunner {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    #[test]
    fn test_runs_closure_on_each_thread() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut runner = ThreadRunner::new();
        let c = counter.clone();
        runner
            .start(4, "bump", move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(runner.num_threads(), 4);
        runner.join();
        assert!(runner.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_single_thread_keeps_name() {
        let mut runner = ThreadRunner::new();
        runner
            .start(1, "solo", || {
                assert_eq!(std::thread::current().name(), Some("solo"));
            })
            .unwrap();
        runner.join();
    }

    #[test]
    fn test_join_survives_worker_panic() {
        let mut runner = ThreadRunner::new();
        runner.start(1, "doomed", || panic!("boom")).unwrap();
        runner.join();
        assert!(runner.is_empty());
    }
}
