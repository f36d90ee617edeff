//! Entry points for running tasks: detached, serialized, and synchronous.

use std::sync::Arc;

use anyhow::{Result, bail};
use parking_lot::Mutex;
use tracing::trace;

use crate::context::Context;
use crate::executor::ExecutorPtr;
use crate::task::frame::Frame;
use crate::task::{Task, TaskResult};

/// Spawns a detached task onto `executor`.
///
/// The task starts on the executor, not inline. A panic escaping a detached
/// task aborts the process.
pub fn spawn<F>(executor: &ExecutorPtr, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let frame = Frame::new(executor.clone(), task);
    trace!("spawning detached task");
    executor.post_resume(frame);
}

/// Spawns a detached task, requiring a serializing executor.
pub fn splice<F>(executor: &ExecutorPtr, task: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if !executor.is_strand() {
        bail!("splice requires a strand executor");
    }
    spawn(executor, task);
    Ok(())
}

/// Runs `task` to completion on a private context, blocking the calling
/// thread, and returns its output.
///
/// A panic inside the task is rethrown on the caller's thread.
pub fn execute<F>(task: F) -> F::Output
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let ctx = Context::new();
    let guard = ctx.make_work_guard();
    let outcome: Arc<Mutex<Option<TaskResult<F::Output>>>> = Arc::new(Mutex::new(None));

    let slot = outcome.clone();
    ctx.spawn(async move {
        // Holding the guard keeps the run loop alive across suspensions
        // that leave its queue empty.
        let mut guard = guard;
        let result = Task::new(task).safe_result().await;
        *slot.lock() = Some(result);
        guard.reset();
    });
    ctx.run();

    let result = outcome
        .lock()
        .take()
        .expect("executed task did not run to completion");
    match result {
        Ok(value) => value,
        Err(failure) => failure.resume(),
    }
}
