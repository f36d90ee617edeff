//! Suspendable units of work.
//!
//! A [`Task`] wraps a future so callers can compose it, await it from
//! another task, or shield themselves from its panics with
//! [`Task::safe_result`]. Detached execution goes through [`spawn`],
//! serialized execution through [`splice`], and synchronous driving through
//! [`execute`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

pub mod frame;
mod generator;
mod iter;
mod spawn;

pub use generator::{Generator, Step, Yielder, generator};
pub use iter::GenIter;
pub use spawn::{execute, spawn, splice};

/// Outcome of a task observed through [`Task::safe_result`].
pub type TaskResult<T> = Result<T, TaskFailure>;

/// A composable unit of asynchronous work producing a `T`.
pub struct Task<T> {
    fut: Pin<Box<dyn Future<Output = T> + Send>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(task: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Task {
            fut: Box::pin(task),
        }
    }

    /// Adapts the task so awaiting it yields a [`TaskResult`] instead of
    /// propagating a panic into the awaiter.
    pub fn safe_result(self) -> SafeResult<T> {
        SafeResult { task: self }
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<T> {
        self.fut.as_mut().poll(cx)
    }
}

/// Future adapter that converts a task panic into a [`TaskFailure`].
pub struct SafeResult<T> {
    task: Task<T>,
}

impl<T> Future for SafeResult<T> {
    type Output = TaskResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match catch_unwind(AssertUnwindSafe(|| this.task.fut.as_mut().poll(cx))) {
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(TaskFailure { payload })),
        }
    }
}

/// A captured task panic.
pub struct TaskFailure {
    payload: Box<dyn Any + Send>,
}

impl TaskFailure {
    /// The panic message, when it was a string.
    pub fn message(&self) -> Option<&str> {
        panic_str(&self.payload)
    }

    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Rethrows the captured panic in the calling task.
    pub fn resume(self) -> ! {
        resume_unwind(self.payload)
    }
}

impl std::fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFailure")
            .field("message", &self.message())
            .finish()
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task panicked: {}", self.message().unwrap_or("<non-string payload>"))
    }
}

fn panic_str(payload: &Box<dyn Any + Send>) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Some(s)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    panic_str(payload).unwrap_or("<non-string payload>")
}
