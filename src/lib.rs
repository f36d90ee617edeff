//! Embeddable asynchronous execution runtime.
//!
//! weft runs suspendable tasks over an engine the host application drives
//! itself: threads are donated to a [`Context`] by calling [`Context::run`],
//! and everything else flows through executors minted from it.
//!
//! The pieces:
//!
//! - [`Context`]: the run loop, with [`WorkGuard`]s to keep it alive and a
//!   registry of named shared objects.
//! - [`Executor`] and [`StrandPtr`]: where work gets posted; strands
//!   serialize everything behind them.
//! - [`Task`], [`Generator`] and the [`spawn`] / [`splice`] / [`execute`]
//!   entry points.
//! - [`SimpleWobj`] and [`TimerWobj`]: awaitable notification points, the
//!   latter with deadlines driven by [`Timer`] and [`Timeout`].
//! - [`ThreadRunner`]: named worker threads for driving contexts.
//!
//! ```
//! use weft::execute;
//!
//! let five = execute(async { 2 + 3 });
//! assert_eq!(five, 5);
//! ```

pub mod context;
pub mod executor;
pub mod runner;
pub mod task;
pub mod timeout;
pub mod timer;
pub mod wobj;

mod utils;

pub use context::{AmbientObject, Context, WorkGuard};
pub use executor::{Executor, ExecutorPtr, PostFn, StrandPtr};
pub use runner::ThreadRunner;
pub use task::{
    GenIter, Generator, SafeResult, Step, Task, TaskFailure, TaskResult, Yielder, execute,
    generator, spawn, splice,
};
pub use timeout::{AWAIT_COMPLETION, NO_WAIT, PROCEED_IMMEDIATELY, Timeout, await_completion_for};
pub use timer::Timer;
pub use wobj::{SimpleWobj, TimerWobj, WaitFunc, WaitObject, WaitStatus};
