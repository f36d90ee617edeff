//! Execution context: the run loop, its root executor and the object
//! registry.
//!
//! A [`Context`] is the engine everything else plugs into. Threads donate
//! themselves by calling [`Context::run`]; tasks, strands and timers feed
//! work back into it through its executor.
//!
//! ```
//! use weft::Context;
//!
//! let ctx = Context::new();
//! ctx.spawn(async {
//!     println!("hello from a task");
//! });
//! ctx.run();
//! ```

use std::any::Any;
use std::sync::{Arc, Weak};

use anyhow::Result;
use tracing::debug;

use crate::executor::strand::StrandExecutor;
use crate::executor::{Engine, Executor, ExecutorPtr, PostFn, StrandPtr};
use crate::task::frame::FrameHandle;
use crate::task::spawn;

pub(crate) mod core;
mod registry;
mod work_guard;

pub use registry::AmbientObject;
pub use work_guard::WorkGuard;

use core::{Core, Work};
use registry::Registry;

pub struct Context {
    core: Arc<Core>,
    executor: ExecutorPtr,
    registry: Registry,
}

impl Context {
    pub fn new() -> Self {
        let core = Core::new();
        let executor = ContextExecutor::create(core.clone());
        Context {
            core,
            executor,
            registry: Registry::new(),
        }
    }

    /// Runs work on the calling thread until the context stops or runs out
    /// of work, guards and pending waits. Returns the number of work items
    /// this thread executed. May be called from several threads at once.
    pub fn run(&self) -> usize {
        let executed = self.core.run();
        debug!(executed, "run loop finished");
        executed
    }

    /// Runs ready work without blocking. Returns the number executed.
    pub fn poll(&self) -> usize {
        self.core.poll()
    }

    /// Makes every running and future `run` call return promptly.
    pub fn stop(&self) {
        debug!("stopping context");
        self.core.stop();
    }

    pub fn stopped(&self) -> bool {
        self.core.stopped()
    }

    /// Clears the stopped flag so the context can be run again.
    pub fn restart(&self) {
        self.core.restart();
    }

    pub fn executor(&self) -> &ExecutorPtr {
        &self.executor
    }

    /// Mints a strand serializing over this context.
    pub fn make_strand(&self) -> StrandPtr {
        self.executor.make_strand()
    }

    /// Keeps [`Context::run`] alive until the guard is reset or dropped.
    pub fn make_work_guard(&self) -> WorkGuard {
        WorkGuard::attach(self.core.clone())
    }

    /// Spawns a detached task onto this context.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        spawn(&self.executor, task);
    }

    /// Attaches a named shared object. Fails if the name is taken.
    pub fn attach(&self, name: &str, object: AmbientObject) -> Result<()> {
        self.registry.attach(name, object)
    }

    pub fn get(&self, name: &str) -> Option<AmbientObject> {
        self.registry.get(name)
    }

    /// Fetches a named object downcast to its concrete type. Returns `None`
    /// when the name is absent or the type does not match.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.registry.get(name).and_then(|o| o.downcast::<T>().ok())
    }

    /// Detaches and returns the object under `name`, if any.
    pub fn detach(&self, name: &str) -> Option<AmbientObject> {
        self.registry.detach(name)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

/// Root executor feeding the context's core directly.
struct ContextExecutor {
    core: Arc<Core>,
    weak_self: Weak<ContextExecutor>,
}

impl ContextExecutor {
    fn create(core: Arc<Core>) -> ExecutorPtr {
        Arc::new_cyclic(|weak_self| ContextExecutor {
            core,
            weak_self: weak_self.clone(),
        })
    }
}

impl Executor for ContextExecutor {
    fn post(&self, func: PostFn) {
        self.core.post(Work::Call(func));
    }

    fn post_resume(&self, frame: FrameHandle) {
        self.core.post(Work::Resume(frame));
    }

    fn is_strand(&self) -> bool {
        false
    }

    fn super_executor(&self) -> ExecutorPtr {
        self.weak_self
            .upgrade()
            .expect("executor used while being dropped")
    }

    fn make_strand(&self) -> StrandPtr {
        StrandExecutor::create(self.super_executor(), self.core.clone())
    }

    fn running_in_this_thread(&self) -> bool {
        self.core.running_in_this_thread()
    }

    fn as_engine(&self) -> Engine {
        Engine {
            core: self.core.clone(),
        }
    }
}

#[cfg(test)]
mod tests;
