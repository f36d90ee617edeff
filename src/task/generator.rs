//! Generators: tasks that yield a stream of values before completing.
//!
//! The body receives a [`Yielder`] and hands values out with
//! [`Yielder::yield_value`]. The consumer pulls them with
//! [`Generator::next`], which polls the body inline until it either parks a
//! value in the shared slot or completes.
//!
//! ```
//! use weft::{execute, generator, Step};
//!
//! fn range(from: i32, to: i32) -> weft::Generator<i32> {
//!     generator(move |y| async move {
//!         for i in from..to {
//!             y.yield_value(i).await;
//!         }
//!     })
//! }
//!
//! let sum = execute(async {
//!     let mut squares = range(1, 5);
//!     let mut sum = 0;
//!     while let Step::Yielded(v) = squares.next().await {
//!         sum += v;
//!     }
//!     sum
//! });
//! assert_eq!(sum, 1 + 2 + 3 + 4);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use parking_lot::Mutex;

/// One step of generator progress.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<Y, R = ()> {
    /// The body yielded a value and is suspended inside `yield_value`.
    Yielded(Y),
    /// The body ran to completion. The return value is present the first
    /// time completion is observed and `None` on repeated calls.
    Complete(Option<R>),
}

impl<Y, R> Step<Y, R> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Step::Complete(_))
    }

    /// The yielded value, if this step yielded one.
    pub fn value(self) -> Option<Y> {
        match self {
            Step::Yielded(v) => Some(v),
            Step::Complete(_) => None,
        }
    }

    /// The body's return value, if this step completed with one.
    pub fn final_value(self) -> Option<R> {
        match self {
            Step::Yielded(_) => None,
            Step::Complete(r) => r,
        }
    }
}

struct YieldSlot<Y> {
    value: Option<Y>,
    /// A `next` call is driving the body and will collect the value.
    attached: bool,
}

/// Hands values out of a generator body.
pub struct Yielder<Y> {
    slot: Arc<Mutex<YieldSlot<Y>>>,
}

impl<Y> Clone for Yielder<Y> {
    fn clone(&self) -> Self {
        Yielder {
            slot: self.slot.clone(),
        }
    }
}

impl<Y> Yielder<Y> {
    /// Parks `value` for the consumer and suspends until the next pull.
    ///
    /// When the generator is awaited as a plain task rather than stepped,
    /// no consumer collects values; the yield then completes immediately
    /// and the value is discarded.
    pub fn yield_value(&self, value: Y) -> YieldValue<'_, Y> {
        YieldValue {
            slot: &self.slot,
            value: Some(value),
        }
    }
}

pub struct YieldValue<'a, Y> {
    slot: &'a Arc<Mutex<YieldSlot<Y>>>,
    value: Option<Y>,
}

impl<Y> Future for YieldValue<'_, Y> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<()> {
        // Safety: neither field is structurally pinned.
        let this = unsafe { self.get_unchecked_mut() };
        match this.value.take() {
            Some(value) => {
                let mut slot = this.slot.lock();
                if !slot.attached {
                    return Poll::Ready(());
                }
                slot.value = Some(value);
                Poll::Pending
            }
            // Second poll: the consumer pulled the value, resume the body.
            None => Poll::Ready(()),
        }
    }
}

/// A task yielding `Y` values and returning `R`.
pub struct Generator<Y, R = ()> {
    fut: Option<Pin<Box<dyn Future<Output = R> + Send>>>,
    slot: Arc<Mutex<YieldSlot<Y>>>,
}

/// Builds a generator from a body taking a [`Yielder`].
pub fn generator<Y, R, F, Fut>(body: F) -> Generator<Y, R>
where
    F: FnOnce(Yielder<Y>) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let slot = Arc::new(Mutex::new(YieldSlot {
        value: None,
        attached: false,
    }));
    let yielder = Yielder { slot: slot.clone() };
    Generator {
        fut: Some(Box::pin(body(yielder))),
        slot,
    }
}

impl<Y, R> Generator<Y, R> {
    /// Drives the body until the next yield or completion.
    pub fn next(&mut self) -> NextStep<'_, Y, R> {
        NextStep { owner: self }
    }

    /// Whether the body has run to completion or panicked.
    pub fn done(&self) -> bool {
        self.fut.is_none()
    }
}

pub struct NextStep<'a, Y, R> {
    owner: &'a mut Generator<Y, R>,
}

impl<Y, R> Future for NextStep<'_, Y, R> {
    type Output = Step<Y, R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let g = &mut *self.owner;
        let Some(fut) = g.fut.as_mut() else {
            return Poll::Ready(Step::Complete(None));
        };

        g.slot.lock().attached = true;
        let polled = catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx)));
        g.slot.lock().attached = false;

        match polled {
            Ok(Poll::Ready(ret)) => {
                g.fut = None;
                Poll::Ready(Step::Complete(Some(ret)))
            }
            Ok(Poll::Pending) => match g.slot.lock().value.take() {
                Some(value) => Poll::Ready(Step::Yielded(value)),
                // Suspended on something other than a yield.
                None => Poll::Pending,
            },
            Err(payload) => {
                g.fut = None;
                resume_unwind(payload)
            }
        }
    }
}

/// Awaiting a generator as a plain future runs it to completion, discarding
/// every yielded value.
impl<Y, R> Future for Generator<Y, R> {
    type Output = R;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<R> {
        let this = &mut *self;
        let fut = this
            .fut
            .as_mut()
            .expect("generator polled after completion");
        match fut.as_mut().poll(cx) {
            Poll::Ready(ret) => {
                this.fut = None;
                Poll::Ready(ret)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
