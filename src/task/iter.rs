//! Pull-style iteration over a generator.
//!
//! [`GenIter`] keeps the latest yielded value resident so loops can borrow
//! it between pulls, which is what the [`gen_for!`](crate::gen_for) macro
//! builds on.

use crate::task::generator::{Generator, Step};

pub struct GenIter<Y, R = ()> {
    inner: Generator<Y, R>,
    current: Option<Y>,
    ret: Option<R>,
}

impl<Y, R> GenIter<Y, R> {
    /// Wraps `source` and advances it to its first value.
    pub async fn start(source: Generator<Y, R>) -> Self {
        let mut iter = GenIter {
            inner: source,
            current: None,
            ret: None,
        };
        iter.advance().await;
        iter
    }

    /// Discards the current value and pulls the next one.
    pub async fn advance(&mut self) {
        match self.inner.next().await {
            Step::Yielded(value) => self.current = Some(value),
            Step::Complete(ret) => {
                self.current = None;
                if ret.is_some() {
                    self.ret = ret;
                }
            }
        }
    }

    /// Whether the generator has completed. A `false` return means
    /// [`GenIter::value`] is present.
    pub fn done(&self) -> bool {
        self.inner.done()
    }

    pub fn value(&self) -> Option<&Y> {
        self.current.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut Y> {
        self.current.as_mut()
    }

    pub fn take_value(&mut self) -> Option<Y> {
        self.current.take()
    }

    /// The generator's return value, once complete.
    pub fn final_value(&self) -> Option<&R> {
        self.ret.as_ref()
    }

    pub fn into_final(self) -> Option<R> {
        self.ret
    }
}

/// Iterates a generator in place.
///
/// ```
/// use weft::{execute, generator, gen_for};
///
/// let total = execute(async {
///     let squares = generator(|y| async move {
///         for i in 1..4 {
///             y.yield_value(i).await;
///         }
///     });
///     let mut total = 0;
///     gen_for!(v in squares => {
///         total += *v;
///     });
///     total
/// });
/// assert_eq!(total, 6);
/// ```
#[macro_export]
macro_rules! gen_for {
    ($v:pat in $source:expr => $body:block) => {{
        let mut __iter = $crate::task::GenIter::start($source).await;
        while !__iter.done() {
            {
                let $v = __iter
                    .value_mut()
                    .expect("running generator must hold a value");
                $body
            }
            __iter.advance().await;
        }
    }};
}
