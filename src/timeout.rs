//! Millisecond timeout value used by the timed wait primitives.
//!
//! A [`Timeout`] is a signed millisecond count with two sentinel
//! classifications: negative means "wait forever" and zero means "don't wait
//! at all". It is a pure value type; the interpretation happens in
//! [`Timer::set_timeout`](crate::timer::Timer::set_timeout) and the wait
//! objects built on it.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeout {
    ms: i64,
}

impl Timeout {
    /// A timeout elapsing `ms` milliseconds from now. Negative values are
    /// treated as infinite.
    pub const fn after_ms(ms: i64) -> Self {
        Timeout { ms }
    }

    /// A timeout elapsing after the given duration, saturating at `i64::MAX`
    /// milliseconds.
    pub fn after(d: Duration) -> Self {
        let ms = i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
        Timeout { ms }
    }

    /// Wait forever.
    pub const fn never() -> Self {
        Timeout { ms: -1 }
    }

    /// Do not wait at all.
    pub const fn now() -> Self {
        Timeout { ms: 0 }
    }

    /// Alias of [`Timeout::now`].
    pub const fn immediately() -> Self {
        Self::now()
    }

    pub const fn ms(self) -> i64 {
        self.ms
    }

    pub const fn is_infinite(self) -> bool {
        self.ms < 0
    }

    pub const fn is_zero(self) -> bool {
        self.ms == 0
    }

    /// The timeout as a duration, or `None` when infinite.
    pub fn duration(self) -> Option<Duration> {
        if self.is_infinite() {
            None
        } else {
            Some(Duration::from_millis(self.ms as u64))
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::after(d)
    }
}

/// Block the wait on the notification alone, with no deadline.
pub const AWAIT_COMPLETION: Timeout = Timeout::never();

/// Check for a notification without suspending on a deadline.
pub const NO_WAIT: Timeout = Timeout::now();

/// Alias of [`NO_WAIT`].
pub const PROCEED_IMMEDIATELY: Timeout = Timeout::now();

/// Wait for a notification for at most `d`.
pub fn await_completion_for(d: Duration) -> Timeout {
    Timeout::after(d)
}
