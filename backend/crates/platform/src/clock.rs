//! Time source abstraction
//!
//! All freshness and window math in this system is millisecond-based. The
//! clock is an explicit, constructor-injected value so tests can age cache
//! entries and cross window boundaries deterministically.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Millisecond clock, either the system clock or a manually advanced one.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<Inner>,
}

enum Inner {
    System,
    Manual(AtomicI64),
}

impl Clock {
    /// System clock (production)
    pub fn system() -> Self {
        Self {
            inner: Arc::new(Inner::System),
        }
    }

    /// Manually advanced clock starting at `start_ms` (tests)
    pub fn manual(start_ms: i64) -> Self {
        Self {
            inner: Arc::new(Inner::Manual(AtomicI64::new(start_ms))),
        }
    }

    /// Current time in epoch milliseconds
    pub fn now_ms(&self) -> i64 {
        match &*self.inner {
            Inner::System => Utc::now().timestamp_millis(),
            Inner::Manual(ms) => ms.load(Ordering::SeqCst),
        }
    }

    /// Advance a manual clock by `delta_ms`.
    ///
    /// # Panics
    /// Panics on a system clock; only manual clocks can be advanced.
    pub fn advance_ms(&self, delta_ms: i64) {
        match &*self.inner {
            Inner::System => panic!("cannot advance the system clock"),
            Inner::Manual(ms) => {
                ms.fetch_add(delta_ms, Ordering::SeqCst);
            }
        }
    }

    /// Set a manual clock to an absolute time.
    ///
    /// # Panics
    /// Panics on a system clock.
    pub fn set_ms(&self, now_ms: i64) {
        match &*self.inner {
            Inner::System => panic!("cannot set the system clock"),
            Inner::Manual(ms) => ms.store(now_ms, Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.inner {
            Inner::System => write!(f, "Clock::System"),
            Inner::Manual(ms) => write!(f, "Clock::Manual({})", ms.load(Ordering::SeqCst)),
        }
    }
}
