//! The millisecond time scale used by the playout engine.
//!
//! All timeline math (enables, offsets, durations, playhead positions)
//! runs on plain `i64` milliseconds. Wall-clock metadata on documents
//! uses `chrono::DateTime<Utc>`.
//!
//! Playout decisions must be testable without sleeping, so "what time is
//! it" goes through the [`Clock`] trait: [`SystemClock`] in production,
//! [`ManualClock`] in tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the Unix epoch.
pub type TimeMillis = i64;

/// Returns the current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> TimeMillis {
    Utc::now().timestamp_millis()
}

/// A source of the current time.
///
/// Held behind `Arc<dyn Clock>` by the job context so the take rate
/// limiter, playhead math and timeline `Now` resolution are all
/// deterministic under test.
pub trait Clock: Send + Sync + 'static {
    /// The current time in epoch milliseconds.
    fn now_ms(&self) -> TimeMillis;

    /// The current wall-clock time.
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms()).unwrap_or_else(Utc::now)
    }
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimeMillis {
        now_ms()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually-advanced clock for tests and embedding.
///
/// Starts at the given epoch millisecond value and only moves when told
/// to.
#[derive(Debug)]
pub struct ManualClock {
    ms: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at the given epoch millisecond value.
    #[must_use]
    pub const fn new(start_ms: TimeMillis) -> Self {
        Self {
            ms: AtomicI64::new(start_ms),
        }
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance(&self, delta_ms: TimeMillis) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute epoch millisecond value.
    pub fn set(&self, ms: TimeMillis) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimeMillis {
        self.ms.load(Ordering::SeqCst)
    }
}
