//! Playout engine metrics.
//!
//! The signals worth alerting on during a live broadcast all sit on
//! the operator-visible path between pressing Take and output changing
//! on air: take latency and outcome, timeline regeneration cost, and
//! lock contention. Everything here goes through the `metrics` crate
//! facade; the embedding service decides the exporter (Prometheus in
//! production) and calls stay cheap no-ops until a recorder is
//! installed.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `onair_takes_total` | Counter | `result` |
//! | `onair_take_rate_limited_total` | Counter | - |
//! | `onair_timeline_generations_total` | Counter | `studio_id` |
//! | `onair_timeline_generation_seconds` | Histogram | `studio_id` |
//! | `onair_timeline_objects` | Gauge | `studio_id` |
//! | `onair_lock_wait_seconds` | Histogram | `scope` |
//! | `onair_deferred_effect_failures_total` | Counter | `effect` |

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Take attempts by outcome.
    pub const TAKES_TOTAL: &str = "onair_takes_total";
    /// Counter: Takes rejected by the minimum-span rate limiter.
    pub const TAKE_RATE_LIMITED_TOTAL: &str = "onair_take_rate_limited_total";
    /// Counter: Timeline regenerations.
    pub const TIMELINE_GENERATIONS_TOTAL: &str = "onair_timeline_generations_total";
    /// Histogram: Timeline generation duration in seconds.
    pub const TIMELINE_GENERATION_SECONDS: &str = "onair_timeline_generation_seconds";
    /// Gauge: Objects in the last published timeline.
    pub const TIMELINE_OBJECTS: &str = "onair_timeline_objects";
    /// Histogram: Time spent waiting for playout locks in seconds.
    pub const LOCK_WAIT_SECONDS: &str = "onair_lock_wait_seconds";
    /// Counter: Post-commit deferred effects that failed.
    pub const DEFERRED_EFFECT_FAILURES_TOTAL: &str = "onair_deferred_effect_failures_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Take outcome (taken, hold_completed, rejected, rate_limited).
    pub const RESULT: &str = "result";
    /// Studio scope.
    pub const STUDIO_ID: &str = "studio_id";
    /// Lock scope (playlist, studio).
    pub const SCOPE: &str = "scope";
    /// Deferred effect label.
    pub const EFFECT: &str = "effect";
}

/// High-level interface for recording playout metrics.
///
/// Cheap to clone and share across jobs.
#[derive(Debug, Clone, Default)]
pub struct PlayoutMetrics {
    _private: (),
}

impl PlayoutMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a take attempt and its outcome.
    pub fn record_take(&self, result: &str) {
        counter!(
            names::TAKES_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records a take rejected by the minimum-span rate limiter.
    pub fn record_take_rate_limited(&self) {
        counter!(names::TAKE_RATE_LIMITED_TOTAL).increment(1);
        self.record_take("rate_limited");
    }

    /// Records a completed timeline generation.
    #[allow(clippy::cast_precision_loss)] // Object counts are small
    pub fn record_timeline_generation(
        &self,
        studio_id: &str,
        duration: Duration,
        object_count: usize,
    ) {
        counter!(
            names::TIMELINE_GENERATIONS_TOTAL,
            labels::STUDIO_ID => studio_id.to_string(),
        )
        .increment(1);
        histogram!(
            names::TIMELINE_GENERATION_SECONDS,
            labels::STUDIO_ID => studio_id.to_string(),
        )
        .record(duration.as_secs_f64());
        gauge!(
            names::TIMELINE_OBJECTS,
            labels::STUDIO_ID => studio_id.to_string(),
        )
        .set(object_count as f64);
    }

    /// Records time spent waiting for a playout lock.
    pub fn observe_lock_wait(&self, scope: &str, duration: Duration) {
        histogram!(
            names::LOCK_WAIT_SECONDS,
            labels::SCOPE => scope.to_string(),
        )
        .record(duration.as_secs_f64());
    }

    /// Records a failed post-commit effect.
    pub fn record_deferred_effect_failure(&self, effect: &str) {
        counter!(
            names::DEFERRED_EFFECT_FAILURES_TOTAL,
            labels::EFFECT => effect.to_string(),
        )
        .increment(1);
    }
}
