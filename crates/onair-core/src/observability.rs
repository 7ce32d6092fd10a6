//! Logging setup and shared span constructors.
//!
//! Playout operations carry their own `#[tracing::instrument]` spans;
//! this module holds what has to be shared across crates: process-wide
//! subscriber initialization and the span wrapping timeline
//! generation, which runs as a plain function inside several
//! operations.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops. Log levels come from `RUST_LOG`
/// (e.g. `info`, `onair_playout=debug`), defaulting to `info`.
///
/// # Example
///
/// ```rust
/// use onair_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        match format {
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// Creates the span timeline generation runs under.
///
/// Generation is called from every mutating operation, so its log
/// lines carry the studio and playlist they were produced for.
#[must_use]
pub fn timeline_span(studio_id: &str, playlist_id: &str) -> Span {
    tracing::info_span!("timeline", studio_id = studio_id, playlist_id = playlist_id)
}
