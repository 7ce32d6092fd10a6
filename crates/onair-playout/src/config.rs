//! Runtime configuration for the playout engine.
//!
//! These settings govern operational thresholds only. Broadcast
//! behavior (take spans, hold permissions, lookahead depth) lives on
//! the [`Studio`](crate::model::Studio) document so that it travels
//! with the studio's data rather than with the process environment.

use std::time::Duration;

use crate::error::{Error, Result};

const ENV_LOCK_WARN_AFTER_MS: &str = "ONAIR_PLAYOUT_LOCK_WARN_AFTER_MS";
const ENV_TIMELINE_WARN_AFTER_MS: &str = "ONAIR_PLAYOUT_TIMELINE_WARN_AFTER_MS";
const ENV_FAST_PUBLISH: &str = "ONAIR_PLAYOUT_FAST_PUBLISH";

const DEFAULT_LOCK_WARN_AFTER_MS: u64 = 1_000;
const DEFAULT_TIMELINE_WARN_AFTER_MS: u64 = 500;
const DEFAULT_FAST_PUBLISH: bool = true;

/// Operational thresholds for playout jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayoutRuntimeConfig {
    /// Lock waits longer than this are logged at warn level.
    pub lock_warn_after: Duration,
    /// Timeline generations slower than this are logged at warn level.
    pub timeline_warn_after: Duration,
    /// Whether to hand freshly generated timelines to the publisher
    /// before the owning transaction commits.
    pub fast_publish_enabled: bool,
}

impl Default for PlayoutRuntimeConfig {
    fn default() -> Self {
        Self {
            lock_warn_after: Duration::from_millis(DEFAULT_LOCK_WARN_AFTER_MS),
            timeline_warn_after: Duration::from_millis(DEFAULT_TIMELINE_WARN_AFTER_MS),
            fast_publish_enabled: DEFAULT_FAST_PUBLISH,
        }
    }
}

impl PlayoutRuntimeConfig {
    /// Loads runtime config from the process environment with strict
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer (for durations) or not a boolean literal.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads runtime config with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value fails to
    /// parse.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lock_warn_after_ms =
            parse_positive_u64_env(&get_env, ENV_LOCK_WARN_AFTER_MS, DEFAULT_LOCK_WARN_AFTER_MS)?;
        let timeline_warn_after_ms = parse_positive_u64_env(
            &get_env,
            ENV_TIMELINE_WARN_AFTER_MS,
            DEFAULT_TIMELINE_WARN_AFTER_MS,
        )?;
        let fast_publish_enabled =
            parse_bool_env(&get_env, ENV_FAST_PUBLISH, DEFAULT_FAST_PUBLISH)?;

        Ok(Self {
            lock_warn_after: Duration::from_millis(lock_warn_after_ms),
            timeline_warn_after: Duration::from_millis(timeline_warn_after_ms),
            fast_publish_enabled,
        })
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

fn parse_bool_env<F>(get_env: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    match raw.as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{key} must be 'true' or 'false', got '{raw}'"
        ))),
    }
}
