//! Deferred post-commit side effects.
//!
//! Job bodies queue notification work here instead of performing it
//! inline: event emission, fast publish, coalesced timing reports.
//! Queued effects run only after the cache has committed and the lock
//! has been released, in two phases: the `defer` queue first, then the
//! `defer_after_save` queue, each in insertion order.
//!
//! Effects are fire-and-forget. A failing effect is logged and skipped;
//! it never propagates and never rolls anything back. Data changes do
//! not belong here.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::metrics::PlayoutMetrics;

type EffectFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct NamedEffect {
    label: &'static str,
    effect: EffectFn,
}

/// Queues of callbacks to run after a successful commit.
#[derive(Default)]
pub struct DeferredEffects {
    deferred: Vec<NamedEffect>,
    after_save: Vec<NamedEffect>,
}

impl std::fmt::Debug for DeferredEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredEffects")
            .field("deferred", &self.deferred.len())
            .field("after_save", &self.after_save.len())
            .finish()
    }
}

impl DeferredEffects {
    /// Creates empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an effect for the first post-commit phase.
    pub fn defer<F, Fut>(&mut self, label: &'static str, effect: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.deferred.push(NamedEffect {
            label,
            effect: Box::new(move || Box::pin(effect())),
        });
    }

    /// Queues an effect for the second post-commit phase, after every
    /// `defer` effect has run.
    pub fn defer_after_save<F, Fut>(&mut self, label: &'static str, effect: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.after_save.push(NamedEffect {
            label,
            effect: Box::new(move || Box::pin(effect())),
        });
    }

    /// Total number of queued effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deferred.len() + self.after_save.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty() && self.after_save.is_empty()
    }

    /// Runs both phases in order, consuming the queues.
    ///
    /// Called by the transaction wrapper after the commit, outside the
    /// lock. Failures are logged and counted; they do not stop later
    /// effects.
    pub(crate) async fn drain(self, metrics: &PlayoutMetrics) {
        for named in self.deferred.into_iter().chain(self.after_save) {
            if let Err(e) = (named.effect)().await {
                tracing::error!(effect = named.label, error = %e, "deferred effect failed");
                metrics.record_deferred_effect_failure(named.label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn phases_run_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut effects = DeferredEffects::new();

        let log = Arc::clone(&order);
        effects.defer_after_save("second", move || async move {
            log.lock().expect("order log").push("after_save");
            Ok(())
        });
        let log = Arc::clone(&order);
        effects.defer("first", move || async move {
            log.lock().expect("order log").push("defer");
            Ok(())
        });

        assert_eq!(effects.len(), 2);
        effects.drain(&PlayoutMetrics::new()).await;

        let seen = order.lock().expect("order log").clone();
        assert_eq!(seen, vec!["defer", "after_save"]);
    }

    #[tokio::test]
    async fn a_failing_effect_does_not_stop_later_ones() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut effects = DeferredEffects::new();

        effects.defer("boom", || async { Err(Error::internal("boom")) });
        let ran_clone = Arc::clone(&ran);
        effects.defer("survivor", move || async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        effects.drain(&PlayoutMetrics::new()).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
