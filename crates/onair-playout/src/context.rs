//! Per-studio job context.
//!
//! Every playout operation takes a [`JobContext`]: the handle bundle a
//! job needs to acquire locks, load and commit documents, read studio
//! settings, stamp times, and queue post-commit notifications. The
//! context owns no playout state itself; all mutable state lives in the
//! documents behind the store.
//!
//! Show styles are read-only lookups cached per context. The pending
//! timing-event map is owned here too, so its lifetime is the
//! context's rather than the process's.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use onair_core::id::ShowStyleId;
use onair_core::time::{Clock, SystemClock, TimeMillis};

use crate::config::PlayoutRuntimeConfig;
use crate::error::{Error, Result};
use crate::events::{PlayoutEvent, PlayoutEventData, PlayoutEventSink, TimingEventQueue, TracingEventSink};
use crate::lock::LockRegistry;
use crate::metrics::PlayoutMetrics;
use crate::model::{ShowStyle, Studio};
use crate::store::DocStore;
use crate::timeline::{TimelineHook, TimelinePublisher};

/// Handle bundle passed to every playout job.
pub struct JobContext {
    store: Arc<dyn DocStore>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
    studio: Arc<Studio>,
    show_styles: Mutex<HashMap<ShowStyleId, Arc<ShowStyle>>>,
    config: PlayoutRuntimeConfig,
    hook: Option<Arc<dyn TimelineHook>>,
    publisher: Option<Arc<dyn TimelinePublisher>>,
    events: Arc<dyn PlayoutEventSink>,
    timing_events: Arc<TimingEventQueue>,
    metrics: PlayoutMetrics,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("studio_id", &self.studio.id)
            .field("config", &self.config)
            .field("has_hook", &self.hook.is_some())
            .field("has_publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl JobContext {
    /// Creates a context with default wiring: system clock, default
    /// runtime config, tracing-backed event sink, no hook, no
    /// publisher.
    #[must_use]
    pub fn new(store: Arc<dyn DocStore>, studio: Studio) -> Self {
        Self {
            store,
            locks: Arc::new(LockRegistry::new()),
            clock: Arc::new(SystemClock),
            studio: Arc::new(studio),
            show_styles: Mutex::new(HashMap::new()),
            config: PlayoutRuntimeConfig::default(),
            hook: None,
            publisher: None,
            events: Arc::new(TracingEventSink),
            timing_events: Arc::new(TimingEventQueue::new()),
            metrics: PlayoutMetrics::new(),
        }
    }

    /// Replaces the clock. Tests install a manual clock here.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the runtime config.
    #[must_use]
    pub fn with_config(mut self, config: PlayoutRuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs the timeline post-process hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn TimelineHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Installs the fast-publish channel.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn TimelinePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn PlayoutEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares a lock registry with another context.
    ///
    /// Contexts for the same studio must share one registry, otherwise
    /// their locks do not exclude each other.
    #[must_use]
    pub fn with_lock_registry(mut self, locks: Arc<LockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// The backing document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    /// The lock registry serializing jobs in this studio.
    #[must_use]
    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// The studio this context operates.
    #[must_use]
    pub fn studio(&self) -> &Studio {
        &self.studio
    }

    /// Current wall-clock time in epoch milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> TimeMillis {
        self.clock.now_ms()
    }

    /// The injected clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Runtime thresholds.
    #[must_use]
    pub fn config(&self) -> &PlayoutRuntimeConfig {
        &self.config
    }

    /// The configured post-process hook, if any.
    #[must_use]
    pub fn hook(&self) -> Option<&Arc<dyn TimelineHook>> {
        self.hook.as_ref()
    }

    /// The configured fast-publish channel, if any.
    #[must_use]
    pub fn publisher(&self) -> Option<Arc<dyn TimelinePublisher>> {
        self.publisher.clone()
    }

    /// The event sink, cloned for use inside deferred effects.
    #[must_use]
    pub fn event_sink(&self) -> Arc<dyn PlayoutEventSink> {
        Arc::clone(&self.events)
    }

    /// Publishes one event immediately.
    ///
    /// Most callers should publish from a deferred effect instead, so
    /// events only fire for committed transactions.
    pub fn emit_event(&self, data: PlayoutEventData) {
        self.events.publish(PlayoutEvent::new(self.studio.id, data));
    }

    /// Pending coalesced timing notifications, keyed per playlist.
    #[must_use]
    pub fn timing_events(&self) -> &Arc<TimingEventQueue> {
        &self.timing_events
    }

    /// Metrics recorder.
    #[must_use]
    pub fn metrics(&self) -> &PlayoutMetrics {
        &self.metrics
    }

    /// Engine version stamped into generated timelines.
    #[must_use]
    pub fn core_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Resolves a show style, read-through cached for the context's
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns the store's error on load failure, or not-found when the
    /// show style does not exist.
    pub async fn show_style(&self, id: ShowStyleId) -> Result<Arc<ShowStyle>> {
        {
            let cached = self
                .show_styles
                .lock()
                .map_err(|_| Error::internal("show style cache lock poisoned"))?;
            if let Some(show_style) = cached.get(&id) {
                return Ok(Arc::clone(show_style));
            }
        }

        let loaded = self.store.load_show_style(id).await?.ok_or_else(|| {
            onair_core::Error::resource_not_found("showStyle", id.to_string())
        })?;
        let mut cached = self
            .show_styles
            .lock()
            .map_err(|_| Error::internal("show style cache lock poisoned"))?;
        Ok(Arc::clone(cached.entry(id).or_insert(Arc::new(loaded))))
    }
}
