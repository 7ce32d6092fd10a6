//! Plugin and transport seams for generated timelines.
//!
//! Two integration points hang off timeline generation:
//!
//! - [`TimelineHook`] lets the show-specific plugin layer rewrite the
//!   generated object list before it is persisted (device-specific
//!   cross-cutting concerns such as router state or audio mappings).
//!   The hook runs synchronously inside the locked transaction; its
//!   output replaces the generated list wholesale.
//! - [`TimelinePublisher`] is the low-latency side channel to the
//!   playout transport. Publication runs as a deferred effect after
//!   commit, so a slow transport never extends the lock hold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use onair_core::id::{InfiniteId, PieceInstanceId};

use crate::error::Result;
use crate::model::{Timeline, TimelineObject};

/// Compact description of one resolved piece, offered to the hook so
/// it can correlate objects with on-air content without re-deriving
/// playout state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceSummary {
    /// The resolved piece instance.
    pub piece_instance_id: PieceInstanceId,
    /// Source layer the piece plays on.
    pub source_layer: String,
    /// Display name.
    pub name: String,
    /// Continuation id when the piece is open-ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infinite_id: Option<InfiniteId>,
}

/// Everything the post-process hook gets to see.
#[derive(Debug, Clone)]
pub struct TimelineHookInput {
    /// The freshly generated, already flattened object list.
    pub objects: Vec<TimelineObject>,
    /// Persistent state returned by the previous hook invocation, if
    /// any. Round-tripped through the Timeline document.
    pub previous_persistent_state: Option<Value>,
    /// Summaries of the piece instances resolved into this generation.
    pub pieces: Vec<PieceSummary>,
    /// Whether the owning playlist is in rehearsal.
    pub rehearsal: bool,
}

/// The hook's replacement output.
#[derive(Debug, Clone)]
pub struct TimelineHookOutput {
    /// Replacement object list. Persisted as-is.
    pub objects: Vec<TimelineObject>,
    /// State to round-trip into the next invocation.
    pub persistent_state: Option<Value>,
}

/// Post-process hook applied to every generated timeline.
///
/// Implementations must be deterministic for identical inputs; the
/// regeneration-stability rule for frozen `now` values assumes the hook
/// does not invent fresh object ids on every call. Hook failures abort
/// the whole transaction; they surface to job callers as an internal
/// error so plugin detail does not leak.
pub trait TimelineHook: Send + Sync + 'static {
    /// Stable identifier of the hook implementation, stamped into the
    /// timeline's generation versions.
    fn id(&self) -> &str;

    /// Version string of the hook implementation, stamped alongside
    /// [`TimelineHook::id`].
    fn version(&self) -> &str;

    /// Rewrites the generated object list.
    ///
    /// # Errors
    ///
    /// Any error aborts the generation and rolls back the transaction.
    fn post_process(
        &self,
        input: TimelineHookInput,
    ) -> std::result::Result<TimelineHookOutput, Box<dyn std::error::Error + Send + Sync>>;
}

/// Fast-publish side channel for committed timelines.
#[async_trait]
pub trait TimelinePublisher: Send + Sync + 'static {
    /// Delivers one committed timeline to the transport.
    ///
    /// # Errors
    ///
    /// Failures are logged by the deferred-effect runner and never
    /// affect the committed transaction.
    async fn publish(&self, timeline: &Timeline) -> Result<()>;
}

/// Publisher that buffers timelines in memory, for tests and local
/// tooling.
#[derive(Debug, Default)]
pub struct InMemoryTimelinePublisher {
    published: std::sync::Mutex<Vec<Timeline>>,
}

impl InMemoryTimelinePublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all published timelines in publication order.
    pub fn drain(&self) -> Vec<Timeline> {
        match self.published.lock() {
            Ok(mut published) => std::mem::take(&mut *published),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of buffered timelines.
    pub fn len(&self) -> usize {
        match self.published.lock() {
            Ok(published) => published.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns true if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TimelinePublisher for InMemoryTimelinePublisher {
    async fn publish(&self, timeline: &Timeline) -> Result<()> {
        match self.published.lock() {
            Ok(mut published) => published.push(timeline.clone()),
            Err(poisoned) => poisoned.into_inner().push(timeline.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::id::StudioId;
    use crate::model::TimelineVersions;

    fn empty_timeline() -> Timeline {
        Timeline::new(
            StudioId::generate(),
            Vec::new(),
            TimelineVersions {
                core: "test".into(),
                hook_id: None,
                hook_version: None,
                studio_config_hash: "hash".into(),
            },
        )
    }

    #[tokio::test]
    async fn in_memory_publisher_buffers_in_order() {
        let publisher = InMemoryTimelinePublisher::new();
        let first = empty_timeline();
        let second = empty_timeline();

        publisher
            .publish(&first)
            .await
            .expect("publish should succeed");
        publisher
            .publish(&second)
            .await
            .expect("publish should succeed");

        let published = publisher.drain();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].hash, first.hash);
        assert_eq!(published[1].hash, second.hash);
        assert!(publisher.is_empty());
    }

    #[test]
    fn piece_summary_serializes_camel_case() {
        let summary = PieceSummary {
            piece_instance_id: PieceInstanceId::generate(),
            source_layer: "camera0".into(),
            name: "CAM 1".into(),
            infinite_id: None,
        };

        let json = serde_json::to_string(&summary).expect("summary should serialize");
        assert!(json.contains("\"pieceInstanceId\""));
        assert!(json.contains("\"sourceLayer\""));
        assert!(!json.contains("infiniteId"));
    }
}
