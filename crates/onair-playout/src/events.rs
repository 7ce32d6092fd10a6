//! Playout events for downstream consumers.
//!
//! Every externally visible playout transition (activation, take,
//! reported playback changes) is wrapped in a `CloudEvents`-compatible
//! envelope and handed to a [`PlayoutEventSink`]. Sinks are
//! fire-and-forget: publication happens from deferred effects after the
//! owning transaction has committed, so a slow or failing sink can
//! never roll back playout state.
//!
//! ## `CloudEvents` Compatibility
//!
//! Envelopes conform to the [`CloudEvents` v1.0 specification](https://cloudevents.io/):
//! - `id`: unique event identifier (ULID)
//! - `source`: event origin URI (`/onair/playout/{studio_id}`)
//! - `specversion`: `CloudEvents` spec version ("1.0")
//! - `type`: event type (`onair.playout.{event_name}`)
//! - `time`: event timestamp (ISO 8601)
//! - `data`: the actual event payload
//!
//! ULIDs are used for event ids so that lexicographic order equals
//! chronological order within a stream.
//!
//! ## Timing coalescing
//!
//! Device-reported playback timestamps arrive in bursts (a take starts
//! one part group and several piece groups within milliseconds). The
//! [`TimingEventQueue`] collects the touched instance ids per playlist
//! so that a single `playback_timings_changed` event can be emitted per
//! committed job instead of one event per instance.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use onair_core::id::{
    ActivationId, PartInstanceId, PieceInstanceId, PlaylistId, RundownId, SegmentId, StudioId,
};
use onair_core::time::TimeMillis;

/// `CloudEvents`-compatible envelope for playout events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayoutEvent {
    /// Unique event identifier (ULID).
    pub id: String,

    /// Event origin URI. Format: `/onair/playout/{studio_id}`.
    pub source: String,

    /// `CloudEvents` specification version.
    pub specversion: String,

    /// Event type. Format: `onair.playout.{event_name}`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event timestamp (ISO 8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Studio scope.
    pub studio_id: StudioId,

    /// Correlation identifier. The playlist the event belongs to, when
    /// there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Schema version for the envelope + payload.
    pub schema_version: u32,

    /// Event payload.
    pub data: PlayoutEventData,
}

impl PlayoutEvent {
    /// Creates a new envelope with auto-generated id and timestamp.
    #[must_use]
    pub fn new(studio_id: StudioId, data: PlayoutEventData) -> Self {
        let correlation_id = data.playlist_id().map(|id| id.to_string());
        Self {
            id: Ulid::new().to_string(),
            source: format!("/onair/playout/{studio_id}"),
            specversion: "1.0".into(),
            event_type: format!("onair.playout.{}", data.event_name()),
            time: Some(Utc::now()),
            studio_id,
            correlation_id,
            schema_version: 1,
            data,
        }
    }
}

/// Playout event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlayoutEventData {
    /// A playlist entered the active (or rehearsal) state.
    PlaylistActivated {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// Activation session identifier.
        activation_id: ActivationId,
        /// Whether the activation is a rehearsal.
        rehearsal: bool,
    },

    /// A playlist left the active state.
    PlaylistDeactivated {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The activation session that ended.
        activation_id: ActivationId,
    },

    /// A playlist was reset to its pre-playback state.
    PlaylistReset {
        /// Playlist identifier.
        playlist_id: PlaylistId,
    },

    /// A take moved the next part on air.
    PartTaken {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The instance that went on air.
        part_instance_id: PartInstanceId,
        /// The instance that went off air, if there was one.
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_part_instance_id: Option<PartInstanceId>,
        /// Wall-clock take time in milliseconds.
        taken_at: TimeMillis,
    },

    /// The next-part pointer changed without a take.
    NextPartChanged {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The newly nexted instance, or `None` when cleared.
        #[serde(skip_serializing_if = "Option::is_none")]
        part_instance_id: Option<PartInstanceId>,
    },

    /// A pending segment override was registered.
    NextSegmentSet {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The override target, or `None` when cleared.
        #[serde(skip_serializing_if = "Option::is_none")]
        segment_id: Option<SegmentId>,
    },

    /// A device reported that a part instance started playing.
    PartPlaybackStarted {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The instance that started.
        part_instance_id: PartInstanceId,
        /// Reported start time in milliseconds.
        started_at: TimeMillis,
    },

    /// A device reported that a part instance stopped playing.
    PartPlaybackStopped {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The instance that stopped.
        part_instance_id: PartInstanceId,
        /// Reported stop time in milliseconds.
        stopped_at: TimeMillis,
    },

    /// Reported playback timings changed for a batch of instances.
    ///
    /// Coalesced by [`TimingEventQueue`]; one event per committed job.
    PlaybackTimingsChanged {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// Part instances whose timings changed.
        part_instance_ids: Vec<PartInstanceId>,
        /// Piece instances whose timings changed.
        piece_instance_ids: Vec<PieceInstanceId>,
    },

    /// A rundown's ingest data was removed while the playlist was active.
    RundownOrphaned {
        /// Playlist identifier.
        playlist_id: PlaylistId,
        /// The rundown left behind.
        rundown_id: RundownId,
    },

    /// A fresh timeline was published for the studio.
    TimelineGenerated {
        /// Playlist the timeline was generated for, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        playlist_id: Option<PlaylistId>,
        /// Content hash of the published timeline.
        hash: String,
        /// Number of top-level objects.
        object_count: usize,
    },
}

impl PlayoutEventData {
    /// Returns the event name (`snake_case`) for the `CloudEvents` type field.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PlaylistActivated { .. } => "playlist_activated",
            Self::PlaylistDeactivated { .. } => "playlist_deactivated",
            Self::PlaylistReset { .. } => "playlist_reset",
            Self::PartTaken { .. } => "part_taken",
            Self::NextPartChanged { .. } => "next_part_changed",
            Self::NextSegmentSet { .. } => "next_segment_set",
            Self::PartPlaybackStarted { .. } => "part_playback_started",
            Self::PartPlaybackStopped { .. } => "part_playback_stopped",
            Self::PlaybackTimingsChanged { .. } => "playback_timings_changed",
            Self::RundownOrphaned { .. } => "rundown_orphaned",
            Self::TimelineGenerated { .. } => "timeline_generated",
        }
    }

    /// Returns the playlist the event belongs to, when there is one.
    #[must_use]
    pub fn playlist_id(&self) -> Option<PlaylistId> {
        match self {
            Self::PlaylistActivated { playlist_id, .. }
            | Self::PlaylistDeactivated { playlist_id, .. }
            | Self::PlaylistReset { playlist_id }
            | Self::PartTaken { playlist_id, .. }
            | Self::NextPartChanged { playlist_id, .. }
            | Self::NextSegmentSet { playlist_id, .. }
            | Self::PartPlaybackStarted { playlist_id, .. }
            | Self::PartPlaybackStopped { playlist_id, .. }
            | Self::PlaybackTimingsChanged { playlist_id, .. }
            | Self::RundownOrphaned { playlist_id, .. } => Some(*playlist_id),
            Self::TimelineGenerated { playlist_id, .. } => *playlist_id,
        }
    }
}

/// Destination for playout events.
///
/// Publication happens post-commit from deferred effects; sinks must
/// not block for long and must never panic.
pub trait PlayoutEventSink: Send + Sync + 'static {
    /// Delivers one event.
    fn publish(&self, event: PlayoutEvent);
}

/// Sink that logs each event through `tracing`. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl PlayoutEventSink for TracingEventSink {
    fn publish(&self, event: PlayoutEvent) {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            studio_id = %event.studio_id,
            correlation_id = event.correlation_id.as_deref().unwrap_or(""),
            "playout event",
        );
    }
}

/// Sink that buffers events in memory, for tests and local tooling.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<PlayoutEvent>>,
}

impl InMemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all buffered events in publication order.
    pub fn drain(&self) -> Vec<PlayoutEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(events) => events.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns true if no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlayoutEventSink for InMemoryEventSink {
    fn publish(&self, event: PlayoutEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Debug, Default)]
struct PendingTimings {
    part_instance_ids: BTreeSet<PartInstanceId>,
    piece_instance_ids: BTreeSet<PieceInstanceId>,
}

/// Collector for coalesced playback-timing events.
///
/// Jobs that touch reported timings enqueue the affected instance ids
/// here; the transaction wrapper drains the playlist's pending set in a
/// deferred effect and emits a single [`PlayoutEventData::PlaybackTimingsChanged`].
#[derive(Debug, Default)]
pub struct TimingEventQueue {
    pending: Mutex<HashMap<PlaylistId, PendingTimings>>,
}

impl TimingEventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a part instance's reported timings changed.
    pub fn enqueue_part(&self, playlist_id: PlaylistId, part_instance_id: PartInstanceId) {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending
            .entry(playlist_id)
            .or_default()
            .part_instance_ids
            .insert(part_instance_id);
    }

    /// Records that a piece instance's reported timings changed.
    pub fn enqueue_piece(&self, playlist_id: PlaylistId, piece_instance_id: PieceInstanceId) {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending
            .entry(playlist_id)
            .or_default()
            .piece_instance_ids
            .insert(piece_instance_id);
    }

    /// Removes the pending set for a playlist and returns it as an
    /// event payload, or `None` when nothing was enqueued.
    pub fn drain_playlist(&self, playlist_id: PlaylistId) -> Option<PlayoutEventData> {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        let timings = pending.remove(&playlist_id)?;
        if timings.part_instance_ids.is_empty() && timings.piece_instance_ids.is_empty() {
            return None;
        }
        Some(PlayoutEventData::PlaybackTimingsChanged {
            playlist_id,
            part_instance_ids: timings.part_instance_ids.into_iter().collect(),
            piece_instance_ids: timings.piece_instance_ids.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_cloudevents_attributes() {
        let studio_id = StudioId::generate();
        let playlist_id = PlaylistId::generate();
        let event = PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PlaylistReset { playlist_id },
        );

        assert_eq!(event.id.len(), 26); // ULID length
        assert_eq!(event.specversion, "1.0");
        assert_eq!(event.event_type, "onair.playout.playlist_reset");
        assert!(event.source.contains("/onair/playout/"));
        assert!(event.time.is_some());
        assert_eq!(event.correlation_id, Some(playlist_id.to_string()));
    }

    #[test]
    fn envelope_serializes_cloudevents_format() -> serde_json::Result<()> {
        let event = PlayoutEvent::new(
            StudioId::generate(),
            PlayoutEventData::PartTaken {
                playlist_id: PlaylistId::generate(),
                part_instance_id: PartInstanceId::generate(),
                previous_part_instance_id: None,
                taken_at: 1_700_000_000_000,
            },
        );

        let json = serde_json::to_string(&event)?;
        assert!(json.contains("\"specversion\":\"1.0\""));
        assert!(json.contains("\"type\":\"onair.playout.part_taken\""));
        assert!(json.contains("\"data\":"));
        assert!(!json.contains("previous_part_instance_id"));

        Ok(())
    }

    #[test]
    fn envelopes_roundtrip_through_json() -> serde_json::Result<()> {
        let event = PlayoutEvent::new(
            StudioId::generate(),
            PlayoutEventData::PlaylistActivated {
                playlist_id: PlaylistId::generate(),
                activation_id: ActivationId::generate(),
                rehearsal: true,
            },
        );

        let json = serde_json::to_string(&event)?;
        let parsed: PlayoutEvent = serde_json::from_str(&json)?;

        assert_eq!(event.id, parsed.id);
        assert_eq!(event.event_type, parsed.event_type);

        Ok(())
    }

    #[test]
    fn in_memory_sink_buffers_in_order() {
        let sink = InMemoryEventSink::new();
        let studio_id = StudioId::generate();
        let playlist_id = PlaylistId::generate();

        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PlaylistReset { playlist_id },
        ));
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::NextPartChanged {
                playlist_id,
                part_instance_id: None,
            },
        ));

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "onair.playout.playlist_reset");
        assert_eq!(events[1].event_type, "onair.playout.next_part_changed");
        assert!(sink.is_empty());
    }

    #[test]
    fn timing_queue_coalesces_per_playlist() {
        let queue = TimingEventQueue::new();
        let playlist_a = PlaylistId::generate();
        let playlist_b = PlaylistId::generate();
        let part = PartInstanceId::generate();
        let piece = PieceInstanceId::generate();

        queue.enqueue_part(playlist_a, part);
        queue.enqueue_part(playlist_a, part);
        queue.enqueue_piece(playlist_a, piece);

        let Some(PlayoutEventData::PlaybackTimingsChanged {
            playlist_id,
            part_instance_ids,
            piece_instance_ids,
        }) = queue.drain_playlist(playlist_a)
        else {
            panic!("expected a coalesced timing payload");
        };

        assert_eq!(playlist_id, playlist_a);
        assert_eq!(part_instance_ids, vec![part]);
        assert_eq!(piece_instance_ids, vec![piece]);

        assert!(queue.drain_playlist(playlist_a).is_none());
        assert!(queue.drain_playlist(playlist_b).is_none());
    }

    #[test]
    fn timeline_generated_carries_no_correlation_without_playlist() {
        let event = PlayoutEvent::new(
            StudioId::generate(),
            PlayoutEventData::TimelineGenerated {
                playlist_id: None,
                hash: "abc".into(),
                object_count: 3,
            },
        );
        assert!(event.correlation_id.is_none());
    }
}
