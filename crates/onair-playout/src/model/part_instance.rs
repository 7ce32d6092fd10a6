//! Part instances: one playback occurrence of a part.
//!
//! The instance embeds a snapshot of its part, so the static part may
//! be changed or removed by ingest while the instance keeps playing
//! unchanged. Pointer states per instance:
//!
//! ```text
//!   unset ──▶ queued-next ──▶ current ──▶ previous ──▶ discarded
//! ```
//!
//! A superseded instance is marked `reset` rather than deleted; reset
//! instances are excluded from loading and must never be referenced by
//! the playlist's pointers.

use serde::{Deserialize, Serialize};

use onair_core::{ActivationId, PartInstanceId, RundownId, SegmentId, TimeMillis};

use super::part::Part;
use super::Document;

/// Why a part instance exists without backing static data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartInstanceOrphaned {
    /// Ingest removed the part while this instance was on air or
    /// queued.
    Deleted,
    /// The instance was created by an ad-lib action and never had a
    /// scripted part.
    AdlibPart,
}

/// Playback timing marks for a part instance, all in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInstanceTimings {
    /// When the take into this instance committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<TimeMillis>,
    /// When the take out of this instance committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_out: Option<TimeMillis>,
    /// When the playout device reported playback start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_started_playback: Option<TimeMillis>,
    /// When the playout device reported playback stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_stopped_playback: Option<TimeMillis>,
    /// Offset into the part content at which playback began, in
    /// milliseconds.
    #[serde(default)]
    pub play_offset: i64,
}

/// One playback occurrence of a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInstance {
    /// Unique instance identifier.
    pub id: PartInstanceId,
    /// The activation this instance belongs to.
    pub playlist_activation_id: ActivationId,
    /// The rundown of the snapshotted part.
    pub rundown_id: RundownId,
    /// The segment of the snapshotted part.
    pub segment_id: SegmentId,
    /// Snapshot of the part at selection time.
    pub part: Part,
    /// How many takes preceded this instance within the activation.
    pub take_count: u32,
    /// Superseded; excluded from loading and never referenced by the
    /// playlist pointers.
    #[serde(default)]
    pub reset: bool,
    /// Set when the instance has no backing static part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<PartInstanceOrphaned>,
    /// This instance consumed the playlist's next-segment override when
    /// it was selected.
    #[serde(default)]
    pub consumed_next_segment_id: bool,
    /// Playback timing marks.
    #[serde(default)]
    pub timings: PartInstanceTimings,
}

impl PartInstance {
    /// Creates a fresh instance snapshotting the given part.
    #[must_use]
    pub fn from_part(part: Part, playlist_activation_id: ActivationId, take_count: u32) -> Self {
        Self {
            id: PartInstanceId::generate(),
            playlist_activation_id,
            rundown_id: part.rundown_id,
            segment_id: part.segment_id,
            part,
            take_count,
            reset: false,
            orphaned: None,
            consumed_next_segment_id: false,
            timings: PartInstanceTimings::default(),
        }
    }

    /// Returns true if the take into this instance has committed.
    #[must_use]
    pub const fn is_taken(&self) -> bool {
        self.timings.take.is_some()
    }

    /// Returns true if the playout device reported playback start.
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.timings.reported_started_playback.is_some()
    }

    /// The best known start time: reported playback start, falling
    /// back to the take timestamp.
    #[must_use]
    pub fn started_or_taken_at(&self) -> Option<TimeMillis> {
        self.timings
            .reported_started_playback
            .or(self.timings.take)
    }

    /// The playhead position within this instance's content at `now`:
    /// time elapsed since the best known start, shifted by the offset
    /// the device reported it began at. Zero before any start mark.
    #[must_use]
    pub fn playhead_position(&self, now: TimeMillis) -> i64 {
        self.started_or_taken_at()
            .map_or(0, |started| now - started + self.timings.play_offset)
    }
}

impl Document for PartInstance {
    type Id = PartInstanceId;

    const KIND: &'static str = "partInstance";

    fn doc_id(&self) -> PartInstanceId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::{PartId, SegmentId};

    fn sample_part() -> Part {
        Part::new(
            PartId::generate(),
            SegmentId::generate(),
            RundownId::generate(),
            1.0,
            "headline",
        )
    }

    #[test]
    fn from_part_snapshots_bindings() {
        let part = sample_part();
        let instance = PartInstance::from_part(part.clone(), ActivationId::generate(), 3);

        assert_eq!(instance.rundown_id, part.rundown_id);
        assert_eq!(instance.segment_id, part.segment_id);
        assert_eq!(instance.part, part);
        assert_eq!(instance.take_count, 3);
        assert!(!instance.is_taken());
        assert!(!instance.has_started());
    }

    #[test]
    fn started_or_taken_prefers_reported_start() {
        let mut instance = PartInstance::from_part(sample_part(), ActivationId::generate(), 0);
        assert_eq!(instance.started_or_taken_at(), None);

        instance.timings.take = Some(5_000);
        assert_eq!(instance.started_or_taken_at(), Some(5_000));

        instance.timings.reported_started_playback = Some(5_040);
        assert_eq!(instance.started_or_taken_at(), Some(5_040));
    }
}
