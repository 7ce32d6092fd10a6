//! Parts: the scripted units of playback.
//!
//! Taking a part puts it on air. Parts are immutable outside ingest;
//! the playout engine snapshots them into part instances at selection
//! time and plays from the snapshot.

use serde::{Deserialize, Serialize};

use onair_core::{PartId, RundownId, SegmentId};

use super::Document;

/// How a part participates in a hold transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartHoldMode {
    /// The part takes no role in holds.
    None,
    /// A hold may start from this part.
    From,
    /// A hold may land on this part.
    To,
}

impl Default for PartHoldMode {
    fn default() -> Self {
        Self::None
    }
}

/// Timing of the transition into a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInTransition {
    /// How long takes are blocked after this transition starts, in
    /// milliseconds.
    pub block_take_duration: i64,
    /// How long the previous part's content is kept alive into this
    /// part, in milliseconds.
    pub previous_part_keepalive: i64,
    /// Delay before this part's own content begins, in milliseconds.
    pub content_delay: i64,
}

/// Timing of the transition out of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartOutTransition {
    /// How long before the part ends its out-transition content starts,
    /// in milliseconds.
    pub duration: i64,
}

/// A scripted unit of content, produced by ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Unique part identifier.
    pub id: PartId,
    /// The segment this part belongs to.
    pub segment_id: SegmentId,
    /// The rundown this part belongs to.
    pub rundown_id: RundownId,
    /// Position within the segment. Fractional so ingest can insert
    /// between neighbours without renumbering.
    pub rank: f64,
    /// Display title.
    pub title: String,
    /// Scripted duration in milliseconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<i64>,
    /// Whether the next part is taken automatically when this one's
    /// expected duration elapses.
    #[serde(default)]
    pub auto_next: bool,
    /// Overlap into the next part when auto-next fires, in milliseconds.
    #[serde(default)]
    pub auto_next_overlap: i64,
    /// Role in hold transitions.
    #[serde(default)]
    pub hold_mode: PartHoldMode,
    /// How early this part's content must start before it is on air, in
    /// milliseconds.
    #[serde(default)]
    pub preroll: i64,
    /// Scripted transition into this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_transition: Option<PartInTransition>,
    /// Suppresses the next part's in-transition when taking out of this
    /// part.
    #[serde(default)]
    pub disable_next_in_transition: bool,
    /// Scripted transition out of this part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_transition: Option<PartOutTransition>,
    /// The part cannot be played (bad ingest data, missing media).
    #[serde(default)]
    pub invalid: bool,
    /// The part was taken out of the running order by the operator but
    /// kept in place.
    #[serde(default)]
    pub floated: bool,
}

impl Part {
    /// Creates a minimal playable part.
    #[must_use]
    pub fn new(
        id: PartId,
        segment_id: SegmentId,
        rundown_id: RundownId,
        rank: f64,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            segment_id,
            rundown_id,
            rank,
            title: title.into(),
            expected_duration: None,
            auto_next: false,
            auto_next_overlap: 0,
            hold_mode: PartHoldMode::None,
            preroll: 0,
            in_transition: None,
            disable_next_in_transition: false,
            out_transition: None,
            invalid: false,
            floated: false,
        }
    }

    /// Returns true if this part may be selected and taken.
    #[must_use]
    pub const fn is_playable(&self) -> bool {
        !self.invalid && !self.floated
    }

    /// Returns the out-transition duration, or zero when there is none.
    #[must_use]
    pub fn out_transition_duration(&self) -> i64 {
        self.out_transition.as_ref().map_or(0, |t| t.duration)
    }
}

impl Document for Part {
    type Id = PartId;

    const KIND: &'static str = "part";

    fn doc_id(&self) -> PartId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playability_requires_neither_invalid_nor_floated() {
        let mut part = Part::new(
            PartId::generate(),
            SegmentId::generate(),
            RundownId::generate(),
            1.0,
            "opening",
        );
        assert!(part.is_playable());

        part.invalid = true;
        assert!(!part.is_playable());

        part.invalid = false;
        part.floated = true;
        assert!(!part.is_playable());
    }

    #[test]
    fn out_transition_duration_defaults_to_zero() {
        let mut part = Part::new(
            PartId::generate(),
            SegmentId::generate(),
            RundownId::generate(),
            1.0,
            "closing",
        );
        assert_eq!(part.out_transition_duration(), 0);

        part.out_transition = Some(PartOutTransition { duration: 480 });
        assert_eq!(part.out_transition_duration(), 480);
    }
}
