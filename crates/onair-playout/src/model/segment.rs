//! Segments: ordered groups of parts within a rundown.

use serde::{Deserialize, Serialize};

use onair_core::{RundownId, SegmentId};

use super::Document;

/// Why a segment is excluded from normal playback ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentOrphaned {
    /// Ingest removed the segment while it was still current or next;
    /// structural removal is deferred until it goes off air.
    Deleted,
    /// The segment is hidden from playback but its data is retained.
    Hidden,
    /// A scratchpad segment used for rehearsing content outside the
    /// scripted show. Never part of the normal playback order.
    Scratchpad,
}

/// An ordered group of parts, produced by ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Unique segment identifier.
    pub id: SegmentId,
    /// The rundown this segment belongs to.
    pub rundown_id: RundownId,
    /// Position within the rundown. Fractional so ingest can insert
    /// between neighbours without renumbering.
    pub rank: f64,
    /// Display name.
    pub name: String,
    /// Set when the segment is excluded from normal playback ordering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<SegmentOrphaned>,
}

impl Segment {
    /// Creates a segment at the given rank.
    #[must_use]
    pub fn new(id: SegmentId, rundown_id: RundownId, rank: f64, name: impl Into<String>) -> Self {
        Self {
            id,
            rundown_id,
            rank,
            name: name.into(),
            orphaned: None,
        }
    }

    /// Returns true if this is a scratchpad segment.
    #[must_use]
    pub fn is_scratchpad(&self) -> bool {
        self.orphaned == Some(SegmentOrphaned::Scratchpad)
    }
}

impl Document for Segment {
    type Id = SegmentId;

    const KIND: &'static str = "segment";

    fn doc_id(&self) -> SegmentId {
        self.id
    }
}
