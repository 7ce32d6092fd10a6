//! Pieces: the playable items inside a part.
//!
//! Each piece targets one source layer (a camera, a graphics engine, an
//! audio bed). Its lifespan decides whether it ends with its part or
//! keeps playing until a segment, rundown or show-style boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use onair_core::{PartId, PieceId, RundownId, SegmentId};

use super::Document;

/// How far past its origin part a piece stays alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceLifespan {
    /// Ends when its part goes off air.
    WithinPart,
    /// Keeps playing until the end of its segment.
    UntilSegmentEnd,
    /// Keeps playing until the end of its rundown.
    UntilRundownEnd,
    /// Keeps playing until playback leaves the show style.
    UntilShowStyleEnd,
}

impl PieceLifespan {
    /// Returns true if the piece may outlive its origin part.
    #[must_use]
    pub const fn is_infinite(&self) -> bool {
        !matches!(self, Self::WithinPart)
    }
}

/// When a piece starts relative to its part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "offset", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceStart {
    /// A fixed offset from the part's content start, in milliseconds.
    Offset(i64),
    /// Starts when triggered, resolved against the part-local playhead.
    Now,
}

/// The scripted timing window of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceEnable {
    /// When the piece starts relative to its part.
    pub start: PieceStart,
    /// Scripted duration in milliseconds; `None` plays until capped by
    /// the part boundary or by another piece on the same layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl PieceEnable {
    /// A piece starting at a fixed offset with no scripted duration.
    #[must_use]
    pub const fn at_offset(offset: i64) -> Self {
        Self {
            start: PieceStart::Offset(offset),
            duration: None,
        }
    }
}

/// The placement role of a piece inside its part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceKind {
    /// Placed by the generic offset rule.
    Normal,
    /// Placed at the transition into the part; only rendered when a
    /// transition is allowed for the take.
    InTransition,
    /// Anchored to the end of the part, backed off by its duration.
    OutTransition,
}

impl Default for PieceKind {
    fn default() -> Self {
        Self::Normal
    }
}

/// How a piece's timeline content behaves while a hold is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceHoldMode {
    /// Included regardless of hold state.
    Normal,
    /// Included only while a hold is active.
    OnlyDuringHold,
    /// Suppressed while a hold is active.
    ExceptDuringHold,
}

impl Default for PieceHoldMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// A scripted playable item on a source layer, produced by ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    /// Unique piece identifier.
    pub id: PieceId,
    /// The part this piece starts in.
    pub part_id: PartId,
    /// The segment of the origin part.
    pub segment_id: SegmentId,
    /// The rundown of the origin part.
    pub rundown_id: RundownId,
    /// Display name.
    pub name: String,
    /// The layer this piece plays on. At most one piece is live per
    /// layer at a time; later pieces cap earlier ones.
    pub source_layer: String,
    /// How far past its origin part the piece stays alive.
    pub lifespan: PieceLifespan,
    /// Scripted timing window.
    pub enable: PieceEnable,
    /// Placement role inside the part.
    #[serde(default)]
    pub kind: PieceKind,
    /// Behavior while a hold is active.
    #[serde(default)]
    pub hold_mode: PieceHoldMode,
    /// Opaque content descriptor passed through to the timeline.
    #[serde(default)]
    pub content: Value,
}

impl Piece {
    /// Creates a within-part piece starting at offset zero.
    #[must_use]
    pub fn new(
        id: PieceId,
        part_id: PartId,
        segment_id: SegmentId,
        rundown_id: RundownId,
        name: impl Into<String>,
        source_layer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            part_id,
            segment_id,
            rundown_id,
            name: name.into(),
            source_layer: source_layer.into(),
            lifespan: PieceLifespan::WithinPart,
            enable: PieceEnable::at_offset(0),
            kind: PieceKind::Normal,
            hold_mode: PieceHoldMode::Normal,
            content: Value::Null,
        }
    }
}

impl Document for Piece {
    type Id = PieceId;

    const KIND: &'static str = "piece";

    fn doc_id(&self) -> PieceId {
        self.id
    }
}
