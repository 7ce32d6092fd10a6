//! Piece instances: one playback occurrence of a piece.
//!
//! Created at next-selection time, by the continuity resolver, or by an
//! ad-lib action. Instances of open-ended pieces carry continuation
//! metadata: every instance sharing an `InfiniteId` represents the same
//! on-air content continuing across part boundaries, not a restart.

use serde::{Deserialize, Serialize};

use onair_core::{ActivationId, InfiniteId, PartInstanceId, PieceId, PieceInstanceId, TimeMillis};

use super::piece::Piece;
use super::Document;

/// Continuation metadata for an instance of an open-ended piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceInstanceInfinite {
    /// Stable identity of this logical run of the piece. Appears at
    /// most once among the piece instances of any single part instance.
    pub infinite_id: InfiniteId,
    /// The piece this run originates from.
    pub from_piece_id: PieceId,
    /// True when the run was inherited from an earlier part rather than
    /// starting in this one. Inherited runs never re-trigger
    /// start-of-playback side effects.
    #[serde(default)]
    pub from_previous_part: bool,
    /// True when the run was carried over from the live playhead, as
    /// opposed to derived from scripted structure. The playhead re-sync
    /// replaces exactly these instances on the queued-next part.
    #[serde(default)]
    pub from_playhead: bool,
}

impl PieceInstanceInfinite {
    /// Continuation metadata for a run starting in this part.
    #[must_use]
    pub fn starting(from_piece_id: PieceId) -> Self {
        Self {
            infinite_id: InfiniteId::generate(),
            from_piece_id,
            from_previous_part: false,
            from_playhead: false,
        }
    }

    /// Continuation metadata for a fresh run of a piece scripted in an
    /// earlier part.
    #[must_use]
    pub fn inherited(from_piece_id: PieceId) -> Self {
        Self {
            infinite_id: InfiniteId::generate(),
            from_piece_id,
            from_previous_part: true,
            from_playhead: false,
        }
    }

    /// Continuation metadata carrying a live run into a new part.
    #[must_use]
    pub const fn continued(infinite_id: InfiniteId, from_piece_id: PieceId) -> Self {
        Self {
            infinite_id,
            from_piece_id,
            from_previous_part: true,
            from_playhead: true,
        }
    }
}

/// An operator-applied override of when a piece instance ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceUserDuration {
    /// End at a fixed offset from the part's content start, in
    /// milliseconds.
    EndRelativeToPart(i64),
    /// End at the given wall-clock time (epoch milliseconds), recorded
    /// when the operator stopped the piece.
    EndAt(TimeMillis),
}

/// One playback occurrence of a piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceInstance {
    /// Unique instance identifier.
    pub id: PieceInstanceId,
    /// The activation this instance belongs to.
    pub playlist_activation_id: ActivationId,
    /// The part instance this piece instance belongs to. Always exactly
    /// one, within the same activation.
    pub part_instance_id: PartInstanceId,
    /// Snapshot of the piece at instantiation time.
    pub piece: Piece,
    /// Continuation metadata; present only for open-ended pieces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infinite: Option<PieceInstanceInfinite>,
    /// Superseded together with its part instance.
    #[serde(default)]
    pub reset: bool,
    /// Disabled by the operator; excluded from timeline output.
    #[serde(default)]
    pub disabled: bool,
    /// Set when the instance was inserted by an ad-lib action, to the
    /// insertion time in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamically_inserted: Option<TimeMillis>,
    /// Operator-applied end override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_duration: Option<PieceUserDuration>,
    /// When the playout device reported playback start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_started_playback: Option<TimeMillis>,
    /// When the playout device reported playback stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_stopped_playback: Option<TimeMillis>,
}

impl PieceInstance {
    /// Creates an instance of a piece native to the given part
    /// instance. Open-ended pieces start a fresh continuation.
    #[must_use]
    pub fn from_piece(
        piece: Piece,
        part_instance_id: PartInstanceId,
        playlist_activation_id: ActivationId,
    ) -> Self {
        let infinite = piece
            .lifespan
            .is_infinite()
            .then(|| PieceInstanceInfinite::starting(piece.id));
        Self {
            id: PieceInstanceId::generate(),
            playlist_activation_id,
            part_instance_id,
            piece,
            infinite,
            reset: false,
            disabled: false,
            dynamically_inserted: None,
            user_duration: None,
            reported_started_playback: None,
            reported_stopped_playback: None,
        }
    }

    /// Returns the continuation id, if this instance is part of an
    /// open-ended run.
    #[must_use]
    pub fn infinite_id(&self) -> Option<InfiniteId> {
        self.infinite.map(|i| i.infinite_id)
    }

    /// Returns true if this instance continues a run inherited from an
    /// earlier part.
    #[must_use]
    pub fn is_inherited_continuation(&self) -> bool {
        self.infinite.is_some_and(|i| i.from_previous_part)
    }

    /// Returns true if this instance was carried over from the live
    /// playhead by the continuity re-sync.
    #[must_use]
    pub fn is_playhead_carried(&self) -> bool {
        self.infinite.is_some_and(|i| i.from_playhead)
    }

    /// Returns true if this instance was inserted by an ad-lib action
    /// rather than inherited or scripted.
    #[must_use]
    pub const fn is_dynamically_inserted(&self) -> bool {
        self.dynamically_inserted.is_some()
    }
}

impl Document for PieceInstance {
    type Id = PieceInstanceId;

    const KIND: &'static str = "pieceInstance";

    fn doc_id(&self) -> PieceInstanceId {
        self.id
    }
}
