//! Document model for the playout engine.
//!
//! Two families of documents live here:
//!
//! - **Static documents** (rundown, segment, part, piece) describe the
//!   scripted show. Ingest owns them; playout never mutates their
//!   content, only orphan markers and removal.
//! - **Playback documents** (playlist, part instance, piece instance,
//!   timeline) record what actually happened on air. Instances embed a
//!   snapshot of their static source so they keep playing even when
//!   ingest changes or removes it mid-broadcast.
//!
//! All cross-references are opaque ids; joins are resolved inside the
//! transaction boundary by the cache layer.

pub mod part;
pub mod part_instance;
pub mod piece;
pub mod piece_instance;
pub mod playlist;
pub mod rundown;
pub mod segment;
pub mod studio;
pub mod timeline;

pub use part::{Part, PartHoldMode, PartInTransition, PartOutTransition};
pub use part_instance::{PartInstance, PartInstanceOrphaned, PartInstanceTimings};
pub use piece::{Piece, PieceEnable, PieceHoldMode, PieceKind, PieceLifespan, PieceStart};
pub use piece_instance::{PieceInstance, PieceInstanceInfinite, PieceUserDuration};
pub use playlist::{HoldState, Playlist};
pub use rundown::{Rundown, RundownOrphaned};
pub use segment::{Segment, SegmentOrphaned};
pub use studio::{LookaheadLayer, ShowStyle, Studio, StudioSettings};
pub use timeline::{
    ExprAnchor, TimeRef, Timeline, TimelineEnable, TimelineKeyframe, TimelineObjHoldMode,
    TimelineObjId, TimelineObject, TimelineVersions,
};

/// A persistable document with a typed identity.
///
/// The cache keys its working set by `Document::Id` and detects changes
/// by `PartialEq` against the loaded snapshot, so implementations must
/// compare by value.
pub trait Document: Clone + PartialEq + Send + Sync + 'static {
    /// Identifier type for this document kind.
    type Id: Copy + Ord + Eq + std::hash::Hash + std::fmt::Display + Send + Sync + 'static;

    /// Collection name, used in logs and errors.
    const KIND: &'static str;

    /// Returns the document's identity.
    fn doc_id(&self) -> Self::Id;
}
