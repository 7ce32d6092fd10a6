//! Rundown playlists: the unit of playback.
//!
//! A playlist spans one or more rundowns played out as a single on-air
//! sequence. Activation state, the playhead pointers (current / next /
//! previous part instance) and the hold state machine all live here.
//!
//! ## Hold state machine
//!
//! ```text
//!   NONE ──▶ PENDING ──▶ ACTIVE ──▶ NONE
//!              │                     ▲
//!              └─────────────────────┘  (deactivate before the take)
//! ```
//!
//! A pending hold becomes active during the take into the TO part; the
//! take after that completes it back to none.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use onair_core::{ActivationId, PartInstanceId, PlaylistId, RundownId, SegmentId, StudioId};
use onair_core::TimeMillis;

use super::Document;

/// Hold state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    /// No hold in progress.
    None,
    /// A hold is armed; the next take enters it.
    Pending,
    /// The held transition is on air; the next take completes it.
    Active,
}

impl HoldState {
    /// Returns true if a hold is armed or on air.
    #[must_use]
    pub const fn is_in_hold(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::None => matches!(target, Self::Pending),
            Self::Pending => matches!(target, Self::Active | Self::None),
            Self::Active => matches!(target, Self::None),
        }
    }
}

impl Default for HoldState {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for HoldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

/// One on-air sequence, spanning one or more rundowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Unique playlist identifier.
    pub id: PlaylistId,
    /// Studio this playlist plays out in.
    pub studio_id: StudioId,
    /// Display name.
    pub name: String,
    /// Set while the playlist is active. Regenerated on every
    /// activation; instance documents carry it so stale instances from
    /// a previous activation are distinguishable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_id: Option<ActivationId>,
    /// True when the active session is a rehearsal.
    #[serde(default)]
    pub rehearsal: bool,
    /// The on-air part instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_part_instance_id: Option<PartInstanceId>,
    /// The queued-next part instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_part_instance_id: Option<PartInstanceId>,
    /// The part instance that was on air before the current one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_part_instance_id: Option<PartInstanceId>,
    /// Hold state machine position.
    #[serde(default)]
    pub hold_state: HoldState,
    /// Whether selection wraps to the first part when the last part has
    /// played.
    #[serde(default)]
    pub loop_enabled: bool,
    /// Pending "jump to this segment" override for the next selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_segment_id: Option<SegmentId>,
    /// Rundowns in playback order.
    pub rundown_ids_in_order: Vec<RundownId>,
    /// When the playlist was last activated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    /// Epoch milliseconds of the first take of this activation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_playback_at: Option<TimeMillis>,
    /// When the playlist was last reset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl Playlist {
    /// Creates an inactive playlist with no rundowns.
    #[must_use]
    pub fn new(id: PlaylistId, studio_id: StudioId, name: impl Into<String>) -> Self {
        Self {
            id,
            studio_id,
            name: name.into(),
            activation_id: None,
            rehearsal: false,
            current_part_instance_id: None,
            next_part_instance_id: None,
            previous_part_instance_id: None,
            hold_state: HoldState::None,
            loop_enabled: false,
            next_segment_id: None,
            rundown_ids_in_order: Vec::new(),
            activated_at: None,
            started_playback_at: None,
            last_reset_at: None,
        }
    }

    /// Returns true if the playlist holds an activation id.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.activation_id.is_some()
    }

    /// Returns true if a hold is armed or on air.
    #[must_use]
    pub const fn is_in_hold(&self) -> bool {
        self.hold_state.is_in_hold()
    }
}

impl Document for Playlist {
    type Id = PlaylistId;

    const KIND: &'static str = "playlist";

    fn doc_id(&self) -> PlaylistId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_state_transitions() {
        assert!(HoldState::None.can_transition_to(HoldState::Pending));
        assert!(!HoldState::None.can_transition_to(HoldState::Active));
        assert!(HoldState::Pending.can_transition_to(HoldState::Active));
        assert!(HoldState::Pending.can_transition_to(HoldState::None));
        assert!(HoldState::Active.can_transition_to(HoldState::None));
        assert!(!HoldState::Active.can_transition_to(HoldState::Pending));
    }

    #[test]
    fn new_playlist_is_inactive() {
        let playlist = Playlist::new(PlaylistId::generate(), StudioId::generate(), "morning");
        assert!(!playlist.is_active());
        assert!(!playlist.is_in_hold());
        assert!(playlist.current_part_instance_id.is_none());
    }

    #[test]
    fn playlist_serde_roundtrip() {
        let mut playlist = Playlist::new(PlaylistId::generate(), StudioId::generate(), "evening");
        playlist.activation_id = Some(ActivationId::generate());
        playlist.hold_state = HoldState::Pending;

        let json = serde_json::to_string(&playlist).expect("serialize playlist");
        let back: Playlist = serde_json::from_str(&json).expect("deserialize playlist");
        assert_eq!(playlist, back);
    }
}
