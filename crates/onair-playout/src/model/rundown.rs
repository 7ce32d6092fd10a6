//! Rundowns: ordered groups of segments.

use serde::{Deserialize, Serialize};

use onair_core::{PlaylistId, RundownId, ShowStyleId};

use super::Document;

/// Why a rundown exists only as playback history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RundownOrphaned {
    /// Ingest removed the rundown while it was still referenced by
    /// on-air state.
    Deleted,
}

/// An ordered group of segments, produced by ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rundown {
    /// Unique rundown identifier.
    pub id: RundownId,
    /// The playlist this rundown belongs to.
    pub playlist_id: PlaylistId,
    /// The show style this rundown was produced against.
    pub show_style_id: ShowStyleId,
    /// Display name.
    pub name: String,
    /// Set when the backing data was removed but the rundown is still
    /// referenced by on-air state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<RundownOrphaned>,
}

impl Rundown {
    /// Creates a rundown bound to a playlist and show style.
    #[must_use]
    pub fn new(
        id: RundownId,
        playlist_id: PlaylistId,
        show_style_id: ShowStyleId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            playlist_id,
            show_style_id,
            name: name.into(),
            orphaned: None,
        }
    }
}

impl Document for Rundown {
    type Id = RundownId;

    const KIND: &'static str = "rundown";

    fn doc_id(&self) -> RundownId {
        self.id
    }
}
