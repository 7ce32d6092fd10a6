//! Working sets for playlist- and studio-scoped jobs.
//!
//! [`PlayoutCache`] is the arena a playlist job runs against: the
//! playlist itself, its static rundown/segment/part/piece documents,
//! the non-reset instances of the current activation, and the studio's
//! timeline. All cross-references stay opaque ids; joins are resolved
//! through the accessors here, inside the transaction boundary.

use std::sync::Arc;

use onair_core::id::{PartInstanceId, PlaylistId, RundownId, StudioId};

use crate::cache::doc_map::{DocCell, DocMap};
use crate::error::{Error, Result};
use crate::model::{
    Part, PartInstance, Piece, PieceInstance, Playlist, Rundown, Segment, Timeline,
};
use crate::store::{DocStore, WriteBatch};

/// The working set of one playlist-scoped job.
#[derive(Debug)]
pub struct PlayoutCache {
    studio_id: StudioId,
    playlist: Playlist,
    playlist_snapshot: Playlist,
    timeline: DocCell<Timeline>,
    rundowns: DocMap<Rundown>,
    segments: DocMap<Segment>,
    parts: DocMap<Part>,
    pieces: DocMap<Piece>,
    part_instances: DocMap<PartInstance>,
    piece_instances: DocMap<PieceInstance>,
}

impl PlayoutCache {
    /// Loads the full working set for one playlist.
    ///
    /// Instances are loaded only while the playlist is active; the
    /// store query already excludes reset instances.
    ///
    /// # Errors
    ///
    /// Returns not-found when the playlist does not exist, otherwise
    /// the store's error.
    pub async fn load(
        store: &Arc<dyn DocStore>,
        studio_id: StudioId,
        playlist_id: PlaylistId,
    ) -> Result<Self> {
        let playlist = store
            .load_playlist(playlist_id)
            .await?
            .ok_or_else(|| {
                onair_core::Error::resource_not_found("playlist", playlist_id.to_string())
            })?;

        let rundowns = store.load_rundowns(playlist_id).await?;
        let rundown_ids: Vec<RundownId> = rundowns.iter().map(|rundown| rundown.id).collect();

        let segments = store.load_segments(&rundown_ids).await?;
        let parts = store.load_parts(&rundown_ids).await?;
        let pieces = store.load_pieces(&rundown_ids).await?;

        let (part_instances, piece_instances) = match playlist.activation_id {
            Some(activation_id) => (
                store.load_part_instances(playlist_id, activation_id).await?,
                store
                    .load_piece_instances(playlist_id, activation_id)
                    .await?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        let timeline = store.load_timeline(studio_id).await?;

        Ok(Self {
            studio_id,
            playlist_snapshot: playlist.clone(),
            playlist,
            timeline: DocCell::loaded(timeline),
            rundowns: DocMap::from_docs(rundowns),
            segments: DocMap::from_docs(segments),
            parts: DocMap::from_docs(parts),
            pieces: DocMap::from_docs(pieces),
            part_instances: DocMap::from_docs(part_instances),
            piece_instances: DocMap::from_docs(piece_instances),
        })
    }

    /// The studio this cache belongs to.
    #[must_use]
    pub fn studio_id(&self) -> StudioId {
        self.studio_id
    }

    /// The playlist, read-only.
    #[must_use]
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// The playlist, for mutation.
    #[must_use]
    pub fn playlist_mut(&mut self) -> &mut Playlist {
        &mut self.playlist
    }

    /// The studio timeline cell.
    #[must_use]
    pub fn timeline(&self) -> &DocCell<Timeline> {
        &self.timeline
    }

    /// The studio timeline cell, for mutation.
    #[must_use]
    pub fn timeline_mut(&mut self) -> &mut DocCell<Timeline> {
        &mut self.timeline
    }

    /// Rundowns of this playlist.
    #[must_use]
    pub fn rundowns(&self) -> &DocMap<Rundown> {
        &self.rundowns
    }

    /// Rundowns of this playlist, for mutation.
    #[must_use]
    pub fn rundowns_mut(&mut self) -> &mut DocMap<Rundown> {
        &mut self.rundowns
    }

    /// Segments of this playlist's rundowns.
    #[must_use]
    pub fn segments(&self) -> &DocMap<Segment> {
        &self.segments
    }

    /// Segments, for mutation.
    #[must_use]
    pub fn segments_mut(&mut self) -> &mut DocMap<Segment> {
        &mut self.segments
    }

    /// Static parts.
    #[must_use]
    pub fn parts(&self) -> &DocMap<Part> {
        &self.parts
    }

    /// Static parts, for mutation.
    #[must_use]
    pub fn parts_mut(&mut self) -> &mut DocMap<Part> {
        &mut self.parts
    }

    /// Static pieces.
    #[must_use]
    pub fn pieces(&self) -> &DocMap<Piece> {
        &self.pieces
    }

    /// Static pieces, for mutation.
    #[must_use]
    pub fn pieces_mut(&mut self) -> &mut DocMap<Piece> {
        &mut self.pieces
    }

    /// Part instances of the current activation.
    #[must_use]
    pub fn part_instances(&self) -> &DocMap<PartInstance> {
        &self.part_instances
    }

    /// Part instances, for mutation.
    #[must_use]
    pub fn part_instances_mut(&mut self) -> &mut DocMap<PartInstance> {
        &mut self.part_instances
    }

    /// Piece instances of the current activation.
    #[must_use]
    pub fn piece_instances(&self) -> &DocMap<PieceInstance> {
        &self.piece_instances
    }

    /// Piece instances, for mutation.
    #[must_use]
    pub fn piece_instances_mut(&mut self) -> &mut DocMap<PieceInstance> {
        &mut self.piece_instances
    }

    /// The instance currently on air.
    #[must_use]
    pub fn current_part_instance(&self) -> Option<&PartInstance> {
        self.playlist
            .current_part_instance_id
            .and_then(|id| self.part_instances.get(id))
    }

    /// The queued-next instance.
    #[must_use]
    pub fn next_part_instance(&self) -> Option<&PartInstance> {
        self.playlist
            .next_part_instance_id
            .and_then(|id| self.part_instances.get(id))
    }

    /// The instance that most recently went off air.
    #[must_use]
    pub fn previous_part_instance(&self) -> Option<&PartInstance> {
        self.playlist
            .previous_part_instance_id
            .and_then(|id| self.part_instances.get(id))
    }

    /// The instance currently on air, or the typed precondition error.
    ///
    /// # Errors
    ///
    /// [`Error::NoCurrentPart`] when nothing is on air.
    pub fn require_current_part_instance(&self) -> Result<&PartInstance> {
        self.current_part_instance().ok_or(Error::NoCurrentPart)
    }

    /// Piece instances belonging to one part instance, in id order.
    pub fn piece_instances_of(
        &self,
        part_instance_id: PartInstanceId,
    ) -> impl Iterator<Item = &PieceInstance> {
        self.piece_instances
            .values()
            .filter(move |instance| instance.part_instance_id == part_instance_id)
    }

    /// Consumes the cache into the batch of changed documents.
    #[must_use]
    pub fn into_write_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::default();
        if self.playlist != self.playlist_snapshot {
            batch.playlists.upserts.push(self.playlist);
        }
        batch.timelines = self.timeline.into_changes();
        batch.rundowns = self.rundowns.into_changes();
        batch.segments = self.segments.into_changes();
        batch.parts = self.parts.into_changes();
        batch.pieces = self.pieces.into_changes();
        batch.part_instances = self.part_instances.into_changes();
        batch.piece_instances = self.piece_instances.into_changes();
        batch
    }
}

/// The working set of one studio-scoped (playlist-independent) job.
///
/// Playlists are a read-only view here; studio jobs consult them (is
/// anything active?) but only ever write the timeline. Playlist
/// mutation stays with [`PlayoutCache`] under the playlist lock.
#[derive(Debug)]
pub struct StudioCache {
    studio_id: StudioId,
    playlists: DocMap<Playlist>,
    timeline: DocCell<Timeline>,
}

impl StudioCache {
    /// Loads every playlist in the studio plus the studio timeline.
    ///
    /// # Errors
    ///
    /// Returns the store's error on load failure.
    pub async fn load(store: &Arc<dyn DocStore>, studio_id: StudioId) -> Result<Self> {
        let playlists = store.load_playlists_in_studio(studio_id).await?;
        let timeline = store.load_timeline(studio_id).await?;
        Ok(Self {
            studio_id,
            playlists: DocMap::from_docs(playlists),
            timeline: DocCell::loaded(timeline),
        })
    }

    /// The studio this cache belongs to.
    #[must_use]
    pub fn studio_id(&self) -> StudioId {
        self.studio_id
    }

    /// Playlists of the studio.
    #[must_use]
    pub fn playlists(&self) -> &DocMap<Playlist> {
        &self.playlists
    }

    /// The playlist currently holding an activation, if any.
    #[must_use]
    pub fn active_playlist(&self) -> Option<&Playlist> {
        self.playlists.values().find(|playlist| playlist.is_active())
    }

    /// The studio timeline cell.
    #[must_use]
    pub fn timeline(&self) -> &DocCell<Timeline> {
        &self.timeline
    }

    /// The studio timeline cell, for mutation.
    #[must_use]
    pub fn timeline_mut(&mut self) -> &mut DocCell<Timeline> {
        &mut self.timeline
    }

    /// Consumes the cache into the batch of changed documents.
    #[must_use]
    pub fn into_write_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::default();
        batch.timelines = self.timeline.into_changes();
        batch
    }
}
