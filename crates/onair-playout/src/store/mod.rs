//! The backing-store seam for playout documents.
//!
//! The engine never talks to a database directly: it loads a working
//! set through [`DocStore`]'s typed queries and writes the diffed
//! result back through a single atomic [`DocStore::commit`]. Writers
//! are serialized by the lock layer, so the store needs atomicity but
//! not optimistic concurrency.

pub mod memory;

use async_trait::async_trait;

use onair_core::{ActivationId, PlaylistId, RundownId, ShowStyleId, StudioId};

use crate::error::Result;
use crate::model::{
    Document, Part, PartInstance, Piece, PieceInstance, Playlist, Rundown, Segment, ShowStyle,
    Studio, Timeline,
};

pub use memory::MemoryDocStore;

/// Upserts and deletes for one document collection.
#[derive(Debug, Clone)]
pub struct DocChanges<D: Document> {
    /// Documents to create or replace.
    pub upserts: Vec<D>,
    /// Identities to remove.
    pub deletes: Vec<D::Id>,
}

impl<D: Document> DocChanges<D> {
    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Number of changed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}

impl<D: Document> Default for DocChanges<D> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

/// All changes produced by one committed transaction.
///
/// Applied atomically: either every change lands or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Playlist changes.
    pub playlists: DocChanges<Playlist>,
    /// Rundown changes.
    pub rundowns: DocChanges<Rundown>,
    /// Segment changes.
    pub segments: DocChanges<Segment>,
    /// Part changes.
    pub parts: DocChanges<Part>,
    /// Piece changes.
    pub pieces: DocChanges<Piece>,
    /// Part instance changes.
    pub part_instances: DocChanges<PartInstance>,
    /// Piece instance changes.
    pub piece_instances: DocChanges<PieceInstance>,
    /// Timeline changes.
    pub timelines: DocChanges<Timeline>,
}

impl WriteBatch {
    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
            && self.rundowns.is_empty()
            && self.segments.is_empty()
            && self.parts.is_empty()
            && self.pieces.is_empty()
            && self.part_instances.is_empty()
            && self.piece_instances.is_empty()
            && self.timelines.is_empty()
    }

    /// Total number of changed documents across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
            + self.rundowns.len()
            + self.segments.len()
            + self.parts.len()
            + self.pieces.len()
            + self.piece_instances.len()
            + self.part_instances.len()
            + self.timelines.len()
    }
}

/// Typed loads and atomic writes for playout documents.
///
/// Implementations report backend faults as
/// [`onair_core::Error::Storage`], wrapped into the playout taxonomy by
/// the `?` at each call site.
#[async_trait]
pub trait DocStore: Send + Sync + 'static {
    /// Loads a studio.
    async fn load_studio(&self, studio_id: StudioId) -> Result<Option<Studio>>;

    /// Loads a show style.
    async fn load_show_style(&self, show_style_id: ShowStyleId) -> Result<Option<ShowStyle>>;

    /// Loads a playlist.
    async fn load_playlist(&self, playlist_id: PlaylistId) -> Result<Option<Playlist>>;

    /// Loads every playlist in a studio.
    async fn load_playlists_in_studio(&self, studio_id: StudioId) -> Result<Vec<Playlist>>;

    /// Loads the rundowns of a playlist.
    async fn load_rundowns(&self, playlist_id: PlaylistId) -> Result<Vec<Rundown>>;

    /// Loads the segments of the given rundowns.
    async fn load_segments(&self, rundown_ids: &[RundownId]) -> Result<Vec<Segment>>;

    /// Loads the parts of the given rundowns.
    async fn load_parts(&self, rundown_ids: &[RundownId]) -> Result<Vec<Part>>;

    /// Loads the pieces of the given rundowns.
    async fn load_pieces(&self, rundown_ids: &[RundownId]) -> Result<Vec<Piece>>;

    /// Loads the non-reset part instances of one activation.
    async fn load_part_instances(
        &self,
        playlist_id: PlaylistId,
        activation_id: ActivationId,
    ) -> Result<Vec<PartInstance>>;

    /// Loads the non-reset piece instances of one activation.
    async fn load_piece_instances(
        &self,
        playlist_id: PlaylistId,
        activation_id: ActivationId,
    ) -> Result<Vec<PieceInstance>>;

    /// Loads a studio's timeline.
    async fn load_timeline(&self, studio_id: StudioId) -> Result<Option<Timeline>>;

    /// Applies a batch of changes atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}
