//! In-memory document store for testing and embedding.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process
//!   boundaries

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use onair_core::{
    ActivationId, PartId, PartInstanceId, PieceId, PieceInstanceId, PlaylistId, RundownId,
    SegmentId, ShowStyleId, StudioId,
};

use super::{DocStore, WriteBatch};
use crate::error::{Error, Result};
use crate::model::{
    Part, PartInstance, Piece, PieceInstance, Playlist, Rundown, Segment, ShowStyle, Studio,
    Timeline,
};

#[derive(Debug, Default)]
struct Collections {
    studios: HashMap<StudioId, Studio>,
    show_styles: HashMap<ShowStyleId, ShowStyle>,
    playlists: HashMap<PlaylistId, Playlist>,
    rundowns: HashMap<RundownId, Rundown>,
    segments: HashMap<SegmentId, Segment>,
    parts: HashMap<PartId, Part>,
    pieces: HashMap<PieceId, Piece>,
    part_instances: HashMap<PartInstanceId, PartInstance>,
    piece_instances: HashMap<PieceInstanceId, PieceInstance>,
    timelines: HashMap<StudioId, Timeline>,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("store lock poisoned")
}

/// In-memory [`DocStore`] backed by a `RwLock`ed set of hash maps.
///
/// Loads return documents sorted by id so tests observe a stable
/// order; semantic ordering (ranks, playlist order) is the ordered
/// view's job, not the store's.
#[derive(Debug, Default)]
pub struct MemoryDocStore {
    inner: RwLock<Collections>,
}

impl MemoryDocStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a studio.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_studio(&self, studio: Studio) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.studios.insert(studio.id, studio);
        Ok(())
    }

    /// Seeds a show style.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_show_style(&self, show_style: ShowStyle) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.show_styles.insert(show_style.id, show_style);
        Ok(())
    }

    /// Seeds a playlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_playlist(&self, playlist: Playlist) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.playlists.insert(playlist.id, playlist);
        Ok(())
    }

    /// Seeds a rundown.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_rundown(&self, rundown: Rundown) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.rundowns.insert(rundown.id, rundown);
        Ok(())
    }

    /// Seeds a segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_segment(&self, segment: Segment) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.segments.insert(segment.id, segment);
        Ok(())
    }

    /// Seeds a part.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_part(&self, part: Part) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.parts.insert(part.id, part);
        Ok(())
    }

    /// Seeds a piece.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_piece(&self, piece: Piece) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.pieces.insert(piece.id, piece);
        Ok(())
    }

    /// Seeds a part instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_part_instance(&self, instance: PartInstance) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.part_instances.insert(instance.id, instance);
        Ok(())
    }

    /// Seeds a piece instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_piece_instance(&self, instance: PieceInstance) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.piece_instances.insert(instance.id, instance);
        Ok(())
    }

    /// Reads a playlist directly, bypassing the trait.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn playlist(&self, playlist_id: PlaylistId) -> Result<Option<Playlist>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.playlists.get(&playlist_id).cloned())
    }

    /// Reads a part instance directly, bypassing the trait.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn part_instance(&self, id: PartInstanceId) -> Result<Option<PartInstance>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.part_instances.get(&id).cloned())
    }

    /// Reads every piece instance of one part instance, including reset
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn piece_instances_of(&self, part_instance_id: PartInstanceId) -> Result<Vec<PieceInstance>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<PieceInstance> = inner
            .piece_instances
            .values()
            .filter(|pi| pi.part_instance_id == part_instance_id)
            .cloned()
            .collect();
        out.sort_by_key(|pi| pi.id);
        Ok(out)
    }

    /// Reads a studio's timeline directly, bypassing the trait.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn timeline(&self, studio_id: StudioId) -> Result<Option<Timeline>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.timelines.get(&studio_id).cloned())
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn load_studio(&self, studio_id: StudioId) -> Result<Option<Studio>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.studios.get(&studio_id).cloned())
    }

    async fn load_show_style(&self, show_style_id: ShowStyleId) -> Result<Option<ShowStyle>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.show_styles.get(&show_style_id).cloned())
    }

    async fn load_playlist(&self, playlist_id: PlaylistId) -> Result<Option<Playlist>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.playlists.get(&playlist_id).cloned())
    }

    async fn load_playlists_in_studio(&self, studio_id: StudioId) -> Result<Vec<Playlist>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<Playlist> = inner
            .playlists
            .values()
            .filter(|p| p.studio_id == studio_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    async fn load_rundowns(&self, playlist_id: PlaylistId) -> Result<Vec<Rundown>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<Rundown> = inner
            .rundowns
            .values()
            .filter(|r| r.playlist_id == playlist_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    async fn load_segments(&self, rundown_ids: &[RundownId]) -> Result<Vec<Segment>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<Segment> = inner
            .segments
            .values()
            .filter(|s| rundown_ids.contains(&s.rundown_id))
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn load_parts(&self, rundown_ids: &[RundownId]) -> Result<Vec<Part>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<Part> = inner
            .parts
            .values()
            .filter(|p| rundown_ids.contains(&p.rundown_id))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    async fn load_pieces(&self, rundown_ids: &[RundownId]) -> Result<Vec<Piece>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<Piece> = inner
            .pieces
            .values()
            .filter(|p| rundown_ids.contains(&p.rundown_id))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    async fn load_part_instances(
        &self,
        _playlist_id: PlaylistId,
        activation_id: ActivationId,
    ) -> Result<Vec<PartInstance>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<PartInstance> = inner
            .part_instances
            .values()
            .filter(|i| i.playlist_activation_id == activation_id && !i.reset)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn load_piece_instances(
        &self,
        _playlist_id: PlaylistId,
        activation_id: ActivationId,
    ) -> Result<Vec<PieceInstance>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut out: Vec<PieceInstance> = inner
            .piece_instances
            .values()
            .filter(|i| i.playlist_activation_id == activation_id && !i.reset)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn load_timeline(&self, studio_id: StudioId) -> Result<Option<Timeline>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.timelines.get(&studio_id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;

        for doc in batch.playlists.upserts {
            inner.playlists.insert(doc.id, doc);
        }
        for id in batch.playlists.deletes {
            inner.playlists.remove(&id);
        }
        for doc in batch.rundowns.upserts {
            inner.rundowns.insert(doc.id, doc);
        }
        for id in batch.rundowns.deletes {
            inner.rundowns.remove(&id);
        }
        for doc in batch.segments.upserts {
            inner.segments.insert(doc.id, doc);
        }
        for id in batch.segments.deletes {
            inner.segments.remove(&id);
        }
        for doc in batch.parts.upserts {
            inner.parts.insert(doc.id, doc);
        }
        for id in batch.parts.deletes {
            inner.parts.remove(&id);
        }
        for doc in batch.pieces.upserts {
            inner.pieces.insert(doc.id, doc);
        }
        for id in batch.pieces.deletes {
            inner.pieces.remove(&id);
        }
        for doc in batch.part_instances.upserts {
            inner.part_instances.insert(doc.id, doc);
        }
        for id in batch.part_instances.deletes {
            inner.part_instances.remove(&id);
        }
        for doc in batch.piece_instances.upserts {
            inner.piece_instances.insert(doc.id, doc);
        }
        for id in batch.piece_instances.deletes {
            inner.piece_instances.remove(&id);
        }
        for doc in batch.timelines.upserts {
            inner.timelines.insert(doc.studio_id, doc);
        }
        for id in batch.timelines.deletes {
            inner.timelines.remove(&id);
        }

        Ok(())
    }
}
