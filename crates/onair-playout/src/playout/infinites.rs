//! Continuity of open-ended pieces across part boundaries.
//!
//! When a part is queued, it must receive instances of every piece
//! that will be on air while it plays: its own scripted pieces, plus
//! open-ended pieces from earlier in the show whose lifespan spans the
//! boundary. Runs carried from the playing part keep their continuation
//! id, so the downstream device sees continuing content rather than a
//! restart.
//!
//! The resolver is a pure projection over the ordered view; the only
//! mutating entry point is [`sync_playhead_infinites_for_next_part_instance`],
//! which re-derives the queued-next instance after the live part was
//! changed under it.

use std::collections::{HashMap, HashSet};

use onair_core::{ActivationId, PartId, PartInstanceId, PieceId, RundownId, ShowStyleId};

use crate::cache::PlayoutCache;
use crate::context::JobContext;
use crate::error::{Error, Result};
use crate::model::{
    Part, PartInstance, Piece, PieceEnable, PieceInstance, PieceInstanceInfinite, PieceLifespan,
};

use super::ordered::OrderedPlaylist;
use super::resolve::{resolve_piece_timings, ResolvedPieceInstance};

/// The playing part and its time-processed pieces, as the source of
/// continuations.
#[derive(Debug, Clone, Copy)]
pub struct PlayheadSource<'a> {
    /// The instance currently on air.
    pub instance: &'a PartInstance,
    /// Its piece instances after time-processing.
    pub pieces: &'a [ResolvedPieceInstance],
    /// The playhead position within the instance, in milliseconds.
    pub now_in_part: i64,
}

/// Derives piece instances for target parts from the playlist's
/// structure and playhead.
pub struct InfiniteResolver<'a> {
    ordered: &'a OrderedPlaylist,
    activation_id: ActivationId,
    rundown_positions: HashMap<RundownId, usize>,
    show_styles: HashMap<RundownId, ShowStyleId>,
    part_ranks: HashMap<PartId, f64>,
}

impl<'a> InfiniteResolver<'a> {
    /// Builds a resolver over the cached structure.
    ///
    /// Rank lookups include the embedded parts of orphaned instances,
    /// so ad-lib parts anchor continuity the same way scripted parts
    /// do.
    pub fn new(cache: &PlayoutCache, ordered: &'a OrderedPlaylist) -> Result<Self> {
        let activation_id =
            cache
                .playlist()
                .activation_id
                .ok_or(Error::PlaylistNotActive {
                    playlist_id: cache.playlist().id,
                })?;

        let rundown_positions = cache
            .playlist()
            .rundown_ids_in_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let show_styles = cache
            .rundowns()
            .values()
            .map(|r| (r.id, r.show_style_id))
            .collect();

        let mut part_ranks: HashMap<PartId, f64> = cache
            .parts()
            .values()
            .map(|p| (p.id, p.rank))
            .collect();
        for instance in cache.part_instances().values() {
            if instance.orphaned.is_some() {
                part_ranks
                    .entry(instance.part.id)
                    .or_insert(instance.part.rank);
            }
        }

        Ok(Self {
            ordered,
            activation_id,
            rundown_positions,
            show_styles,
            part_ranks,
        })
    }

    /// Computes the full piece instance set for a target part: native
    /// pieces, fresh runs of in-scope ancestor infinites, and
    /// continuations carried from the playhead.
    ///
    /// Continuations win over fresh runs of the same origin piece, and
    /// per source layer only the latest-starting ancestor infinite is
    /// considered.
    #[must_use]
    pub fn piece_instances_for_part(
        &self,
        pieces: &[Piece],
        target: &Part,
        new_instance_id: PartInstanceId,
        playhead: Option<PlayheadSource<'_>>,
    ) -> Vec<PieceInstance> {
        let continued = playhead
            .map(|source| self.playhead_tracking_infinites(target, new_instance_id, source))
            .unwrap_or_default();
        let continued_origins: HashSet<PieceId> = continued
            .iter()
            .filter_map(|instance| instance.infinite.map(|i| i.from_piece_id))
            .collect();

        let mut result = continued;
        for piece in pieces {
            if piece.part_id == target.id && !continued_origins.contains(&piece.id) {
                result.push(PieceInstance::from_piece(
                    piece.clone(),
                    new_instance_id,
                    self.activation_id,
                ));
            }
        }

        for piece in self.best_ancestor_per_layer(pieces, target).into_values() {
            if continued_origins.contains(&piece.id) {
                continue;
            }
            result.push(self.fresh_inherited_instance(piece, new_instance_id));
        }

        result
    }

    /// Computes only the continuations carried from the playing part
    /// onto the target. Used by the playhead re-sync to replace the
    /// queued-next instance's inherited set.
    #[must_use]
    pub fn playhead_tracking_infinites(
        &self,
        target: &Part,
        new_instance_id: PartInstanceId,
        source: PlayheadSource<'_>,
    ) -> Vec<PieceInstance> {
        if !self.is_at_or_after(source.instance, target) {
            // A backward jump restarts content rather than carrying it.
            return Vec::new();
        }

        // Per layer, the run owning the layer at the playhead is the
        // one that survives the boundary.
        let mut per_layer: HashMap<&str, &ResolvedPieceInstance> = HashMap::new();
        for resolved in source.pieces {
            if resolved.instance.infinite.is_none()
                || !resolved.instance.piece.lifespan.is_infinite()
            {
                continue;
            }
            if resolved
                .resolved_end
                .is_some_and(|end| end <= source.now_in_part)
            {
                continue;
            }
            if !self.lifespan_reaches(&resolved.instance.piece, target) {
                continue;
            }
            per_layer
                .entry(resolved.instance.piece.source_layer.as_str())
                .and_modify(|current| {
                    if resolved.resolved_start > current.resolved_start {
                        *current = resolved;
                    }
                })
                .or_insert(resolved);
        }

        let mut continued: Vec<PieceInstance> = per_layer
            .into_values()
            .map(|resolved| self.continued_instance(resolved, new_instance_id))
            .collect();
        continued.sort_by_key(|instance| instance.piece.id);
        continued
    }

    /// Latest-starting in-scope ancestor infinite per source layer.
    fn best_ancestor_per_layer<'p>(
        &self,
        pieces: &'p [Piece],
        target: &Part,
    ) -> HashMap<&'p str, &'p Piece> {
        let mut best: HashMap<&str, &Piece> = HashMap::new();
        for piece in pieces {
            if piece.part_id == target.id || !self.in_ancestor_scope(piece, target) {
                continue;
            }
            best.entry(piece.source_layer.as_str())
                .and_modify(|current| {
                    if self.origin_starts_before(current, piece) {
                        *current = piece;
                    }
                })
                .or_insert(piece);
        }
        best
    }

    /// Whether an infinite piece from an earlier position is in scope
    /// for the target part.
    fn in_ancestor_scope(&self, piece: &Piece, target: &Part) -> bool {
        if !piece.lifespan.is_infinite() {
            return false;
        }

        if piece.segment_id == target.segment_id {
            return self
                .part_ranks
                .get(&piece.part_id)
                .is_some_and(|rank| *rank < target.rank);
        }

        // A scratchpad segment has no position in the order; content
        // never leaks into or out of it.
        let Some(target_segment) = self.ordered.segment_position(target.segment_id) else {
            return false;
        };

        if piece.rundown_id == target.rundown_id {
            if !matches!(
                piece.lifespan,
                PieceLifespan::UntilRundownEnd | PieceLifespan::UntilShowStyleEnd
            ) {
                return false;
            }
            return self
                .ordered
                .segment_position(piece.segment_id)
                .is_some_and(|position| position < target_segment);
        }

        if piece.lifespan != PieceLifespan::UntilShowStyleEnd {
            return false;
        }
        if !self.same_show_style(piece.rundown_id, target.rundown_id) {
            return false;
        }
        match (
            self.rundown_positions.get(&piece.rundown_id),
            self.rundown_positions.get(&target.rundown_id),
        ) {
            (Some(origin), Some(target_pos)) => origin < target_pos,
            _ => false,
        }
    }

    /// Whether a running piece's lifespan spans the boundary between
    /// its origin and the target part.
    fn lifespan_reaches(&self, piece: &Piece, target: &Part) -> bool {
        match piece.lifespan {
            PieceLifespan::WithinPart => false,
            PieceLifespan::UntilSegmentEnd => piece.segment_id == target.segment_id,
            PieceLifespan::UntilRundownEnd => piece.rundown_id == target.rundown_id,
            PieceLifespan::UntilShowStyleEnd => {
                self.same_show_style(piece.rundown_id, target.rundown_id)
            }
        }
    }

    fn same_show_style(&self, a: RundownId, b: RundownId) -> bool {
        if a == b {
            return true;
        }
        match (self.show_styles.get(&a), self.show_styles.get(&b)) {
            (Some(style_a), Some(style_b)) => style_a == style_b,
            _ => false,
        }
    }

    /// Whether the target part sits at or after the playing instance
    /// in playback order.
    fn is_at_or_after(&self, playing: &PartInstance, target: &Part) -> bool {
        if let (Some(playing_index), Some(target_index)) = (
            self.ordered.part_index(playing.part.id),
            self.ordered.part_index(target.id),
        ) {
            return target_index >= playing_index;
        }

        // Orphaned parts fall back to segment position and snapshot
        // rank.
        if playing.segment_id == target.segment_id {
            return target.rank >= playing.part.rank;
        }
        match (
            self.ordered.segment_position(playing.segment_id),
            self.ordered.segment_position(target.segment_id),
        ) {
            (Some(playing_segment), Some(target_segment)) => target_segment > playing_segment,
            _ => false,
        }
    }

    /// True when `a` starts before `b` in playback order.
    fn origin_starts_before(&self, a: &Piece, b: &Piece) -> bool {
        let (key_a, key_b) = (self.origin_key(a), self.origin_key(b));
        key_a
            .0
            .cmp(&key_b.0)
            .then_with(|| key_a.1.cmp(&key_b.1))
            .then_with(|| key_a.2.total_cmp(&key_b.2))
            .is_lt()
    }

    fn origin_key(&self, piece: &Piece) -> (usize, usize, f64) {
        (
            self.rundown_positions
                .get(&piece.rundown_id)
                .copied()
                .unwrap_or(usize::MAX),
            self.ordered
                .segment_position(piece.segment_id)
                .unwrap_or(usize::MAX),
            self.part_ranks
                .get(&piece.part_id)
                .copied()
                .unwrap_or(f64::MAX),
        )
    }

    /// A fresh run of an ancestor infinite, anchored at the top of the
    /// new part.
    fn fresh_inherited_instance(
        &self,
        piece: &Piece,
        new_instance_id: PartInstanceId,
    ) -> PieceInstance {
        let mut inherited = piece.clone();
        inherited.enable = PieceEnable::at_offset(0);
        let mut instance =
            PieceInstance::from_piece(inherited, new_instance_id, self.activation_id);
        instance.infinite = Some(PieceInstanceInfinite::inherited(piece.id));
        instance
    }

    /// A continuation of a running piece: same continuation id, same
    /// absolute start, placed at the top of the new part.
    fn continued_instance(
        &self,
        resolved: &ResolvedPieceInstance,
        new_instance_id: PartInstanceId,
    ) -> PieceInstance {
        let source = &resolved.instance;
        let mut piece = source.piece.clone();
        piece.enable = PieceEnable::at_offset(0);
        let mut instance = PieceInstance::from_piece(piece, new_instance_id, self.activation_id);
        if let Some(infinite) = source.infinite {
            instance.infinite = Some(PieceInstanceInfinite::continued(
                infinite.infinite_id,
                infinite.from_piece_id,
            ));
        }
        instance.reported_started_playback = source.reported_started_playback;
        instance
    }
}

/// Re-derives the queued-next instance's inherited pieces from the
/// live part's current state.
///
/// Replaces only continuations (`from_previous_part`); pieces native
/// to the next part and ad-libs queued onto it are untouched. A no-op
/// when there is no current or no next instance.
pub fn sync_playhead_infinites_for_next_part_instance(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
) -> Result<()> {
    let (Some(current), Some(next)) = (
        cache.current_part_instance().cloned(),
        cache.next_part_instance().cloned(),
    ) else {
        return Ok(());
    };

    let now_in_part = current.playhead_position(ctx.now_ms());
    let current_pieces: Vec<PieceInstance> =
        cache.piece_instances_of(current.id).cloned().collect();
    let resolved = resolve_piece_timings(
        &current_pieces,
        now_in_part,
        current.started_or_taken_at(),
    );

    let ordered = OrderedPlaylist::build(cache);
    let resolver = InfiniteResolver::new(cache, &ordered)?;
    let replacement = resolver.playhead_tracking_infinites(
        &next.part,
        next.id,
        PlayheadSource {
            instance: &current,
            pieces: &resolved,
            now_in_part,
        },
    );

    let superseded: Vec<_> = cache
        .piece_instances_of(next.id)
        .filter(|instance| instance.is_playhead_carried())
        .map(|instance| instance.id)
        .collect();
    for id in superseded {
        cache.piece_instances_mut().remove(id);
    }
    for instance in replacement {
        cache.piece_instances_mut().insert(instance);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use onair_core::{InfiniteId, PlaylistId, SegmentId, StudioId};

    use crate::model::{Playlist, Segment};

    use super::*;

    struct Show {
        playlist: Playlist,
        segments: Vec<Segment>,
        parts: Vec<Part>,
        pieces: Vec<Piece>,
    }

    impl Show {
        /// One rundown, two segments, two parts each.
        fn new() -> Self {
            let rundown_id = RundownId::generate();
            let seg_a = Segment::new(SegmentId::generate(), rundown_id, 1.0, "A");
            let seg_b = Segment::new(SegmentId::generate(), rundown_id, 2.0, "B");
            let mut parts = Vec::new();
            for (segment, labels) in [(&seg_a, ["A1", "A2"]), (&seg_b, ["B1", "B2"])] {
                for (i, label) in labels.iter().enumerate() {
                    parts.push(Part::new(
                        PartId::generate(),
                        segment.id,
                        rundown_id,
                        (i + 1) as f64,
                        *label,
                    ));
                }
            }
            let mut playlist =
                Playlist::new(PlaylistId::generate(), StudioId::generate(), "infinites");
            playlist.rundown_ids_in_order = vec![rundown_id];
            playlist.activation_id = Some(ActivationId::generate());
            Self {
                playlist,
                segments: vec![seg_a, seg_b],
                parts,
                pieces: Vec::new(),
            }
        }

        fn piece_in(&mut self, part_index: usize, layer: &str, lifespan: PieceLifespan) -> PieceId {
            let part = &self.parts[part_index];
            let mut piece = Piece::new(
                PieceId::generate(),
                part.id,
                part.segment_id,
                part.rundown_id,
                format!("{layer} piece"),
                layer,
            );
            piece.lifespan = lifespan;
            let id = piece.id;
            self.pieces.push(piece);
            id
        }

        fn ordered(&self) -> OrderedPlaylist {
            OrderedPlaylist::from_sorted(self.segments.clone(), self.parts.clone())
        }

        fn resolver<'a>(&self, ordered: &'a OrderedPlaylist) -> InfiniteResolver<'a> {
            let mut rundown_positions = HashMap::new();
            for (i, id) in self.playlist.rundown_ids_in_order.iter().enumerate() {
                rundown_positions.insert(*id, i);
            }
            let show_style = ShowStyleId::generate();
            let show_styles = self
                .playlist
                .rundown_ids_in_order
                .iter()
                .map(|id| (*id, show_style))
                .collect();
            let part_ranks = self.parts.iter().map(|p| (p.id, p.rank)).collect();
            InfiniteResolver {
                ordered,
                activation_id: self.playlist.activation_id.expect("active fixture"),
                rundown_positions,
                show_styles,
                part_ranks,
            }
        }
    }

    fn resolved(instance: PieceInstance, start: i64, end: Option<i64>) -> ResolvedPieceInstance {
        ResolvedPieceInstance {
            instance,
            resolved_start: start,
            resolved_end: end,
        }
    }

    #[test]
    fn native_pieces_become_fresh_instances() {
        let mut show = Show::new();
        show.piece_in(0, "cam0", PieceLifespan::WithinPart);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[0],
            PartInstanceId::generate(),
            None,
        );
        assert_eq!(instances.len(), 1);
        assert!(instances[0].infinite.is_none());
    }

    #[test]
    fn segment_infinite_from_an_earlier_part_is_inherited() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        // A2 sits after A1 in the same segment.
        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[1],
            PartInstanceId::generate(),
            None,
        );
        assert_eq!(instances.len(), 1);
        let infinite = instances[0].infinite.expect("continuation metadata");
        assert!(infinite.from_previous_part);
        assert_eq!(instances[0].piece.enable, PieceEnable::at_offset(0));
    }

    #[test]
    fn segment_infinite_does_not_cross_into_the_next_segment() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[2],
            PartInstanceId::generate(),
            None,
        );
        assert!(instances.is_empty());
    }

    #[test]
    fn rundown_infinite_crosses_segments() {
        let mut show = Show::new();
        show.piece_in(0, "bg0", PieceLifespan::UntilRundownEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[2],
            PartInstanceId::generate(),
            None,
        );
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn only_the_latest_ancestor_per_layer_survives() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let newer = show.piece_in(1, "gfx0", PieceLifespan::UntilSegmentEnd);
        // Target: a third part appended to segment A.
        let seg_a = show.segments[0].id;
        let rundown = show.parts[0].rundown_id;
        show.parts
            .insert(2, Part::new(PartId::generate(), seg_a, rundown, 3.0, "A3"));
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[2],
            PartInstanceId::generate(),
            None,
        );
        assert_eq!(instances.len(), 1);
        let infinite = instances[0].infinite.expect("continuation metadata");
        assert_eq!(infinite.from_piece_id, newer);
    }

    #[test]
    fn continuation_keeps_the_run_id_across_the_take() {
        let mut show = Show::new();
        let origin = show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let playing = PartInstance::from_part(
            show.parts[0].clone(),
            show.playlist.activation_id.expect("active"),
            0,
        );
        let mut on_air = PieceInstance::from_piece(
            show.pieces[0].clone(),
            playing.id,
            playing.playlist_activation_id,
        );
        on_air.reported_started_playback = Some(50_000);
        let run_id = on_air.infinite_id().expect("infinite");
        let source_pieces = vec![resolved(on_air, 0, None)];

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[1],
            PartInstanceId::generate(),
            Some(PlayheadSource {
                instance: &playing,
                pieces: &source_pieces,
                now_in_part: 4_000,
            }),
        );
        assert_eq!(instances.len(), 1);
        let infinite = instances[0].infinite.expect("continuation metadata");
        assert_eq!(infinite.infinite_id, run_id);
        assert_eq!(infinite.from_piece_id, origin);
        assert!(infinite.from_previous_part);
        assert_eq!(instances[0].reported_started_playback, Some(50_000));
    }

    #[test]
    fn backward_jump_starts_a_fresh_run() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        // Playing A2 while the target A1 sits before it in rundown order.
        let playing = PartInstance::from_part(
            show.parts[1].clone(),
            show.playlist.activation_id.expect("active"),
            1,
        );
        let on_air = PieceInstance::from_piece(
            show.pieces[0].clone(),
            playing.id,
            playing.playlist_activation_id,
        );
        let run_id = on_air.infinite_id().expect("infinite");
        let source_pieces = vec![resolved(on_air, 0, None)];

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[0],
            PartInstanceId::generate(),
            Some(PlayheadSource {
                instance: &playing,
                pieces: &source_pieces,
                now_in_part: 4_000,
            }),
        );
        // The piece is native to A1, so it restarts with a fresh run.
        assert_eq!(instances.len(), 1);
        let infinite = instances[0].infinite.expect("continuation metadata");
        assert_ne!(infinite.infinite_id, run_id);
        assert!(!infinite.from_previous_part);
    }

    #[test]
    fn ended_runs_are_not_carried() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let playing = PartInstance::from_part(
            show.parts[0].clone(),
            show.playlist.activation_id.expect("active"),
            0,
        );
        let on_air = PieceInstance::from_piece(
            show.pieces[0].clone(),
            playing.id,
            playing.playlist_activation_id,
        );
        // Capped before the playhead: the run is already over.
        let source_pieces = vec![resolved(on_air, 0, Some(3_000))];

        let continued = resolver.playhead_tracking_infinites(
            &show.parts[1],
            PartInstanceId::generate(),
            PlayheadSource {
                instance: &playing,
                pieces: &source_pieces,
                now_in_part: 4_000,
            },
        );
        assert!(continued.is_empty());
    }

    #[test]
    fn adlib_infinite_with_no_static_origin_still_continues() {
        let show = Show::new();
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let playing = PartInstance::from_part(
            show.parts[0].clone(),
            show.playlist.activation_id.expect("active"),
            0,
        );
        // An ad-libbed graphic: its piece doc exists only inside the
        // instance.
        let mut adlib_piece = Piece::new(
            PieceId::generate(),
            playing.part.id,
            playing.segment_id,
            playing.rundown_id,
            "breaking strap",
            "gfx1",
        );
        adlib_piece.lifespan = PieceLifespan::UntilSegmentEnd;
        let mut on_air =
            PieceInstance::from_piece(adlib_piece, playing.id, playing.playlist_activation_id);
        on_air.dynamically_inserted = Some(60_000);
        let run_id = on_air.infinite_id().expect("infinite");
        let source_pieces = vec![resolved(on_air, 2_000, None)];

        let continued = resolver.playhead_tracking_infinites(
            &show.parts[1],
            PartInstanceId::generate(),
            PlayheadSource {
                instance: &playing,
                pieces: &source_pieces,
                now_in_part: 4_000,
            },
        );
        assert_eq!(continued.len(), 1);
        assert_eq!(
            continued[0].infinite.expect("continuation").infinite_id,
            run_id
        );
    }

    #[test]
    fn infinite_ids_are_unique_within_a_part_instance() {
        let mut show = Show::new();
        show.piece_in(0, "gfx0", PieceLifespan::UntilSegmentEnd);
        show.piece_in(1, "gfx0", PieceLifespan::UntilSegmentEnd);
        let seg_a = show.segments[0].id;
        let rundown = show.parts[0].rundown_id;
        show.parts
            .insert(2, Part::new(PartId::generate(), seg_a, rundown, 3.0, "A3"));
        let ordered = show.ordered();
        let resolver = show.resolver(&ordered);

        let instances = resolver.piece_instances_for_part(
            &show.pieces,
            &show.parts[2],
            PartInstanceId::generate(),
            None,
        );
        let mut seen = HashSet::new();
        for instance in &instances {
            if let Some(id) = instance.infinite_id() {
                assert!(seen.insert(id), "duplicate continuation id");
            }
        }
    }

    #[test]
    fn unique_run_ids_hold_under_continuation() {
        let run = InfiniteId::generate();
        let a = PieceInstanceInfinite::continued(run, PieceId::generate());
        let b = PieceInstanceInfinite::continued(run, PieceId::generate());
        assert_eq!(a.infinite_id, b.infinite_id);
    }
}
