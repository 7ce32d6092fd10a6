//! Queueing a part as next.
//!
//! Queueing creates (or reuses) a part instance, computes its piece
//! instances through the continuity resolver, moves the `next` pointer
//! and garbage-collects whatever the move made unreachable.
//! [`set_next_part`] finishes with a timeline regeneration so lookahead
//! and the pre-placed successor group follow the new pointer;
//! [`queue_next_part`] leaves regeneration to its caller.
//!
//! The operator-facing entry points ([`set_next_part`],
//! [`set_next_segment`], [`move_next_part`]) refuse to run mid-hold.
//! The take path queues through [`queue_next_part`] directly, because
//! it changes the next pointer while the hold state machine is in
//! transition.

use std::collections::HashSet;

use onair_core::{PartId, PartInstanceId, PieceId, SegmentId};

use crate::cache::PlayoutCache;
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::model::{Part, PartInstance, Piece, PieceInstance, SegmentOrphaned};
use crate::timeline::generate_timeline;

use super::infinites::{InfiniteResolver, PlayheadSource};
use super::ordered::OrderedPlaylist;
use super::resolve::resolve_piece_timings;
use super::selection::SelectedPart;

/// What to queue as next.
#[derive(Debug, Clone)]
pub struct SetNextTarget {
    /// The part to queue.
    pub part: Part,
    /// Whether queueing it consumes the playlist's next-segment
    /// override.
    pub consumes_next_segment_id: bool,
}

impl From<Part> for SetNextTarget {
    fn from(part: Part) -> Self {
        Self {
            part,
            consumes_next_segment_id: false,
        }
    }
}

impl From<SelectedPart> for SetNextTarget {
    fn from(selected: SelectedPart) -> Self {
        Self {
            part: selected.part,
            consumes_next_segment_id: selected.consumes_next_segment_id,
        }
    }
}

/// Queues a part as next, replacing whatever was queued before.
///
/// The playlist must be active and not in a hold; the part must belong
/// to one of the playlist's rundowns and be playable. Queueing a part
/// that already has an un-taken instance re-nexts that instance instead
/// of creating a duplicate. The timeline is regenerated before the call
/// returns, so the published document tracks the new pointer.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`],
/// [`Error::PartNotFound`] or [`Error::PartNotPlayable`] when a
/// precondition fails; nothing is mutated in that case.
pub fn set_next_part(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    target: SetNextTarget,
) -> Result<PartInstanceId> {
    let playlist = cache.playlist();
    if !playlist.is_active() {
        return Err(Error::PlaylistNotActive {
            playlist_id: playlist.id,
        });
    }
    if playlist.is_in_hold() {
        return Err(Error::DuringHold {
            state: playlist.hold_state.to_string(),
        });
    }

    let playlist_id = playlist.id;
    let instance_id = queue_next_part(ctx, cache, target)?;
    generate_timeline(ctx, cache, effects)?;

    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    effects.defer("next part changed event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::NextPartChanged {
                playlist_id,
                part_instance_id: Some(instance_id),
            },
        ));
        Ok(())
    });

    Ok(instance_id)
}

/// Queues a part as next without the operator-facing hold guard.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::PartNotFound`] or
/// [`Error::PartNotPlayable`] when a precondition fails.
pub(super) fn queue_next_part(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    target: SetNextTarget,
) -> Result<PartInstanceId> {
    let part = target.part;
    let playlist_id = cache.playlist().id;
    let activation_id = cache
        .playlist()
        .activation_id
        .ok_or(Error::PlaylistNotActive { playlist_id })?;

    if !cache.rundowns().contains(part.rundown_id) {
        return Err(Error::PartNotFound { part_id: part.id });
    }
    if !part.is_playable() {
        return Err(Error::PartNotPlayable {
            part_id: part.id,
            reason: unplayable_reason(&part).into(),
        });
    }

    let consumes_override = target.consumes_next_segment_id
        || cache.playlist().next_segment_id == Some(part.segment_id);

    // Re-nexting a part that already has an un-taken instance keeps
    // that instance (and the ad-libbed content it may carry).
    let reusable = cache
        .part_instances()
        .values()
        .find(|instance| {
            instance.part.id == part.id
                && instance.playlist_activation_id == activation_id
                && !instance.is_taken()
                && !instance.reset
        })
        .map(|instance| instance.id);

    let instance_id = match reusable {
        Some(id) => {
            cache.part_instances_mut().update(id, |instance| {
                instance.part = part.clone();
            });
            id
        }
        None => {
            let take_count = cache
                .current_part_instance()
                .map_or(0, |current| current.take_count + 1);
            let instance = PartInstance::from_part(part.clone(), activation_id, take_count);
            let id = instance.id;
            let piece_instances = fresh_piece_instances(ctx, cache, &part, id)?;

            cache.part_instances_mut().insert(instance);
            for piece_instance in piece_instances {
                cache.piece_instances_mut().insert(piece_instance);
            }
            id
        }
    };

    cache.playlist_mut().next_part_instance_id = Some(instance_id);
    if consumes_override {
        cache.playlist_mut().next_segment_id = None;
        cache.part_instances_mut().update(instance_id, |instance| {
            instance.consumed_next_segment_id = true;
        });
    }

    cleanup_after_pointer_move(ctx, cache);

    tracing::debug!(
        playlist_id = %playlist_id,
        part_instance_id = %instance_id,
        "queued next part",
    );
    Ok(instance_id)
}

/// Computes the piece instance set a fresh instance of `part` starts
/// with: native pieces, inherited runs of earlier open-ended pieces,
/// and continuations carried from the playing part.
pub(super) fn fresh_piece_instances(
    ctx: &JobContext,
    cache: &PlayoutCache,
    part: &Part,
    instance_id: PartInstanceId,
) -> Result<Vec<PieceInstance>> {
    let ordered = OrderedPlaylist::build(cache);
    let resolver = InfiniteResolver::new(cache, &ordered)?;
    let pieces: Vec<Piece> = cache.pieces().values().cloned().collect();

    let Some(current) = cache.current_part_instance() else {
        return Ok(resolver.piece_instances_for_part(&pieces, part, instance_id, None));
    };

    let current_pieces: Vec<PieceInstance> =
        cache.piece_instances_of(current.id).cloned().collect();
    let now_in_part = current.playhead_position(ctx.now_ms());
    let resolved = resolve_piece_timings(
        &current_pieces,
        now_in_part,
        current.timings.reported_started_playback,
    );
    let source = PlayheadSource {
        instance: current,
        pieces: &resolved,
        now_in_part,
    };
    Ok(resolver.piece_instances_for_part(&pieces, part, instance_id, Some(source)))
}

/// Arms (or clears) the next-segment override.
///
/// The override does not move the next pointer by itself; it bends the
/// following selection toward the segment's first playable part once
/// the natural choice would change segment anyway. An override on a
/// segment with nothing playable stays armed so it can fire after
/// ingest fills the segment in.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`], or
/// [`Error::SegmentNotFound`] when the segment is missing or sits
/// outside the running order.
pub fn set_next_segment(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    segment_id: Option<SegmentId>,
) -> Result<()> {
    let playlist = cache.playlist();
    if !playlist.is_active() {
        return Err(Error::PlaylistNotActive {
            playlist_id: playlist.id,
        });
    }
    if playlist.is_in_hold() {
        return Err(Error::DuringHold {
            state: playlist.hold_state.to_string(),
        });
    }
    let playlist_id = playlist.id;

    if let Some(segment_id) = segment_id {
        let segment = cache
            .segments()
            .get(segment_id)
            .ok_or(Error::SegmentNotFound { segment_id })?;
        if segment.is_scratchpad() {
            return Err(Error::SegmentNotFound { segment_id });
        }
    }

    cache.playlist_mut().next_segment_id = segment_id;

    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    effects.defer("next segment set event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::NextSegmentSet {
                playlist_id,
                segment_id,
            },
        ));
        Ok(())
    });

    Ok(())
}

/// Moves the next pointer through the ordered view.
///
/// `segment_delta` jumps whole segments (landing on the target
/// segment's first playable part); otherwise `part_delta` steps through
/// the playable parts. The anchor is the queued next instance, falling
/// back to the playing one. Steps past either end stick to the
/// boundary. Returns the id of the newly queued part.
///
/// # Errors
///
/// [`Error::NoNextPart`] when there is nothing to anchor on,
/// [`Error::PartNotFound`] / [`Error::SegmentNotFound`] when ingest
/// removed the anchor from the order, plus anything [`set_next_part`]
/// raises.
pub fn move_next_part(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    part_delta: i64,
    segment_delta: i64,
) -> Result<PartId> {
    let reference = cache
        .next_part_instance()
        .or_else(|| cache.current_part_instance())
        .cloned()
        .ok_or(Error::NoNextPart)?;

    let ordered = OrderedPlaylist::build(cache);

    let part = if segment_delta == 0 {
        // The reference part stays in the candidate list even when
        // unplayable, so its neighbours stay reachable from it.
        let candidates: Vec<&Part> = ordered
            .parts()
            .iter()
            .filter(|p| p.is_playable() || p.id == reference.part.id)
            .collect();
        let position = candidates
            .iter()
            .position(|p| p.id == reference.part.id)
            .ok_or(Error::PartNotFound {
                part_id: reference.part.id,
            })?;
        candidates[step(position, part_delta, candidates.len())].clone()
    } else {
        let segments: Vec<SegmentId> = ordered
            .segments()
            .iter()
            .map(|s| s.id)
            .filter(|id| ordered.first_playable_part_of_segment(*id).is_some())
            .collect();
        let position = segments
            .iter()
            .position(|id| *id == reference.segment_id)
            .ok_or(Error::SegmentNotFound {
                segment_id: reference.segment_id,
            })?;
        let target = segments[step(position, segment_delta, segments.len())];
        ordered
            .first_playable_part_of_segment(target)
            .cloned()
            .ok_or(Error::SegmentNotFound { segment_id: target })?
    };

    let part_id = part.id;
    set_next_part(ctx, cache, effects, SetNextTarget::from(part))?;
    Ok(part_id)
}

/// Steps an index by a signed delta, sticking to the ends.
fn step(position: usize, delta: i64, len: usize) -> usize {
    debug_assert!(len > 0, "stepping requires a non-empty list");
    let max = i64::try_from(len).unwrap_or(i64::MAX) - 1;
    let target = i64::try_from(position).unwrap_or(i64::MAX).saturating_add(delta);
    usize::try_from(target.clamp(0, max)).unwrap_or(0)
}

/// Garbage-collects state a pointer move made unreachable.
///
/// Instances no longer referenced by the current/next/previous
/// pointers are marked reset together with their piece instances.
/// Orphaned-deleted segments are dropped once no pointer plays from
/// them; the studio's preserve setting extends that to the previous
/// pointer so the running order keeps its shape until the segment is
/// fully off air.
pub(super) fn cleanup_after_pointer_move(ctx: &JobContext, cache: &mut PlayoutCache) {
    let playlist = cache.playlist();
    let referenced: HashSet<PartInstanceId> = [
        playlist.current_part_instance_id,
        playlist.next_part_instance_id,
        playlist.previous_part_instance_id,
    ]
    .into_iter()
    .flatten()
    .collect();

    let stale: HashSet<PartInstanceId> = cache
        .part_instances()
        .values()
        .filter(|instance| !instance.reset && !referenced.contains(&instance.id))
        .map(|instance| instance.id)
        .collect();
    for id in &stale {
        cache.part_instances_mut().update(*id, |instance| {
            instance.reset = true;
        });
    }
    for piece_instance in cache.piece_instances_mut().values_mut() {
        if stale.contains(&piece_instance.part_instance_id) {
            piece_instance.reset = true;
        }
    }

    let mut segments_in_use: HashSet<SegmentId> = HashSet::new();
    if let Some(current) = cache.current_part_instance() {
        segments_in_use.insert(current.segment_id);
    }
    if let Some(next) = cache.next_part_instance() {
        segments_in_use.insert(next.segment_id);
    }
    if ctx.studio().settings.preserve_orphaned_segment_position {
        if let Some(previous) = cache.previous_part_instance() {
            segments_in_use.insert(previous.segment_id);
        }
    }

    let removable: Vec<SegmentId> = cache
        .segments()
        .values()
        .filter(|segment| {
            matches!(segment.orphaned, Some(SegmentOrphaned::Deleted))
                && !segments_in_use.contains(&segment.id)
        })
        .map(|segment| segment.id)
        .collect();
    for segment_id in removable {
        tracing::debug!(segment_id = %segment_id, "removing off-air orphaned segment");
        remove_segment_contents(cache, segment_id);
    }
}

/// Removes a segment and whatever static parts and pieces remain in it.
pub(super) fn remove_segment_contents(cache: &mut PlayoutCache, segment_id: SegmentId) {
    let part_ids: Vec<PartId> = cache
        .parts()
        .values()
        .filter(|part| part.segment_id == segment_id)
        .map(|part| part.id)
        .collect();
    for part_id in part_ids {
        cache.parts_mut().remove(part_id);
    }
    let piece_ids: Vec<PieceId> = cache
        .pieces()
        .values()
        .filter(|piece| piece.segment_id == segment_id)
        .map(|piece| piece.id)
        .collect();
    for piece_id in piece_ids {
        cache.pieces_mut().remove(piece_id);
    }
    cache.segments_mut().remove(segment_id);
}

fn unplayable_reason(part: &Part) -> &'static str {
    if part.invalid {
        "marked invalid by ingest"
    } else {
        "floated out of the running order"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use onair_core::{ActivationId, PlaylistId, RundownId, ShowStyleId, StudioId};

    use crate::model::{HoldState, PieceLifespan, Playlist, Rundown, Segment, Studio};
    use crate::store::{DocStore, MemoryDocStore};

    use super::*;

    struct Rig {
        ctx: JobContext,
        cache: PlayoutCache,
        effects: DeferredEffects,
        segments: Vec<Segment>,
        parts: Vec<Part>,
    }

    /// An active playlist with `shape.0` segments of `shape.1` parts
    /// each, loaded into a working cache.
    async fn active_rig(shape: (usize, usize)) -> Rig {
        let store = MemoryDocStore::new();
        let studio_id = StudioId::generate();
        let playlist_id = PlaylistId::generate();
        let rundown_id = RundownId::generate();

        let mut playlist = Playlist::new(playlist_id, studio_id, "six o'clock");
        playlist.rundown_ids_in_order = vec![rundown_id];
        playlist.activation_id = Some(ActivationId::generate());
        store.put_playlist(playlist).expect("seed playlist");
        store
            .put_rundown(Rundown::new(
                rundown_id,
                playlist_id,
                ShowStyleId::generate(),
                "main",
            ))
            .expect("seed rundown");

        let mut segments = Vec::new();
        let mut parts = Vec::new();
        for s in 0..shape.0 {
            let segment = Segment::new(
                SegmentId::generate(),
                rundown_id,
                (s + 1) as f64,
                format!("seg {s}"),
            );
            for p in 0..shape.1 {
                let part = Part::new(
                    PartId::generate(),
                    segment.id,
                    rundown_id,
                    (p + 1) as f64,
                    format!("{s}-{p}"),
                );
                store.put_part(part.clone()).expect("seed part");
                parts.push(part);
            }
            store.put_segment(segment.clone()).expect("seed segment");
            segments.push(segment);
        }

        let store: Arc<dyn DocStore> = Arc::new(store);
        let cache = PlayoutCache::load(&store, studio_id, playlist_id)
            .await
            .expect("load cache");
        let ctx = JobContext::new(store, Studio::new(studio_id, "Studio"));
        Rig {
            ctx,
            cache,
            effects: DeferredEffects::new(),
            segments,
            parts,
        }
    }

    fn put_on_air(rig: &mut Rig, part_index: usize, taken_at: i64) -> PartInstanceId {
        let activation_id = rig.cache.playlist().activation_id.expect("active");
        let mut instance =
            PartInstance::from_part(rig.parts[part_index].clone(), activation_id, 0);
        instance.timings.take = Some(taken_at);
        let id = instance.id;
        rig.cache.part_instances_mut().insert(instance);
        rig.cache.playlist_mut().current_part_instance_id = Some(id);
        id
    }

    fn piece_on(rig: &mut Rig, part_index: usize, layer: &str) -> Piece {
        let part = &rig.parts[part_index];
        let piece = Piece::new(
            PieceId::generate(),
            part.id,
            part.segment_id,
            part.rundown_id,
            format!("piece on {layer}"),
            layer,
        );
        rig.cache.pieces_mut().insert(piece.clone());
        piece
    }

    #[tokio::test]
    async fn queues_a_fresh_instance_with_its_pieces() {
        let mut rig = active_rig((2, 2)).await;
        piece_on(&mut rig, 1, "camera0");

        let target = SetNextTarget::from(rig.parts[1].clone());
        let instance_id = set_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, target)
            .expect("set next");

        assert_eq!(
            rig.cache.playlist().next_part_instance_id,
            Some(instance_id)
        );
        let instance = rig
            .cache
            .part_instances()
            .get(instance_id)
            .expect("instance queued");
        assert_eq!(instance.take_count, 0);
        assert!(!instance.is_taken());
        assert_eq!(rig.cache.piece_instances_of(instance_id).count(), 1);
        assert_eq!(
            rig.effects.len(),
            2,
            "timeline regeneration and the pointer event are deferred"
        );
    }

    #[tokio::test]
    async fn take_count_increments_from_the_current_instance() {
        let mut rig = active_rig((1, 3)).await;
        put_on_air(&mut rig, 0, 1_000);

        let target = SetNextTarget::from(rig.parts[1].clone());
        let instance_id = set_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, target)
            .expect("set next");

        let instance = rig
            .cache
            .part_instances()
            .get(instance_id)
            .expect("instance queued");
        assert_eq!(instance.take_count, 1);
    }

    #[tokio::test]
    async fn renexting_the_same_part_reuses_the_instance() {
        let mut rig = active_rig((1, 2)).await;

        let first = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        )
        .expect("first set next");
        let second = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        )
        .expect("second set next");

        assert_eq!(first, second);
        assert_eq!(rig.cache.part_instances().len(), 1);
    }

    #[tokio::test]
    async fn switching_next_resets_the_superseded_instance() {
        let mut rig = active_rig((1, 2)).await;
        piece_on(&mut rig, 0, "camera0");

        let superseded = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        )
        .expect("first set next");
        let replacement = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[1].clone()),
        )
        .expect("second set next");

        assert_ne!(superseded, replacement);
        let old = rig
            .cache
            .part_instances()
            .get(superseded)
            .expect("superseded instance kept as history");
        assert!(old.reset);
        assert!(rig
            .cache
            .piece_instances_of(superseded)
            .all(|instance| instance.reset));
        let new = rig
            .cache
            .part_instances()
            .get(replacement)
            .expect("replacement queued");
        assert!(!new.reset);
    }

    #[tokio::test]
    async fn rejects_an_inactive_playlist() {
        let mut rig = active_rig((1, 1)).await;
        rig.cache.playlist_mut().activation_id = None;

        let result = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        );
        assert!(matches!(result, Err(Error::PlaylistNotActive { .. })));
    }

    #[tokio::test]
    async fn rejects_mid_hold() {
        let mut rig = active_rig((1, 2)).await;
        rig.cache.playlist_mut().hold_state = HoldState::Pending;

        let result = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[1].clone()),
        );
        assert!(matches!(result, Err(Error::DuringHold { .. })));
    }

    #[tokio::test]
    async fn rejects_unplayable_and_foreign_parts() {
        let mut rig = active_rig((1, 2)).await;

        let mut floated = rig.parts[1].clone();
        floated.floated = true;
        rig.cache.parts_mut().insert(floated.clone());
        let result = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(floated),
        );
        assert!(matches!(result, Err(Error::PartNotPlayable { .. })));

        let foreign = Part::new(
            PartId::generate(),
            SegmentId::generate(),
            RundownId::generate(),
            1.0,
            "from another playlist",
        );
        let result = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(foreign),
        );
        assert!(matches!(result, Err(Error::PartNotFound { .. })));
    }

    #[tokio::test]
    async fn entering_the_override_segment_consumes_it() {
        let mut rig = active_rig((2, 2)).await;
        rig.cache.playlist_mut().next_segment_id = Some(rig.segments[1].id);

        let instance_id = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[2].clone()),
        )
        .expect("set next");

        assert_eq!(rig.cache.playlist().next_segment_id, None);
        let instance = rig
            .cache
            .part_instances()
            .get(instance_id)
            .expect("instance queued");
        assert!(instance.consumed_next_segment_id);
    }

    #[tokio::test]
    async fn queued_instance_carries_live_continuations() {
        let mut rig = active_rig((1, 2)).await;
        let mut bed = piece_on(&mut rig, 0, "audio_bed");
        bed.lifespan = PieceLifespan::UntilSegmentEnd;
        rig.cache.pieces_mut().insert(bed.clone());

        let current_id = put_on_air(&mut rig, 0, 1_000);
        let activation_id = rig.cache.playlist().activation_id.expect("active");
        let on_air = PieceInstance::from_piece(bed, current_id, activation_id);
        let run_id = on_air.infinite_id().expect("open-ended piece has a run id");
        rig.cache.piece_instances_mut().insert(on_air);

        let next_id = set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[1].clone()),
        )
        .expect("set next");

        let carried: Vec<_> = rig
            .cache
            .piece_instances_of(next_id)
            .filter(|instance| instance.infinite_id() == Some(run_id))
            .collect();
        assert_eq!(carried.len(), 1);
        assert!(carried[0].is_playhead_carried());
    }

    #[tokio::test]
    async fn orphaned_segment_is_dropped_once_unreferenced() {
        let mut rig = active_rig((2, 1)).await;
        let orphaned_id = rig.segments[0].id;
        rig.cache.segments_mut().update(orphaned_id, |segment| {
            segment.orphaned = Some(SegmentOrphaned::Deleted);
        });

        set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[1].clone()),
        )
        .expect("set next");

        assert!(!rig.cache.segments().contains(orphaned_id));
        assert!(rig
            .cache
            .parts()
            .values()
            .all(|part| part.segment_id != orphaned_id));
    }

    #[tokio::test]
    async fn orphaned_segment_survives_while_current_plays_it() {
        let mut rig = active_rig((2, 1)).await;
        put_on_air(&mut rig, 0, 1_000);
        let orphaned_id = rig.segments[0].id;
        rig.cache.segments_mut().update(orphaned_id, |segment| {
            segment.orphaned = Some(SegmentOrphaned::Deleted);
        });

        set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[1].clone()),
        )
        .expect("set next");

        assert!(rig.cache.segments().contains(orphaned_id));
    }

    #[tokio::test]
    async fn set_next_segment_arms_and_clears_the_override() {
        let mut rig = active_rig((2, 1)).await;

        set_next_segment(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            Some(rig.segments[1].id),
        )
        .expect("arm override");
        assert_eq!(
            rig.cache.playlist().next_segment_id,
            Some(rig.segments[1].id)
        );

        set_next_segment(&rig.ctx, &mut rig.cache, &mut rig.effects, None)
            .expect("clear override");
        assert_eq!(rig.cache.playlist().next_segment_id, None);
    }

    #[tokio::test]
    async fn set_next_segment_rejects_unknown_and_scratchpad_segments() {
        let mut rig = active_rig((1, 1)).await;

        let result = set_next_segment(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            Some(SegmentId::generate()),
        );
        assert!(matches!(result, Err(Error::SegmentNotFound { .. })));

        let rundown_id = rig.segments[0].rundown_id;
        let mut scratch = Segment::new(SegmentId::generate(), rundown_id, 99.0, "scratch");
        scratch.orphaned = Some(SegmentOrphaned::Scratchpad);
        let scratch_id = scratch.id;
        rig.cache.segments_mut().insert(scratch);
        let result =
            set_next_segment(&rig.ctx, &mut rig.cache, &mut rig.effects, Some(scratch_id));
        assert!(matches!(result, Err(Error::SegmentNotFound { .. })));
    }

    #[tokio::test]
    async fn move_next_part_steps_and_clamps() {
        let mut rig = active_rig((1, 3)).await;
        set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        )
        .expect("queue first part");

        let forward = move_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, 1, 0)
            .expect("step forward");
        assert_eq!(forward, rig.parts[1].id);

        let back = move_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, -1, 0)
            .expect("step back");
        assert_eq!(back, rig.parts[0].id);

        let clamped = move_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, -5, 0)
            .expect("clamp at the start");
        assert_eq!(clamped, rig.parts[0].id);
    }

    #[tokio::test]
    async fn move_next_part_jumps_to_the_next_segment() {
        let mut rig = active_rig((2, 2)).await;
        set_next_part(
            &rig.ctx,
            &mut rig.cache,
            &mut rig.effects,
            SetNextTarget::from(rig.parts[0].clone()),
        )
        .expect("queue first part");

        let jumped = move_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, 0, 1)
            .expect("jump segment");
        assert_eq!(jumped, rig.parts[2].id);
    }

    #[tokio::test]
    async fn move_next_part_needs_an_anchor() {
        let mut rig = active_rig((1, 2)).await;
        let result = move_next_part(&rig.ctx, &mut rig.cache, &mut rig.effects, 1, 0);
        assert!(matches!(result, Err(Error::NoNextPart)));
    }
}
