//! Reconciling live state after ingest rewrites the script.
//!
//! Ingest owns the static Rundown/Segment/Part/Piece documents and may
//! rewrite or remove them at any time, including while their content is
//! on air. Playback never follows those edits directly: part instances
//! play off their embedded snapshots. This module closes the gap
//! afterwards: on-air instances whose backing was removed are marked
//! orphaned and kept, a queued-next instance bound to removed or
//! rewritten backing is rebuilt, and structural removal of a segment
//! still under the playhead is deferred until it goes off air.

use onair_core::{PartId, PieceId, PlaylistId, RundownId, SegmentId};
use serde::{Deserialize, Serialize};

use crate::cache::{with_playlist_cache, PlayoutCache};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::Result;
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::model::{PartInstanceOrphaned, RundownOrphaned, SegmentOrphaned};
use crate::timeline::generate_timeline;

use super::adlib::PlayheadChange;
use super::infinites::sync_playhead_infinites_for_next_part_instance;
use super::ordered::OrderedPlaylist;
use super::selection::select_next_part;
use super::set_next::{
    cleanup_after_pointer_move, fresh_piece_instances, queue_next_part, remove_segment_contents,
};

/// What an ingest pass changed, as reported to the playout engine.
///
/// Removal lists name documents ingest took out of the script;
/// `changed_part_ids` names parts whose static document was rewritten
/// in place. The static tables may already reflect the change when the
/// reconciliation job runs; every operation here is idempotent against
/// that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestChanges {
    /// Parts removed from the script.
    pub removed_part_ids: Vec<PartId>,
    /// Segments removed from the script.
    pub removed_segment_ids: Vec<SegmentId>,
    /// Rundowns removed from the script.
    pub removed_rundown_ids: Vec<RundownId>,
    /// Parts whose static document was rewritten.
    pub changed_part_ids: Vec<PartId>,
}

impl IngestChanges {
    /// A change set that removes parts.
    #[must_use]
    pub fn removed_parts(ids: Vec<PartId>) -> Self {
        Self {
            removed_part_ids: ids,
            ..Self::default()
        }
    }

    /// A change set that removes segments.
    #[must_use]
    pub fn removed_segments(ids: Vec<SegmentId>) -> Self {
        Self {
            removed_segment_ids: ids,
            ..Self::default()
        }
    }

    /// A change set that removes rundowns.
    #[must_use]
    pub fn removed_rundowns(ids: Vec<RundownId>) -> Self {
        Self {
            removed_rundown_ids: ids,
            ..Self::default()
        }
    }

    /// A change set that rewrites parts in place.
    #[must_use]
    pub fn changed_parts(ids: Vec<PartId>) -> Self {
        Self {
            changed_part_ids: ids,
            ..Self::default()
        }
    }

    /// True when there is nothing to reconcile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed_part_ids.is_empty()
            && self.removed_segment_ids.is_empty()
            && self.removed_rundown_ids.is_empty()
            && self.changed_part_ids.is_empty()
    }
}

/// Reconciles live playout state with an ingest change set.
///
/// Runs all applicable reconciliations in one playlist transaction,
/// then regenerates the timeline when the playlist is active, since
/// removed or rewritten script content also changes lookahead. An empty
/// change set commits nothing.
///
/// # Errors
///
/// Storage and timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx, changes),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn sync_changes_to_part_instances(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    changes: IngestChanges,
) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        execute_sync(ctx, cache, effects, changes)
    })
    .await
}

fn execute_sync(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    changes: IngestChanges,
) -> Result<()> {
    let playlist_id = cache.playlist().id;

    // A removed rundown is orphan-marked rather than dropped, so the
    // playlist's running order and any history pointing at it keep
    // their shape. Its segments reconcile like directly removed ones.
    let mut removed_segments = changes.removed_segment_ids.clone();
    for rundown_id in &changes.removed_rundown_ids {
        if !cache.rundowns().contains(*rundown_id) {
            continue;
        }
        cache.rundowns_mut().update(*rundown_id, |rundown| {
            rundown.orphaned = Some(RundownOrphaned::Deleted);
        });
        removed_segments.extend(
            cache
                .segments()
                .values()
                .filter(|segment| segment.rundown_id == *rundown_id)
                .map(|segment| segment.id),
        );
        let sink = ctx.event_sink();
        let studio_id = cache.studio_id();
        let rundown_id = *rundown_id;
        effects.defer("rundown orphaned event", move || async move {
            sink.publish(PlayoutEvent::new(
                studio_id,
                PlayoutEventData::RundownOrphaned {
                    playlist_id,
                    rundown_id,
                },
            ));
            Ok(())
        });
    }

    let mut change = reconcile_removed_segments(ctx, cache, &removed_segments)?;
    change = change.merge(reconcile_removed_parts(ctx, cache, &changes.removed_part_ids)?);
    change = change.merge(refresh_changed_parts(ctx, cache, &changes.changed_part_ids)?);
    cleanup_after_pointer_move(ctx, cache);

    if cache.playlist().is_active() {
        if change.current_changed {
            sync_playhead_infinites_for_next_part_instance(ctx, cache)?;
        }
        generate_timeline(ctx, cache, effects)?;
    }

    tracing::info!(
        playlist_id = %playlist_id,
        current_changed = change.current_changed,
        next_changed = change.next_changed,
        "reconciled ingest changes",
    );
    Ok(())
}

/// Reconciles part instances after ingest removed their backing parts.
///
/// The static parts and their pieces are removed from the working set.
/// On-air and just-played instances keep playing off their snapshots
/// and are marked orphaned; a queued-next instance bound to a removed
/// part is discarded and the next pointer is re-selected from the
/// playing position.
///
/// Callers composing a larger reconciliation regenerate the timeline
/// themselves once all changes are applied;
/// [`sync_changes_to_part_instances`] does this.
///
/// # Errors
///
/// Propagates re-queue failures for the re-selected next part.
pub fn reconcile_removed_parts(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    removed: &[PartId],
) -> Result<PlayheadChange> {
    if removed.is_empty() {
        return Ok(PlayheadChange::default());
    }

    for part_id in removed {
        cache.parts_mut().remove(*part_id);
    }
    let doomed_pieces: Vec<PieceId> = cache
        .pieces()
        .values()
        .filter(|piece| removed.contains(&piece.part_id))
        .map(|piece| piece.id)
        .collect();
    for piece_id in doomed_pieces {
        cache.pieces_mut().remove(piece_id);
    }

    let playlist = cache.playlist();
    let current_id = playlist.current_part_instance_id;
    let previous_id = playlist.previous_part_instance_id;
    for id in [current_id, previous_id].into_iter().flatten() {
        let hit = cache
            .part_instances()
            .get(id)
            .is_some_and(|instance| removed.contains(&instance.part.id));
        if hit {
            tracing::debug!(part_instance_id = %id, "backing part removed; instance orphaned");
            cache.part_instances_mut().update(id, |instance| {
                instance.orphaned = Some(PartInstanceOrphaned::Deleted);
            });
        }
    }

    let next_discarded = cache
        .next_part_instance()
        .is_some_and(|next| removed.contains(&next.part.id));
    if next_discarded {
        reselect_next(ctx, cache)?;
    }

    Ok(if next_discarded {
        PlayheadChange {
            current_changed: false,
            next_changed: true,
        }
    } else {
        PlayheadChange::default()
    })
}

/// Reconciles state after ingest removed whole segments.
///
/// A removed segment still under the playhead keeps its document,
/// marked orphaned, so the running order holds its position until the
/// playhead leaves; only its static parts and pieces go. Segments off
/// the playhead are removed outright. Instances playing from a removed
/// segment are orphan-marked like removed parts, and a queued-next
/// sitting in one is discarded and re-selected.
///
/// # Errors
///
/// Propagates re-queue failures for the re-selected next part.
pub fn reconcile_removed_segments(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    removed: &[SegmentId],
) -> Result<PlayheadChange> {
    if removed.is_empty() {
        return Ok(PlayheadChange::default());
    }

    // Discard a doomed queued-next up front so it does not hold its
    // segment on the playhead.
    let next_discarded = cache
        .next_part_instance()
        .is_some_and(|next| removed.contains(&next.segment_id));
    if next_discarded {
        cache.playlist_mut().next_part_instance_id = None;
    }

    let mut in_use: Vec<SegmentId> = Vec::new();
    if let Some(current) = cache.current_part_instance() {
        in_use.push(current.segment_id);
    }
    if ctx.studio().settings.preserve_orphaned_segment_position {
        if let Some(previous) = cache.previous_part_instance() {
            in_use.push(previous.segment_id);
        }
    }

    for segment_id in removed {
        if !cache.segments().contains(*segment_id) {
            continue;
        }
        if in_use.contains(segment_id) {
            tracing::debug!(segment_id = %segment_id, "segment removed while on air; deferred");
            cache.segments_mut().update(*segment_id, |segment| {
                segment.orphaned = Some(SegmentOrphaned::Deleted);
            });
            strip_segment_script(cache, *segment_id);
        } else {
            remove_segment_contents(cache, *segment_id);
        }
    }

    let playlist = cache.playlist();
    let current_id = playlist.current_part_instance_id;
    let previous_id = playlist.previous_part_instance_id;
    for id in [current_id, previous_id].into_iter().flatten() {
        let hit = cache
            .part_instances()
            .get(id)
            .is_some_and(|instance| removed.contains(&instance.segment_id));
        if hit {
            cache.part_instances_mut().update(id, |instance| {
                instance.orphaned = Some(PartInstanceOrphaned::Deleted);
            });
        }
    }

    if next_discarded {
        reselect_next(ctx, cache)?;
    }

    Ok(if next_discarded {
        PlayheadChange {
            current_changed: false,
            next_changed: true,
        }
    } else {
        PlayheadChange::default()
    })
}

/// Rebuilds the queued-next instance after its backing part was
/// rewritten in place.
///
/// The instance keeps its identity and any ad-libbed content; its part
/// snapshot is refreshed and the scripted piece instances are computed
/// again from the rewritten script. On-air and played instances are
/// never touched, their snapshots are the record of what aired.
///
/// # Errors
///
/// Propagates continuity resolution failures.
pub fn refresh_changed_parts(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    changed: &[PartId],
) -> Result<PlayheadChange> {
    if changed.is_empty() {
        return Ok(PlayheadChange::default());
    }

    let refresh = cache.next_part_instance().and_then(|next| {
        if next.is_taken() || !changed.contains(&next.part.id) {
            return None;
        }
        cache
            .parts()
            .get(next.part.id)
            .map(|part| (next.id, part.clone()))
    });
    let Some((next_id, part)) = refresh else {
        return Ok(PlayheadChange::default());
    };

    let superseded: Vec<_> = cache
        .piece_instances_of(next_id)
        .filter(|instance| !instance.is_dynamically_inserted())
        .map(|instance| instance.id)
        .collect();
    for id in superseded {
        cache.piece_instances_mut().remove(id);
    }

    cache.part_instances_mut().update(next_id, |instance| {
        instance.part = part.clone();
    });
    let rebuilt = fresh_piece_instances(ctx, cache, &part, next_id)?;
    for instance in rebuilt {
        cache.piece_instances_mut().insert(instance);
    }

    tracing::debug!(
        part_instance_id = %next_id,
        part_id = %part.id,
        "queued next rebuilt after script rewrite",
    );
    Ok(PlayheadChange {
        current_changed: false,
        next_changed: true,
    })
}

/// Removes a deferred segment's static parts and pieces while keeping
/// the segment document in place.
fn strip_segment_script(cache: &mut PlayoutCache, segment_id: SegmentId) {
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
}

/// Re-picks and queues the next part after the previous choice lost its
/// backing. Leaves the pointer empty when nothing playable remains.
fn reselect_next(ctx: &JobContext, cache: &mut PlayoutCache) -> Result<()> {
    cache.playlist_mut().next_part_instance_id = None;
    let ordered = OrderedPlaylist::build(cache);
    let selected = select_next_part(cache.playlist(), cache.current_part_instance(), &ordered, true);
    match selected {
        Some(selected) => {
            queue_next_part(ctx, cache, selected.into())?;
        }
        None => cleanup_after_pointer_move(ctx, cache),
    }
    Ok(())
}
