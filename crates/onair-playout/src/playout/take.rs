//! The take: the only way content goes on air.
//!
//! A take rotates the playhead pointers (next becomes current, current
//! becomes previous), stamps the take timings, queues the successor and
//! regenerates the timeline, all inside one playlist transaction. The
//! anti-runaway guard rejects takes arriving faster than the studio's
//! configured minimum span, so a bounced Take key cannot skip a part
//! before it ever reached the output.
//!
//! When a hold is on air the take does not advance: it completes the
//! hold instead, cutting the previous part's held-over tails and
//! regenerating with the hold filtering removed.

use std::collections::HashSet;

use onair_core::{InfiniteId, PartInstanceId, PieceInstanceId, PlaylistId, TimeMillis};

use crate::cache::{with_playlist_cache, PlayoutCache};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::model::{HoldState, PartInstance, PieceInstance, PieceUserDuration};
use crate::timeline::generate_timeline;

use super::defer_timing_flush;
use super::ordered::OrderedPlaylist;
use super::selection::select_next_part;
use super::set_next::{cleanup_after_pointer_move, queue_next_part};

/// Takes the queued next part on air.
///
/// Requires an active playlist and either a queued next instance or an
/// on-air hold. With an active hold the take completes the hold and the
/// playhead stays where it is; otherwise the pointers rotate, a pending
/// hold goes on air, the successor is selected and queued, and the
/// timeline is regenerated. Returns the id of the on-air instance.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::NoNextPart`] or
/// [`Error::TakeRateLimited`] on a failed precondition; storage and
/// timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn take_next_part(
    ctx: &JobContext,
    playlist_id: PlaylistId,
) -> Result<PartInstanceId> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        let taken = execute_take(ctx, cache, effects);
        if let Err(e) = &taken {
            if !matches!(e, Error::TakeRateLimited { .. }) {
                ctx.metrics().record_take("rejected");
            }
        }
        taken
    })
    .await
}

fn execute_take(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
) -> Result<PartInstanceId> {
    let playlist = cache.playlist();
    if !playlist.is_active() {
        return Err(Error::PlaylistNotActive {
            playlist_id: playlist.id,
        });
    }
    let playlist_id = playlist.id;
    let now = ctx.now_ms();

    if playlist.hold_state == HoldState::Active {
        return complete_hold(ctx, cache, effects, now);
    }

    let taken_id = playlist.next_part_instance_id.ok_or(Error::NoNextPart)?;
    let outgoing_id = playlist.current_part_instance_id;

    if let Some(current) = cache.current_part_instance() {
        if let Some(remaining) = take_blocked_for(ctx, current, now) {
            ctx.metrics().record_take_rate_limited();
            return Err(Error::TakeRateLimited {
                remaining_ms: remaining,
            });
        }
    }

    if let Some(outgoing_id) = outgoing_id {
        cache.part_instances_mut().update(outgoing_id, |instance| {
            instance.timings.take_out = Some(now);
        });
    }
    let stamped = cache.part_instances_mut().update(taken_id, |instance| {
        instance.timings.take = Some(now);
    });
    if !stamped {
        return Err(Error::PartInstanceNotFound {
            part_instance_id: taken_id,
        });
    }

    {
        let playlist = cache.playlist_mut();
        playlist.previous_part_instance_id = outgoing_id;
        playlist.current_part_instance_id = Some(taken_id);
        playlist.next_part_instance_id = None;
        if playlist.hold_state == HoldState::Pending {
            playlist.hold_state = HoldState::Active;
        }
        if playlist.started_playback_at.is_none() {
            playlist.started_playback_at = Some(now);
        }
    }

    queue_successor(ctx, cache)?;
    generate_timeline(ctx, cache, effects)?;

    ctx.metrics().record_take("taken");
    ctx.timing_events().enqueue_part(playlist_id, taken_id);
    if let Some(outgoing_id) = outgoing_id {
        ctx.timing_events().enqueue_part(playlist_id, outgoing_id);
    }

    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    effects.defer("part taken event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PartTaken {
                playlist_id,
                part_instance_id: taken_id,
                previous_part_instance_id: outgoing_id,
                taken_at: now,
            },
        ));
        Ok(())
    });
    defer_timing_flush(ctx, effects, playlist_id);

    tracing::info!(
        playlist_id = %playlist_id,
        part_instance_id = %taken_id,
        previous = outgoing_id.map(|id| id.to_string()).unwrap_or_default(),
        "take",
    );
    Ok(taken_id)
}

/// Returns the milliseconds still blocked, if the take arrives too soon
/// after the current instance went on air.
///
/// Two guards apply: the studio-wide minimum span since the current
/// instance started or was taken, and the current part's in-transition
/// `block_take_duration` since its take.
fn take_blocked_for(ctx: &JobContext, current: &PartInstance, now: TimeMillis) -> Option<i64> {
    let mut blocked: Option<i64> = None;

    let span = ctx.studio().settings.minimum_take_span_ms;
    if let Some(since) = current.started_or_taken_at() {
        let remaining = span - (now - since);
        if remaining > 0 {
            blocked = Some(remaining);
        }
    }
    if let Some(transition) = &current.part.in_transition {
        if let Some(taken) = current.timings.take {
            let remaining = (taken + transition.block_take_duration) - now;
            if remaining > 0 && remaining > blocked.unwrap_or(0) {
                blocked = Some(remaining);
            }
        }
    }
    blocked
}

/// Selects and queues the part to play after the freshly taken one, or
/// clears the pointer when the playlist has run out.
fn queue_successor(ctx: &JobContext, cache: &mut PlayoutCache) -> Result<()> {
    let ordered = OrderedPlaylist::build(cache);
    let selected = select_next_part(
        cache.playlist(),
        cache.current_part_instance(),
        &ordered,
        true,
    );
    match selected {
        Some(selected) => {
            queue_next_part(ctx, cache, selected.into())?;
        }
        None => {
            cache.playlist_mut().next_part_instance_id = None;
            cleanup_after_pointer_move(ctx, cache);
        }
    }
    Ok(())
}

/// Completes an on-air hold: the previous part's held-over tails are
/// stopped, the hold state returns to none and the timeline is
/// regenerated. The playhead does not move.
fn complete_hold(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    now: TimeMillis,
) -> Result<PartInstanceId> {
    let current_id = cache
        .playlist()
        .current_part_instance_id
        .ok_or(Error::NoCurrentPart)?;
    let playlist_id = cache.playlist().id;

    if let Some(previous_id) = cache.playlist().previous_part_instance_id {
        // Runs continuing into the current instance stay on air; only
        // the tails the hold kept alive past their part get cut.
        let continuing: HashSet<InfiniteId> = cache
            .piece_instances_of(current_id)
            .filter_map(PieceInstance::infinite_id)
            .collect();
        let held: Vec<PieceInstanceId> = cache
            .piece_instances_of(previous_id)
            .filter(|instance| {
                instance.reported_stopped_playback.is_none()
                    && instance.user_duration.is_none()
                    && instance
                        .infinite_id()
                        .is_none_or(|run| !continuing.contains(&run))
            })
            .map(|instance| instance.id)
            .collect();
        for id in held {
            ctx.timing_events().enqueue_piece(playlist_id, id);
            cache.piece_instances_mut().update(id, |instance| {
                instance.user_duration = Some(PieceUserDuration::EndAt(now));
            });
        }
    }

    cache.playlist_mut().hold_state = HoldState::None;
    generate_timeline(ctx, cache, effects)?;

    ctx.metrics().record_take("hold_completed");
    defer_timing_flush(ctx, effects, playlist_id);
    tracing::info!(
        playlist_id = %playlist_id,
        part_instance_id = %current_id,
        "hold completed",
    );
    Ok(current_id)
}
