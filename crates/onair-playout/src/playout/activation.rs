//! Playlist activation lifecycle.
//!
//! Activation claims the studio for one playlist: at most one playlist
//! per studio may hold an activation id. The claim is checked when the
//! job starts and rechecked under the lock immediately before the
//! commit; two playlists activate under different locks, so the
//! recheck closes the read-then-write window between them.
//!
//! Deactivation keeps the last on-air instance reachable through the
//! previous pointer, so late timing reports from the gateway still
//! find it; everything else is released and the studio timeline falls
//! back to its baseline. A reset rewinds an inactive or rehearsing
//! playlist to the top of its running order; a live playlist rejects
//! it. Baseline upkeep for an idle studio runs under the studio lock
//! instead of a playlist lock.

use onair_core::{ActivationId, PartInstanceId, PieceInstanceId, PlaylistId};

use crate::cache::{
    with_playlist_cache, with_playlist_cache_and_verify, with_studio_cache, PlayoutCache,
};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::model::HoldState;
use crate::timeline::{generate_studio_baseline, generate_timeline};

use super::defer_timing_flush;
use super::ordered::OrderedPlaylist;
use super::selection::select_next_part;
use super::set_next::{cleanup_after_pointer_move, queue_next_part};

/// Activates a playlist for playback, claiming its studio.
///
/// A fresh activation clears the playhead, queues the first playable
/// part as next and generates the timeline; nothing is on air until
/// the first take. Re-activating the already-active playlist is a
/// no-op when the mode matches and promotes a rehearsal to live when
/// called with `rehearsal = false`; a live playlist cannot drop back
/// into rehearsal.
///
/// # Errors
///
/// [`Error::PlaylistAlreadyActive`] when another playlist in the
/// studio holds the activation, [`Error::NotInRehearsal`] on an
/// attempt to move a live playlist back into rehearsal; storage and
/// timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn activate_playlist(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    rehearsal: bool,
) -> Result<ActivationId> {
    verify_studio_exclusive(ctx, playlist_id).await?;
    with_playlist_cache_and_verify(
        ctx,
        playlist_id,
        |cache, effects| execute_activate(ctx, cache, effects, rehearsal),
        || verify_studio_exclusive(ctx, playlist_id),
    )
    .await
}

/// Fails if any other playlist in the studio is active.
async fn verify_studio_exclusive(ctx: &JobContext, playlist_id: PlaylistId) -> Result<()> {
    let playlists = ctx.store().load_playlists_in_studio(ctx.studio().id).await?;
    match playlists
        .iter()
        .find(|candidate| candidate.id != playlist_id && candidate.is_active())
    {
        Some(holder) => Err(Error::PlaylistAlreadyActive { other: holder.id }),
        None => Ok(()),
    }
}

fn execute_activate(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    rehearsal: bool,
) -> Result<ActivationId> {
    let playlist = cache.playlist();
    let playlist_id = playlist.id;

    if let Some(activation_id) = playlist.activation_id {
        if playlist.rehearsal == rehearsal {
            tracing::debug!(playlist_id = %playlist_id, "already active in the requested mode");
            return Ok(activation_id);
        }
        if !playlist.rehearsal {
            return Err(Error::NotInRehearsal {
                playlist_id,
                operation: "switching to rehearsal".into(),
            });
        }
        // Rehearsal goes live under the same activation; instances and
        // the playhead carry over, only the mode flag changes.
        cache.playlist_mut().rehearsal = false;
        generate_timeline(ctx, cache, effects)?;
        defer_activated_event(ctx, cache, effects, activation_id, false);
        tracing::info!(
            playlist_id = %playlist_id,
            activation_id = %activation_id,
            "rehearsal promoted to live",
        );
        return Ok(activation_id);
    }

    let activation_id = ActivationId::generate();
    {
        let playlist = cache.playlist_mut();
        playlist.activation_id = Some(activation_id);
        playlist.rehearsal = rehearsal;
        playlist.activated_at = Some(ctx.clock().now());
        playlist.started_playback_at = None;
        playlist.hold_state = HoldState::None;
        playlist.next_segment_id = None;
        playlist.current_part_instance_id = None;
        playlist.next_part_instance_id = None;
        playlist.previous_part_instance_id = None;
    }

    // Queue the top of the running order. An empty playlist activates
    // with no next and sits in the before-first-part state.
    let ordered = OrderedPlaylist::build(cache);
    if let Some(selected) = select_next_part(cache.playlist(), None, &ordered, true) {
        queue_next_part(ctx, cache, selected.into())?;
    }
    generate_timeline(ctx, cache, effects)?;

    defer_activated_event(ctx, cache, effects, activation_id, rehearsal);
    tracing::info!(
        playlist_id = %playlist_id,
        activation_id = %activation_id,
        rehearsal,
        "playlist activated",
    );
    Ok(activation_id)
}

fn defer_activated_event(
    ctx: &JobContext,
    cache: &PlayoutCache,
    effects: &mut DeferredEffects,
    activation_id: ActivationId,
    rehearsal: bool,
) {
    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    let playlist_id = cache.playlist().id;
    effects.defer("playlist activated event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PlaylistActivated {
                playlist_id,
                activation_id,
                rehearsal,
            },
        ));
        Ok(())
    });
}

/// Deactivates a playlist, releasing its studio.
///
/// The on-air instance gets its take-out stamped and stays reachable
/// as previous; the queued next is reset, the hold and the
/// next-segment override are dropped and the studio timeline falls
/// back to its baseline. Deactivating an inactive playlist does
/// nothing.
///
/// # Errors
///
/// Storage and timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn deactivate_playlist(ctx: &JobContext, playlist_id: PlaylistId) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        execute_deactivate(ctx, cache, effects)
    })
    .await
}

fn execute_deactivate(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
) -> Result<()> {
    let playlist = cache.playlist();
    let playlist_id = playlist.id;
    let Some(activation_id) = playlist.activation_id else {
        tracing::debug!(playlist_id = %playlist_id, "deactivate on an inactive playlist");
        return Ok(());
    };
    let current_id = playlist.current_part_instance_id;
    let now = ctx.now_ms();

    if let Some(current_id) = current_id {
        cache.part_instances_mut().update(current_id, |instance| {
            instance.timings.take_out = Some(now);
        });
        ctx.timing_events().enqueue_part(playlist_id, current_id);
    }

    {
        let playlist = cache.playlist_mut();
        playlist.activation_id = None;
        playlist.previous_part_instance_id = current_id;
        playlist.current_part_instance_id = None;
        playlist.next_part_instance_id = None;
        playlist.hold_state = HoldState::None;
        playlist.next_segment_id = None;
        playlist.started_playback_at = None;
    }
    cleanup_after_pointer_move(ctx, cache);
    generate_timeline(ctx, cache, effects)?;

    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    effects.defer("playlist deactivated event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PlaylistDeactivated {
                playlist_id,
                activation_id,
            },
        ));
        Ok(())
    });
    defer_timing_flush(ctx, effects, playlist_id);

    tracing::info!(
        playlist_id = %playlist_id,
        activation_id = %activation_id,
        "playlist deactivated",
    );
    Ok(())
}

/// Rewinds a playlist to the top of its running order.
///
/// Every instance of the activation is marked reset and the playhead
/// pointers are cleared. While active in rehearsal the first playable
/// part is queued again and the timeline regenerated; an inactive
/// playlist only has its pointers and flags cleared.
///
/// # Errors
///
/// [`Error::NotInRehearsal`] when the playlist is live on air; storage
/// and timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn reset_playlist(ctx: &JobContext, playlist_id: PlaylistId) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        execute_reset(ctx, cache, effects)
    })
    .await
}

fn execute_reset(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
) -> Result<()> {
    let playlist = cache.playlist();
    let playlist_id = playlist.id;
    if playlist.is_active() && !playlist.rehearsal {
        return Err(Error::NotInRehearsal {
            playlist_id,
            operation: "a reset".into(),
        });
    }
    let was_active = playlist.is_active();

    let part_instance_ids: Vec<PartInstanceId> = cache
        .part_instances()
        .values()
        .filter(|instance| !instance.reset)
        .map(|instance| instance.id)
        .collect();
    for id in part_instance_ids {
        cache
            .part_instances_mut()
            .update(id, |instance| instance.reset = true);
    }
    let piece_instance_ids: Vec<PieceInstanceId> = cache
        .piece_instances()
        .values()
        .filter(|instance| !instance.reset)
        .map(|instance| instance.id)
        .collect();
    for id in piece_instance_ids {
        cache
            .piece_instances_mut()
            .update(id, |instance| instance.reset = true);
    }

    {
        let playlist = cache.playlist_mut();
        playlist.current_part_instance_id = None;
        playlist.next_part_instance_id = None;
        playlist.previous_part_instance_id = None;
        playlist.hold_state = HoldState::None;
        playlist.next_segment_id = None;
        playlist.started_playback_at = None;
        playlist.last_reset_at = Some(ctx.clock().now());
    }

    if was_active {
        let ordered = OrderedPlaylist::build(cache);
        if let Some(selected) = select_next_part(cache.playlist(), None, &ordered, true) {
            queue_next_part(ctx, cache, selected.into())?;
        }
        generate_timeline(ctx, cache, effects)?;
    }

    let sink = ctx.event_sink();
    let studio_id = cache.studio_id();
    effects.defer("playlist reset event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::PlaylistReset { playlist_id },
        ));
        Ok(())
    });

    tracing::info!(playlist_id = %playlist_id, was_active, "playlist reset");
    Ok(())
}

/// Rewrites the studio baseline timeline while no playlist is active.
///
/// Studio-wide maintenance (settings changes, engine upgrades) calls
/// this to refresh the device-clearing baseline and its version stamps
/// without touching any playlist. While a playlist holds the studio
/// the timeline belongs to that playlist's jobs and the call does
/// nothing.
///
/// Returns whether the baseline was written.
///
/// # Errors
///
/// Storage and timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn update_studio_baseline(ctx: &JobContext) -> Result<bool> {
    with_studio_cache(ctx, |cache, effects| {
        if let Some(active) = cache.active_playlist() {
            tracing::debug!(
                playlist_id = %active.id,
                "baseline update skipped, playlist active",
            );
            return Ok(false);
        }
        generate_studio_baseline(ctx, cache, effects)?;
        Ok(true)
    })
    .await
}
