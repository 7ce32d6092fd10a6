//! Device playback reports.
//!
//! The playout transport reports back when parts and pieces actually
//! start and stop on the output. These handlers stamp the reported
//! timings onto the instances, so every later playhead computation
//! anchors on what really aired rather than on when the take
//! committed. Reports are idempotent; a report for an instance outside
//! the active window is dropped as stale, since devices replay their
//! report backlog after reconnecting.
//!
//! Timing changes are not emitted one by one: each handler enqueues
//! the touched instances on the shared timing queue and defers a
//! single coalesced event per transaction.

use onair_core::{PartInstanceId, PieceInstanceId, PlaylistId, TimeMillis};

use crate::cache::{with_playlist_cache, PlayoutCache};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::Result;
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::timeline::generate_timeline;

use super::defer_timing_flush;

/// Records that a part instance started playing on the output.
///
/// `play_offset` is the content offset the device began at, zero for a
/// clean start. A start report for the on-air instance also closes the
/// previous instance (the device switching over implies the old part
/// left the output) and regenerates the timeline so the on-air group
/// anchors on the reported time.
///
/// # Errors
///
/// Storage and timeline errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn on_part_playback_started(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    part_instance_id: PartInstanceId,
    started_at: TimeMillis,
    play_offset: i64,
) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        let Some(instance) = cache.part_instances().get(part_instance_id) else {
            drop_stale_report(cache, "part start");
            return Ok(());
        };
        if instance.timings.reported_started_playback == Some(started_at)
            && instance.timings.play_offset == play_offset
        {
            return Ok(());
        }

        cache
            .part_instances_mut()
            .update(part_instance_id, |instance| {
                instance.timings.reported_started_playback = Some(started_at);
                instance.timings.play_offset = play_offset;
            });
        ctx.timing_events().enqueue_part(playlist_id, part_instance_id);
        tracing::debug!(
            part_instance_id = %part_instance_id,
            started_at,
            play_offset,
            "part playback started",
        );

        if cache.playlist().current_part_instance_id == Some(part_instance_id) {
            if let Some(previous) = cache.previous_part_instance() {
                let previous_id = previous.id;
                if previous.timings.reported_stopped_playback.is_none() {
                    cache.part_instances_mut().update(previous_id, |instance| {
                        instance.timings.reported_stopped_playback = Some(started_at);
                    });
                    ctx.timing_events().enqueue_part(playlist_id, previous_id);
                }
            }
            generate_timeline(ctx, cache, effects)?;
        }

        let sink = ctx.event_sink();
        let studio_id = cache.studio_id();
        effects.defer("part playback started event", move || async move {
            sink.publish(PlayoutEvent::new(
                studio_id,
                PlayoutEventData::PartPlaybackStarted {
                    playlist_id,
                    part_instance_id,
                    started_at,
                },
            ));
            Ok(())
        });
        defer_timing_flush(ctx, effects, playlist_id);
        Ok(())
    })
    .await
}

/// Records that a part instance stopped playing on the output.
///
/// # Errors
///
/// Storage errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn on_part_playback_stopped(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    part_instance_id: PartInstanceId,
    stopped_at: TimeMillis,
) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        let Some(instance) = cache.part_instances().get(part_instance_id) else {
            drop_stale_report(cache, "part stop");
            return Ok(());
        };
        if instance.timings.reported_stopped_playback == Some(stopped_at) {
            return Ok(());
        }

        cache
            .part_instances_mut()
            .update(part_instance_id, |instance| {
                instance.timings.reported_stopped_playback = Some(stopped_at);
            });
        ctx.timing_events().enqueue_part(playlist_id, part_instance_id);
        tracing::debug!(
            part_instance_id = %part_instance_id,
            stopped_at,
            "part playback stopped",
        );

        let sink = ctx.event_sink();
        let studio_id = cache.studio_id();
        effects.defer("part playback stopped event", move || async move {
            sink.publish(PlayoutEvent::new(
                studio_id,
                PlayoutEventData::PartPlaybackStopped {
                    playlist_id,
                    part_instance_id,
                    stopped_at,
                },
            ));
            Ok(())
        });
        defer_timing_flush(ctx, effects, playlist_id);
        Ok(())
    })
    .await
}

/// Records that a piece instance started playing on the output.
///
/// # Errors
///
/// Storage errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn on_piece_playback_started(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    piece_instance_id: PieceInstanceId,
    started_at: TimeMillis,
) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        let Some(instance) = cache.piece_instances().get(piece_instance_id) else {
            drop_stale_report(cache, "piece start");
            return Ok(());
        };
        if instance.reported_started_playback == Some(started_at) {
            return Ok(());
        }

        cache
            .piece_instances_mut()
            .update(piece_instance_id, |instance| {
                instance.reported_started_playback = Some(started_at);
            });
        ctx.timing_events()
            .enqueue_piece(playlist_id, piece_instance_id);
        defer_timing_flush(ctx, effects, playlist_id);
        Ok(())
    })
    .await
}

/// Records that a piece instance stopped playing on the output.
///
/// # Errors
///
/// Storage errors propagate from the transaction.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn on_piece_playback_stopped(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    piece_instance_id: PieceInstanceId,
    stopped_at: TimeMillis,
) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, effects| {
        let Some(instance) = cache.piece_instances().get(piece_instance_id) else {
            drop_stale_report(cache, "piece stop");
            return Ok(());
        };
        if instance.reported_stopped_playback == Some(stopped_at) {
            return Ok(());
        }

        cache
            .piece_instances_mut()
            .update(piece_instance_id, |instance| {
                instance.reported_stopped_playback = Some(stopped_at);
            });
        ctx.timing_events()
            .enqueue_piece(playlist_id, piece_instance_id);
        defer_timing_flush(ctx, effects, playlist_id);
        Ok(())
    })
    .await
}

fn drop_stale_report(cache: &PlayoutCache, kind: &str) {
    tracing::warn!(
        playlist_id = %cache.playlist().id,
        kind,
        "playback report for an instance outside the active window; dropped",
    );
}
