//! Timeline generation, run inside the playlist transaction.
//!
//! Every state change that affects what devices should do ends with a
//! regeneration: the generator reads the consistent cache, renders the
//! playhead as an object tree, post-processes the flat list and writes
//! the timeline document back into the cache, so it commits atomically
//! with the state that produced it. Handing the result to transport
//! layers happens post-commit through deferred effects.
//!
//! Regeneration is idempotent on unchanged state: `Now` anchors freeze
//! to the value the previous generation resolved, so a regeneration
//! triggered by an unrelated edit cannot move content already on air.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::Value;
use sha2::{Digest, Sha256};

use onair_core::{canonical, observability, InfiniteId, PartInstanceId, PlaylistId, TimeMillis};

use crate::cache::{PlayoutCache, StudioCache};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::events::{PlayoutEvent, PlayoutEventData};
use crate::model::{HoldState, PieceInstance, Studio, Timeline, TimelineObject, TimelineVersions};
use crate::playout::resolve::{resolve_piece_timings, ResolvedPieceInstance};
use crate::playout::{calculate_part_timings, OrderedPlaylist};
use crate::timeline::hook::{PieceSummary, TimelineHookInput};
use crate::timeline::{builder, lookahead};

/// Renders the playhead into the studio's timeline document.
///
/// An active playlist produces the full playout timeline; an inactive
/// one produces the empty studio baseline, which clears the devices.
/// The document is written into the cache and committed with the
/// calling transaction. A configured hook may rewrite the object list
/// before the write; a configured publisher receives the committed
/// document through a deferred effect.
pub fn generate_timeline(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
) -> Result<()> {
    let span = observability::timeline_span(
        &cache.studio_id().to_string(),
        &cache.playlist().id.to_string(),
    );
    let _guard = span.enter();

    let started = Instant::now();
    let now = ctx.now_ms();
    let active = cache.playlist().is_active();

    let (mut objects, summaries) = if active {
        build_playlist_objects(ctx, cache, now)
    } else {
        (Vec::new(), Vec::new())
    };

    builder::freeze_now_anchors(&mut objects, cache.timeline().get(), now);

    let previous_state = cache
        .timeline()
        .get()
        .and_then(|timeline| timeline.persistent_state.clone());
    let (objects, persistent_state) = post_process(
        ctx,
        objects,
        previous_state,
        summaries,
        cache.playlist().rehearsal,
    )?;

    let object_count = objects.len();
    let mut timeline = Timeline::new(cache.studio_id(), objects, stamped_versions(ctx)?);
    timeline.generated_at = ctx.clock().now();
    timeline.persistent_state = persistent_state;

    let elapsed = started.elapsed();
    if elapsed > ctx.config().timeline_warn_after {
        tracing::warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            object_count,
            "slow timeline generation"
        );
    }
    ctx.metrics()
        .record_timeline_generation(&cache.studio_id().to_string(), elapsed, object_count);

    defer_publication(ctx, effects, active.then(|| cache.playlist().id), &timeline);
    cache.timeline_mut().set(timeline);

    tracing::debug!(object_count, active, "timeline generated");
    Ok(())
}

/// Rewrites the studio baseline timeline through the studio-scoped
/// cache.
///
/// The baseline is what devices play while no playlist holds the
/// studio: an empty object list that clears them, stamped with fresh
/// versions. A configured hook still post-processes it, so studio-wide
/// overlays survive deactivation. Callers own the no-active-playlist
/// check; an active playlist's jobs regenerate through
/// [`generate_timeline`] instead.
pub fn generate_studio_baseline(
    ctx: &JobContext,
    cache: &mut StudioCache,
    effects: &mut DeferredEffects,
) -> Result<()> {
    let started = Instant::now();

    let previous_state = cache
        .timeline()
        .get()
        .and_then(|timeline| timeline.persistent_state.clone());
    let (objects, persistent_state) =
        post_process(ctx, Vec::new(), previous_state, Vec::new(), false)?;

    let object_count = objects.len();
    let mut timeline = Timeline::new(cache.studio_id(), objects, stamped_versions(ctx)?);
    timeline.generated_at = ctx.clock().now();
    timeline.persistent_state = persistent_state;

    ctx.metrics().record_timeline_generation(
        &cache.studio_id().to_string(),
        started.elapsed(),
        object_count,
    );

    defer_publication(ctx, effects, None, &timeline);
    cache.timeline_mut().set(timeline);

    tracing::debug!(object_count, "studio baseline written");
    Ok(())
}

/// Runs the configured post-process hook over a candidate object list.
///
/// Without a hook the objects pass through and the previous persistent
/// state is carried forward unchanged.
fn post_process(
    ctx: &JobContext,
    objects: Vec<TimelineObject>,
    previous_state: Option<Value>,
    pieces: Vec<PieceSummary>,
    rehearsal: bool,
) -> Result<(Vec<TimelineObject>, Option<Value>)> {
    let Some(hook) = ctx.hook() else {
        return Ok((objects, previous_state));
    };

    let input = TimelineHookInput {
        objects,
        previous_persistent_state: previous_state,
        pieces,
        rehearsal,
    };
    let output = hook
        .post_process(input)
        .map_err(|source| Error::TimelineHookFailed {
            hook_id: hook.id().to_owned(),
            message: source.to_string(),
        })?;
    Ok((output.objects, output.persistent_state))
}

/// Version stamp for a new generation: the engine version, the
/// configured hook identity and a canonical hash of the studio
/// settings.
fn stamped_versions(ctx: &JobContext) -> Result<TimelineVersions> {
    Ok(TimelineVersions {
        core: ctx.core_version().to_owned(),
        hook_id: ctx.hook().map(|hook| hook.id().to_owned()),
        hook_version: ctx.hook().map(|hook| hook.version().to_owned()),
        studio_config_hash: studio_config_hash(ctx.studio())?,
    })
}

/// Queues the post-commit notifications for a freshly written timeline:
/// the generated event and, when enabled and configured, the fast
/// publish of the full document.
fn defer_publication(
    ctx: &JobContext,
    effects: &mut DeferredEffects,
    playlist_id: Option<PlaylistId>,
    timeline: &Timeline,
) {
    let sink = ctx.event_sink();
    let studio_id = timeline.studio_id;
    let hash = timeline.hash.clone();
    let object_count = timeline.objects.len();
    effects.defer("timeline generated event", move || async move {
        sink.publish(PlayoutEvent::new(
            studio_id,
            PlayoutEventData::TimelineGenerated {
                playlist_id,
                hash,
                object_count,
            },
        ));
        Ok(())
    });

    if ctx.config().fast_publish_enabled {
        if let Some(publisher) = ctx.publisher() {
            let published = timeline.clone();
            effects.defer("timeline fast publish", move || async move {
                publisher.publish(&published).await
            });
        }
    }
}

/// Builds the object tree for an active playlist, together with the
/// resolved piece summaries handed to the post-process hook.
fn build_playlist_objects(
    ctx: &JobContext,
    cache: &PlayoutCache,
    now: TimeMillis,
) -> (Vec<TimelineObject>, Vec<PieceSummary>) {
    let playlist = cache.playlist();
    let hold_active = playlist.hold_state == HoldState::Active;
    let ordered = OrderedPlaylist::build(cache);

    let current = cache.current_part_instance();
    let next = cache.next_part_instance();
    let previous = cache.previous_part_instance();

    let mut objects = vec![builder::status_object(
        playlist,
        current.is_none(),
        next.is_none(),
    )];
    let mut summaries = Vec::new();

    if let Some(current) = current {
        let now_in_part = current.playhead_position(now);
        let current_pieces = live_piece_instances(cache, current.id);
        let resolved_current = resolve_piece_timings(
            &current_pieces,
            now_in_part,
            current.timings.reported_started_playback,
        );
        let timings = calculate_part_timings(
            playlist.hold_state,
            previous.map(|instance| &instance.part),
            &current.part,
        );

        let built = builder::current_part_group(current, &resolved_current, &timings);
        let current_group_id = built.group.id.clone();
        let current_bounded = built.group.enable.duration.is_some();
        let promoted: HashSet<InfiniteId> = resolved_current
            .iter()
            .filter_map(|piece| piece.instance.infinite_id())
            .collect();
        summarize(&resolved_current, &mut summaries);
        objects.push(built.group);
        objects.extend(built.infinite_groups);

        if let Some(previous) = previous {
            let now_in_previous = previous.playhead_position(now);
            let previous_pieces = live_piece_instances(cache, previous.id);
            let resolved_previous = resolve_piece_timings(
                &previous_pieces,
                now_in_previous,
                previous.timings.reported_started_playback,
            );
            if let Some(group) = builder::previous_part_group(
                previous,
                &resolved_previous,
                &current_group_id,
                timings.from_part_remaining,
                hold_active,
                &promoted,
            ) {
                summarize(&resolved_previous, &mut summaries);
                objects.push(group);
            }
        }

        if current_bounded {
            if let Some(next) = next {
                let next_pieces = live_piece_instances(cache, next.id);
                let resolved_next = resolve_piece_timings(&next_pieces, 0, None);
                let next_timings = calculate_part_timings(
                    playlist.hold_state,
                    Some(&current.part),
                    &next.part,
                );
                summarize(&resolved_next, &mut summaries);
                objects.push(builder::next_part_group(
                    next,
                    &resolved_next,
                    &current_group_id,
                    &next_timings,
                    current.part.auto_next_overlap,
                ));
            }
        }
    }

    objects.extend(lookahead::lookahead_objects(
        cache,
        &ordered,
        &ctx.studio().settings.lookahead_layers,
    ));

    let flat = builder::flatten_objects(objects);
    (builder::filter_for_hold(flat, hold_active), summaries)
}

/// The instance's piece instances that can still render, cloned for
/// resolution.
fn live_piece_instances(
    cache: &PlayoutCache,
    part_instance_id: PartInstanceId,
) -> Vec<PieceInstance> {
    cache
        .piece_instances_of(part_instance_id)
        .filter(|instance| !instance.reset)
        .cloned()
        .collect()
}

fn summarize(resolved: &[ResolvedPieceInstance], summaries: &mut Vec<PieceSummary>) {
    summaries.extend(resolved.iter().map(|piece| PieceSummary {
        piece_instance_id: piece.instance.id,
        source_layer: piece.instance.piece.source_layer.clone(),
        name: piece.instance.piece.name.clone(),
        infinite_id: piece.instance.infinite_id(),
    }));
}

/// Canonical hash of the studio settings the generation ran against,
/// so consumers can detect configuration drift between generations.
fn studio_config_hash(studio: &Studio) -> Result<String> {
    let bytes = canonical::to_canonical_bytes(&studio.settings)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}
