//! Object-tree construction for timeline generation.
//!
//! One grouping node per visible part instance, piece objects as
//! children, and standalone groups for open-ended runs so they can
//! outlive the part that started them. Everything here is pure over
//! model snapshots and resolved piece windows; the generator composes
//! the groups, flattens the tree and post-processes the flat list.

use std::collections::HashSet;

use serde_json::json;

use onair_core::{InfiniteId, TimeMillis};

use crate::model::{
    PartInstance, PieceHoldMode, PieceKind, Playlist, TimeRef, Timeline, TimelineEnable,
    TimelineObjHoldMode, TimelineObjId, TimelineObject,
};
use crate::playout::resolve::ResolvedPieceInstance;
use crate::playout::PartTimings;

/// Virtual layer carrying the playout status object.
pub const STATUS_LAYER: &str = "playout_status";

/// Virtual layer carrying part start markers. Transport layers report
/// playback starts from objects on this layer, which feeds the
/// playback reporting loop.
pub const MARKER_LAYER: &str = "part_marker";

/// A part instance rendered as a grouping node, with any open-ended
/// runs split out as standalone top-level groups.
#[derive(Debug)]
pub struct BuiltPartGroup {
    /// The part group with its bounded pieces nested as children.
    pub group: TimelineObject,
    /// Standalone groups for the open-ended runs visible in this part.
    pub infinite_groups: Vec<TimelineObject>,
}

/// Builds the always-on status object announcing playhead state to
/// devices and downstream consumers.
#[must_use]
pub fn status_object(playlist: &Playlist, before_first_part: bool, no_next: bool) -> TimelineObject {
    TimelineObject::new(
        TimelineObjId::playout_status(),
        TimelineEnable::starting_at(TimeRef::absolute(0)),
        STATUS_LAYER,
    )
    .with_content(json!({
        "playlistId": playlist.id,
        "rehearsal": playlist.rehearsal,
        "beforeFirstPart": before_first_part,
        "noNext": no_next,
    }))
}

/// Builds the on-air part group.
///
/// The group anchors at the device-reported start, shifted back by the
/// play offset so child offsets stay content-relative, or at `Now`
/// before any report arrives. With an armed auto-next and a known
/// duration the group is bounded, so a successor can anchor to its end.
///
/// In-unit pieces become children shifted by the take's content delay.
/// In-transition pieces appear only when the take allowed a transition.
/// Out-transition pieces land against the group end when it is bounded.
/// Open-ended runs become standalone groups keyed by continuation id.
#[must_use]
pub fn current_part_group(
    instance: &PartInstance,
    resolved: &[ResolvedPieceInstance],
    timings: &PartTimings,
) -> BuiltPartGroup {
    let group_id = TimelineObjId::part_group(instance.id);
    let start = match instance.timings.reported_started_playback {
        Some(at) => TimeRef::absolute(at - instance.timings.play_offset),
        None => TimeRef::Now,
    };
    let mut enable = TimelineEnable::starting_at(start);
    if instance.part.auto_next {
        if let Some(expected) = instance.part.expected_duration {
            enable.duration = Some(timings.to_part_delay + expected);
        }
    }
    let group_duration = enable.duration;

    let mut group = TimelineObject::group(group_id.clone(), enable)
        .with_classes(vec!["current_part".into()]);
    group.push_child(part_marker_object(instance));

    let mut infinite_groups = Vec::new();
    for piece in resolved {
        if let Some(infinite_id) = piece.instance.infinite_id() {
            infinite_groups.push(infinite_run_group(infinite_id, piece, &group_id, timings));
            continue;
        }
        let child = match piece.instance.piece.kind {
            PieceKind::Normal => Some(offset_piece_object(
                piece,
                piece.resolved_start + timings.to_part_delay,
            )),
            PieceKind::InTransition => timings
                .in_transition_start
                .map(|at| offset_piece_object(piece, at + piece.resolved_start)),
            PieceKind::OutTransition => end_anchored_piece_object(piece, group_duration),
        };
        if let Some(child) = child {
            group.push_child(child);
        }
    }

    BuiltPartGroup {
        group,
        infinite_groups,
    }
}

/// Builds the outgoing part group.
///
/// Returns `None` for an instance that never started; there is nothing
/// on the devices to keep alive. The group anchors at the reported
/// start and its end is capped shortly after the on-air group begins,
/// so outgoing content clears once the take settles. An active hold
/// removes the cap: the outgoing part stays fully alive until the hold
/// completes. Runs promoted into standalone continuation groups are
/// excluded so they do not play twice.
#[must_use]
pub fn previous_part_group(
    instance: &PartInstance,
    resolved: &[ResolvedPieceInstance],
    current_group_id: &TimelineObjId,
    from_part_remaining: i64,
    hold_active: bool,
    promoted: &HashSet<InfiniteId>,
) -> Option<TimelineObject> {
    let started = instance.timings.reported_started_playback?;
    let mut enable =
        TimelineEnable::starting_at(TimeRef::absolute(started - instance.timings.play_offset));
    if !hold_active {
        enable = enable
            .with_end(TimeRef::start_of(current_group_id.clone()).offset_by(from_part_remaining));
    }

    let mut group = TimelineObject::group(TimelineObjId::part_group(instance.id), enable)
        .with_classes(vec!["previous_part".into()]);
    for piece in resolved {
        if piece
            .instance
            .infinite_id()
            .is_some_and(|id| promoted.contains(&id))
        {
            continue;
        }
        let child = match piece.instance.piece.kind {
            // The out transition plays across the take itself, so it
            // anchors to where the outgoing part clears rather than to
            // its long-past scripted offset.
            PieceKind::OutTransition => {
                let duration = piece
                    .resolved_duration()
                    .unwrap_or(instance.part.out_transition_duration());
                let start = TimeRef::start_of(current_group_id.clone())
                    .offset_by(from_part_remaining - duration);
                piece_object(
                    piece,
                    TimelineEnable::starting_at(start).with_duration(duration),
                )
            }
            _ => offset_piece_object(piece, piece.resolved_start),
        };
        group.push_child(child);
    }
    Some(group)
}

/// Builds the queued part group for an armed auto-next.
///
/// Anchors to the end of the bounded on-air group, pulled forward by
/// the transition overlap so the handover happens on air rather than
/// after it. Open-ended pieces are left to the take that will promote
/// them; preloading is the lookahead pass's concern.
#[must_use]
pub fn next_part_group(
    instance: &PartInstance,
    resolved: &[ResolvedPieceInstance],
    current_group_id: &TimelineObjId,
    timings: &PartTimings,
    overlap: i64,
) -> TimelineObject {
    let enable =
        TimelineEnable::starting_at(TimeRef::end_of(current_group_id.clone()).offset_by(-overlap));
    let mut group = TimelineObject::group(TimelineObjId::part_group(instance.id), enable)
        .with_classes(vec!["next_part".into()]);
    group.push_child(part_marker_object(instance));

    for piece in resolved {
        if piece.instance.piece.lifespan.is_infinite() {
            continue;
        }
        let child = match piece.instance.piece.kind {
            PieceKind::Normal => Some(offset_piece_object(
                piece,
                piece.resolved_start + timings.to_part_delay,
            )),
            PieceKind::InTransition => timings
                .in_transition_start
                .map(|at| offset_piece_object(piece, at + piece.resolved_start)),
            // An unbounded group has no end to anchor against.
            PieceKind::OutTransition => None,
        };
        if let Some(child) = child {
            group.push_child(child);
        }
    }
    group
}

/// Flattens the object tree into the persisted list: children are
/// emitted after their group with `in_group` set, in document order.
/// Keyframes ride their object into the flat list; their enables stay
/// relative to that object.
#[must_use]
pub fn flatten_objects(top: Vec<TimelineObject>) -> Vec<TimelineObject> {
    let mut flat = Vec::new();
    for object in top {
        flatten_into(object, None, &mut flat);
    }
    flat
}

/// Drops objects whose hold-mode tag excludes them from the present
/// hold state: `Only` objects exist solely during an active hold,
/// `Except` objects everywhere else.
#[must_use]
pub fn filter_for_hold(objects: Vec<TimelineObject>, hold_active: bool) -> Vec<TimelineObject> {
    objects
        .into_iter()
        .filter(|object| match object.hold_mode {
            TimelineObjHoldMode::Normal => true,
            TimelineObjHoldMode::Only => hold_active,
            TimelineObjHoldMode::Except => !hold_active,
        })
        .collect()
}

/// Materializes `Now` anchors against the previous generation.
///
/// An object id that already resolved to an absolute start keeps that
/// value verbatim, so regenerating without a state change cannot move
/// anything already on air. Remaining `Now` anchors resolve to the
/// generation wall clock exactly once.
pub fn freeze_now_anchors(
    objects: &mut [TimelineObject],
    previous: Option<&Timeline>,
    now: TimeMillis,
) {
    for object in objects.iter_mut() {
        if !matches!(object.enable.start, TimeRef::Now) {
            continue;
        }
        let carried = previous
            .and_then(|timeline| timeline.object(&object.id))
            .and_then(|frozen| match frozen.enable.start {
                TimeRef::Absolute { ms } => Some(ms),
                TimeRef::Now | TimeRef::Expression { .. } => None,
            });
        object.enable.start = TimeRef::absolute(carried.unwrap_or(now));
    }
}

/// Marker child at the group start, carrying the instance identity for
/// playback start reports.
fn part_marker_object(instance: &PartInstance) -> TimelineObject {
    TimelineObject::new(
        TimelineObjId::part_group_first_object(instance.id),
        TimelineEnable::starting_at(TimeRef::absolute(0)),
        MARKER_LAYER,
    )
    .with_content(json!({ "partInstanceId": instance.id }))
    .with_classes(vec!["part_first_object".into()])
}

/// A standalone group for one open-ended run.
///
/// Continuations and device-confirmed runs anchor at their absolute
/// start; a run that has not started yet anchors relative to the part
/// group that will start it. Top-level placement keeps the run alive
/// past the end of that group.
fn infinite_run_group(
    infinite_id: InfiniteId,
    piece: &ResolvedPieceInstance,
    part_group_id: &TimelineObjId,
    timings: &PartTimings,
) -> TimelineObject {
    let start = match piece.instance.reported_started_playback {
        Some(at) => TimeRef::absolute(at),
        None => TimeRef::start_of(part_group_id.clone())
            .offset_by(piece.resolved_start + timings.to_part_delay),
    };
    let mut enable = TimelineEnable::starting_at(start);
    if let Some(duration) = piece.resolved_duration() {
        enable.duration = Some(duration);
    }

    let mut group = TimelineObject::group(TimelineObjId::infinite_group(infinite_id), enable)
        .with_classes(vec!["infinite_run".into()]);
    group.push_child(piece_object(
        piece,
        TimelineEnable::starting_at(TimeRef::absolute(0)),
    ));
    group
}

/// A piece at a fixed offset inside its group, bounded by its resolved
/// window.
fn offset_piece_object(piece: &ResolvedPieceInstance, offset: i64) -> TimelineObject {
    let mut enable = TimelineEnable::starting_at(TimeRef::absolute(offset));
    if let Some(duration) = piece.resolved_duration() {
        enable.duration = Some(duration);
    }
    piece_object(piece, enable)
}

/// A piece counted backwards from the end of a bounded group. `None`
/// when the group is open-ended or the piece has no duration to count
/// back by.
fn end_anchored_piece_object(
    piece: &ResolvedPieceInstance,
    group_duration: Option<i64>,
) -> Option<TimelineObject> {
    let group_duration = group_duration?;
    let duration = piece.resolved_duration()?;
    let enable =
        TimelineEnable::starting_at(TimeRef::absolute(group_duration - duration)).with_duration(duration);
    Some(piece_object(piece, enable))
}

fn piece_object(piece: &ResolvedPieceInstance, enable: TimelineEnable) -> TimelineObject {
    TimelineObject::new(
        TimelineObjId::piece(piece.instance.id),
        enable,
        piece.instance.piece.source_layer.clone(),
    )
    .with_content(piece.instance.piece.content.clone())
    .with_hold_mode(hold_mode_tag(piece.instance.piece.hold_mode))
}

const fn hold_mode_tag(mode: PieceHoldMode) -> TimelineObjHoldMode {
    match mode {
        PieceHoldMode::Normal => TimelineObjHoldMode::Normal,
        PieceHoldMode::OnlyDuringHold => TimelineObjHoldMode::Only,
        PieceHoldMode::ExceptDuringHold => TimelineObjHoldMode::Except,
    }
}

fn flatten_into(
    mut object: TimelineObject,
    parent: Option<&TimelineObjId>,
    flat: &mut Vec<TimelineObject>,
) {
    object.in_group = parent.cloned();
    let children = std::mem::take(&mut object.children);
    let id = object.id.clone();
    flat.push(object);
    for child in children {
        flatten_into(child, Some(&id), flat);
    }
}
