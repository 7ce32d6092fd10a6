//! Time-processing of piece instances within one part instance.
//!
//! Scripted enables, operator stop overrides, device stop reports and
//! per-layer exclusivity all feed into the window a piece actually
//! occupies. This pass turns the raw instances into part-relative
//! `[start, end)` windows and prunes instances that can never be
//! visible. The timeline generator places pieces from these windows,
//! and the continuity resolver re-syncs the queued-next part from them.

use std::collections::HashMap;

use onair_core::TimeMillis;

use crate::model::{PieceInstance, PieceStart, PieceUserDuration};

/// A piece instance with its effective part-relative timing window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPieceInstance {
    /// The underlying instance.
    pub instance: PieceInstance,
    /// Effective start offset within the part, in milliseconds.
    pub resolved_start: i64,
    /// Effective end offset within the part; `None` runs until the
    /// part (or lifespan) boundary.
    pub resolved_end: Option<i64>,
}

impl ResolvedPieceInstance {
    /// Returns the effective duration, when bounded.
    #[must_use]
    pub fn resolved_duration(&self) -> Option<i64> {
        self.resolved_end.map(|end| end - self.resolved_start)
    }
}

/// Resolves the timing windows of one part instance's piece instances.
///
/// `now_in_part` is the elapsed time within the part (zero for a part
/// that has not started). `part_started_at` converts wall-clock stop
/// marks into part-relative offsets; without it those marks are
/// ignored.
///
/// Per source layer, within-part pieces and open-ended pieces occupy
/// independent tracks. On each track a later-starting piece caps the
/// earlier one, so at most one piece per track is live at any offset.
/// Within-part content never caps an open-ended run. Pieces capped to
/// a zero-length window are dropped, as are disabled instances.
#[must_use]
pub fn resolve_piece_timings(
    piece_instances: &[PieceInstance],
    now_in_part: i64,
    part_started_at: Option<TimeMillis>,
) -> Vec<ResolvedPieceInstance> {
    let mut resolved: Vec<ResolvedPieceInstance> = piece_instances
        .iter()
        .filter(|instance| !instance.disabled)
        .map(|instance| resolve_one(instance, now_in_part, part_started_at))
        .collect();

    // Per (layer, track) capping. Indices into `resolved`, ordered by
    // effective start; age breaks ties so a fresh ad-lib caps the
    // scripted piece it lands on.
    let mut tracks: HashMap<(String, bool), Vec<usize>> = HashMap::new();
    for (index, piece) in resolved.iter().enumerate() {
        let key = (
            piece.instance.piece.source_layer.clone(),
            piece.instance.piece.lifespan.is_infinite(),
        );
        tracks.entry(key).or_default().push(index);
    }

    for indices in tracks.values_mut() {
        indices.sort_by_key(|&i| {
            let piece = &resolved[i];
            (
                piece.resolved_start,
                piece.instance.dynamically_inserted.unwrap_or(0),
                piece.instance.id,
            )
        });
        for pair in indices.windows(2) {
            let cap = resolved[pair[1]].resolved_start;
            let earlier = &mut resolved[pair[0]];
            earlier.resolved_end = Some(earlier.resolved_end.map_or(cap, |end| end.min(cap)));
        }
    }

    resolved.retain(|piece| {
        piece
            .resolved_end
            .is_none_or(|end| end > piece.resolved_start)
    });
    resolved.sort_by(|a, b| {
        a.resolved_start
            .cmp(&b.resolved_start)
            .then_with(|| a.instance.piece.source_layer.cmp(&b.instance.piece.source_layer))
            .then_with(|| a.instance.id.cmp(&b.instance.id))
    });
    resolved
}

fn resolve_one(
    instance: &PieceInstance,
    now_in_part: i64,
    part_started_at: Option<TimeMillis>,
) -> ResolvedPieceInstance {
    let resolved_start = match instance.piece.enable.start {
        PieceStart::Offset(offset) => offset,
        PieceStart::Now => now_in_part,
    };

    let mut ends: Vec<i64> = Vec::new();
    if let Some(duration) = instance.piece.enable.duration {
        ends.push(resolved_start + duration);
    }
    match instance.user_duration {
        Some(PieceUserDuration::EndRelativeToPart(offset)) => ends.push(offset),
        Some(PieceUserDuration::EndAt(at)) => {
            if let Some(started) = part_started_at {
                ends.push(at - started);
            }
        }
        None => {}
    }
    if let (Some(stopped), Some(started)) = (instance.reported_stopped_playback, part_started_at) {
        ends.push(stopped - started);
    }

    ResolvedPieceInstance {
        instance: instance.clone(),
        resolved_start,
        resolved_end: ends.into_iter().min(),
    }
}

#[cfg(test)]
mod tests {
    use onair_core::{ActivationId, PartId, PartInstanceId, PieceId, RundownId, SegmentId};

    use crate::model::{Piece, PieceEnable, PieceLifespan};

    use super::*;

    fn instance_on(layer: &str, enable: PieceEnable) -> PieceInstance {
        let mut piece = Piece::new(
            PieceId::generate(),
            PartId::generate(),
            SegmentId::generate(),
            RundownId::generate(),
            "clip",
            layer,
        );
        piece.enable = enable;
        PieceInstance::from_piece(piece, PartInstanceId::generate(), ActivationId::generate())
    }

    #[test]
    fn offsets_and_durations_pass_through() {
        let instance = instance_on(
            "vt0",
            PieceEnable {
                start: PieceStart::Offset(400),
                duration: Some(2_000),
            },
        );

        let resolved = resolve_piece_timings(&[instance], 0, None);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].resolved_start, 400);
        assert_eq!(resolved[0].resolved_end, Some(2_400));
        assert_eq!(resolved[0].resolved_duration(), Some(2_000));
    }

    #[test]
    fn now_resolves_to_the_part_playhead() {
        let instance = instance_on(
            "gfx0",
            PieceEnable {
                start: PieceStart::Now,
                duration: None,
            },
        );

        let resolved = resolve_piece_timings(&[instance], 7_250, None);
        assert_eq!(resolved[0].resolved_start, 7_250);
        assert_eq!(resolved[0].resolved_end, None);
    }

    #[test]
    fn user_stop_beats_the_scripted_duration() {
        let mut instance = instance_on(
            "vt0",
            PieceEnable {
                start: PieceStart::Offset(0),
                duration: Some(10_000),
            },
        );
        instance.user_duration = Some(PieceUserDuration::EndRelativeToPart(3_000));

        let resolved = resolve_piece_timings(&[instance], 0, None);
        assert_eq!(resolved[0].resolved_end, Some(3_000));
    }

    #[test]
    fn wall_clock_stops_become_part_relative() {
        let mut stopped_by_user = instance_on("gfx0", PieceEnable::at_offset(0));
        stopped_by_user.user_duration = Some(PieceUserDuration::EndAt(1_000_500));
        let mut stopped_by_device = instance_on("gfx1", PieceEnable::at_offset(0));
        stopped_by_device.reported_stopped_playback = Some(1_000_250);

        let resolved =
            resolve_piece_timings(&[stopped_by_user, stopped_by_device], 0, Some(1_000_000));
        assert_eq!(resolved[0].resolved_end, Some(500));
        assert_eq!(resolved[1].resolved_end, Some(250));
    }

    #[test]
    fn later_piece_caps_the_earlier_on_the_same_layer() {
        let first = instance_on("cam0", PieceEnable::at_offset(0));
        let second = instance_on(
            "cam0",
            PieceEnable {
                start: PieceStart::Offset(4_000),
                duration: None,
            },
        );

        let resolved = resolve_piece_timings(&[first.clone(), second], 0, None);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].instance.id, first.id);
        assert_eq!(resolved[0].resolved_end, Some(4_000));
        assert_eq!(resolved[1].resolved_end, None);
    }

    #[test]
    fn within_part_content_does_not_cap_an_open_ended_run() {
        let mut open_ended = instance_on("gfx0", PieceEnable::at_offset(0));
        open_ended.piece.lifespan = PieceLifespan::UntilSegmentEnd;
        let bounded = instance_on(
            "gfx0",
            PieceEnable {
                start: PieceStart::Offset(2_000),
                duration: Some(1_000),
            },
        );

        let resolved = resolve_piece_timings(&[open_ended.clone(), bounded], 0, None);
        let open = resolved
            .iter()
            .find(|p| p.instance.id == open_ended.id)
            .expect("open-ended piece survives");
        assert_eq!(open.resolved_end, None);
    }

    #[test]
    fn newer_open_ended_run_caps_the_older_one() {
        let mut older = instance_on("gfx0", PieceEnable::at_offset(0));
        older.piece.lifespan = PieceLifespan::UntilRundownEnd;
        let mut newer = instance_on(
            "gfx0",
            PieceEnable {
                start: PieceStart::Offset(5_000),
                duration: None,
            },
        );
        newer.piece.lifespan = PieceLifespan::UntilRundownEnd;

        let resolved = resolve_piece_timings(&[older.clone(), newer.clone()], 0, None);
        let old = resolved
            .iter()
            .find(|p| p.instance.id == older.id)
            .expect("older run present");
        assert_eq!(old.resolved_end, Some(5_000));
    }

    #[test]
    fn pieces_capped_to_nothing_are_pruned() {
        let ghost = instance_on("cam0", PieceEnable::at_offset(1_000));
        let replacement = instance_on("cam0", PieceEnable::at_offset(1_000));

        let resolved = resolve_piece_timings(&[ghost, replacement], 0, None);
        // Same start on the same track: the older is capped to zero
        // length and dropped.
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn disabled_instances_are_excluded() {
        let mut disabled = instance_on("cam0", PieceEnable::at_offset(0));
        disabled.disabled = true;

        let resolved = resolve_piece_timings(&[disabled], 0, None);
        assert!(resolved.is_empty());
    }
}
