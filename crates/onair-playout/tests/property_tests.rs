//! Property-based tests for the pure timing helpers.
//!
//! These tests use proptest to verify that the per-track exclusivity
//! rules of piece resolution and the take-offset guarantees of part
//! timing hold across randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;

use proptest::prelude::*;

use onair_core::{ActivationId, PartId, PartInstanceId, PieceId, RundownId, SegmentId};

use onair_playout::model::{
    HoldState, Part, PartInTransition, PartOutTransition, Piece, PieceEnable, PieceInstance,
    PieceLifespan, PieceStart, PieceUserDuration,
};
use onair_playout::playout::calculate_part_timings;
use onair_playout::playout::resolve::{resolve_piece_timings, ResolvedPieceInstance};

/// Wall-clock start used to convert absolute marks into part offsets.
const PART_STARTED_AT: i64 = 100_000;

/// Generates a source layer from a small mapped set, so collisions on
/// one layer actually happen.
fn arb_layer() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["cam0", "gfx0", "vt0", "aud0"]).prop_map(String::from)
}

fn arb_lifespan() -> impl Strategy<Value = PieceLifespan> {
    prop::sample::select(vec![
        PieceLifespan::WithinPart,
        PieceLifespan::UntilSegmentEnd,
        PieceLifespan::UntilRundownEnd,
        PieceLifespan::UntilShowStyleEnd,
    ])
}

/// Generates a scripted enable: fixed offset or `Now`, bounded or
/// open-ended.
fn arb_enable() -> impl Strategy<Value = PieceEnable> {
    (
        prop_oneof![
            (0i64..60_000).prop_map(PieceStart::Offset),
            Just(PieceStart::Now),
        ],
        prop::option::of(1i64..30_000),
    )
        .prop_map(|(start, duration)| PieceEnable { start, duration })
}

fn arb_user_duration() -> impl Strategy<Value = Option<PieceUserDuration>> {
    prop::option::of(prop_oneof![
        (0i64..60_000).prop_map(PieceUserDuration::EndRelativeToPart),
        (100_000i64..200_000).prop_map(PieceUserDuration::EndAt),
    ])
}

/// Generates one piece instance with varied scripted and reported
/// timing marks. Part instance ids are rehomed by
/// [`arb_part_piece_set`].
fn arb_piece_instance() -> impl Strategy<Value = PieceInstance> {
    (
        arb_layer(),
        arb_lifespan(),
        arb_enable(),
        prop::option::of(100_000i64..200_000), // reported stop
        prop::option::of(0i64..1_000_000),     // ad-lib insertion time
        arb_user_duration(),
    )
        .prop_map(
            |(layer, lifespan, enable, stopped, inserted, user_duration)| {
                let mut piece = Piece::new(
                    PieceId::generate(),
                    PartId::generate(),
                    SegmentId::generate(),
                    RundownId::generate(),
                    "generated",
                    layer,
                );
                piece.lifespan = lifespan;
                piece.enable = enable;
                let mut instance = PieceInstance::from_piece(
                    piece,
                    PartInstanceId::generate(),
                    ActivationId::generate(),
                );
                instance.reported_stopped_playback = stopped;
                instance.dynamically_inserted = inserted;
                instance.user_duration = user_duration;
                instance
            },
        )
}

/// A bundle of piece instances rehomed onto one shared part instance,
/// the shape [`resolve_piece_timings`] is called with.
fn arb_part_piece_set() -> impl Strategy<Value = Vec<PieceInstance>> {
    prop::collection::vec(arb_piece_instance(), 0..12).prop_map(|mut instances| {
        let shared = PartInstanceId::generate();
        for instance in &mut instances {
            instance.part_instance_id = shared;
        }
        instances
    })
}

fn arb_in_transition() -> impl Strategy<Value = Option<PartInTransition>> {
    prop::option::of((0i64..3_000, 0i64..3_000, 0i64..3_000).prop_map(
        |(block, keepalive, delay)| PartInTransition {
            block_take_duration: block,
            previous_part_keepalive: keepalive,
            content_delay: delay,
        },
    ))
}

/// Generates a part with varied transition scripting.
fn arb_part() -> impl Strategy<Value = Part> {
    (
        0i64..3_000,                   // preroll
        prop::option::of(1i64..3_000), // out transition
        any::<bool>(),                 // auto next
        0i64..3_000,                   // auto next overlap
        arb_in_transition(),
        any::<bool>(),                 // disable the next in-transition
    )
        .prop_map(
            |(preroll, out, auto_next, overlap, in_transition, disable)| {
                let mut part = Part::new(
                    PartId::generate(),
                    SegmentId::generate(),
                    RundownId::generate(),
                    1.0,
                    "generated",
                );
                part.preroll = preroll;
                part.out_transition = out.map(|duration| PartOutTransition { duration });
                part.auto_next = auto_next;
                part.auto_next_overlap = overlap;
                part.in_transition = in_transition;
                part.disable_next_in_transition = disable;
                part
            },
        )
}

fn arb_hold_state() -> impl Strategy<Value = HoldState> {
    prop::sample::select(vec![HoldState::None, HoldState::Pending, HoldState::Active])
}

fn track_key(piece: &ResolvedPieceInstance) -> (String, bool) {
    (
        piece.instance.piece.source_layer.clone(),
        piece.instance.piece.lifespan.is_infinite(),
    )
}

proptest! {
    /// INVARIANT: On each (layer, track) at most one piece is live at
    /// any offset; only the last may run open-ended.
    #[test]
    fn tracks_never_overlap(
        instances in arb_part_piece_set(),
        now in 0i64..60_000,
    ) {
        let resolved = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));

        let mut tracks: HashMap<(String, bool), Vec<&ResolvedPieceInstance>> = HashMap::new();
        for piece in &resolved {
            tracks.entry(track_key(piece)).or_default().push(piece);
        }
        for pieces in tracks.values_mut() {
            pieces.sort_by_key(|piece| piece.resolved_start);
            for pair in pieces.windows(2) {
                let end = pair[0].resolved_end;
                prop_assert!(
                    end.is_some(),
                    "a piece followed on its track must have been capped"
                );
                prop_assert!(end.unwrap() <= pair[1].resolved_start);
            }
        }
    }

    /// INVARIANT: Every surviving bounded window has positive length.
    #[test]
    fn bounded_windows_keep_positive_length(
        instances in arb_part_piece_set(),
        now in 0i64..60_000,
    ) {
        let resolved = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));
        for piece in &resolved {
            if let Some(end) = piece.resolved_end {
                prop_assert!(end > piece.resolved_start);
            }
        }
    }

    /// INVARIANT: Resolution is a pure function of its inputs.
    #[test]
    fn resolution_is_deterministic(
        instances in arb_part_piece_set(),
        now in 0i64..60_000,
    ) {
        let first = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));
        let second = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));
        prop_assert_eq!(first, second);
    }

    /// INVARIANT: Output is ordered by (start, layer, id), so the
    /// timeline generator never has to re-sort.
    #[test]
    fn output_is_ordered(
        instances in arb_part_piece_set(),
        now in 0i64..60_000,
    ) {
        let resolved = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));
        for pair in resolved.windows(2) {
            let a = (
                pair[0].resolved_start,
                &pair[0].instance.piece.source_layer,
                pair[0].instance.id,
            );
            let b = (
                pair[1].resolved_start,
                &pair[1].instance.piece.source_layer,
                pair[1].instance.id,
            );
            prop_assert!(a <= b);
        }
    }

    /// INVARIANT: A device stop report can only shorten a window,
    /// never extend it.
    #[test]
    fn stop_reports_never_extend(
        instances in arb_part_piece_set(),
        now in 0i64..60_000,
    ) {
        let resolved = resolve_piece_timings(&instances, now, Some(PART_STARTED_AT));
        for piece in &resolved {
            if let (Some(stopped), Some(end)) =
                (piece.instance.reported_stopped_playback, piece.resolved_end)
            {
                prop_assert!(end <= stopped - PART_STARTED_AT);
            }
        }
    }

    /// INVARIANT: Take offsets are non-negative and transition content
    /// never starts after the regular content it introduces.
    #[test]
    fn take_offsets_are_ordered_and_non_negative(
        from in arb_part(),
        to in arb_part(),
        hold in arb_hold_state(),
    ) {
        let timings = calculate_part_timings(hold, Some(&from), &to);
        prop_assert!(timings.to_part_delay >= 0);
        prop_assert!(timings.from_part_remaining >= 0);
        if let Some(start) = timings.in_transition_start {
            prop_assert!(start >= 0);
            prop_assert!(start <= timings.to_part_delay);
        }
    }

    /// INVARIANT: A hold falls back to a plain switch, whatever the
    /// parts script.
    #[test]
    fn a_hold_suppresses_scripted_transitions(
        from in arb_part(),
        to in arb_part(),
        hold in prop::sample::select(vec![HoldState::Pending, HoldState::Active]),
    ) {
        let timings = calculate_part_timings(hold, Some(&from), &to);
        let plain = 0.max(from.out_transition_duration()).max(to.preroll);
        prop_assert_eq!(timings.in_transition_start, None);
        prop_assert_eq!(timings.to_part_delay, plain);
        prop_assert_eq!(timings.from_part_remaining, plain);
    }

    /// INVARIANT: The outgoing part group always lives long enough for
    /// its scripted out-transition to finish.
    #[test]
    fn the_outgoing_part_outlives_its_out_transition(
        from in arb_part(),
        to in arb_part(),
        hold in arb_hold_state(),
    ) {
        let timings = calculate_part_timings(hold, Some(&from), &to);
        prop_assert!(timings.from_part_remaining >= from.out_transition_duration());
    }

    /// INVARIANT: The incoming part always gets its full preroll,
    /// with or without an outgoing part.
    #[test]
    fn the_incoming_part_gets_its_preroll(
        from in prop::option::of(arb_part()),
        to in arb_part(),
        hold in arb_hold_state(),
    ) {
        let timings = calculate_part_timings(hold, from.as_ref(), &to);
        prop_assert!(timings.to_part_delay >= to.preroll);
    }
}
