//! Transition timing between two adjacent parts.
//!
//! Taking from one part into another has to reconcile three scripted
//! demands: the outgoing part's out-transition must finish, the
//! incoming part needs its preroll, and a scripted in-transition may
//! keep the old content alive while delaying the new. The result is a
//! set of offsets the timeline generator applies to the part groups.

use crate::model::{HoldState, Part, PartInTransition};

/// Offsets produced by [`calculate_part_timings`], all in milliseconds
/// relative to the take point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTimings {
    /// Where in-transition pieces start inside the incoming part's
    /// group. `None` when no transition content may play.
    pub in_transition_start: Option<i64>,
    /// Delay before the incoming part's regular content starts.
    pub to_part_delay: i64,
    /// How long the outgoing part's group stays alive past the take
    /// point.
    pub from_part_remaining: i64,
}

impl PartTimings {
    /// Timings for a take with no outgoing part and no transition.
    #[must_use]
    pub const fn preroll_only(preroll: i64) -> Self {
        Self {
            in_transition_start: None,
            to_part_delay: preroll,
            from_part_remaining: preroll,
        }
    }
}

/// Computes the take offsets for moving from `from` into `to`.
///
/// A hold suppresses scripted transitions entirely. An armed auto-next
/// with overlap behaves as an implicit transition that keeps the
/// outgoing part alive for the overlap without delaying the incoming
/// content. Otherwise the incoming part's scripted in-transition is
/// honoured, unless the outgoing part disables it.
#[must_use]
pub fn calculate_part_timings(
    hold_state: HoldState,
    from: Option<&Part>,
    to: &Part,
) -> PartTimings {
    let mut in_transition: Option<PartInTransition> = None;
    let mut allow_transition_piece = false;

    if let Some(from) = from {
        if !hold_state.is_in_hold() {
            if from.auto_next && from.auto_next_overlap > 0 {
                in_transition = Some(PartInTransition {
                    block_take_duration: from.auto_next_overlap,
                    previous_part_keepalive: from.auto_next_overlap,
                    content_delay: 0,
                });
            } else if !from.disable_next_in_transition {
                allow_transition_piece = to.in_transition.is_some();
                in_transition = to.in_transition.clone();
            }
        }
    }

    let out_duration = from.map_or(0, Part::out_transition_duration);

    match in_transition {
        None => {
            // The switch waits for the out-transition and the preroll,
            // whichever is longer.
            let take_offset = [0, out_duration, to.preroll]
                .into_iter()
                .max()
                .unwrap_or(0);
            PartTimings {
                in_transition_start: None,
                to_part_delay: take_offset,
                from_part_remaining: take_offset,
            }
        }
        Some(transition) => {
            // Out-transition time not already covered by the keepalive,
            // and preroll time not already covered by the content delay.
            let out_shortfall = out_duration - transition.previous_part_keepalive;
            let preroll_shortfall = to.preroll - transition.content_delay;
            let base_delay = [0, out_shortfall, preroll_shortfall]
                .into_iter()
                .max()
                .unwrap_or(0);
            PartTimings {
                in_transition_start: allow_transition_piece.then_some(base_delay),
                to_part_delay: base_delay + transition.content_delay,
                from_part_remaining: base_delay + transition.previous_part_keepalive,
            }
        }
    }
}
