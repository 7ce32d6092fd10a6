//! Deterministic choice of the next part to queue.
//!
//! Selection is a pure function of the ordered view, the previously
//! played instance and the playlist's pending overrides. It must keep
//! working when ingest has removed the exact part (or its whole
//! segment) that was just on air, so the search start point degrades
//! through a chain of fallbacks before the first playable part is
//! taken.

use onair_core::SegmentId;

use crate::model::{Part, PartInstance, Playlist};

use super::ordered::OrderedPlaylist;

/// The outcome of [`select_next_part`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPart {
    /// The part to queue next.
    pub part: Part,
    /// Its index in the ordered view.
    pub index: usize,
    /// True when this choice honoured the playlist's next-segment
    /// override; the override must be cleared once the part is set.
    pub consumes_next_segment_id: bool,
}

/// Picks the part that should play after `previous`.
///
/// The search starts just after the previous instance's position:
///
/// 1. Exact part still present: its index plus one.
/// 2. Part removed, segment still has parts: just after the last part
///    ranked at or below the instance's snapshot, or the segment start
///    when everything now ranks above it.
/// 3. Segment has no parts left: the first part of any later segment.
/// 4. Segment unknown entirely: nothing, unless looping wraps below.
///
/// From that point the first playable part wins. A pending next-segment
/// override takes priority whenever there is no previous instance or
/// the naturally found part changes segment. When looping is enabled
/// and the forward search found nothing, the search wraps to the start.
///
/// With `ignore_unplayable` set, invalid and floated parts are skipped;
/// otherwise any part qualifies.
#[must_use]
pub fn select_next_part(
    playlist: &Playlist,
    previous: Option<&PartInstance>,
    ordered: &OrderedPlaylist,
    ignore_unplayable: bool,
) -> Option<SelectedPart> {
    let parts = ordered.parts();

    let find_first = |offset: usize, in_segment: Option<SegmentId>| {
        parts
            .iter()
            .enumerate()
            .skip(offset)
            .filter(|(_, p)| in_segment.is_none_or(|seg| p.segment_id == seg))
            .find(|(_, p)| !ignore_unplayable || p.is_playable())
            .map(|(index, part)| SelectedPart {
                part: part.clone(),
                index,
                consumes_next_segment_id: false,
            })
    };

    let search_from = previous.map_or(0, |prev| search_start(prev, ordered));
    let mut next = find_first(search_from, None);

    if let Some(next_segment_id) = playlist.next_segment_id {
        let segment_changed = match (&previous, &next) {
            (None, _) => true,
            (Some(prev), Some(found)) => prev.segment_id != found.part.segment_id,
            (Some(_), None) => false,
        };
        if segment_changed {
            if let Some(mut overridden) = find_first(0, Some(next_segment_id)) {
                overridden.consumes_next_segment_id = true;
                next = Some(overridden);
            }
        }
    }

    if next.is_none() && playlist.loop_enabled && !parts.is_empty() {
        next = find_first(0, None);
    }

    next
}

/// Computes the index to search from, degrading when ingest removed
/// the previous instance's part or segment.
fn search_start(previous: &PartInstance, ordered: &OrderedPlaylist) -> usize {
    if let Some(index) = ordered.part_index(previous.part.id) {
        return index + 1;
    }

    let parts = ordered.parts();
    if let Some(segment_start) = ordered.segment_start_index(previous.segment_id) {
        // The exact part is gone; resume after the last surviving part
        // the instance's snapshot outranked.
        let mut after_rank: Option<usize> = None;
        for (i, part) in parts.iter().enumerate().skip(segment_start) {
            if part.segment_id != previous.segment_id {
                break;
            }
            if part.rank <= previous.part.rank {
                after_rank = Some(i + 1);
            }
        }
        return after_rank.unwrap_or(segment_start);
    }

    if let Some(segment_position) = ordered.segment_position(previous.segment_id) {
        // The whole segment lost its parts; resume at the first part of
        // any later segment.
        for (i, part) in parts.iter().enumerate() {
            let position = ordered.segment_position(part.segment_id);
            if position.is_some_and(|p| p > segment_position) {
                return i;
            }
        }
    }

    // Nothing to anchor on; only a loop wrap can find a part now.
    parts.len()
}
