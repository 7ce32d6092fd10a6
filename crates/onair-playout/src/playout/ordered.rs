//! A flattened, playback-ordered view of a playlist's structure.
//!
//! Selection and timeline generation both need "the parts, in the order
//! they will play". That order is: rundowns as listed on the playlist,
//! segments by rank within each rundown, parts by rank within each
//! segment. [`OrderedPlaylist`] computes it once per operation and hands
//! out index-based lookups so callers never re-sort.

use std::collections::HashMap;

use onair_core::{PartId, RundownId, SegmentId};

use crate::cache::PlayoutCache;
use crate::model::{Part, Segment};

/// Playback-ordered segments and parts for one playlist.
///
/// Scratchpad segments are excluded entirely. Segments orphaned by a
/// deletion stay in the order (their rank still anchors the playhead)
/// but usually carry no playable parts.
#[derive(Debug)]
pub struct OrderedPlaylist {
    segments: Vec<Segment>,
    parts: Vec<Part>,
    part_index: HashMap<PartId, usize>,
    segment_position: HashMap<SegmentId, usize>,
}

impl OrderedPlaylist {
    /// Builds the ordered view from the cached playlist structure.
    #[must_use]
    pub fn build(cache: &PlayoutCache) -> Self {
        let mut rundown_ids: Vec<RundownId> =
            cache.playlist().rundown_ids_in_order.clone();
        // Rundowns known to the cache but missing from the playlist's
        // order (mid-ingest states) go last, in id order.
        let mut unlisted: Vec<RundownId> = cache
            .rundowns()
            .values()
            .map(|r| r.id)
            .filter(|id| !rundown_ids.contains(id))
            .collect();
        unlisted.sort();
        rundown_ids.extend(unlisted);

        let mut segments = Vec::new();
        for rundown_id in &rundown_ids {
            let mut in_rundown: Vec<&Segment> = cache
                .segments()
                .values()
                .filter(|s| s.rundown_id == *rundown_id && !s.is_scratchpad())
                .collect();
            in_rundown.sort_by(|a, b| {
                a.rank
                    .total_cmp(&b.rank)
                    .then_with(|| a.id.cmp(&b.id))
            });
            segments.extend(in_rundown.into_iter().cloned());
        }

        let mut parts = Vec::new();
        for segment in &segments {
            let mut in_segment: Vec<&Part> = cache
                .parts()
                .values()
                .filter(|p| p.segment_id == segment.id)
                .collect();
            in_segment.sort_by(|a, b| {
                a.rank
                    .total_cmp(&b.rank)
                    .then_with(|| a.id.cmp(&b.id))
            });
            parts.extend(in_segment.into_iter().cloned());
        }

        Self::from_sorted(segments, parts)
    }

    /// Wraps segment and part lists that are already in playback order.
    pub(crate) fn from_sorted(segments: Vec<Segment>, parts: Vec<Part>) -> Self {
        let part_index = parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        let segment_position = segments
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();

        Self {
            segments,
            parts,
            part_index,
            segment_position,
        }
    }

    /// All parts in playback order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All segments in playback order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index of a part in the playback order.
    #[must_use]
    pub fn part_index(&self, part_id: PartId) -> Option<usize> {
        self.part_index.get(&part_id).copied()
    }

    /// Position of a segment in the playback order.
    #[must_use]
    pub fn segment_position(&self, segment_id: SegmentId) -> Option<usize> {
        self.segment_position.get(&segment_id).copied()
    }

    /// Index of the first part belonging to the given segment.
    #[must_use]
    pub fn segment_start_index(&self, segment_id: SegmentId) -> Option<usize> {
        self.parts.iter().position(|p| p.segment_id == segment_id)
    }

    /// Parts of one segment, in playback order.
    pub fn parts_of_segment(&self, segment_id: SegmentId) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(move |p| p.segment_id == segment_id)
    }

    /// The first playable part of the whole playlist, if any.
    #[must_use]
    pub fn first_playable_part(&self) -> Option<&Part> {
        self.parts.iter().find(|p| p.is_playable())
    }

    /// The first playable part of one segment, if any.
    #[must_use]
    pub fn first_playable_part_of_segment(&self, segment_id: SegmentId) -> Option<&Part> {
        self.parts_of_segment(segment_id).find(|p| p.is_playable())
    }
}
