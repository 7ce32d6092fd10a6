//! Preload objects for upcoming content.
//!
//! Some devices need media opened before the switch hits them; a video
//! server cueing a clip is the canonical case. For each lookahead layer
//! in the studio settings, a bounded scan ahead of the playhead finds
//! the nearest scripted piece on that layer and emits a low-priority
//! preload object for it. Lookahead never changes what is on air: the
//! objects sit below live content priority and devices treat them as
//! cue hints.

use crate::cache::PlayoutCache;
use crate::model::{
    LookaheadLayer, Piece, PieceStart, TimeRef, TimelineEnable, TimelineObjId, TimelineObject,
};
use crate::playout::OrderedPlaylist;

/// Class tag carried by every preload object.
pub const LOOKAHEAD_CLASS: &str = "lookahead";

/// Builds preload objects for the studio's lookahead layers.
///
/// The scan starts at the queued next part, or just past the on-air
/// part when nothing is queued, and inspects at most `search_distance`
/// playable parts per layer. The nearest scripted piece on the layer
/// wins; one preload object per layer at most.
#[must_use]
pub fn lookahead_objects(
    cache: &PlayoutCache,
    ordered: &OrderedPlaylist,
    layers: &[LookaheadLayer],
) -> Vec<TimelineObject> {
    let start = scan_start(cache, ordered);
    let mut objects = Vec::new();
    for config in layers {
        let upcoming = ordered
            .parts()
            .iter()
            .skip(start)
            .filter(|part| part.is_playable())
            .take(config.search_distance);
        for part in upcoming {
            let mut candidates: Vec<&Piece> = cache
                .pieces()
                .values()
                .filter(|piece| piece.part_id == part.id && piece.source_layer == config.layer)
                .collect();
            candidates.sort_by_key(|piece| (scripted_offset(piece), piece.id));
            if let Some(piece) = candidates.first() {
                objects.push(preload_object(piece));
                break;
            }
        }
    }
    objects
}

/// Index of the first part the scan may preload from.
fn scan_start(cache: &PlayoutCache, ordered: &OrderedPlaylist) -> usize {
    if let Some(next) = cache.next_part_instance() {
        if let Some(index) = ordered.part_index(next.part.id) {
            return index;
        }
    }
    if let Some(current) = cache.current_part_instance() {
        if let Some(index) = ordered.part_index(current.part.id) {
            return index + 1;
        }
    }
    0
}

fn scripted_offset(piece: &Piece) -> i64 {
    match piece.enable.start {
        PieceStart::Offset(offset) => offset,
        PieceStart::Now => i64::MAX,
    }
}

fn preload_object(piece: &Piece) -> TimelineObject {
    TimelineObject::new(
        TimelineObjId::new(format!("lookahead_{}", piece.id)),
        TimelineEnable::starting_at(TimeRef::absolute(0)),
        piece.source_layer.clone(),
    )
    .with_content(piece.content.clone())
    .with_priority(-1)
    .with_classes(vec![LOOKAHEAD_CLASS.into()])
}
