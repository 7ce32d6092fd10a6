//! Playout operations: the user-facing verbs of the engine.
//!
//! Operations run inside a playlist transaction (see
//! [`crate::cache::with_playlist_cache`]): load, mutate, commit or roll
//! back, then flush deferred effects. The one exception is baseline
//! upkeep, which locks the whole studio because it runs without any
//! playlist. The modules split along the lifecycle of a show:
//!
//! - **activation**: activate / deactivate / reset a playlist, plus
//!   the idle-studio baseline refresh
//! - **selection** + **set_next**: choose and queue the next part
//! - **take**: advance the playhead (the only way anything goes on air)
//! - **hold**: arm and release the hold state machine
//! - **adlib**: inject unplanned pieces and parts while on air
//! - **ingest_sync**: reconcile ingest edits onto live instances
//! - **playback**: apply timing reports from the playout gateway
//!
//! ## Playhead flow
//!
//! ```text
//!              set_next                    take
//!   (no next) ─────────▶ next queued ─────────────▶ current on air
//!                            ▲                            │
//!                            └────── select successor ◀───┘
//! ```
//!
//! Pure helpers (no cache access) live in **ordered**, **timings**,
//! **resolve** and **infinites**; operations compose them.

pub mod activation;
pub mod adlib;
pub mod hold;
pub mod infinites;
pub mod ingest_sync;
pub mod ordered;
pub mod playback;
pub mod resolve;
pub mod selection;
pub mod set_next;
pub mod take;
pub mod timings;

pub use activation::{
    activate_playlist, deactivate_playlist, reset_playlist, update_studio_baseline,
};
pub use adlib::{
    apply_playhead_change, disable_next_piece, insert_adlib_piece, queue_adlib_part,
    stop_pieces_on_source_layers, update_piece_instance, AdlibDestination, PieceInstanceUpdate,
    PlayheadChange,
};
pub use hold::{activate_hold, deactivate_hold};
pub use ingest_sync::{
    reconcile_removed_parts, reconcile_removed_segments, refresh_changed_parts,
    sync_changes_to_part_instances, IngestChanges,
};
pub use ordered::OrderedPlaylist;
pub use playback::{
    on_part_playback_started, on_part_playback_stopped, on_piece_playback_started,
    on_piece_playback_stopped,
};
pub use selection::{select_next_part, SelectedPart};
pub use set_next::{move_next_part, set_next_part, set_next_segment, SetNextTarget};
pub use take::take_next_part;
pub use timings::{calculate_part_timings, PartTimings};

use std::sync::Arc;

use onair_core::PlaylistId;

use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::events::PlayoutEvent;

/// Defers the coalesced playback-timings event for one playlist.
///
/// Operations enqueue the instances they touched on the shared
/// [`crate::events::TimingEventQueue`]; this drains them into a single
/// event once the transaction has committed.
pub(crate) fn defer_timing_flush(
    ctx: &JobContext,
    effects: &mut DeferredEffects,
    playlist_id: PlaylistId,
) {
    let sink = ctx.event_sink();
    let studio_id = ctx.studio().id;
    let timings = Arc::clone(ctx.timing_events());
    effects.defer("playback timings event", move || async move {
        if let Some(data) = timings.drain_playlist(playlist_id) {
            sink.publish(PlayoutEvent::new(studio_id, data));
        }
        Ok(())
    });
}
