//! # onair-playout
//!
//! Playout orchestration engine for live broadcast rundowns.
//!
//! This crate implements the playout domain: it decides what is on air,
//! what is queued, and renders both into the timeline consumed by
//! downstream playout devices:
//!
//! - **Transactional Cache**: Per-playlist working set loaded under an
//!   exclusive lock, committed atomically as a write batch
//! - **Take State Machine**: Part selection, queueing and the
//!   current/next/previous playhead rotation
//! - **Continuity Resolver**: Open-ended pieces carried across part
//!   boundaries by lifespan scope
//! - **Timeline Generator**: The flat, relatively-timed object graph,
//!   with now-freezing so regeneration never moves on-air content
//!
//! ## Core Concepts
//!
//! - **Playlist**: The on-air unit; one studio plays at most one
//!   activated playlist at a time
//! - **Part instance**: A playback-time snapshot of a scripted part;
//!   what actually aired, immune to later ingest edits
//! - **Take**: The operator action advancing next to current
//! - **Timeline**: The declarative device-facing output document
//!
//! ## Guarantees
//!
//! - **Serialized**: One exclusive lock per playlist; different
//!   playlists proceed fully in parallel
//! - **Atomic**: State changes and the timeline they imply commit in
//!   one batch or not at all
//! - **Stable**: Regenerating an unchanged playhead reproduces the
//!   same frozen timing anchors
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use onair_core::{PlaylistId, StudioId};
//! use onair_playout::context::JobContext;
//! use onair_playout::model::Studio;
//! use onair_playout::playout::{activate_playlist, take_next_part};
//! use onair_playout::store::{DocStore, MemoryDocStore};
//!
//! # async fn demo() -> onair_playout::error::Result<()> {
//! let store: Arc<dyn DocStore> = Arc::new(MemoryDocStore::new());
//! let studio = Studio::new(StudioId::generate(), "Studio 1");
//! let ctx = JobContext::new(store, studio);
//!
//! // The playlist and its rundowns arrive through ingest beforehand.
//! let playlist_id = PlaylistId::generate();
//! activate_playlist(&ctx, playlist_id, false).await?;
//! take_next_part(&ctx, playlist_id).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod context;
pub mod effects;
pub mod error;
pub mod events;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod playout;
pub mod store;
pub mod timeline;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cache::{with_playlist_cache, PlayoutCache};
    pub use crate::context::JobContext;
    pub use crate::effects::DeferredEffects;
    pub use crate::error::{Error, Result};
    pub use crate::events::{InMemoryEventSink, PlayoutEvent, PlayoutEventData, PlayoutEventSink};
    pub use crate::metrics::PlayoutMetrics;
    pub use crate::model::{Part, PartInstance, Piece, PieceInstance, Playlist, Timeline};
    pub use crate::playout::{
        activate_playlist, deactivate_playlist, set_next_part, take_next_part,
    };
    pub use crate::store::{DocStore, MemoryDocStore};
    pub use crate::timeline::{generate_timeline, TimelineHook, TimelinePublisher};
}
