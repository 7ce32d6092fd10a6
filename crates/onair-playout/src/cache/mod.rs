//! Transactional document cache.
//!
//! A playout job never mutates the store directly. It loads the
//! documents it needs into an identity-keyed working set, mutates that
//! set in memory, and commits the diff against the loaded snapshot in
//! one batch. Any error discards the whole working set; partial writes
//! are structurally impossible.
//!
//! ```text
//!  lock ──▶ load ──▶ body(&mut cache) ──▶ diff ──▶ commit ──▶ unlock ──▶ effects
//!                        │
//!                        └ Err ─▶ discard ─▶ unlock ─▶ propagate
//! ```
//!
//! - [`doc_map`]: the snapshot-diffing containers ([`DocMap`] for
//!   collections, [`DocCell`] for single documents).
//! - [`playout`]: the per-playlist working set ([`PlayoutCache`]) and
//!   the studio-scoped one ([`StudioCache`]).
//! - [`transaction`]: the lock/load/commit wrappers jobs run inside.

pub mod doc_map;
pub mod playout;
pub mod transaction;

pub use doc_map::{DocCell, DocMap};
pub use playout::{PlayoutCache, StudioCache};
pub use transaction::{with_playlist_cache, with_playlist_cache_and_verify, with_studio_cache};
