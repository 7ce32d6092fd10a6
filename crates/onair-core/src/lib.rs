//! # onair-core
//!
//! Core abstractions for the onair playout engine.
//!
//! This crate provides the foundational types used across all onair components:
//!
//! - **Identifiers**: Strongly-typed IDs for playlists, rundowns, parts, pieces
//!   and their playback instances
//! - **Error Types**: Shared error definitions and result types
//! - **Time**: The millisecond time scale all playout math runs on, plus a
//!   swappable clock for deterministic tests
//! - **Observability**: Logging initialization and the generation span
//! - **Canonical JSON**: Deterministic encoding for configuration hashing
//!
//! ## Crate Boundary
//!
//! `onair-core` is the **only** crate allowed to define shared primitives.
//! Domain documents and playout semantics live in `onair-playout`.
//!
//! ## Example
//!
//! ```rust
//! use onair_core::prelude::*;
//!
//! let playlist = PlaylistId::generate();
//! let part = PartId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod canonical;
pub mod error;
pub mod id;
pub mod observability;
pub mod time;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use onair_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{
        ActivationId, InfiniteId, PartId, PartInstanceId, PieceId, PieceInstanceId, PlaylistId,
        RundownId, SegmentId, ShowStyleId, StudioId,
    };
    pub use crate::time::{Clock, ManualClock, SystemClock, TimeMillis};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{
    ActivationId, InfiniteId, PartId, PartInstanceId, PieceId, PieceInstanceId, PlaylistId,
    RundownId, SegmentId, ShowStyleId, StudioId,
};
pub use observability::{LogFormat, init_logging};
pub use time::{Clock, ManualClock, SystemClock, TimeMillis};
