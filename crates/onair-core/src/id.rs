//! Strongly-typed identifiers for onair entities.
//!
//! All identifiers in onair are:
//! - **Strongly typed**: Prevents mixing up different ID types at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: No coordination required for generation
//!
//! Static identifiers (playlists, rundowns, segments, parts, pieces) come from
//! the ingest side; instance identifiers (part/piece instances, activations,
//! continuations) are minted by the playout engine itself.
//!
//! # Example
//!
//! ```rust
//! use onair_core::id::{PartId, PartInstanceId};
//!
//! let part = PartId::generate();
//! let instance = PartInstanceId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: PartId = instance;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a new unique ID.
            ///
            /// Uses ULID generation which is:
            /// - Lexicographically sortable by creation time
            /// - Globally unique without coordination
            /// - URL-safe and case-insensitive
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the creation timestamp encoded in the ID.
            #[must_use]
            pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                let ms = self.0.timestamp_ms();
                chrono::DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(chrono::Utc::now)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| Error::InvalidId {
                        message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                    })
            }
        }
    };
}

define_id!(
    /// A unique identifier for a studio.
    ///
    /// A studio is one physical/logical playout environment: one timeline
    /// output, one set of device settings, at most one active playlist.
    StudioId,
    "studio"
);

define_id!(
    /// A unique identifier for a show style.
    ///
    /// Rundowns bind to a show style; open-ended content only continues
    /// across rundown boundaries when the show style matches.
    ShowStyleId,
    "show style"
);

define_id!(
    /// A unique identifier for a rundown playlist.
    ///
    /// The playlist is the unit of playback: activation, the playhead
    /// pointers and the hold state all live on it.
    PlaylistId,
    "playlist"
);

define_id!(
    /// A unique identifier for a rundown.
    RundownId,
    "rundown"
);

define_id!(
    /// A unique identifier for a segment within a rundown.
    SegmentId,
    "segment"
);

define_id!(
    /// A unique identifier for a part.
    ///
    /// Parts are the scripted units of playback; taking a part puts it
    /// on air.
    PartId,
    "part"
);

define_id!(
    /// A unique identifier for a piece.
    ///
    /// Pieces are the content elements of a part (video, graphics,
    /// audio), each on a source layer.
    PieceId,
    "piece"
);

define_id!(
    /// A unique identifier for a part instance.
    ///
    /// Instances record one playback occurrence of a part; the static
    /// part may change or disappear while its instance keeps playing.
    PartInstanceId,
    "part instance"
);

define_id!(
    /// A unique identifier for a piece instance.
    PieceInstanceId,
    "piece instance"
);

define_id!(
    /// A unique identifier for one activation of a playlist.
    ///
    /// Regenerated on every activation; instance documents carry it so
    /// stale instances from a previous activation are distinguishable.
    ActivationId,
    "activation"
);

define_id!(
    /// A stable identity for one logical run of an open-ended piece.
    ///
    /// Carried across part boundaries by the continuity resolver: piece
    /// instances sharing an `InfiniteId` represent the same on-air
    /// content continuing, not a restart.
    InfiniteId,
    "infinite"
);
