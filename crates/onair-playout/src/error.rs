//! Error types for the playout domain.
//!
//! Two families:
//!
//! - **User-facing preconditions**: raised before any mutation, with
//!   enough structured detail for a caller to render a message. These
//!   abort the transaction cleanly.
//! - **Internal invariant failures**: a referenced document
//!   unexpectedly missing. Not expected in normal operation and not
//!   recovered; the transaction aborts and is logged loudly.
//!
//! [`Error::into_api_safe`] applies the plugin-boundary policy: errors
//! crossing it keep their user-facing variants but collapse internal
//! detail into the generic internal category.

use onair_core::{PartId, PartInstanceId, PieceInstanceId, PlaylistId, SegmentId};

/// The result type used throughout onair-playout.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in playout operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The playlist is not active.
    #[error("playlist {playlist_id} is not active")]
    PlaylistNotActive {
        /// The inactive playlist.
        playlist_id: PlaylistId,
    },

    /// Another playlist in the studio holds the activation.
    #[error("another playlist is already active in this studio: {other}")]
    PlaylistAlreadyActive {
        /// The playlist holding the activation.
        other: PlaylistId,
    },

    /// The operation needs rehearsal mode or an inactive playlist.
    #[error("playlist {playlist_id} is live on air; {operation} requires rehearsal mode or an inactive playlist")]
    NotInRehearsal {
        /// The live playlist.
        playlist_id: PlaylistId,
        /// The rejected operation.
        operation: String,
    },

    /// No part is on air.
    #[error("no part is currently playing")]
    NoCurrentPart,

    /// No part is queued as next.
    #[error("no next part is queued")]
    NoNextPart,

    /// The operation is not allowed while a hold is in progress.
    #[error("not allowed during a hold (state: {state})")]
    DuringHold {
        /// The hold state that blocked the operation.
        state: String,
    },

    /// A hold cannot be armed from the current pair of parts.
    #[error("hold is not possible here: {reason}")]
    HoldNotPossible {
        /// Why the hold was rejected.
        reason: String,
    },

    /// The take was rejected by the anti-runaway guard.
    #[error("take rejected: wait {remaining_ms}ms before taking again")]
    TakeRateLimited {
        /// Milliseconds until a take will be accepted.
        remaining_ms: i64,
    },

    /// A part was not found in the playlist's rundowns.
    #[error("part not found: {part_id}")]
    PartNotFound {
        /// The missing part.
        part_id: PartId,
    },

    /// The part cannot be played.
    #[error("part {part_id} is not playable: {reason}")]
    PartNotPlayable {
        /// The unplayable part.
        part_id: PartId,
        /// Why it cannot be played.
        reason: String,
    },

    /// A part instance was not found.
    #[error("part instance not found: {part_instance_id}")]
    PartInstanceNotFound {
        /// The missing instance.
        part_instance_id: PartInstanceId,
    },

    /// A piece instance was not found.
    #[error("piece instance not found: {piece_instance_id}")]
    PieceInstanceNotFound {
        /// The missing instance.
        piece_instance_id: PieceInstanceId,
    },

    /// A segment was not found in the playlist's rundowns.
    #[error("segment not found: {segment_id}")]
    SegmentNotFound {
        /// The missing segment.
        segment_id: SegmentId,
    },

    /// Disable-next-piece found no matching piece.
    #[error("no piece found to {action}")]
    DisableNoMatch {
        /// The attempted action ("disable" or "enable").
        action: String,
    },

    /// The runtime configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The timeline post-process hook failed.
    #[error("timeline hook '{hook_id}' failed: {message}")]
    TimelineHookFailed {
        /// The hook that failed.
        hook_id: String,
        /// The hook's error message.
        message: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// An error from onair-core.
    #[error("core error: {0}")]
    Core(#[from] onair_core::error::Error),
}

impl Error {
    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if this error describes a failed user-facing
    /// precondition rather than an engine fault.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        match self {
            Self::PlaylistNotActive { .. }
            | Self::PlaylistAlreadyActive { .. }
            | Self::NotInRehearsal { .. }
            | Self::NoCurrentPart
            | Self::NoNextPart
            | Self::DuringHold { .. }
            | Self::HoldNotPossible { .. }
            | Self::TakeRateLimited { .. }
            | Self::PartNotFound { .. }
            | Self::PartNotPlayable { .. }
            | Self::SegmentNotFound { .. }
            | Self::DisableNoMatch { .. } => true,
            Self::PartInstanceNotFound { .. }
            | Self::PieceInstanceNotFound { .. }
            | Self::Configuration { .. }
            | Self::TimelineHookFailed { .. }
            | Self::Internal { .. }
            | Self::Core(_) => false,
        }
    }

    /// Applies the plugin-boundary policy: user-facing errors pass
    /// through unchanged, everything else collapses to the generic
    /// internal category so implementation detail does not leak to
    /// plugin authors.
    #[must_use]
    pub fn into_api_safe(self) -> Self {
        if self.is_user_facing() {
            self
        } else {
            Self::internal("internal playout error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_error_carries_remaining() {
        let err = Error::TakeRateLimited { remaining_ms: 640 };
        assert!(err.to_string().contains("640"));
        assert!(err.is_user_facing());
    }

    #[test]
    fn internal_errors_are_not_user_facing() {
        assert!(!Error::internal("next instance vanished").is_user_facing());
        assert!(
            !Error::Core(onair_core::Error::internal("lock poisoned")).is_user_facing()
        );
    }

    #[test]
    fn api_safe_passes_user_errors_through() {
        let err = Error::NoNextPart.into_api_safe();
        assert!(matches!(err, Error::NoNextPart));
    }

    #[test]
    fn api_safe_masks_internal_detail() {
        let err = Error::internal("cache entry for part instance 01X missing").into_api_safe();
        let msg = err.to_string();
        assert!(!msg.contains("01X"));
        assert!(msg.contains("internal"));
    }
}
