//! Kernel error taxonomy shared by all onair components.
//!
//! These are the failures the shared primitives themselves can raise:
//! id parsing, canonical encoding, store plumbing. Playout semantics
//! (take rejected, hold not possible, ...) have their own taxonomy in
//! the playout crate and wrap this one at the boundary.

use std::fmt;

/// The result type used throughout onair.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared kernel primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An identifier failed to parse.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// What made the identifier invalid.
        message: String,
    },

    /// A store backend failed.
    ///
    /// Store implementations report backend faults through this
    /// variant; the in-memory store only raises it for poisoned locks.
    #[error("storage error: {message}")]
    Storage {
        /// What the backend reported.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Encoding or decoding a document failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// What failed to encode or decode.
        message: String,
    },

    /// A referenced document does not exist.
    #[error("not found: {resource_type} with id {id}")]
    ResourceNotFound {
        /// The document kind that was looked up.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// An invariant the kernel relies on was violated.
    #[error("internal error: {message}")]
    Internal {
        /// The violated invariant.
        message: String,
    },
}

impl Error {
    /// Creates a storage error without a cause.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error wrapping the backend's cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a document kind and id.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates an internal invariant-violation error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
