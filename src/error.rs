//! Error kinds shared across the pod, object store, changelog, and series layers.

use thiserror::Error;

use crate::digest::Digest;

/// The crate-wide error type.
///
/// Mirrors the kinds a caller needs to branch on: a missing object, a
/// corrupted one, a frame that violates its schema, and a backend/transport
/// failure. A collection fork is non-fatal and is surfaced as a return
/// value (`WriteOutcome::forked`, `MergeOutcome`) rather than as an error
/// variant — see DESIGN.md.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity error at {digest}: {reason}")]
    Integrity { digest: Digest, reason: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("backend error: {0}")]
    Backend(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Transport(String),
}

impl Error {
    pub fn not_found(key: impl Into<String>) -> Error {
        return Error::NotFound(key.into());
    }

    pub fn integrity(digest: Digest, reason: impl Into<String>) -> Error {
        return Error::Integrity { digest, reason: reason.into() };
    }

    pub fn schema(reason: impl Into<String>) -> Error {
        return Error::Schema(reason.into());
    }

    /// True for the one case a read should swallow: a missing changelog
    /// entry is "no history", not a failure.
    pub fn is_not_found(&self) -> bool {
        return matches!(self, Error::NotFound(_));
    }
}

pub type Result<T> = std::result::Result<T, Error>;
