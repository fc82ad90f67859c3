//! Error types for picking-core.

use thiserror::Error;

/// Errors raised while decoding or encoding a snapshot document.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document is not a key → record object mapping.
    #[error("malformed snapshot: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Serialization failed (write path).
    #[error("snapshot encoding error: {0}")]
    Encode(#[source] serde_json::Error),
}
