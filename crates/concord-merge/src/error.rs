//! Error types for concord-merge.

use thiserror::Error;

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Uploads that cannot be merged at all.
///
/// Most malformed content is tolerated (skipped blocks, unparsable fields).
/// These errors cover payloads with no usable meaning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// A numeric payload did not parse to a finite number.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// An orbit CSV line was missing fields or a user.
    #[error("invalid orbit record: {0}")]
    InvalidOrbit(&'static str),
}
