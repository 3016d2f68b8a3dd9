//! Error types for concord-vote.

use thiserror::Error;

/// Result type for vote operations.
pub type Result<T> = std::result::Result<T, VoteError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// No session exists for the tech, or it has already closed.
    #[error("no open vote for {tech} in {save}")]
    NoOpenVote { save: String, tech: String },
}
