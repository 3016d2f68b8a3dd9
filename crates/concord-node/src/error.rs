//! Error types for the Concord node.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use concord_merge::MergeError;
use concord_vote::VoteError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving requests.
#[derive(Debug, Error)]
pub enum Error {
    /// Upload could not be interpreted
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Per-user upload without a user
    #[error("Missing user")]
    MissingUser,

    /// Module has no convergence rule
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// Nothing stored under the key
    #[error("{0}")]
    NotFound(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vote protocol error
    #[error(transparent)]
    Vote(#[from] VoteError),
}

impl From<MergeError> for Error {
    fn from(e: MergeError) -> Self {
        Error::MalformedInput(e.to_string())
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MalformedInput(_) | Error::MissingUser | Error::Vote(_) => StatusCode::BAD_REQUEST,
            Error::UnknownModule(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Storage(_) | Error::Io(_) | Error::Config(_) | Error::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = match &self {
            Error::Vote(VoteError::NoOpenVote { .. }) => "No open vote".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
