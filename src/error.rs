use crate::models::{PollId, UserId};
use thiserror::Error;

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Failures raised by registry operations. Every variant is returned before
/// any state is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid poll: {0}")]
    Validation(String),
    #[error("user '{0}' already exists")]
    DuplicateUser(UserId),
    #[error("poll {0} not found")]
    PollNotFound(PollId),
    #[error("user '{0}' not found")]
    UserNotFound(UserId),
    #[error("user '{user_id}' has already voted in poll {poll_id}")]
    AlreadyVoted { poll_id: PollId, user_id: UserId },
    #[error("option {index} does not exist in poll {poll_id} ({option_count} options)")]
    InvalidOption {
        poll_id: PollId,
        index: usize,
        option_count: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to start storage runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot failed integrity checks: {}", .0.join("; "))]
    Inconsistent(Vec<String>),
}
