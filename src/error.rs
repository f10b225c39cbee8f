use thiserror::Error;

use crate::models::{CardId, UserId};

/// Failure of the backing store. Surfaced to callers unchanged.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt review state: {0}")]
    Corrupt(String),

    #[error("backup belongs to user {found}, not {expected}")]
    UserMismatch { expected: UserId, found: UserId },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid quality {0}: expected an integer from 0 to 5")]
    InvalidQuality(i32),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("review state of card {card} for user {user} kept changing after {attempts} attempts")]
    Conflict {
        user: UserId,
        card: CardId,
        attempts: u32,
    },
}

impl SchedulerError {
    /// Returns true when the caller should re-prompt for a rating.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidQuality(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for PersistenceError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}
