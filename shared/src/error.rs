use serde::{Deserialize, Serialize};

/// Machine-readable classification of a [`LotteryError`], sent to callers
/// next to the human-readable message.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyConsumed,
    RateLimited,
    AlreadyExists,
    CapacityExhausted,
    ConcurrentRedemptionConflict,
    PersistenceError,
    SpinInProgress,
    InvalidSessionState,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LotteryError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid lottery code")]
    NotFound,

    #[error("This code has already been used")]
    AlreadyConsumed,

    #[error("You have used all of today's draws (limit {limit} per day)")]
    RateLimited { limit: u32 },

    #[error("Code {0} already exists")]
    AlreadyExists(String),

    #[error("Could not find an unused code after {attempts} attempts")]
    CapacityExhausted { attempts: u32 },

    #[error("Code {0} was redeemed by another attempt before this draw settled")]
    ConcurrentRedemptionConflict(String),

    #[error("Storage error: {0}")]
    Persistence(#[from] StorageError),

    #[error("A spin is already in progress")]
    SpinInProgress,

    #[error("Cannot {action} while the session is {state}")]
    InvalidSessionState {
        action: &'static str,
        state: &'static str,
    },
}

impl LotteryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound => ErrorKind::NotFound,
            Self::AlreadyConsumed => ErrorKind::AlreadyConsumed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::CapacityExhausted { .. } => ErrorKind::CapacityExhausted,
            Self::ConcurrentRedemptionConflict(_) => ErrorKind::ConcurrentRedemptionConflict,
            Self::Persistence(_) => ErrorKind::PersistenceError,
            Self::SpinInProgress => ErrorKind::SpinInProgress,
            Self::InvalidSessionState { .. } => ErrorKind::InvalidSessionState,
        }
    }
}

/// Failure of the underlying key-value storage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    #[error("failed to write {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("record {key} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },
}

pub type LotteryResult<T> = Result<T, LotteryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let kind = LotteryError::ConcurrentRedemptionConflict("X".into()).kind();
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"concurrent_redemption_conflict\"");
    }

    #[test]
    fn test_storage_error_becomes_persistence() {
        let err: LotteryError = StorageError::Unavailable("disk".into()).into();
        assert_eq!(err.kind(), ErrorKind::PersistenceError);
        assert!(err.to_string().contains("disk"));
    }
}
