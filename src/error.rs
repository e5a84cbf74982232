//! Custom error types and handling
//!
//! This module defines the error taxonomy surfaced by the exam managers.
//! Transport layers map [`AppError::error_code`] to their own responses.

use uuid::Uuid;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed input, recoverable by correcting it
    #[error("Validation error: {0}")]
    Validation(String),

    /// An id did not resolve to an entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the current exam state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The executor could not be reached at dispatch time
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// A repository failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::IllegalState(_) => "ILLEGAL_STATE",
            Self::Dispatch(_) => "DISPATCH_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether the caller may succeed by retrying the same call later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Dispatch(_) | Self::Storage(_))
    }

    pub fn exam_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Exam {id} not found"))
    }

    pub fn exercise_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Exercise {id} not found"))
    }

    pub fn test_case_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Test case {id} not found"))
    }

    pub fn solution_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Exercise solution {id} not found"))
    }
}

/// Failure reported by a repository port
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupted record: {0}")]
    Corrupted(String),
}

/// Failure reported by the executor send capability
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("executor channel unreachable: {0}")]
    Unreachable(String),

    #[error("could not encode execution request: {0}")]
    Encoding(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!("Storage error: {}", err);
        AppError::Storage(err.to_string())
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        AppError::Dispatch(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::from(err).into()
    }
}

impl From<redis::RedisError> for DispatchError {
    fn from(err: redis::RedisError) -> Self {
        DispatchError::Unreachable(err.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Encoding(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for repository ports
pub type StorageResult<T> = Result<T, StorageError>;
