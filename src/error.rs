//! Error types for the lending core

use thiserror::Error;

/// Numeric error codes handed to presentation shells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    BadValue = 1,
    NoSuchCopy = 2,
    CopyAlreadyBorrowed = 3,
    CopyAlreadyAvailable = 4,
    DbFailure = 5,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Copy with id {0} not found")]
    NotFound(i64),

    #[error("Copy with id {0} is already borrowed")]
    AlreadyBorrowed(i64),

    #[error("Copy with id {0} is already available")]
    AlreadyAvailable(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
    /// Code reported to callers that do not match on the variant
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::NotFound(_) => ErrorCode::NoSuchCopy,
            AppError::AlreadyBorrowed(_) => ErrorCode::CopyAlreadyBorrowed,
            AppError::AlreadyAvailable(_) => ErrorCode::CopyAlreadyAvailable,
            AppError::Storage(_) | AppError::Migration(_) => ErrorCode::DbFailure,
        }
    }

    /// True for failures of the persistence layer rather than of the request
    pub fn is_storage(&self) -> bool {
        self.code() == ErrorCode::DbFailure
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
