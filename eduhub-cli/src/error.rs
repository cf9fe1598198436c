// eduhub-cli/src/error.rs
//! Application-level errors

use eduhub_core::EduHubError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] EduHubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected result shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AppError {
    /// Underlying database error, if this came from the engine
    pub fn as_database(&self) -> Option<&EduHubError> {
        match self {
            AppError::Database(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
