//! Sakura Cloud API error types

use sakura_framework::{DeadlineExceeded, NotFound};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error [{status}]: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    /// The requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::NotFound(_) => true,
            ApiError::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl NotFound for ApiError {
    fn is_not_found(&self) -> bool {
        ApiError::is_not_found(self)
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
