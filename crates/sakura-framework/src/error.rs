//! Framework error types

use thiserror::Error;

/// Errors raised while moving data between the host and typed models
#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unknown value at '{0}' cannot be written to state")]
    UnknownInState(String),

    #[error("Resource has been removed from state")]
    ResourceRemoved,

    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Resource type not found: {0}")]
    ResourceTypeNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceTypeNotFound(String),
}

pub type Result<T> = std::result::Result<T, FrameworkError>;

/// Vendor errors that can report a missing remote object
///
/// Read paths use this to tell "the object is gone" apart from a real failure.
pub trait NotFound {
    fn is_not_found(&self) -> bool;
}
