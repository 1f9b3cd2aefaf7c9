//! Error types for the core module.

use thiserror::Error;

use crate::record::{ItemId, RecordId};

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Migration record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Item {0} is already registered for migration")]
    AlreadyRegistered(ItemId),

    #[error("Item not supported: {0}")]
    NotSupported(String),

    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Item provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
