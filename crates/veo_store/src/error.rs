//! Error types for the item library.

use thiserror::Error;

use veo_core::{CoreError, ItemId, RecordId};

use crate::store::StoreOp;

/// Result type alias for library operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the library.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Item not found in trash: {0}")]
    NotInTrash(ItemId),

    #[error("Migration record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// Failure requested through `LibraryStore::fail_on`
    #[error("Injected failure: {0}")]
    Injected(StoreOp),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ItemNotFound(id) => CoreError::ItemNotFound(id),
            StoreError::RecordNotFound(id) => CoreError::RecordNotFound(id),
            other => CoreError::Provider(other.to_string()),
        }
    }
}
