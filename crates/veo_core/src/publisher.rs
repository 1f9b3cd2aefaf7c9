//! Publishing service client contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for publishing service calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures reported by a publishing client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The service answered with an application error
    #[error("Service error {code} ({module}): {message}")]
    Service {
        code: i64,
        module: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request could not complete
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn service(code: i64, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code,
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

/// Processing state of an item on the publishing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RemoteState {
    Error,
    WaitingForUpload,
    Ready,
    Published,
    /// Any other code: the service is still working on the item
    Processing(i64),
}

impl RemoteState {
    pub const ERROR: i64 = 0;
    pub const WAITING_FOR_UPLOAD: i64 = 6;
    pub const READY: i64 = 11;
    pub const PUBLISHED: i64 = 12;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::ERROR => RemoteState::Error,
            Self::WAITING_FOR_UPLOAD => RemoteState::WaitingForUpload,
            Self::READY => RemoteState::Ready,
            Self::PUBLISHED => RemoteState::Published,
            other => RemoteState::Processing(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            RemoteState::Error => Self::ERROR,
            RemoteState::WaitingForUpload => Self::WAITING_FOR_UPLOAD,
            RemoteState::Ready => Self::READY,
            RemoteState::Published => Self::PUBLISHED,
            RemoteState::Processing(code) => *code,
        }
    }

    /// Whether the service is done working on the item, successfully or not.
    pub fn is_stable(&self) -> bool {
        !matches!(self, RemoteState::Processing(_))
    }

    /// Whether the item is available for publishing.
    pub fn is_available(&self) -> bool {
        matches!(self, RemoteState::Ready | RemoteState::Published)
    }
}

impl From<i64> for RemoteState {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl From<RemoteState> for i64 {
    fn from(state: RemoteState) -> Self {
        state.code()
    }
}

impl std::fmt::Display for RemoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteState::Error => write!(f, "error"),
            RemoteState::WaitingForUpload => write!(f, "waiting for upload"),
            RemoteState::Ready => write!(f, "ready"),
            RemoteState::Published => write!(f, "published"),
            RemoteState::Processing(code) => write!(f, "processing ({})", code),
        }
    }
}

/// Descriptive information sent along with an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub title: String,
    /// Creation date, serialized as milliseconds since the epoch
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// An item to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub metadata: UploadMetadata,
    pub timeout: Duration,
}

/// Client of the remote publishing service.
#[async_trait]
pub trait PublishingClient: Send + Sync {
    /// Find the remote user id registered with an e-mail address.
    async fn find_user(&self, email: &str) -> ClientResult<Option<String>>;

    /// Upload an item, returning its remote identifier.
    async fn upload(&self, request: UploadRequest) -> ClientResult<String>;

    /// Get the processing state of a remote item.
    async fn status(&self, destination_id: &str) -> ClientResult<RemoteState>;

    async fn publish(&self, destination_id: &str) -> ClientResult<()>;

    async fn delete(&self, destination_id: &str) -> ClientResult<()>;
}
