//! Mock publishing client for testing.
//!
//! Provides a scriptable implementation of the PublishingClient trait for
//! use in tests without a running OpenVeo server.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use veo_core::{
    ClientError, ClientResult, PublishingClient, RemoteState, UploadMetadata, UploadRequest,
};

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub destination_id: Option<String>,
    pub email: Option<String>,
    pub metadata: Option<UploadMetadata>,
    pub size: Option<usize>,
}

impl CapturedCall {
    fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            destination_id: None,
            email: None,
            metadata: None,
            size: None,
        }
    }

    fn on(mut self, destination_id: &str) -> Self {
        self.destination_id = Some(destination_id.to_string());
        self
    }
}

/// Mock publishing client.
///
/// Remote items live in memory. Status requests return the scripted states
/// in order, then the default state once the script is used up.
#[derive(Clone)]
pub struct MockPublisher {
    /// Scripted status answers.
    statuses: Arc<RwLock<VecDeque<ClientResult<RemoteState>>>>,
    /// State returned once the script is exhausted.
    default_status: Arc<RwLock<RemoteState>>,
    /// Remote user ids by e-mail.
    users: Arc<RwLock<HashMap<String, String>>>,
    /// Items stored on the "service".
    remote_items: Arc<RwLock<HashSet<String>>>,
    /// Items that were published.
    published: Arc<RwLock<HashSet<String>>>,
    /// Simulated failures by method name.
    failures: Arc<RwLock<HashMap<String, ClientError>>>,
    next_id: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublisher {
    /// Create a mock whose items are ready as soon as they are uploaded.
    pub fn new() -> Self {
        Self {
            statuses: Arc::new(RwLock::new(VecDeque::new())),
            default_status: Arc::new(RwLock::new(RemoteState::Ready)),
            users: Arc::new(RwLock::new(HashMap::new())),
            remote_items: Arc::new(RwLock::new(HashSet::new())),
            published: Arc::new(RwLock::new(HashSet::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the next status answers.
    pub fn with_statuses(self, statuses: Vec<RemoteState>) -> Self {
        *self.statuses.write() = statuses.into_iter().map(Ok).collect();
        self
    }

    /// Add one scripted status answer, possibly an error.
    pub fn add_status(self, status: ClientResult<RemoteState>) -> Self {
        self.statuses.write().push_back(status);
        self
    }

    pub fn set_default_status(self, state: RemoteState) -> Self {
        *self.default_status.write() = state;
        self
    }

    pub fn add_user(self, email: impl Into<String>, id: impl Into<String>) -> Self {
        self.users.write().insert(email.into(), id.into());
        self
    }

    /// Pretend an item already exists on the service.
    pub fn add_remote_item(self, id: impl Into<String>) -> Self {
        self.remote_items.write().insert(id.into());
        self
    }

    /// Make every call to `method` fail with `error`.
    pub fn simulate_failure(self, method: impl Into<String>, error: ClientError) -> Self {
        self.failures.write().insert(method.into(), error);
        self
    }

    pub fn clear_failure(&self, method: &str) {
        self.failures.write().remove(method);
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Get the number of calls made to a method.
    pub fn method_call_count(&self, method: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.method_call_count(method) > 0
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn has_remote_item(&self, id: &str) -> bool {
        self.remote_items.read().contains(id)
    }

    pub fn remote_items(&self) -> Vec<String> {
        let mut items: Vec<String> = self.remote_items.read().iter().cloned().collect();
        items.sort();
        items
    }

    pub fn is_published(&self, id: &str) -> bool {
        self.published.read().contains(id)
    }

    /// Record a call.
    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    /// Check for simulated failure.
    fn check_failure(&self, method: &str) -> ClientResult<()> {
        match self.failures.read().get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_exists(&self, id: &str) -> ClientResult<()> {
        if self.has_remote_item(id) {
            Ok(())
        } else {
            Err(ClientError::service(
                404,
                "publish",
                format!("video {} not found", id),
            ))
        }
    }
}

#[async_trait]
impl PublishingClient for MockPublisher {
    async fn find_user(&self, email: &str) -> ClientResult<Option<String>> {
        let mut call = CapturedCall::new("find_user");
        call.email = Some(email.to_string());
        self.record_call(call);
        self.check_failure("find_user")?;
        Ok(self.users.read().get(email).cloned())
    }

    async fn upload(&self, request: UploadRequest) -> ClientResult<String> {
        let mut call = CapturedCall::new("upload");
        call.metadata = Some(request.metadata.clone());
        call.size = Some(request.bytes.len());
        self.record_call(call);
        self.check_failure("upload")?;

        let id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.remote_items.write().insert(id.clone());
        Ok(id)
    }

    async fn status(&self, destination_id: &str) -> ClientResult<RemoteState> {
        self.record_call(CapturedCall::new("status").on(destination_id));
        self.check_failure("status")?;
        self.check_exists(destination_id)?;

        let scripted = self.statuses.write().pop_front();
        match scripted {
            Some(answer) => answer,
            None => Ok(*self.default_status.read()),
        }
    }

    async fn publish(&self, destination_id: &str) -> ClientResult<()> {
        self.record_call(CapturedCall::new("publish").on(destination_id));
        self.check_failure("publish")?;
        self.check_exists(destination_id)?;
        self.published.write().insert(destination_id.to_string());
        Ok(())
    }

    async fn delete(&self, destination_id: &str) -> ClientResult<()> {
        self.record_call(CapturedCall::new("delete").on(destination_id));
        self.check_failure("delete")?;
        self.check_exists(destination_id)?;
        self.remote_items.write().remove(destination_id);
        self.published.write().remove(destination_id);
        Ok(())
    }
}
