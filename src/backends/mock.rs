use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{LlmCaller, UpstreamError};
use crate::chat::{ChatRequest, ChatResponse};
use crate::context::RequestContext;

/// Scripted upstream for tests and dry runs: returns the queued responses
/// in order and errors once they run out.
pub struct MockLlmCaller {
    responses: Vec<ChatResponse>,
    call_count: AtomicUsize,
    seen_requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmCaller {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            seen_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn seen_requests(&self) -> Vec<ChatRequest> {
        self.seen_requests.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl LlmCaller for MockLlmCaller {
    async fn completion(
        &self,
        _ctx: &RequestContext,
        request: &ChatRequest,
    ) -> Result<ChatResponse, UpstreamError> {
        self.seen_requests
            .lock()
            .expect("mock lock poisoned")
            .push(request.clone());

        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(index)
            .cloned()
            .ok_or_else(|| UpstreamError::Other("no more mock responses available".to_string()))
    }
}
