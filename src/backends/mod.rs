use async_trait::async_trait;

use crate::chat::{ChatRequest, ChatResponse};
use crate::context::RequestContext;

pub mod error;
pub mod mock;

pub use error::UpstreamError;
pub use mock::MockLlmCaller;

/// Upstream LLM collaborator. Called at most once per loop iteration;
/// provider selection, retries and fallbacks are its own concern.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn completion(
        &self,
        ctx: &RequestContext,
        request: &ChatRequest,
    ) -> Result<ChatResponse, UpstreamError>;
}
