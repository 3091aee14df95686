use anyhow::Result;
use async_trait::async_trait;

use crate::chat::{ChatMessage, ToolCall};
use crate::context::RequestContext;

/// Tool execution collaborator.
///
/// How a tool is physically invoked (network call, subprocess, MCP
/// transport) is the implementor's concern, as are per-tool timeouts and
/// failure classification. The returned message must be a tool turn
/// answering `tool_call.id`.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, ctx: &RequestContext, tool_call: &ToolCall) -> Result<ChatMessage>;
}
