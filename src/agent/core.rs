//! The agent execution loop.
//!
//! Given an upstream response, the loop keeps executing auto-approved tool
//! calls and re-asking the upstream model until the model stops asking for
//! tools, a call needs human approval, or the depth budget runs out.

use std::sync::Arc;

use crate::backends::LlmCaller;
use crate::chat::{
    ChatMessage, ChatRequest, ChatResponse, FINISH_REASON_STOP, FINISH_REASON_TOOL_CALLS, ToolCall,
};
use crate::clients::ClientRegistry;
use crate::console::console;
use crate::context::RequestContext;
use crate::request_id::RequestIdFetcher;
use crate::tool_executor::ToolExecutor;

use super::classifier::classify_tool_calls;
use super::error::{AgentError, AgentResult};
use super::runner::ToolRunner;
use super::synthesizer::approval_pending_response;

/// Iteration budget when none is configured.
pub const DEFAULT_MAX_AGENT_DEPTH: usize = 10;

pub struct AgentLoop {
    max_depth: usize,
    llm: Arc<dyn LlmCaller>,
    tool_runner: ToolRunner,
    registry: Arc<dyn ClientRegistry>,
    request_ids: Option<Arc<dyn RequestIdFetcher>>,
}

impl AgentLoop {
    pub fn new(
        llm: Arc<dyn LlmCaller>,
        executor: Arc<dyn ToolExecutor>,
        registry: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            max_depth: DEFAULT_MAX_AGENT_DEPTH,
            llm,
            tool_runner: ToolRunner::new(executor),
            registry,
            request_ids: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = if max_depth == 0 {
            DEFAULT_MAX_AGENT_DEPTH
        } else {
            max_depth
        };
        self
    }

    pub fn with_request_id_fetcher(mut self, fetcher: Arc<dyn RequestIdFetcher>) -> Self {
        self.request_ids = Some(fetcher);
        self
    }

    /// Drive the loop to a terminal state.
    ///
    /// Returns the final upstream response when the model stops calling
    /// tools, or a synthesized approval-pending response when a call needs
    /// human sign-off. Errors abort the run with no partial response.
    pub async fn run(
        &self,
        ctx: RequestContext,
        original_request: &ChatRequest,
        initial_response: ChatResponse,
    ) -> AgentResult<ChatResponse> {
        let mut ctx = ctx.pin_original_request_id();
        let mut history = original_request.input.clone();
        let mut current = initial_response;
        let mut depth = 0usize;

        // Everything executed so far in this run, across iterations. The
        // approval-pending response reports all of it, not just the last
        // batch.
        let mut executed_calls: Vec<ToolCall> = Vec::new();
        let mut executed_results: Vec<ChatMessage> = Vec::new();

        while depth < self.max_depth {
            let tool_calls = extract_tool_calls(&current);
            if tool_calls.is_empty() {
                break;
            }

            let partition = classify_tool_calls(&ctx, self.registry.as_ref(), tool_calls);

            if !partition.auto_executable.is_empty() {
                // The assistant turn that asked for these calls goes into
                // history before the tool answers, so every tool message
                // has a call to answer.
                history.push(ChatMessage::assistant(
                    current.leading_content().cloned(),
                    Some(partition.auto_executable.clone()),
                ));
                let results = self
                    .tool_runner
                    .execute_batch(&ctx, &partition.auto_executable)
                    .await;
                history.extend(results.iter().cloned());
                executed_calls.extend(partition.auto_executable.iter().cloned());
                executed_results.extend(results);
            }

            if !partition.needs_approval.is_empty() {
                console().info(&format!(
                    "{} tool call(s) need approval, suspending agent loop",
                    partition.needs_approval.len()
                ));
                return Ok(approval_pending_response(
                    &current,
                    &executed_results,
                    &executed_calls,
                    partition.needs_approval,
                ));
            }

            let request = original_request.with_input(history.clone());
            if let Some(fetcher) = &self.request_ids {
                if let Some(id) = fetcher.next(&ctx) {
                    ctx = ctx.with_request_id(id);
                }
            }
            current = self.llm.completion(&ctx, &request).await?;
            depth += 1;
        }

        if depth >= self.max_depth {
            return Err(AgentError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        Ok(current)
    }
}

/// Whether a response asks for another loop iteration. A "stop" finish
/// reason is terminal even when tool calls are attached; that is how
/// synthesized approval-pending responses opt out of re-entry.
pub(crate) fn has_tool_calls(response: &ChatResponse) -> bool {
    let Some(choice) = response.first_choice() else {
        return false;
    };
    match choice.finish_reason.as_deref() {
        Some(FINISH_REASON_STOP) => false,
        Some(FINISH_REASON_TOOL_CALLS) => true,
        _ => choice
            .message
            .as_ref()
            .and_then(|m| m.tool_calls.as_ref())
            .is_some_and(|calls| !calls.is_empty()),
    }
}

/// Gather the tool calls of every choice, in choice order. Empty when the
/// response is terminal.
pub(crate) fn extract_tool_calls(response: &ChatResponse) -> Vec<ToolCall> {
    if !has_tool_calls(response) {
        return Vec::new();
    }
    response
        .choices
        .iter()
        .filter_map(|choice| choice.message.as_ref())
        .filter_map(|message| message.tool_calls.as_ref())
        .flatten()
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
