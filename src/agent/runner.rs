//! Concurrent execution of auto-approved tool calls.

use std::sync::Arc;

use futures::future::join_all;

use crate::chat::{ChatMessage, ToolCall};
use crate::console::console;
use crate::context::RequestContext;
use crate::tool_executor::ToolExecutor;

/// Runs a batch of tool calls concurrently and collects one tool-result
/// message per call, in the order the calls were given. A failing call
/// yields a synthetic error result instead of aborting its siblings.
#[derive(Clone)]
pub struct ToolRunner {
    executor: Arc<dyn ToolExecutor>,
}

impl ToolRunner {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self { executor }
    }

    pub async fn execute_batch(
        &self,
        ctx: &RequestContext,
        tool_calls: &[ToolCall],
    ) -> Vec<ChatMessage> {
        let handles: Vec<_> = tool_calls
            .iter()
            .map(|call| {
                let executor = Arc::clone(&self.executor);
                let ctx = ctx.clone();
                let call = call.clone();
                tokio::spawn(async move { executor.execute(&ctx, &call).await })
            })
            .collect();

        let outcomes = join_all(handles).await;

        tool_calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| match outcome {
                Ok(Ok(message)) => message,
                Ok(Err(err)) => {
                    console().warning(&format!(
                        "Tool {} failed: {}",
                        call.name().unwrap_or("unknown"),
                        err
                    ));
                    error_result_message(call, &err.to_string())
                }
                Err(join_err) => error_result_message(call, &join_err.to_string()),
            })
            .collect()
    }
}

fn error_result_message(call: &ToolCall, detail: &str) -> ChatMessage {
    ChatMessage::tool_result(
        call.id.clone(),
        format!(
            "Error executing tool {}: {}",
            call.name().unwrap_or("unknown"),
            detail
        ),
    )
}
