//! Synthesis of the approval-pending response.
//!
//! When a batch mixes auto-executed calls with calls that need approval,
//! the loop ends the run with a hand-built response: the outputs already
//! collected are summarized in the assistant text, and the pending calls
//! ride along for the caller to approve or reject.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::chat::{
    ChatMessage, ChatResponse, FINISH_REASON_STOP, MessageContent, ResponseChoice, ToolCall,
};

const PENDING_CALLS_ANNOUNCEMENT: &str = "Now I shall call these tools next...";

/// Build the terminal response handed back when some tool calls await
/// approval. Envelope metadata is echoed from the upstream response the
/// batch came from.
pub fn approval_pending_response(
    current: &ChatResponse,
    executed_results: &[ChatMessage],
    executed_calls: &[ToolCall],
    pending_calls: Vec<ToolCall>,
) -> ChatResponse {
    let content = if executed_results.is_empty() {
        PENDING_CALLS_ANNOUNCEMENT.to_string()
    } else {
        let outputs = collect_outputs(executed_results, executed_calls);
        match serde_json::to_string(&outputs) {
            Ok(json) => format!(
                "The Output from allowed tools calls is - {}\n\n{}",
                json, PENDING_CALLS_ANNOUNCEMENT
            ),
            Err(_) => format!(
                "The Output from allowed tools calls is - {:?}\n\n{}",
                outputs, PENDING_CALLS_ANNOUNCEMENT
            ),
        }
    };

    // finish_reason is forced to "stop" even though tool calls are
    // attached; has_tool_calls treats "stop" as terminal, so a re-entrant
    // caller cannot accidentally resume the loop on this response.
    ChatResponse {
        id: current.id.clone(),
        object: current.object.clone(),
        created: current.created.or_else(|| Some(Utc::now().timestamp())),
        model: current.model.clone(),
        choices: vec![ResponseChoice {
            index: 0,
            finish_reason: Some(FINISH_REASON_STOP.to_string()),
            message: Some(ChatMessage::assistant(
                Some(MessageContent::Text(content)),
                Some(pending_calls),
            )),
        }],
    }
}

/// Keyed map of executed tool outputs. Keys prefer the tool name looked
/// up from the executed calls, then the call id, then a placeholder.
fn collect_outputs(results: &[ChatMessage], executed_calls: &[ToolCall]) -> Map<String, Value> {
    let mut outputs = Map::new();
    for result in results {
        let key = result
            .tool_call_id
            .as_deref()
            .and_then(|id| name_for_call(executed_calls, id))
            .or(result.tool_call_id.as_deref())
            .unwrap_or("unknown_tool")
            .to_string();

        let value = match &result.content {
            Some(MessageContent::Text(text)) => Value::String(text.clone()),
            Some(MessageContent::Blocks(blocks)) => Value::Array(
                blocks
                    .iter()
                    .map(|block| {
                        let mut entry = Map::new();
                        entry.insert("type".to_string(), Value::String(block.r#type.clone()));
                        if let Some(text) = &block.text {
                            entry.insert("text".to_string(), Value::String(text.clone()));
                        }
                        Value::Object(entry)
                    })
                    .collect(),
            ),
            None => Value::Null,
        };
        outputs.insert(key, value);
    }
    outputs
}

fn name_for_call<'a>(calls: &'a [ToolCall], id: &str) -> Option<&'a str> {
    calls.iter().find(|c| c.id == id).and_then(|c| c.name())
}
