//! Trust classification of tool calls.
//!
//! Every tool call an upstream response carries is sorted into one of two
//! buckets before anything executes: auto-executable, or needs-approval.
//! Unrecognized names fail closed.

use crate::chat::ToolCall;
use crate::clients::{
    ClientRegistry, TOOL_EXECUTE_TOOL_CODE, TOOL_LIST_TOOL_FILES, TOOL_READ_TOOL_FILE,
};
use crate::console::console;
use crate::context::RequestContext;

use super::code_mode::{build_allow_list, validate_code_arguments};

/// Result of classifying one batch of tool calls. Relative order within
/// each bucket follows the order of the input batch.
#[derive(Debug, Default)]
pub struct TrustPartition {
    pub auto_executable: Vec<ToolCall>,
    pub needs_approval: Vec<ToolCall>,
}

impl TrustPartition {
    pub fn is_empty(&self) -> bool {
        self.auto_executable.is_empty() && self.needs_approval.is_empty()
    }
}

/// Split a batch of tool calls into auto-executable and needs-approval
/// buckets.
///
/// Calls naming a tool of a connected client are auto-executable exactly
/// when that client's allow-list admits the tool. The introspection tools
/// `listToolFiles` and `readToolFile` are always auto-executable;
/// `executeToolCode` is auto-executable only when its embedded program
/// passes static vetting. Anything else needs approval.
pub fn classify_tool_calls(
    ctx: &RequestContext,
    registry: &dyn ClientRegistry,
    tool_calls: Vec<ToolCall>,
) -> TrustPartition {
    let mut partition = TrustPartition::default();

    for call in tool_calls {
        let Some(name) = call.name().map(|n| n.to_string()) else {
            partition.needs_approval.push(call);
            continue;
        };

        if let Some(client) = registry.client_for_tool(&name) {
            if client.execution_config.allows_auto_execution(&name) {
                partition.auto_executable.push(call);
            } else {
                partition.needs_approval.push(call);
            }
            continue;
        }

        match name.as_str() {
            TOOL_LIST_TOOL_FILES | TOOL_READ_TOOL_FILE => {
                partition.auto_executable.push(call);
            }
            TOOL_EXECUTE_TOOL_CODE => {
                let snapshot = build_allow_list(ctx, registry);
                if validate_code_arguments(&call.function.arguments, &snapshot) {
                    partition.auto_executable.push(call);
                } else {
                    partition.needs_approval.push(call);
                }
            }
            other => {
                console().warning(&format!(
                    "Client not found for tool {}, treating as non-auto-executable",
                    other
                ));
                partition.needs_approval.push(call);
            }
        }
    }

    partition
}
