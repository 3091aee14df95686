//! Request-level visibility filtering and tool attachment.
//!
//! A request may carry whitelists restricting which clients and tools it
//! sees; `attach_client_tools` merges the surviving tool schemas into the
//! outgoing request, swapping in the three code-mode tools for clients
//! that operate in code mode.

use serde_json::json;

use super::{
    ClientRegistry, TOOL_EXECUTE_TOOL_CODE, TOOL_LIST_TOOL_FILES, TOOL_READ_TOOL_FILE, WILDCARD,
};
use crate::chat::{ChatParameters, ChatRequest, ToolDefinition};
use crate::console::console;
use crate::context::RequestContext;

/// Whitelist check for a client name. `None` admits everything, an empty
/// list admits nothing, "*" admits everything.
pub fn should_include_client(client_name: &str, include_clients: Option<&[String]>) -> bool {
    match include_clients {
        None => true,
        Some(list) => {
            if list.is_empty() {
                return false;
            }
            list.iter().any(|c| c == WILDCARD || c == client_name)
        }
    }
}

/// Whitelist check for a "client/tool" pair from the request context.
pub fn should_include_tool_for_request(
    client_name: &str,
    tool_name: &str,
    ctx: &RequestContext,
) -> bool {
    match ctx.include_tools.as_deref() {
        None => true,
        Some(list) => {
            if list.is_empty() {
                return false;
            }
            let client_wildcard = format!("{}/{}", client_name, WILDCARD);
            let full_name = format!("{}/{}", client_name, tool_name);
            list.iter().any(|t| t == &client_wildcard || t == &full_name)
        }
    }
}

/// Schemas for the three code-mode tools. Their handlers live with the
/// tool-executor collaborator; the agent core only needs the definitions
/// and the trust rules around their names.
pub fn code_mode_tool_definitions() -> Vec<ToolDefinition> {
    let empty_object = json!({
        "type": "object",
        "properties": {},
        "required": []
    });

    vec![
        ToolDefinition::function(
            TOOL_LIST_TOOL_FILES,
            "Returns a tree structure listing the virtual declaration files available for \
             connected tool servers. Each connected server has a corresponding virtual file \
             that can be read using readToolFile.",
            empty_object.clone(),
        ),
        ToolDefinition::function(
            TOOL_READ_TOOL_FILE,
            "Reads one virtual declaration file describing the code bindings a connected \
             server exposes.",
            json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "Name of the declaration file to read"
                    }
                },
                "required": ["file"]
            }),
        ),
        ToolDefinition::function(
            TOOL_EXECUTE_TOOL_CODE,
            "Executes a short program that may invoke several server tools in one batch. \
             The program is statically vetted against the auto-execution allow-list before \
             it runs.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Source text of the program to run"
                    }
                },
                "required": ["code"]
            }),
        ),
    ]
}

/// Merge the visible tools of all connected clients into the request's
/// parameters without duplicating names. Code-mode clients contribute the
/// three code-mode tools instead of their raw schemas.
pub fn attach_client_tools(
    ctx: &RequestContext,
    request: &mut ChatRequest,
    registry: &dyn ClientRegistry,
) {
    let per_client = registry.tools_per_client(ctx);

    let mut available: Vec<ToolDefinition> = Vec::new();
    let mut include_code_mode_tools = false;
    for (client_name, client_tools) in &per_client {
        let Some(client) = registry.client_by_name(client_name) else {
            console().warning(&format!("Client {} not found, skipping", client_name));
            continue;
        };
        if client.execution_config.is_code_mode_client {
            include_code_mode_tools = true;
        } else {
            available.extend(client_tools.iter().cloned());
        }
    }

    if include_code_mode_tools {
        available.extend(code_mode_tool_definitions());
    }

    if available.is_empty() {
        return;
    }

    let params = request.params.get_or_insert_with(ChatParameters::default);
    let tools = params.tools.get_or_insert_with(Vec::new);

    let mut existing: Vec<String> = tools.iter().map(|t| t.name().to_string()).collect();
    for tool in available {
        if existing.iter().any(|name| name == tool.name()) {
            continue;
        }
        existing.push(tool.name().to_string());
        tools.push(tool);
    }
}
