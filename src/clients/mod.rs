use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chat::ToolDefinition;
use crate::context::RequestContext;

pub mod filtering;
pub mod registry;

pub use filtering::{attach_client_tools, code_mode_tool_definitions};
pub use registry::StaticClientRegistry;

/// Name of the read-only tool listing the virtual tool declaration files.
pub const TOOL_LIST_TOOL_FILES: &str = "listToolFiles";
/// Name of the read-only tool reading one virtual tool declaration file.
pub const TOOL_READ_TOOL_FILE: &str = "readToolFile";
/// Name of the code-execution tool that batches tool invocations.
pub const TOOL_EXECUTE_TOOL_CODE: &str = "executeToolCode";

/// Wildcard entry admitting every tool of a client.
pub const WILDCARD: &str = "*";

/// Per-client execution policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Code-mode clients expose their tools through code bindings instead
    /// of individual tool schemas.
    #[serde(default)]
    pub is_code_mode_client: bool,
    /// Which of the client's tools are exposed at all. Empty means none,
    /// "*" means all.
    #[serde(default)]
    pub tools_to_execute: Vec<String>,
    /// Which tools may run unattended. Empty means none, "*" means all.
    #[serde(default)]
    pub tools_to_auto_execute: Vec<String>,
}

impl ExecutionConfig {
    /// Whether `tool_name` is pre-approved for unattended execution.
    pub fn allows_auto_execution(&self, tool_name: &str) -> bool {
        self.tools_to_auto_execute
            .iter()
            .any(|t| t == WILDCARD || t == tool_name)
    }

    /// Whether `tool_name` is exposed to requests at all.
    pub fn exposes_tool(&self, tool_name: &str) -> bool {
        self.tools_to_execute
            .iter()
            .any(|t| t == WILDCARD || t == tool_name)
    }
}

/// A connected tool client as seen by the agent core.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub name: String,
    pub execution_config: ExecutionConfig,
    pub tools: Vec<ToolDefinition>,
}

impl ClientState {
    pub fn new(name: impl Into<String>, execution_config: ExecutionConfig) -> Self {
        Self {
            name: name.into(),
            execution_config,
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == tool_name)
    }
}

/// Registry of connected tool clients. The production implementation is
/// the embedder's concern; `StaticClientRegistry` backs tests and simple
/// embeddings.
pub trait ClientRegistry: Send + Sync {
    fn client_by_name(&self, name: &str) -> Option<Arc<ClientState>>;

    /// The client owning the given tool, if any.
    fn client_for_tool(&self, tool_name: &str) -> Option<Arc<ClientState>>;

    /// Visible tools per connected client, after applying the per-client
    /// exposure list and any request-context filters.
    fn tools_per_client(&self, ctx: &RequestContext) -> IndexMap<String, Vec<ToolDefinition>>;
}
