use std::sync::Arc;

use indexmap::IndexMap;

use super::filtering::{should_include_client, should_include_tool_for_request};
use super::{ClientRegistry, ClientState};
use crate::chat::ToolDefinition;
use crate::context::RequestContext;

/// In-memory `ClientRegistry` over a fixed set of clients.
#[derive(Debug, Default)]
pub struct StaticClientRegistry {
    clients: IndexMap<String, Arc<ClientState>>,
}

impl StaticClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: ClientState) -> Self {
        self.clients.insert(client.name.clone(), Arc::new(client));
        self
    }

    pub fn client_names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientRegistry for StaticClientRegistry {
    fn client_by_name(&self, name: &str) -> Option<Arc<ClientState>> {
        self.clients.get(name).cloned()
    }

    fn client_for_tool(&self, tool_name: &str) -> Option<Arc<ClientState>> {
        self.clients
            .values()
            .find(|client| client.has_tool(tool_name))
            .cloned()
    }

    fn tools_per_client(&self, ctx: &RequestContext) -> IndexMap<String, Vec<ToolDefinition>> {
        let mut per_client = IndexMap::new();
        for (name, client) in &self.clients {
            if !should_include_client(name, ctx.include_clients.as_deref()) {
                continue;
            }

            let tools: Vec<ToolDefinition> = client
                .tools
                .iter()
                .filter(|tool| client.execution_config.exposes_tool(tool.name()))
                .filter(|tool| should_include_tool_for_request(name, tool.name(), ctx))
                .cloned()
                .collect();

            per_client.insert(name.clone(), tools);
        }
        per_client
    }
}
