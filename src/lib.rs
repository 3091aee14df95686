pub mod agent;
pub mod backends;
pub mod chat;
pub mod clients;
pub mod config;
pub mod console;
pub mod context;
pub mod request_id;
pub mod tool_executor;

pub use agent::{AgentError, AgentLoop, DEFAULT_MAX_AGENT_DEPTH};
pub use backends::LlmCaller;
pub use chat::{ChatMessage, ChatRequest, ChatResponse};
pub use clients::{ClientRegistry, attach_client_tools};
pub use config::GatewayConfig;
pub use context::RequestContext;
pub use tool_executor::ToolExecutor;
