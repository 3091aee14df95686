pub mod classifier;
pub mod code_mode;
pub mod core;
pub mod error;
pub mod runner;
pub mod synthesizer;

pub use classifier::{TrustPartition, classify_tool_calls};
pub use code_mode::{AllowListSnapshot, ExtractedInvocation, build_allow_list};
pub use core::{AgentLoop, DEFAULT_MAX_AGENT_DEPTH};
pub use error::AgentError;
pub use runner::ToolRunner;
