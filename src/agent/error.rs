use thiserror::Error;

use crate::backends::UpstreamError;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The loop consumed its iteration budget without reaching a terminal
    /// state. No partial response is returned.
    #[error("Agent mode exceeded maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// The upstream LLM collaborator failed; the run aborts.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type AgentResult<T> = Result<T, AgentError>;
