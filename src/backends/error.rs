use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream request failed: {message}")]
    RequestFailed {
        message: String,
        status: Option<u16>,
    },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Upstream server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response from upstream: {0}")]
    InvalidResponse(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimitExceeded { .. }
                | UpstreamError::ServerError {
                    status: 500..=599,
                    ..
                }
                | UpstreamError::Timeout(_)
        )
    }
}
