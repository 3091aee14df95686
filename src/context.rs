/// Request-scoped context threaded through the agent loop and into
/// collaborators.
///
/// The context is an immutable value: the loop derives an updated copy
/// between iterations (fresh correlation id) instead of mutating shared
/// state, so concurrently running tool executions only ever see a
/// read-only snapshot.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Correlation id of the in-flight upstream request.
    pub request_id: Option<String>,
    /// Correlation id of the request that started the run.
    pub original_request_id: Option<String>,
    /// Whitelist of client names a request may see. `None` means no
    /// filtering, an empty list means none, "*" means all.
    pub include_clients: Option<Vec<String>>,
    /// Whitelist of "client/tool" names a request may see. Same
    /// semantics; "client/*" admits all of one client's tools.
    pub include_tools: Option<Vec<String>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_include_clients(mut self, clients: Vec<String>) -> Self {
        self.include_clients = Some(clients);
        self
    }

    pub fn with_include_tools(mut self, tools: Vec<String>) -> Self {
        self.include_tools = Some(tools);
        self
    }

    /// Remember the id the run started with before the per-iteration id
    /// starts rotating.
    pub(crate) fn pin_original_request_id(mut self) -> Self {
        if self.original_request_id.is_none() {
            self.original_request_id = self.request_id.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinning_keeps_first_request_id() {
        let ctx = RequestContext::new()
            .with_request_id("req-1")
            .pin_original_request_id()
            .with_request_id("req-2");

        assert_eq!(ctx.request_id.as_deref(), Some("req-2"));
        assert_eq!(ctx.original_request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn pinning_is_idempotent() {
        let ctx = RequestContext::new()
            .with_request_id("req-1")
            .pin_original_request_id()
            .with_request_id("req-2")
            .pin_original_request_id();

        assert_eq!(ctx.original_request_id.as_deref(), Some("req-1"));
    }
}
