use uuid::Uuid;

use crate::context::RequestContext;

/// Supplies a fresh correlation id for each follow-up upstream call.
pub trait RequestIdFetcher: Send + Sync {
    fn next(&self, ctx: &RequestContext) -> Option<String>;
}

/// Default fetcher: random v4 ids.
#[derive(Debug, Default)]
pub struct UuidRequestIdFetcher;

impl RequestIdFetcher for UuidRequestIdFetcher {
    fn next(&self, _ctx: &RequestContext) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}
