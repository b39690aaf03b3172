mod tavily;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, TimeRange};

pub use tavily::TavilyProvider;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    pub time_range: TimeRange,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    async fn search(&self, request: SearchRequest) -> Result<Vec<Candidate>>;
}

/// The configured web-search backend, if it has credentials.
pub fn build_search_provider(config: &Config) -> Option<Arc<dyn SearchProvider>> {
    let provider = TavilyProvider::new(config.search.tavily_api_key.clone(), config.request_timeout());
    if provider.available() {
        Some(Arc::new(provider))
    } else {
        None
    }
}
