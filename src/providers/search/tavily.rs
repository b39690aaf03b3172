use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Candidate;

use super::{SearchProvider, SearchRequest};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    max_results: usize,
    days: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

pub struct TavilyProvider {
    client: Client,
    api_key: Option<String>,
}

impl TavilyProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Candidate>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::SearchApi("Tavily API key is not configured".to_string()))?;

        let max_results = if request.max_results == 0 {
            DEFAULT_MAX_RESULTS
        } else {
            request.max_results
        };

        let body = TavilyRequest {
            api_key,
            query: &request.query,
            search_depth: "advanced",
            include_answer: false,
            include_raw_content: false,
            max_results,
            days: request.time_range.days(),
        };

        let response = self.client.post(TAVILY_API_URL).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::SearchApi(format!("Tavily {}: {}", status, error_text)));
        }

        let parsed: TavilyResponse = response.json().await?;
        tracing::debug!("Tavily returned {} results for {:?}", parsed.results.len(), request.query);

        Ok(parsed
            .results
            .into_iter()
            .map(|r| Candidate {
                title: r.title,
                url: r.url,
                snippet: r.content,
                content: String::new(),
                published_at: None,
                source: "tavily".to_string(),
            })
            .collect())
    }
}
