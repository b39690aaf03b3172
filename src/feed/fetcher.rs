use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::Result;
use crate::models::Candidate;

use super::FeedSource;

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("termiflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_feed(&self, url: &str, since: Option<DateTime<Utc>>) -> Result<Vec<Candidate>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        let candidates = parse_feed(&bytes[..], since)?;
        tracing::debug!("Fetched {} entries from {}", candidates.len(), url);
        Ok(candidates)
    }
}

/// Parse an RSS/Atom document into candidates, dropping entries older than
/// `since`.
pub fn parse_feed(bytes: &[u8], since: Option<DateTime<Utc>>) -> Result<Vec<Candidate>> {
    let feed = parser::parse(bytes)?;

    let source = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "rss".to_string());

    let candidates = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published_at = entry.published.or(entry.updated);
            if let (Some(since), Some(published)) = (since, published_at) {
                if published < since {
                    return None;
                }
            }

            let snippet = entry
                .summary
                .as_ref()
                .map(|s| html_to_text(&s.content))
                .unwrap_or_default();

            let content = entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .map(html_to_text)
                .unwrap_or_default();

            Some(Candidate {
                title: entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string()),
                url: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                snippet,
                content,
                published_at,
                source: source.clone(),
            })
        })
        .collect();

    Ok(candidates)
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|_| html.to_string())
}
