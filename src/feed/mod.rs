mod fetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Candidate;

pub use fetcher::{parse_feed, FeedFetcher};

/// RSS/Atom capability.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one feed. Entries published before `since` are dropped; entries
    /// without a publish time are always kept.
    async fn fetch_feed(&self, url: &str, since: Option<DateTime<Utc>>) -> Result<Vec<Candidate>>;
}
