use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content is stored truncated to this many characters.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub subscription_id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub source_name: String,
    pub source_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
    pub relevance_score: f64,
    pub tags: Vec<String>,
}

/// A curated item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedItem {
    pub subscription_id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub source_name: String,
    pub source_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub relevance_score: f64,
    pub tags: Vec<String>,
}

impl NewFeedItem {
    pub fn tags_json(&self) -> String {
        tags_to_json(&self.tags)
    }
}

impl FeedItem {
    pub fn tags_json(&self) -> String {
        tags_to_json(&self.tags)
    }

    pub fn set_tags_from_json(&mut self, data: &str) -> serde_json::Result<()> {
        if data.is_empty() || data == "null" {
            self.tags = Vec::new();
            return Ok(());
        }
        self.tags = serde_json::from_str(data)?;
        Ok(())
    }

    /// Compact age of the item relative to `now`, e.g. "3h ago".
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        let Some(published) = self.published_at else {
            return "unknown".to_string();
        };

        let elapsed = now - published;
        if elapsed.num_minutes() < 1 {
            "just now".to_string()
        } else if elapsed.num_hours() < 1 {
            format!("{}m ago", elapsed.num_minutes())
        } else if elapsed.num_days() < 1 {
            format!("{}h ago", elapsed.num_hours())
        } else if elapsed.num_weeks() < 1 {
            format!("{}d ago", elapsed.num_days())
        } else {
            format!("{}w ago", elapsed.num_weeks())
        }
    }
}

fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}
