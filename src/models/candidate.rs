use chrono::{DateTime, Utc};

/// A piece of content gathered from a source during one refresh run.
///
/// `url` is the identity key: within a batch, two candidates with the same
/// non-empty URL are the same candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}
