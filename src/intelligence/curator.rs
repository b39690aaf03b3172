use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::models::{truncate_content, Candidate, NewFeedItem, MAX_CONTENT_CHARS};
use crate::providers::llm::LlmProvider;
use crate::providers::CallGuard;

use super::scorer::score_relevance;
use super::summarize::{extract_tags, summarize};

/// Items scoring below this are dropped. Only items strictly above it are
/// summarized and tagged, so an item at exactly the threshold is kept bare.
pub const RELEVANCE_THRESHOLD: f64 = 0.5;

const RELEVANCE_WEIGHT: f64 = 0.7;
const RECENCY_BONUS: f64 = 0.3;

/// Turns raw candidates into scored, summarized, ranked feed items.
pub struct Curator {
    llm: Arc<dyn LlmProvider>,
    max_concurrency: usize,
    timeout: Duration,
}

impl Curator {
    /// `max_concurrency` caps how many candidates are in flight at once. Each
    /// candidate makes its model calls one after another.
    pub fn new(llm: Arc<dyn LlmProvider>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            llm,
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }

    /// Score every candidate, summarize the relevant ones, drop the rest, and
    /// rank what remains. Individual failures degrade the item, never the batch.
    ///
    /// Returned items carry `subscription_id = 0`; the caller stamps them.
    pub async fn curate(
        &self,
        topic: &str,
        candidates: Vec<Candidate>,
        cancel: &CancellationToken,
    ) -> Vec<NewFeedItem> {
        let guard = CallGuard::new(cancel.clone(), self.timeout);
        let fetched_at = Utc::now();
        let total = candidates.len();

        let items: Vec<NewFeedItem> = stream::iter(candidates)
            .map(|candidate| self.curate_one(topic, candidate, &guard, fetched_at))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut kept: Vec<NewFeedItem> = items
            .into_iter()
            .filter(|item| item.relevance_score >= RELEVANCE_THRESHOLD)
            .collect();
        sort_by_relevance_and_recency(&mut kept);

        tracing::debug!("Curated {} of {} candidates for {:?}", kept.len(), total, topic);
        kept
    }

    async fn curate_one(
        &self,
        topic: &str,
        candidate: Candidate,
        guard: &CallGuard,
        fetched_at: DateTime<Utc>,
    ) -> NewFeedItem {
        let llm = self.llm.as_ref();
        // Search results carry only a snippet, which then stands in as the body.
        let body = if candidate.content.is_empty() {
            truncate_content(&candidate.snippet, MAX_CONTENT_CHARS)
        } else {
            truncate_content(&candidate.content, MAX_CONTENT_CHARS)
        };

        let relevance_score =
            score_relevance(llm, guard, topic, &candidate.title, &candidate.snippet).await;

        let (summary, tags) = if relevance_score > RELEVANCE_THRESHOLD {
            let summary = summarize(llm, guard, topic, &candidate.title, &body).await;
            let tags = extract_tags(llm, guard, &candidate.title, &body).await;
            (summary, tags)
        } else {
            (String::new(), Vec::new())
        };

        NewFeedItem {
            subscription_id: 0,
            title: candidate.title,
            summary,
            content: body,
            source_name: candidate.source,
            source_url: candidate.url,
            published_at: candidate.published_at,
            fetched_at,
            relevance_score,
            tags,
        }
    }
}

/// Rank by 70% relevance plus a 30% bonus for whichever of two dated items
/// is more recent. Undated items get no bonus. Equal weights keep input order.
///
/// The pairwise bonus is not a total order, so this runs a stable insertion
/// sort instead of `sort_by`.
pub fn sort_by_relevance_and_recency(items: &mut [NewFeedItem]) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && ranks_before(&items[j], &items[j - 1]) {
            items.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn ranks_before(a: &NewFeedItem, b: &NewFeedItem) -> bool {
    let mut weight_a = a.relevance_score * RELEVANCE_WEIGHT;
    let mut weight_b = b.relevance_score * RELEVANCE_WEIGHT;

    if let (Some(pa), Some(pb)) = (a.published_at, b.published_at) {
        if pa > pb {
            weight_a += RECENCY_BONUS;
        } else if pb > pa {
            weight_b += RECENCY_BONUS;
        }
    }

    weight_a > weight_b
}
