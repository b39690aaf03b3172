//! Subscription refresh: gather candidates, curate them, persist what is new.

mod dedup;
mod policy;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::db::FeedStore;
use crate::error::{AppError, Result};
use crate::feed::FeedSource;
use crate::intelligence::Curator;
use crate::models::{Candidate, NewFeedItem, Subscription};
use crate::providers::llm::LlmProvider;
use crate::providers::search::{SearchProvider, SearchRequest};
use crate::providers::CallGuard;

pub use dedup::dedup_by_url;
pub use policy::is_due;

/// Result cap for the per-subscription web search.
pub const SEARCH_MAX_RESULTS: usize = 10;

/// Outcome of a batch refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: usize,
}

pub struct Scheduler {
    search: Option<Arc<dyn SearchProvider>>,
    feeds: Arc<dyn FeedSource>,
    store: Arc<dyn FeedStore>,
    curator: Curator,
    timeout: Duration,
}

impl Scheduler {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Option<Arc<dyn SearchProvider>>,
        feeds: Arc<dyn FeedSource>,
        store: Arc<dyn FeedStore>,
        max_concurrent_llm_calls: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            search,
            feeds,
            store,
            curator: Curator::new(llm, max_concurrent_llm_calls, timeout),
            timeout,
        }
    }

    /// Refresh one subscription and return every curated item, including
    /// ones that were already stored and therefore not inserted again.
    ///
    /// Source and per-item storage failures are logged and skipped. Only a
    /// failed `last_fetched_at` update or cancellation fails the call, and in
    /// both cases the subscription stays due.
    pub async fn refresh_subscription(
        &self,
        sub: &Subscription,
        cancel: &CancellationToken,
    ) -> Result<Vec<NewFeedItem>> {
        let guard = CallGuard::new(cancel.clone(), self.timeout);

        let (mut candidates, from_feeds) = futures::join!(
            self.search_candidates(sub, &guard),
            self.feed_candidates(sub, &guard)
        );
        candidates.extend(from_feeds);
        let candidates = dedup_by_url(candidates);
        tracing::debug!("{} unique candidates for {:?}", candidates.len(), sub.topic);

        ensure_live(cancel)?;
        let mut items = self.curator.curate(&sub.topic, candidates, cancel).await;
        ensure_live(cancel)?;

        let mut inserted = 0;
        for item in &mut items {
            ensure_live(cancel)?;
            item.subscription_id = sub.id;

            if self.already_stored(&item.source_url).await {
                tracing::debug!("Skipping known item {}", item.source_url);
                continue;
            }

            match self.store.create_feed_item(item).await {
                Ok(_) => inserted += 1,
                Err(e) => tracing::warn!("Failed to store {}: {}", item.source_url, e),
            }
        }

        ensure_live(cancel)?;
        self.store.update_last_fetched(sub.id, Utc::now()).await?;

        tracing::info!(
            "Refreshed {:?}: {} curated, {} new",
            sub.topic,
            items.len(),
            inserted
        );
        Ok(items)
    }

    /// Refresh every active subscription that is due. Individual refresh
    /// failures are logged; only failing to list subscriptions, or
    /// cancellation, is returned as an error.
    pub async fn refresh_all(&self, cancel: &CancellationToken) -> Result<RefreshSummary> {
        let subs = self.store.get_active_subscriptions().await?;
        let now = Utc::now();
        let mut summary = RefreshSummary::default();

        for sub in &subs {
            if !is_due(sub, now) {
                summary.skipped += 1;
                continue;
            }

            match self.refresh_subscription(sub, cancel).await {
                Ok(items) => {
                    summary.refreshed += 1;
                    summary.items += items.len();
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Failed to refresh {:?}: {}", sub.topic, e);
                }
            }
        }

        Ok(summary)
    }

    async fn search_candidates(&self, sub: &Subscription, guard: &CallGuard) -> Vec<Candidate> {
        let Some(search) = self.search.as_ref().filter(|s| s.available()) else {
            return Vec::new();
        };

        let request = SearchRequest {
            query: sub.topic.clone(),
            max_results: SEARCH_MAX_RESULTS,
            time_range: sub.frequency.time_range(),
        };

        match guard.run(search.search(request)).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("{} search failed for {:?}: {}", search.name(), sub.topic, e);
                Vec::new()
            }
        }
    }

    /// Entries from the default feeds of the category matching the topic,
    /// fetched in list order.
    async fn feed_candidates(&self, sub: &Subscription, guard: &CallGuard) -> Vec<Candidate> {
        let category = match self.store.get_category_by_name(&sub.topic).await {
            Ok(Some(category)) => category,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Category lookup failed for {:?}: {}", sub.topic, e);
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for url in &category.default_rss {
            match guard.run(self.feeds.fetch_feed(url, sub.last_fetched_at)).await {
                Ok(entries) => candidates.extend(entries),
                Err(e) => tracing::warn!("Failed to fetch feed {}: {}", url, e),
            }
        }
        candidates
    }

    /// A failed lookup counts as "not stored" so the insert is still tried.
    /// Items without a URL have no identity and are always inserted.
    async fn already_stored(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        match self.store.item_exists_by_url(url).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("Existence check failed for {}: {}", url, e);
                false
            }
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}
