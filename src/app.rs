use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ProviderKind};
use crate::db::{FeedItemFilter, FeedStore, Repository};
use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::intelligence::{self, AskResult};
use crate::models::{
    find_category, Category, FeedItem, Frequency, NewFeedItem, NewSubscription, Subscription,
};
use crate::providers::llm::{build_llm_provider, LlmProvider, TextStream};
use crate::providers::search::{build_search_provider, SearchProvider};
use crate::providers::CallGuard;
use crate::scheduler::{RefreshSummary, Scheduler};

/// Items older than this are removed by `feed --cleanup`.
const RETENTION_DAYS: i64 = 30;

const DEFAULT_SOURCES: [&str; 2] = ["tavily", "rss"];

/// Which stored items `feed` shows.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub topic: Option<String>,
    pub include_read: bool,
    pub today: bool,
    pub week: bool,
    pub limit: Option<usize>,
}

/// Subscription with its stored item counts.
#[derive(Debug, Clone)]
pub struct TopicStatus {
    pub subscription: Subscription,
    pub total_items: i64,
    pub unread_items: i64,
}

/// Wires configuration, storage, and providers together for the commands.
pub struct App {
    config: Config,
    repository: Arc<Repository>,
    llm: Arc<dyn LlmProvider>,
    search: Option<Arc<dyn SearchProvider>>,
    scheduler: Scheduler,
}

impl App {
    pub async fn new(config: Config, provider: Option<ProviderKind>) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let llm = build_llm_provider(&config, provider);
        let search = build_search_provider(&config);
        let fetcher = Arc::new(FeedFetcher::new(config.request_timeout()));

        tracing::debug!(
            "Using {} for completions, search {}",
            llm.name(),
            search.as_ref().map(|s| s.name()).unwrap_or("disabled")
        );

        let scheduler = Scheduler::new(
            llm.clone(),
            search.clone(),
            fetcher,
            repository.clone(),
            config.max_concurrent_llm_calls,
            config.request_timeout(),
        );

        Ok(Self {
            config,
            repository,
            llm,
            search,
            scheduler,
        })
    }

    pub async fn subscribe(
        &self,
        topic: &str,
        frequency: Option<Frequency>,
        sources: Vec<String>,
    ) -> Result<Subscription> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::Config("topic must not be empty".to_string()));
        }
        if self.repository.get_subscription(topic).await?.is_some() {
            return Err(anyhow::anyhow!("Already subscribed to {:?}", topic).into());
        }

        let sources = if sources.is_empty() {
            DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            sources
        };

        self.repository
            .create_subscription(NewSubscription {
                topic: topic.to_string(),
                category: find_category(topic).map(|c| c.name),
                frequency: frequency.unwrap_or_else(|| self.config.default_frequency.clone()),
                sources,
            })
            .await
    }

    /// Deletes the subscription together with its stored items.
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        if self.repository.delete_subscription(topic).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("subscription {:?}", topic)))
        }
    }

    /// Pause or resume refreshing a topic.
    pub async fn set_active(&self, topic: &str, is_active: bool) -> Result<()> {
        if self.repository.set_subscription_active(topic, is_active).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("subscription {:?}", topic)))
        }
    }

    pub async fn mark_topic_read(&self, topic: &str) -> Result<()> {
        let sub = self
            .repository
            .get_subscription(topic)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {:?}", topic)))?;
        self.repository.mark_all_read_for_subscription(sub.id).await
    }

    pub async fn topics(&self) -> Result<Vec<TopicStatus>> {
        let mut topics = Vec::new();
        for subscription in self.repository.get_all_subscriptions().await? {
            let (total_items, unread_items) = self
                .repository
                .subscription_item_counts(subscription.id)
                .await?;
            topics.push(TopicStatus {
                subscription,
                total_items,
                unread_items,
            });
        }
        Ok(topics)
    }

    pub async fn available_categories(&self) -> Result<Vec<Category>> {
        self.repository.get_categories().await
    }

    /// Stored items matching `query`, best first. Shown items are marked read
    /// when `mark_read` is set.
    pub async fn feed(&self, query: FeedQuery, mark_read: bool) -> Result<Vec<FeedItem>> {
        let now = Utc::now();
        let since = if query.today {
            now.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc())
        } else if query.week {
            Some(now - Duration::days(7))
        } else {
            None
        };

        let items = self
            .repository
            .get_feed_items(FeedItemFilter {
                topic: query.topic,
                unread_only: !query.include_read,
                since,
                limit: Some(query.limit.unwrap_or(self.config.feed_limit)),
                ..Default::default()
            })
            .await?;

        if mark_read && !items.is_empty() {
            let ids = items.iter().map(|i| i.id).collect();
            if let Err(e) = self.repository.mark_items_read(ids).await {
                tracing::warn!("Failed to mark items as read: {}", e);
            }
        }
        Ok(items)
    }

    pub async fn has_active_subscriptions(&self) -> Result<bool> {
        Ok(!self.repository.get_active_subscriptions().await?.is_empty())
    }

    pub async fn cleanup(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
        self.repository.delete_old_items(cutoff).await
    }

    /// Refresh one topic regardless of when it was last fetched.
    pub async fn refresh_topic(
        &self,
        topic: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<NewFeedItem>> {
        let sub = self
            .repository
            .get_subscription(topic)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {:?}", topic)))?;
        self.scheduler.refresh_subscription(&sub, cancel).await
    }

    pub async fn refresh_due(&self, cancel: &CancellationToken) -> Result<RefreshSummary> {
        self.scheduler.refresh_all(cancel).await
    }

    pub async fn ask(
        &self,
        question: &str,
        use_search: bool,
        max_sources: usize,
        cancel: &CancellationToken,
    ) -> Result<AskResult> {
        self.ensure_llm()?;
        let guard = self.guard(cancel);
        let search = self.search_for(use_search);
        intelligence::ask(self.llm.as_ref(), search, &guard, question, max_sources).await
    }

    /// Streams the answer. Only used when there are no sources to show
    /// alongside it. The deadline covers the response headers; after that
    /// only cancellation ends the stream early.
    pub async fn ask_streaming(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<TextStream> {
        self.ensure_llm()?;
        let guard = self.guard(cancel);
        let request = intelligence::build_ask_request(question, &[]);
        let text = guard.run(self.llm.stream(request)).await?;
        Ok(guard.watch_stream(text))
    }

    /// Whether `ask` would have a usable search backend.
    pub fn can_search(&self) -> bool {
        self.search.as_ref().is_some_and(|s| s.available())
    }

    fn search_for(&self, use_search: bool) -> Option<&dyn SearchProvider> {
        if use_search {
            self.search.as_deref()
        } else {
            None
        }
    }

    fn guard(&self, cancel: &CancellationToken) -> CallGuard {
        CallGuard::new(cancel.clone(), self.config.request_timeout())
    }

    fn ensure_llm(&self) -> Result<()> {
        if self.llm.available() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "{} provider is not configured; set its API key in {}",
                self.llm.name(),
                Config::config_path().display()
            )))
        }
    }
}
