#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use termiflow::db::FeedStore;
use termiflow::error::{AppError, Result};
use termiflow::feed::FeedSource;
use termiflow::models::{Candidate, Category, Frequency, NewFeedItem, Subscription};
use termiflow::providers::llm::{CompletionRequest, CompletionResponse, LlmProvider, TextStream};
use termiflow::providers::search::{SearchProvider, SearchRequest};

/// Answers scoring prompts per title, summary and tag prompts with fixed text.
pub struct ScriptedLlm {
    scores: Vec<(String, Option<String>)>,
    default_score: Option<String>,
    summary: Option<String>,
    tags: Option<String>,
    pub score_calls: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            scores: Vec::new(),
            default_score: Some("0.5".to_string()),
            summary: Some(String::new()),
            tags: Some(String::new()),
            score_calls: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply `score` when asked to rate an item titled `title`.
    pub fn score(mut self, title: &str, score: &str) -> Self {
        self.scores.push((title.to_string(), Some(score.to_string())));
        self
    }

    /// Fail the scoring call for an item titled `title`.
    pub fn fail_score(mut self, title: &str) -> Self {
        self.scores.push((title.to_string(), None));
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn fail_summary(mut self) -> Self {
        self.summary = None;
        self
    }

    pub fn tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_string());
        self
    }

    pub fn fail_tags(mut self) -> Self {
        self.tags = None;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let content = if prompt.contains("Rate the relevance") {
            self.score_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .scores
                .iter()
                .find(|(title, _)| prompt.contains(&format!("Content Title: {}\n", title)))
                .map(|(_, score)| score.clone())
                .unwrap_or_else(|| self.default_score.clone());
            scripted.ok_or_else(|| AppError::LlmApi("scripted scoring failure".to_string()))?
        } else if prompt.starts_with("Summarize") {
            self.summary
                .clone()
                .ok_or_else(|| AppError::LlmApi("scripted summary failure".to_string()))?
        } else if prompt.starts_with("Extract") {
            self.tags
                .clone()
                .ok_or_else(|| AppError::LlmApi("scripted tagging failure".to_string()))?
        } else {
            String::new()
        };

        Ok(CompletionResponse {
            content,
            finish_reason: "stop".to_string(),
            ..Default::default()
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<TextStream> {
        Err(AppError::LlmApi("streaming is not scripted".to_string()))
    }
}

pub struct MockSearch {
    results: Option<Vec<Candidate>>,
    available: bool,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearch {
    pub fn returning(results: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            results: Some(results),
            available: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            results: None,
            available: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            results: Some(Vec::new()),
            available: false,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    fn available(&self) -> bool {
        self.available
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Candidate>> {
        self.requests.lock().unwrap().push(request);
        self.results
            .clone()
            .ok_or_else(|| AppError::SearchApi("scripted search failure".to_string()))
    }
}

#[derive(Default)]
pub struct MockFeeds {
    feeds: HashMap<String, Vec<Candidate>>,
    failing: HashSet<String>,
    pub fetches: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
}

impl MockFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(mut self, url: &str, entries: Vec<Candidate>) -> Self {
        self.feeds.insert(url.to_string(), entries);
        self
    }

    pub fn failing_feed(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl FeedSource for MockFeeds {
    async fn fetch_feed(&self, url: &str, since: Option<DateTime<Utc>>) -> Result<Vec<Candidate>> {
        self.fetches.lock().unwrap().push((url.to_string(), since));
        if self.failing.contains(url) {
            return Err(anyhow::anyhow!("scripted feed failure").into());
        }
        Ok(self.feeds.get(url).cloned().unwrap_or_default())
    }
}

/// In-memory store that records every write.
#[derive(Default)]
pub struct RecordingStore {
    pub subscriptions: Vec<Subscription>,
    pub categories: HashMap<String, Category>,
    pub existing_urls: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<NewFeedItem>>,
    pub last_fetched: Mutex<Vec<(i64, DateTime<Utc>)>>,
    pub fail_exists: bool,
    pub fail_create: bool,
    pub fail_list: bool,
    pub fail_update_for: HashSet<i64>,
    /// Fired right after the first successful insert.
    pub cancel_after_insert: Option<CancellationToken>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, name: &str, feeds: &[&str]) -> Self {
        self.categories.insert(
            name.to_string(),
            Category {
                name: name.to_string(),
                display_name: name.to_string(),
                description: String::new(),
                default_rss: feeds.iter().map(|f| f.to_string()).collect(),
                keywords: Vec::new(),
            },
        );
        self
    }

    pub fn with_existing(self, url: &str) -> Self {
        self.existing_urls.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn with_subscription(mut self, sub: Subscription) -> Self {
        self.subscriptions.push(sub);
        self
    }

    pub fn cancelling_after_first_insert(mut self, cancel: CancellationToken) -> Self {
        self.cancel_after_insert = Some(cancel);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn created(&self) -> Vec<NewFeedItem> {
        self.created.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(i64, DateTime<Utc>)> {
        self.last_fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedStore for RecordingStore {
    async fn item_exists_by_url(&self, url: &str) -> Result<bool> {
        if self.fail_exists {
            return Err(AppError::NotFound("scripted existence failure".to_string()));
        }
        Ok(self.existing_urls.lock().unwrap().contains(url))
    }

    async fn create_feed_item(&self, item: &NewFeedItem) -> Result<i64> {
        if self.fail_create {
            return Err(anyhow::anyhow!("scripted insert failure").into());
        }
        let mut created = self.created.lock().unwrap();
        created.push(item.clone());
        self.existing_urls
            .lock()
            .unwrap()
            .insert(item.source_url.clone());
        if let Some(cancel) = &self.cancel_after_insert {
            cancel.cancel();
        }
        Ok(created.len() as i64)
    }

    async fn get_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        if self.fail_list {
            return Err(anyhow::anyhow!("scripted listing failure").into());
        }
        Ok(self
            .subscriptions
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn update_last_fetched(&self, subscription_id: i64, at: DateTime<Utc>) -> Result<()> {
        if self.fail_update_for.contains(&subscription_id) {
            return Err(anyhow::anyhow!("scripted update failure").into());
        }
        self.last_fetched.lock().unwrap().push((subscription_id, at));
        Ok(())
    }

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        Ok(self.categories.get(name).cloned())
    }
}

pub fn subscription(id: i64, topic: &str, frequency: &str) -> Subscription {
    let now = Utc::now();
    Subscription {
        id,
        topic: topic.to_string(),
        category: None,
        frequency: Frequency::from(frequency),
        sources: vec!["tavily".to_string(), "rss".to_string()],
        created_at: now,
        updated_at: now,
        last_fetched_at: None,
        is_active: true,
    }
}

pub fn candidate(title: &str, url: &str, source: &str) -> Candidate {
    Candidate {
        title: title.to_string(),
        url: url.to_string(),
        snippet: format!("snippet for {}", title),
        content: format!("content for {}", title),
        published_at: None,
        source: source.to_string(),
    }
}
