mod repository;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Category, NewFeedItem, Subscription};

pub use repository::{FeedItemFilter, Repository};

/// Persistence capability the refresh pipeline depends on.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// True if any subscription already holds an item with this source URL.
    async fn item_exists_by_url(&self, url: &str) -> Result<bool>;

    async fn create_feed_item(&self, item: &NewFeedItem) -> Result<i64>;

    async fn get_active_subscriptions(&self) -> Result<Vec<Subscription>>;

    async fn update_last_fetched(&self, subscription_id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>>;
}
