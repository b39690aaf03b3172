use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    default_categories, Category, FeedItem, Frequency, NewFeedItem, NewSubscription, Subscription,
};

use super::schema::SCHEMA;
use super::FeedStore;

const SUBSCRIPTION_COLUMNS: &str =
    "id, topic, category, frequency, sources, created_at, updated_at, last_fetched_at, is_active";

/// Query options for listing stored feed items.
#[derive(Debug, Clone, Default)]
pub struct FeedItemFilter {
    pub subscription_id: Option<i64>,
    pub topic: Option<String>,
    pub unread_only: bool,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        let categories = default_categories()
            .into_iter()
            .map(|c| -> Result<_> {
                Ok((
                    c.name,
                    c.display_name,
                    c.description,
                    serde_json::to_string(&c.default_rss)?,
                    serde_json::to_string(&c.keywords)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        conn.call(move |conn| {
            conn.execute_batch(SCHEMA)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO categories (name, display_name, description, default_rss, keywords)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (name, display_name, description, rss, keywords) in &categories {
                    stmt.execute(params![name, display_name, description, rss, keywords])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Subscription operations

    pub async fn create_subscription(&self, sub: NewSubscription) -> Result<Subscription> {
        let now = Utc::now();
        let stamp = timestamp(now);
        let topic = sub.topic.clone();
        let category = sub.category.clone();
        let frequency = sub.frequency.as_str().to_string();
        let sources = sub.sources_json();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO subscriptions (topic, category, frequency, sources, created_at, updated_at, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)",
                    params![topic, category, frequency, sources, stamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        Ok(Subscription {
            id,
            topic: sub.topic,
            category: sub.category,
            frequency: sub.frequency,
            sources: sub.sources,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
            is_active: true,
        })
    }

    pub async fn get_subscription(&self, topic: &str) -> Result<Option<Subscription>> {
        let topic = topic.to_string();
        let sub = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM subscriptions WHERE topic = ?1",
                    SUBSCRIPTION_COLUMNS
                ))?;
                let sub = stmt
                    .query_row(params![topic], subscription_from_row)
                    .optional()?;
                Ok(sub)
            })
            .await?;
        Ok(sub)
    }

    pub async fn get_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.query_subscriptions(false).await
    }

    async fn query_subscriptions(&self, active_only: bool) -> Result<Vec<Subscription>> {
        let subs = self
            .conn
            .call(move |conn| {
                let filter = if active_only { "WHERE is_active = 1" } else { "" };
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM subscriptions {} ORDER BY created_at DESC, id DESC",
                    SUBSCRIPTION_COLUMNS, filter
                ))?;
                let subs = stmt
                    .query_map([], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(subs)
            })
            .await?;
        Ok(subs)
    }

    pub async fn set_subscription_active(&self, topic: &str, is_active: bool) -> Result<bool> {
        let topic = topic.to_string();
        let stamp = timestamp(Utc::now());
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE subscriptions SET is_active = ?1, updated_at = ?2 WHERE topic = ?3",
                    params![is_active, stamp, topic],
                )?;
                Ok(n)
            })
            .await?;
        Ok(changed > 0)
    }

    /// Removes the subscription; its feed items are deleted with it.
    pub async fn delete_subscription(&self, topic: &str) -> Result<bool> {
        let topic = topic.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM subscriptions WHERE topic = ?1", params![topic])?;
                Ok(n)
            })
            .await?;
        Ok(deleted > 0)
    }

    /// (total, unread) item counts for one subscription.
    pub async fn subscription_item_counts(&self, subscription_id: i64) -> Result<(i64, i64)> {
        let counts = self
            .conn
            .call(move |conn| {
                let counts = conn.query_row(
                    "SELECT COUNT(*), SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END)
                     FROM feed_items WHERE subscription_id = ?1",
                    params![subscription_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    // Feed item operations

    pub async fn get_feed_items(&self, filter: FeedItemFilter) -> Result<Vec<FeedItem>> {
        let mut sql = String::from(
            r#"SELECT fi.id, fi.subscription_id, fi.title, fi.summary, fi.content,
                      fi.source_name, fi.source_url, fi.published_at, fi.fetched_at,
                      fi.is_read, fi.relevance_score, fi.tags
               FROM feed_items fi
               JOIN subscriptions s ON fi.subscription_id = s.id
               WHERE 1=1"#,
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(id) = filter.subscription_id {
            sql.push_str(" AND fi.subscription_id = ?");
            args.push(Value::Integer(id));
        }
        if let Some(topic) = filter.topic {
            sql.push_str(" AND s.topic = ?");
            args.push(Value::Text(topic));
        }
        if filter.unread_only {
            sql.push_str(" AND fi.is_read = 0");
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND fi.fetched_at >= ?");
            args.push(Value::Text(timestamp(since)));
        }

        sql.push_str(" ORDER BY fi.relevance_score DESC, fi.published_at DESC");

        match (filter.limit, filter.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                args.push(Value::Integer(limit as i64));
                args.push(Value::Integer(offset.unwrap_or(0) as i64));
            }
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                args.push(Value::Integer(offset as i64));
            }
            (None, None) => {}
        }

        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params_from_iter(args.iter()), feed_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn mark_items_read(&self, ids: Vec<i64>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare("UPDATE feed_items SET is_read = 1 WHERE id = ?1")?;
                    for id in &ids {
                        stmt.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn mark_all_read_for_subscription(&self, subscription_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feed_items SET is_read = 1 WHERE subscription_id = ?1",
                    params![subscription_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Purge items fetched before `older_than`; returns how many were removed.
    pub async fn delete_old_items(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let cutoff = timestamp(older_than);
        let deleted = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM feed_items WHERE fetched_at < ?1", params![cutoff])?;
                Ok(n)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>> {
        let categories = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, display_name, description, default_rss, keywords FROM categories ORDER BY id",
                )?;
                let categories = stmt
                    .query_map([], category_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(categories)
            })
            .await?;
        Ok(categories)
    }
}

#[async_trait]
impl FeedStore for Repository {
    async fn item_exists_by_url(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM feed_items WHERE source_url = ?1)",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    async fn create_feed_item(&self, item: &NewFeedItem) -> Result<i64> {
        let tags = item.tags_json();
        let item = item.clone();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feed_items (subscription_id, title, summary, content, source_name,
                                              source_url, published_at, fetched_at, relevance_score, tags)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                    params![
                        item.subscription_id,
                        item.title,
                        item.summary,
                        item.content,
                        item.source_name,
                        item.source_url,
                        item.published_at.map(timestamp),
                        timestamp(item.fetched_at),
                        item.relevance_score,
                        tags,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn get_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.query_subscriptions(true).await
    }

    async fn update_last_fetched(&self, subscription_id: i64, at: DateTime<Utc>) -> Result<()> {
        let stamp = timestamp(at);
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE subscriptions SET last_fetched_at = ?1, updated_at = ?1 WHERE id = ?2",
                    params![stamp, subscription_id],
                )?;
                Ok(n)
            })
            .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("subscription {}", subscription_id)));
        }
        Ok(())
    }

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let name = name.to_string();
        let category = self
            .conn
            .call(move |conn| {
                let category = conn
                    .query_row(
                        "SELECT name, display_name, description, default_rss, keywords
                         FROM categories WHERE name = ?1",
                        params![name],
                        category_from_row,
                    )
                    .optional()?;
                Ok(category)
            })
            .await?;
        Ok(category)
    }
}

/// Timestamps are stored as RFC 3339 UTC so that text comparison orders them.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn subscription_from_row(row: &Row) -> rusqlite::Result<Subscription> {
    let mut sub = Subscription {
        id: row.get(0)?,
        topic: row.get(1)?,
        category: row.get(2)?,
        frequency: Frequency::from(row.get::<_, String>(3)?),
        sources: Vec::new(),
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_fetched_at: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| parse_datetime(&s)),
        is_active: row.get::<_, i64>(8)? != 0,
    };
    if let Some(sources) = row.get::<_, Option<String>>(4)? {
        if let Err(e) = sub.set_sources_from_json(&sources) {
            tracing::warn!("Ignoring malformed sources for {}: {}", sub.topic, e);
        }
    }
    Ok(sub)
}

fn feed_item_from_row(row: &Row) -> rusqlite::Result<FeedItem> {
    let mut item = FeedItem {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        content: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        source_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        source_url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        published_at: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| parse_datetime(&s)),
        fetched_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        is_read: row.get::<_, i64>(9)? != 0,
        relevance_score: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
        tags: Vec::new(),
    };
    if let Some(tags) = row.get::<_, Option<String>>(11)? {
        if let Err(e) = item.set_tags_from_json(&tags) {
            tracing::warn!("Ignoring malformed tags on item {}: {}", item.id, e);
        }
    }
    Ok(item)
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    let default_rss: String = row.get(3)?;
    let keywords: String = row.get(4)?;
    Ok(Category {
        name: row.get(0)?,
        display_name: row.get(1)?,
        description: row.get(2)?,
        default_rss: serde_json::from_str(&default_rss).unwrap_or_default(),
        keywords: serde_json::from_str(&keywords).unwrap_or_default(),
    })
}
