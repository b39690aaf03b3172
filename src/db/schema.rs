pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- subscriptions table
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL UNIQUE,
    category TEXT,
    frequency TEXT NOT NULL DEFAULT 'daily',
    sources TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_fetched_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_active ON subscriptions(is_active);

-- feed_items table (items go away with their subscription)
CREATE TABLE IF NOT EXISTS feed_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subscription_id INTEGER NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    summary TEXT,
    content TEXT,
    source_name TEXT,
    source_url TEXT,
    published_at TEXT,
    fetched_at TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    relevance_score REAL,
    tags TEXT
);

CREATE INDEX IF NOT EXISTS idx_feed_items_subscription ON feed_items(subscription_id);
CREATE INDEX IF NOT EXISTS idx_feed_items_source_url ON feed_items(source_url);
CREATE INDEX IF NOT EXISTS idx_feed_items_fetched ON feed_items(fetched_at);
CREATE INDEX IF NOT EXISTS idx_feed_items_read ON feed_items(is_read);

-- categories table (seeded from the built-in taxonomy)
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    description TEXT NOT NULL,
    default_rss TEXT NOT NULL DEFAULT '[]',
    keywords TEXT NOT NULL DEFAULT '[]'
);
"#;
