mod candidate;
mod category;
mod feed_item;
mod subscription;

pub use candidate::Candidate;
pub use category::{default_categories, find_category, Category};
pub use feed_item::{truncate_content, FeedItem, NewFeedItem, MAX_CONTENT_CHARS};
pub use subscription::{Frequency, NewSubscription, Subscription, TimeRange};
