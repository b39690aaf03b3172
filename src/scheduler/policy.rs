use chrono::{DateTime, Utc};

use crate::models::Subscription;

/// Whether `sub` should be refreshed at `now`. Never-fetched subscriptions
/// are always due; otherwise the frequency tier sets the minimum gap.
pub fn is_due(sub: &Subscription, now: DateTime<Utc>) -> bool {
    match sub.last_fetched_at {
        None => true,
        Some(last) => now - last >= sub.frequency.refresh_interval(),
    }
}
