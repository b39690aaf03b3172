use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Refresh cadence of a subscription.
///
/// Unrecognized tiers are kept verbatim in `Other` so they round-trip through
/// the database; they behave like `Daily` for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Other(String),
}

impl Frequency {
    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Other(s) => s,
        }
    }

    /// Minimum time between two refreshes of a subscription with this tier.
    pub fn refresh_interval(&self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::hours(24),
            Frequency::Weekly => Duration::days(7),
            Frequency::Other(_) => Duration::hours(24),
        }
    }

    /// Search window used when querying for fresh content.
    pub fn time_range(&self) -> TimeRange {
        match self {
            Frequency::Hourly => TimeRange::Day,
            Frequency::Daily => TimeRange::Week,
            Frequency::Weekly => TimeRange::Month,
            Frequency::Other(_) => TimeRange::Week,
        }
    }
}

impl From<&str> for Frequency {
    fn from(s: &str) -> Self {
        match s {
            "hourly" => Frequency::Hourly,
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            other => Frequency::Other(other.to_string()),
        }
    }
}

impl From<String> for Frequency {
    fn from(s: String) -> Self {
        Frequency::from(s.as_str())
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.as_str().to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub topic: String,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Subscription {
    pub fn sources_json(&self) -> String {
        sources_to_json(&self.sources)
    }

    pub fn set_sources_from_json(&mut self, data: &str) -> serde_json::Result<()> {
        self.sources = sources_from_json(data)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub topic: String,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub sources: Vec<String>,
}

impl NewSubscription {
    pub fn sources_json(&self) -> String {
        sources_to_json(&self.sources)
    }
}

fn sources_to_json(sources: &[String]) -> String {
    serde_json::to_string(sources).unwrap_or_else(|_| "[]".to_string())
}

fn sources_from_json(data: &str) -> serde_json::Result<Vec<String>> {
    if data.is_empty() || data == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(data)
}
