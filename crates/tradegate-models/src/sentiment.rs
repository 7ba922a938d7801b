use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source name used for the request-supplied Fear & Greed index.
pub const FEAR_GREED_SOURCE: &str = "fear_greed";

/// A raw polarity reading from one sentiment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentReading {
    /// Collector name (e.g. "twitter", "reddit", "news").
    pub source: String,
    /// -1.0 (bearish) to 1.0 (bullish).
    pub score: f64,
    pub observed_at: DateTime<Utc>,
}

/// A reading paired with the weight it carries in aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentScore {
    pub source: String,
    pub score: f64,
    pub weight: f64,
}

/// Map a 0..=100 Fear & Greed index onto the -1..=1 polarity scale.
pub fn fear_greed_to_score(index: f64) -> f64 {
    (index - 50.0) / 50.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}
