use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tradegate_cache::SentimentReader;
use tradegate_models::sentiment::{fear_greed_to_score, FEAR_GREED_SOURCE};
use tradegate_models::{
    Polarity, SentimentConfig, SentimentReading, SentimentScore, Signal, SignalLabel, SignalSource,
};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    /// Weighted mean polarity, -1.0 to 1.0.
    pub score: f64,
    pub magnitude: f64,
    pub polarity: Polarity,
    /// Sources that contributed, in input order.
    pub sources: Vec<String>,
}

/// Weighted mean over the available sources.
///
/// Non-finite scores and non-positive weights count as unavailable; weights
/// are renormalized over what remains.
pub fn aggregate(
    scores: &[SentimentScore],
    config: &SentimentConfig,
) -> Result<SentimentSummary, PipelineError> {
    let available: Vec<&SentimentScore> = scores
        .iter()
        .filter(|s| s.score.is_finite() && s.weight.is_finite() && s.weight > 0.0)
        .collect();
    if available.is_empty() {
        return Err(PipelineError::NoSentimentData);
    }

    let total_weight: f64 = available.iter().map(|s| s.weight).sum();
    let weighted: f64 = available
        .iter()
        .map(|s| s.score.clamp(-1.0, 1.0) * s.weight)
        .sum();
    let score = (weighted / total_weight).clamp(-1.0, 1.0);

    let polarity = if score > config.polarity_threshold {
        Polarity::Positive
    } else if score < -config.polarity_threshold {
        Polarity::Negative
    } else {
        Polarity::Neutral
    };

    Ok(SentimentSummary {
        score,
        magnitude: score.abs(),
        polarity,
        sources: available.iter().map(|s| s.source.clone()).collect(),
    })
}

pub fn sentiment_signal(summary: &SentimentSummary) -> Signal {
    let label = match summary.polarity {
        Polarity::Positive => SignalLabel::Bullish,
        Polarity::Negative => SignalLabel::Bearish,
        Polarity::Neutral => SignalLabel::Neutral,
    };
    Signal::new(SignalSource::Sentiment, label, summary.magnitude)
}

/// Weight feed readings and the optional Fear & Greed index by source name.
pub fn collect_scores(
    readings: &[SentimentReading],
    fear_greed_index: Option<f64>,
    config: &SentimentConfig,
) -> Vec<SentimentScore> {
    let mut scores: Vec<SentimentScore> = readings
        .iter()
        .map(|r| SentimentScore {
            source: r.source.clone(),
            score: r.score,
            weight: config.weight_for(&r.source),
        })
        .collect();

    if let Some(index) = fear_greed_index {
        scores.push(SentimentScore {
            source: FEAR_GREED_SOURCE.to_string(),
            score: fear_greed_to_score(index),
            weight: config.weight_for(FEAR_GREED_SOURCE),
        });
    }
    scores
}

/// Source of per-symbol sentiment readings. External collaborator; mockable for testing.
#[async_trait]
pub trait SentimentFeed: Send + Sync {
    fn name(&self) -> &str;

    async fn readings(&self, symbol: &str) -> Result<Vec<SentimentReading>, PipelineError>;
}

/// Feed backed by the shared SQLite store that sentiment collectors write to.
pub struct CachedSentimentFeed {
    reader: Arc<SentimentReader>,
}

impl CachedSentimentFeed {
    pub fn new(reader: Arc<SentimentReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl SentimentFeed for CachedSentimentFeed {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn readings(&self, symbol: &str) -> Result<Vec<SentimentReading>, PipelineError> {
        let readings = self.reader.readings(symbol).await?;
        Ok(readings.as_ref().clone())
    }
}
