//! tradegate - deterministic trade decision and risk gating
//!
//! Combines technical indicators, an ML direction estimate, weighted sentiment
//! and user rules into one risk-checked trading decision.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tradegate::models::{DecisionRequest, TradegateConfig};
//! use tradegate::pipeline::Pipeline;
//!
//! # async fn run(request: DecisionRequest) -> anyhow::Result<()> {
//! let pipeline = tradegate::build_pipeline(&TradegateConfig::default())?;
//! let decision = tradegate::evaluate(&pipeline, request).await?;
//! println!("{} @ {:.2}", decision.action, decision.confidence);
//! # Ok(())
//! # }
//! ```

pub use tradegate_cache as cache;
pub use tradegate_models as models;
pub use tradegate_pipeline as pipeline;

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use tradegate_cache::{SentimentReader, SentimentStore};
use tradegate_models::{Decision, DecisionRequest, SentimentReading, TradegateConfig};
use tradegate_pipeline::{CachedSentimentFeed, Pipeline, PipelineError};

/// Load configuration from a TOML file, or defaults when no path is given.
pub fn load_config(path: Option<&str>) -> anyhow::Result<TradegateConfig> {
    let Some(path) = path else {
        return Ok(TradegateConfig::default());
    };
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

/// Build a Pipeline from configuration.
pub fn build_pipeline(config: &TradegateConfig) -> anyhow::Result<Pipeline> {
    let mut pipeline = Pipeline::new(config.clone());

    if let Some(path) = &config.cache.sentiment_db_path {
        let store = SentimentStore::open(path)
            .with_context(|| format!("Failed to open sentiment DB: {path}"))?;
        let reader = SentimentReader::new(
            store,
            config.cache.memory_max_capacity,
            Duration::from_secs(config.cache.memory_ttl_seconds),
        );
        pipeline = pipeline.with_sentiment_feed(Arc::new(CachedSentimentFeed::new(Arc::new(reader))));
    }

    Ok(pipeline)
}

/// Evaluate a decision request using the given pipeline.
pub async fn evaluate(
    pipeline: &Pipeline,
    request: DecisionRequest,
) -> Result<Decision, PipelineError> {
    pipeline.decide(request).await
}

/// Purge expired rows, then store one reading valid for `ttl_seconds`.
/// Returns how many expired rows were removed.
pub fn record_sentiment(
    store: &SentimentStore,
    symbol: &str,
    source: &str,
    score: f64,
    ttl_seconds: i64,
) -> anyhow::Result<usize> {
    anyhow::ensure!(score.is_finite(), "Sentiment score must be finite, got {score}");
    anyhow::ensure!(ttl_seconds > 0, "TTL must be positive, got {ttl_seconds}");
    let now = Utc::now();
    let expires_at = TimeDelta::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .with_context(|| format!("TTL of {ttl_seconds}s is out of range"))?;

    let purged = store.purge_expired()?;
    store.upsert(
        symbol,
        &SentimentReading {
            source: source.to_string(),
            score: score.clamp(-1.0, 1.0),
            observed_at: now,
        },
        expires_at,
    )?;
    Ok(purged)
}
