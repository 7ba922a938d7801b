//! Test support: deterministic collaborators and market series builders.
//!
//! The mocks stand in for the external model and sentiment feed so pipeline
//! behavior (fallbacks, timeouts, voting) can be exercised without any I/O.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tradegate_models::{DecisionRequest, MarketContext, SentimentReading, TradeAction};

use crate::error::PipelineError;
use crate::ml::{MlPrediction, PriceModel};
use crate::sentiment::SentimentFeed;

/// Always returns the same prediction.
pub struct FixedModel {
    pub prediction: MlPrediction,
}

impl FixedModel {
    pub fn new(up_probability: f64, volatility: f64) -> Self {
        Self {
            prediction: MlPrediction {
                up_probability,
                volatility,
                confidence: (up_probability - 0.5).abs() * 2.0,
            },
        }
    }
}

#[async_trait]
impl PriceModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn predict(&self, _market: &MarketContext) -> Result<MlPrediction, PipelineError> {
        Ok(self.prediction)
    }
}

pub struct FailingModel;

#[async_trait]
impl PriceModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn predict(&self, _market: &MarketContext) -> Result<MlPrediction, PipelineError> {
        Err(PipelineError::CollaboratorUnavailable(
            "model endpoint unreachable".to_string(),
        ))
    }
}

/// Sleeps before answering; used to drive source timeouts.
pub struct SlowModel {
    pub delay: Duration,
    pub prediction: MlPrediction,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            prediction: FixedModel::new(0.75, 0.01).prediction,
        }
    }
}

#[async_trait]
impl PriceModel for SlowModel {
    fn name(&self) -> &str {
        "slow"
    }

    async fn predict(&self, _market: &MarketContext) -> Result<MlPrediction, PipelineError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.prediction)
    }
}

/// Returns fixed `(source, score)` readings for every symbol.
pub struct StaticSentimentFeed {
    pub scores: Vec<(String, f64)>,
    pub delay: Option<Duration>,
}

impl StaticSentimentFeed {
    pub fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(s, v)| (s.to_string(), *v)).collect(),
            delay: None,
        }
    }

    pub fn slow(scores: &[(&str, f64)], delay: Duration) -> Self {
        let mut feed = Self::new(scores);
        feed.delay = Some(delay);
        feed
    }
}

#[async_trait]
impl SentimentFeed for StaticSentimentFeed {
    fn name(&self) -> &str {
        "static"
    }

    async fn readings(&self, _symbol: &str) -> Result<Vec<SentimentReading>, PipelineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let observed_at = Utc::now();
        Ok(self
            .scores
            .iter()
            .map(|(source, score)| SentimentReading {
                source: source.clone(),
                score: *score,
                observed_at,
            })
            .collect())
    }
}

pub struct FailingSentimentFeed;

#[async_trait]
impl SentimentFeed for FailingSentimentFeed {
    fn name(&self) -> &str {
        "failing"
    }

    async fn readings(&self, _symbol: &str) -> Result<Vec<SentimentReading>, PipelineError> {
        Err(PipelineError::CollaboratorUnavailable(
            "sentiment store offline".to_string(),
        ))
    }
}

/// `n` prices starting at `start`, each `step` above the previous.
pub fn rising_prices(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

pub fn falling_prices(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start - step * i as f64).collect()
}

/// A request over `prices` with constant volume and no optional inputs.
pub fn request(symbol: &str, prices: Vec<f64>) -> DecisionRequest {
    let volumes = vec![1_000.0; prices.len()];
    DecisionRequest {
        symbol: symbol.to_string(),
        prices,
        volumes,
        proposed_action: TradeAction::Hold,
        proposed_size: Decimal::ZERO,
        account_balance: Decimal::new(10_000, 0),
        fear_greed_index: None,
        rules: None,
        current_positions: None,
        entry_price: None,
        request_id: None,
    }
}

/// A buy proposal over a steadily rising series with greedy sentiment.
pub fn bullish_buy_request(size: Decimal, balance: Decimal) -> DecisionRequest {
    let mut req = request("BTC/USD", rising_prices(30, 100.0, 1.0));
    req.proposed_action = TradeAction::Buy;
    req.proposed_size = size;
    req.account_balance = balance;
    req.fear_greed_index = Some(80.0);
    req.request_id = Some("scenario".to_string());
    req
}
