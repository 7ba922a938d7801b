use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use tradegate_models::{MarketContext, Signal, SignalLabel, SignalSource};

use crate::error::PipelineError;

/// Output of a price-direction model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub up_probability: f64,
    /// Standard deviation of simple returns.
    pub volatility: f64,
    pub confidence: f64,
}

impl MlPrediction {
    pub const NEUTRAL: MlPrediction = MlPrediction {
        up_probability: 0.5,
        volatility: 0.0,
        confidence: 0.0,
    };

    fn check_shape(&self) -> Result<(), String> {
        if !self.up_probability.is_finite() || !(0.0..=1.0).contains(&self.up_probability) {
            return Err(format!("up_probability out of range: {}", self.up_probability));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(format!("volatility out of range: {}", self.volatility));
        }
        if !self.confidence.is_finite() {
            return Err(format!("confidence not finite: {}", self.confidence));
        }
        Ok(())
    }

    /// "up", "down" or "neutral" given the neutral band half-width.
    pub fn direction(&self, neutral_band: f64) -> &'static str {
        if self.up_probability > 0.5 + neutral_band {
            "up"
        } else if self.up_probability < 0.5 - neutral_band {
            "down"
        } else {
            "neutral"
        }
    }
}

/// A price-direction model. External collaborator; mockable for testing.
#[async_trait]
pub trait PriceModel: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(&self, market: &MarketContext) -> Result<MlPrediction, PipelineError>;
}

/// Deterministic momentum heuristic used when no trained model is wired in.
pub struct MomentumModel;

impl MomentumModel {
    const MIN_SAMPLES: usize = 10;
    const MOMENTUM_THRESHOLD: f64 = 0.02;

    pub fn volatility(prices: &[f64]) -> f64 {
        if prices.len() < 2 {
            return 0.02;
        }
        let returns: Vec<f64> = prices
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    }

    pub fn estimate(prices: &[f64]) -> MlPrediction {
        let volatility = Self::volatility(prices);
        if prices.len() < Self::MIN_SAMPLES {
            return MlPrediction {
                up_probability: 0.5,
                volatility,
                confidence: 0.3,
            };
        }

        let base = prices[prices.len() - 5];
        let change = (prices[prices.len() - 1] - base) / base;
        let up_probability = if change > Self::MOMENTUM_THRESHOLD {
            0.65
        } else if change < -Self::MOMENTUM_THRESHOLD {
            0.35
        } else {
            0.5
        };

        MlPrediction {
            up_probability,
            volatility,
            confidence: (change.abs() * 10.0).min(0.9),
        }
    }
}

#[async_trait]
impl PriceModel for MomentumModel {
    fn name(&self) -> &str {
        "momentum"
    }

    async fn predict(&self, market: &MarketContext) -> Result<MlPrediction, PipelineError> {
        Ok(Self::estimate(market.prices()))
    }
}

/// A scored prediction and whether it is the neutral fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlScore {
    pub prediction: MlPrediction,
    pub degraded: bool,
}

impl MlScore {
    pub fn fallback() -> Self {
        Self {
            prediction: MlPrediction::NEUTRAL,
            degraded: true,
        }
    }
}

/// Wraps an optional [`PriceModel`], validating its output and falling back to neutral.
pub struct MlScorer {
    model: Option<Arc<dyn PriceModel>>,
    neutral_band: f64,
}

impl MlScorer {
    pub fn new(model: Option<Arc<dyn PriceModel>>, neutral_band: f64) -> Self {
        Self {
            model,
            neutral_band,
        }
    }

    pub fn neutral_band(&self) -> f64 {
        self.neutral_band
    }

    pub async fn score(&self, market: &MarketContext) -> MlScore {
        let Some(model) = &self.model else {
            return MlScore::fallback();
        };

        match model.predict(market).await {
            Ok(prediction) => match prediction.check_shape() {
                Ok(()) => MlScore {
                    prediction,
                    degraded: false,
                },
                Err(reason) => {
                    warn!(model = model.name(), %reason, "Model returned invalid prediction");
                    MlScore::fallback()
                }
            },
            Err(e) => {
                warn!(model = model.name(), error = %e, "Model prediction failed");
                MlScore::fallback()
            }
        }
    }

    pub fn signal(&self, prediction: &MlPrediction) -> Signal {
        ml_signal(prediction, self.neutral_band)
    }
}

/// Bullish above `0.5 + band`, bearish below `0.5 - band`; confidence `|p - 0.5| * 2`.
pub fn ml_signal(prediction: &MlPrediction, neutral_band: f64) -> Signal {
    let label = match prediction.direction(neutral_band) {
        "up" => SignalLabel::Bullish,
        "down" => SignalLabel::Bearish,
        _ => SignalLabel::Neutral,
    };
    Signal::new(
        SignalSource::Ml,
        label,
        (prediction.up_probability - 0.5).abs() * 2.0,
    )
}
