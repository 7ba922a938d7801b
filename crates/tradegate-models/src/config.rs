use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::sentiment::FEAR_GREED_SOURCE;

/// Top-level configuration for tradegate. Immutable once loaded; shared per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradegateConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub indicators: IndicatorConfig,
    pub ml: MlConfig,
    pub sentiment: SentimentConfig,
    pub risk: RiskConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP API binds to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Orchestration and aggregation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deadline for each of the indicator, ML and sentiment sources.
    pub source_timeout_ms: u64,
    /// Deadline for the risk gate. Expiry forces a hold.
    pub risk_timeout_ms: u64,
    /// A fired rule overrides the vote only above this confidence.
    pub rule_confidence_threshold: f64,
    /// Stop-loss distance from the latest price (0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Take-profit distance from the latest price.
    pub take_profit_pct: f64,
    /// Confidence multiplier applied once per degraded source.
    pub degraded_confidence_factor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: 2_000,
            risk_timeout_ms: 1_000,
            rule_confidence_threshold: 0.5,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            degraded_confidence_factor: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub ema_short_period: usize,
    pub ema_long_period: usize,
    pub trend_fast_period: usize,
    pub trend_slow_period: usize,
    /// Relative band around the slow EMA inside which the trend is flat.
    pub trend_band: f64,
    pub volume_window: usize,
    /// Samples back used for the price change percentage.
    pub change_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            ema_short_period: 20,
            ema_long_period: 50,
            trend_fast_period: 5,
            trend_slow_period: 10,
            trend_band: 0.01,
            volume_window: 20,
            change_lookback: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MlConfig {
    /// Use the built-in momentum model. When false, the scorer always falls back to neutral.
    pub enabled: bool,
    /// Half-width of the neutral zone around an up-probability of 0.5.
    pub neutral_band: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            neutral_band: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentConfig {
    /// |mean| above this is positive or negative, otherwise neutral.
    pub polarity_threshold: f64,
    /// Weight for sources not listed in `weights`.
    pub default_weight: f64,
    /// Per-source weights. Renormalized over the sources actually available.
    pub weights: BTreeMap<String, f64>,
}

impl SentimentConfig {
    pub fn weight_for(&self, source: &str) -> f64 {
        self.weights
            .get(source)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            polarity_threshold: 0.2,
            default_weight: 0.2,
            weights: BTreeMap::from([
                ("twitter".to_string(), 0.3),
                ("reddit".to_string(), 0.2),
                ("news".to_string(), 0.3),
                (FEAR_GREED_SOURCE.to_string(), 0.2),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Largest single position as a fraction of the account balance.
    pub max_position_pct: Decimal,
    /// Largest total exposure (open positions + new buy) as a fraction of balance.
    pub max_total_exposure: Decimal,
    /// Volatility ceiling (std-dev of returns) above which trades are blocked.
    pub max_volatility: f64,
    /// Loss from entry at which an open position's stop-loss counts as triggered.
    pub stop_loss_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: Decimal::new(10, 2),
            max_total_exposure: Decimal::new(50, 2),
            max_volatility: 0.05,
            stop_loss_pct: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Shared SQLite file written by external sentiment collectors. None disables the feed.
    pub sentiment_db_path: Option<String>,
    /// Maximum number of entries in each in-memory moka cache.
    pub memory_max_capacity: u64,
    /// How long sentiment reads stay in memory.
    pub memory_ttl_seconds: u64,
    /// How long a computed indicator snapshot is reused for an identical series.
    pub indicator_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sentiment_db_path: None,
            memory_max_capacity: 10_000,
            memory_ttl_seconds: 60,
            indicator_ttl_seconds: 30,
        }
    }
}
