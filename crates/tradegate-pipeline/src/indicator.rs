//! Technical indicators over a validated [`MarketContext`].
//!
//! Everything here is pure: identical inputs always give identical snapshots,
//! which is what makes the snapshot safe to memoize by content fingerprint.

use serde::{Deserialize, Serialize};
use tradegate_cache::Fingerprint;
use tradegate_models::{IndicatorConfig, MarketContext, Signal, SignalLabel, SignalSource};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsiZone::Overbought => "overbought",
            RsiZone::Oversold => "oversold",
            RsiZone::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub rsi_zone: RsiZone,
    pub ema_short: f64,
    pub ema_long: f64,
    /// Short EMA above long EMA.
    pub ema_cross: bool,
    pub trend: Trend,
    pub current_price: f64,
    pub volume_avg: f64,
    pub volume_current: f64,
    /// Current volume over the window average; 1.0 when the average is zero.
    pub volume_ratio: f64,
    /// Percent change over the lookback window; 0 when the series is shorter.
    pub price_change_pct: f64,
}

/// Relative strength index from simple averages of the last `period` moves.
pub fn rsi(prices: &[f64], period: usize) -> Result<f64, PipelineError> {
    let required = period + 1;
    if period == 0 || prices.len() < required {
        return Err(PipelineError::InsufficientData {
            indicator: "rsi",
            required,
            available: prices.len(),
        });
    }

    let window = &prices[prices.len() - required..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), delta| {
            if delta > 0.0 {
                (gains + delta, losses)
            } else {
                (gains, losses - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// Exponential moving average seeded with the first sample.
///
/// Series shorter than `period` fall back to the arithmetic mean. Empty input gives 0.
pub fn ema(values: &[f64], period: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.len() < period {
        return mean(values);
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    values[1..]
        .iter()
        .fold(values[0], |acc, value| (value - acc) * multiplier + acc)
}

/// Fast EMA over the recent tail against a slow EMA over a longer tail.
pub fn trend(prices: &[f64], config: &IndicatorConfig) -> Trend {
    let fast = ema(tail(prices, config.trend_fast_period * 2), config.trend_fast_period);
    let slow = ema(tail(prices, config.trend_slow_period * 2), config.trend_slow_period);

    if fast > slow * (1.0 + config.trend_band) {
        Trend::Up
    } else if fast < slow * (1.0 - config.trend_band) {
        Trend::Down
    } else {
        Trend::Flat
    }
}

pub fn compute(
    market: &MarketContext,
    config: &IndicatorConfig,
) -> Result<IndicatorSnapshot, PipelineError> {
    let prices = market.prices();
    let volumes = market.volumes();

    let rsi = rsi(prices, config.rsi_period)?;
    let rsi_zone = if rsi > config.rsi_overbought {
        RsiZone::Overbought
    } else if rsi < config.rsi_oversold {
        RsiZone::Oversold
    } else {
        RsiZone::Neutral
    };

    let ema_short = ema(prices, config.ema_short_period);
    let ema_long = ema(prices, config.ema_long_period);

    let volume_avg = mean(tail(volumes, config.volume_window));
    let volume_current = volumes.last().copied().unwrap_or(0.0);
    let volume_ratio = if volume_avg > 0.0 {
        volume_current / volume_avg
    } else {
        1.0
    };

    let current_price = market.latest_price();
    let lookback = config.change_lookback;
    let price_change_pct = if lookback > 0 && prices.len() >= lookback {
        let base = prices[prices.len() - lookback];
        (current_price - base) / base * 100.0
    } else {
        0.0
    };

    Ok(IndicatorSnapshot {
        rsi,
        rsi_zone,
        ema_short,
        ema_long,
        ema_cross: ema_short > ema_long,
        trend: trend(prices, config),
        current_price,
        volume_avg,
        volume_current,
        volume_ratio,
        price_change_pct,
    })
}

/// Collapse a snapshot into the market signal.
pub fn market_signal(snapshot: &IndicatorSnapshot) -> Signal {
    let label = match snapshot.trend {
        Trend::Up => SignalLabel::Bullish,
        Trend::Down => SignalLabel::Bearish,
        Trend::Flat => return Signal::new(SignalSource::Market, SignalLabel::Neutral, 0.5),
    };

    let mut confidence = 0.5;
    let cross_agrees = match snapshot.trend {
        Trend::Up => snapshot.ema_cross,
        _ => !snapshot.ema_cross,
    };
    if cross_agrees {
        confidence += 0.2;
    }
    let rsi_contradicts = matches!(
        (snapshot.trend, snapshot.rsi_zone),
        (Trend::Up, RsiZone::Overbought) | (Trend::Down, RsiZone::Oversold)
    );
    if rsi_contradicts {
        confidence -= 0.15;
    }

    Signal::new(SignalSource::Market, label, confidence)
}

/// Memo key covering the symbol, every indicator parameter and the full series.
pub fn fingerprint(market: &MarketContext, config: &IndicatorConfig) -> String {
    Fingerprint::new("indicators/v1")
        .str(market.symbol())
        .usize(config.rsi_period)
        .f64(config.rsi_overbought)
        .f64(config.rsi_oversold)
        .usize(config.ema_short_period)
        .usize(config.ema_long_period)
        .usize(config.trend_fast_period)
        .usize(config.trend_slow_period)
        .f64(config.trend_band)
        .usize(config.volume_window)
        .usize(config.change_lookback)
        .f64s(market.prices())
        .f64s(market.volumes())
        .finish()
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
