use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pipeline component produced a signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Market,
    Ml,
    Sentiment,
    Risk,
}

impl SignalSource {
    pub const ALL: [SignalSource; 4] = [
        SignalSource::Market,
        SignalSource::Ml,
        SignalSource::Sentiment,
        SignalSource::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Market => "market",
            SignalSource::Ml => "ml",
            SignalSource::Sentiment => "sentiment",
            SignalSource::Risk => "risk",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalLabel {
    Bullish,
    Bearish,
    Neutral,
    Proceed,
    Block,
}

impl SignalLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLabel::Bullish => "bullish",
            SignalLabel::Bearish => "bearish",
            SignalLabel::Neutral => "neutral",
            SignalLabel::Proceed => "proceed",
            SignalLabel::Block => "block",
        }
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's labelled assessment for a single request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub source: SignalSource,
    pub label: SignalLabel,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

impl Signal {
    /// Build a signal, clamping confidence into `[0, 1]` (non-finite becomes 0).
    pub fn new(source: SignalSource, label: SignalLabel, confidence: f64) -> Self {
        Self {
            source,
            label,
            confidence: clamp_unit(confidence),
        }
    }

    /// The fallback emitted when a source times out or is unavailable.
    pub fn neutral(source: SignalSource) -> Self {
        let label = match source {
            SignalSource::Risk => SignalLabel::Block,
            _ => SignalLabel::Neutral,
        };
        Self::new(source, label, 0.0)
    }
}

/// Clamp into `[0, 1]`, mapping NaN and infinities to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
