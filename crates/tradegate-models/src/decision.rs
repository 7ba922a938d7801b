use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::signal::{SignalLabel, SignalSource};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub symbol: String,
    pub action: TradeAction,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub reasoning: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub position_size: Decimal,
    /// None when the action is hold.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub stop_loss: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub take_profit: Option<Decimal>,
    /// 0.0 (benign) to 1.0 (blocked).
    pub risk_score: f64,
    /// Always holds exactly one label per [`SignalSource`].
    pub signals: BTreeMap<SignalSource, SignalLabel>,
    /// Name of the user rule that decided the action, if any.
    pub matched_rule: Option<String>,
    /// Sources that fell back to a neutral signal during this run.
    pub degraded_sources: Vec<SignalSource>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}
