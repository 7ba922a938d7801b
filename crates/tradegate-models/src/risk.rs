use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of the risk gate for one proposed trade.
///
/// `passes == false` is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub passes: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub adjusted_size: Decimal,
    /// Why the trade was blocked. Empty when `passes` is true.
    pub reasons: Vec<String>,
    /// Non-blocking observations (e.g. a triggered stop-loss on an open position).
    pub warnings: Vec<String>,
    /// 0.0 (benign) to 1.0 (blocked).
    pub risk_score: f64,
}
