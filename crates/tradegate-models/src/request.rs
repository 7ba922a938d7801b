use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decision::TradeAction;
use crate::error::ValidationError;
use crate::market::MarketContext;
use crate::rule::Rule;

/// Incoming request for a trading decision, as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRequest {
    pub symbol: String,
    pub prices: Vec<f64>,
    pub volumes: Vec<f64>,
    #[serde(default)]
    pub proposed_action: TradeAction,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub proposed_size: Decimal,
    #[serde(default = "default_account_balance", with = "rust_decimal::serde::float")]
    pub account_balance: Decimal,
    /// 0 (extreme fear) to 100 (extreme greed).
    #[serde(default)]
    pub fear_greed_index: Option<f64>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// Open position values by symbol, used for the total exposure check.
    #[serde(default)]
    pub current_positions: Option<BTreeMap<String, Decimal>>,
    /// Entry price of an open position, used for the stop-loss check.
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub request_id: Option<String>,
}

fn default_account_balance() -> Decimal {
    Decimal::new(10_000, 0)
}

/// A request that passed ingestion checks. Nothing downstream re-validates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub market: MarketContext,
    pub proposed_action: TradeAction,
    pub proposed_size: Decimal,
    pub account_balance: Decimal,
    pub fear_greed_index: Option<f64>,
    pub rules: Vec<Rule>,
    pub current_positions: BTreeMap<String, Decimal>,
    pub entry_price: Option<f64>,
    pub request_id: Option<String>,
}

impl DecisionRequest {
    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        let market = MarketContext::new(self.symbol, self.prices, self.volumes)?;

        if self.proposed_size.is_sign_negative() && !self.proposed_size.is_zero() {
            return Err(ValidationError::InvalidAmount {
                field: "proposed_size",
                reason: format!("must not be negative, got {}", self.proposed_size),
            });
        }
        if self.account_balance.is_sign_negative() && !self.account_balance.is_zero() {
            return Err(ValidationError::InvalidAmount {
                field: "account_balance",
                reason: format!("must not be negative, got {}", self.account_balance),
            });
        }
        if let Some(index) = self.fear_greed_index {
            if !index.is_finite() || !(0.0..=100.0).contains(&index) {
                return Err(ValidationError::FearGreedOutOfRange(index));
            }
        }
        if let Some(entry) = self.entry_price {
            if !entry.is_finite() || entry <= 0.0 {
                return Err(ValidationError::InvalidAmount {
                    field: "entry_price",
                    reason: format!("must be positive, got {entry}"),
                });
            }
        }

        let current_positions = self.current_positions.unwrap_or_default();
        if let Some((symbol, value)) = current_positions
            .iter()
            .find(|(_, v)| v.is_sign_negative() && !v.is_zero())
        {
            return Err(ValidationError::InvalidAmount {
                field: "current_positions",
                reason: format!("position {symbol} has negative value {value}"),
            });
        }

        let rules = self.rules.unwrap_or_default();
        for rule in &rules {
            rule.validate()?;
        }

        Ok(ValidatedRequest {
            market,
            proposed_action: self.proposed_action,
            proposed_size: self.proposed_size,
            account_balance: self.account_balance,
            fear_greed_index: self.fear_greed_index,
            rules,
            current_positions,
            entry_price: self.entry_price,
            request_id: self.request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn example_json() -> serde_json::Value {
        serde_json::json!({
            "symbol": "BTC/USD",
            "prices": [50000, 50100, 50200, 50300, 50250, 50400, 50500, 50450, 50600, 50700],
            "volumes": [1000, 1100, 1050, 1200, 1150, 1300, 1250, 1400, 1350, 1500],
            "proposed_action": "buy",
            "proposed_size": 1000.0,
            "account_balance": 10000.0,
            "fear_greed_index": 65.0
        })
    }

    #[test]
    fn parses_example_request() {
        let request: DecisionRequest = serde_json::from_value(example_json()).unwrap();
        assert_eq!(request.proposed_action, TradeAction::Buy);
        assert_eq!(request.proposed_size, dec!(1000));
        assert_eq!(request.account_balance, dec!(10000));

        let validated = request.validate().unwrap();
        assert_eq!(validated.market.len(), 10);
        assert!(validated.rules.is_empty());
        assert!(validated.current_positions.is_empty());
    }

    #[test]
    fn applies_defaults() {
        let request: DecisionRequest = serde_json::from_value(serde_json::json!({
            "symbol": "ETH/USD",
            "prices": [3200],
            "volumes": [1000]
        }))
        .unwrap();
        assert_eq!(request.proposed_action, TradeAction::Hold);
        assert_eq!(request.proposed_size, Decimal::ZERO);
        assert_eq!(request.account_balance, dec!(10000));
        assert!(request.fear_greed_index.is_none());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut json = example_json();
        json["volumes"] = serde_json::json!([1000]);
        let request: DecisionRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(
            request.validate(),
            Err(ValidationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_negative_size() {
        let mut json = example_json();
        json["proposed_size"] = serde_json::json!(-5.0);
        let request: DecisionRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidAmount { field: "proposed_size", .. })
        ));
    }

    #[test]
    fn rejects_fear_greed_out_of_range() {
        let mut json = example_json();
        json["fear_greed_index"] = serde_json::json!(140.0);
        let request: DecisionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(
            request.validate(),
            Err(ValidationError::FearGreedOutOfRange(140.0))
        );
    }

    #[test]
    fn rejects_malformed_rule_at_ingestion() {
        let mut json = example_json();
        json["rules"] = serde_json::json!([{
            "name": "empty",
            "conditions": [],
            "action": "sell"
        }]);
        let request: DecisionRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidRule { .. })
        ));
    }

    #[test]
    fn rejects_negative_position() {
        let mut json = example_json();
        json["current_positions"] = serde_json::json!({"ETH/USD": -10});
        let request: DecisionRequest = serde_json::from_value(json).unwrap();
        assert!(request.validate().is_err());
    }
}
