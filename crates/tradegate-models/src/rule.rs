use serde::{Deserialize, Serialize};

use crate::decision::TradeAction;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RuleLogic {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    In,
    NotIn,
}

impl Operator {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte)
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// A single `field operator value` test against the feature map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Dotted path into the feature map, e.g. `market.rsi`.
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

/// A user-authored conditional mapping from features to an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub action: TradeAction,
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default = "default_rule_confidence")]
    pub confidence: f64,
}

fn default_rule_confidence() -> f64 {
    1.0
}

impl Rule {
    /// Structural checks performed at ingestion, before any evaluation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidRule {
            rule: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.conditions.is_empty() {
            return Err(invalid("at least one condition is required".to_string()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid(format!(
                "confidence must be within 0..=1, got {}",
                self.confidence
            )));
        }

        for condition in &self.conditions {
            if condition.field.split('.').any(|segment| segment.trim().is_empty()) {
                return Err(invalid(format!("invalid field path '{}'", condition.field)));
            }
            if condition.operator.is_numeric() && !condition.value.is_number() {
                return Err(invalid(format!(
                    "operator {:?} on '{}' needs a numeric value",
                    condition.operator, condition.field
                )));
            }
            if condition.operator.is_membership() && !condition.value.is_array() {
                return Err(invalid(format!(
                    "operator {:?} on '{}' needs an array value",
                    condition.operator, condition.field
                )));
            }
        }

        Ok(())
    }
}
