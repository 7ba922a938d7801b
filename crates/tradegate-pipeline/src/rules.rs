//! User rules evaluated against a feature map.
//!
//! The feature map is a JSON object with one section per available source
//! (`market`, `ml`, `sentiment`); conditions address it with dotted paths
//! such as `market.rsi`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tradegate_models::{Condition, Operator, Rule, RuleLogic, TradeAction};

use crate::error::PipelineError;
use crate::indicator::IndicatorSnapshot;
use crate::ml::MlPrediction;
use crate::sentiment::SentimentSummary;

/// Build the feature map. A `None` source contributes no section.
pub fn build_features(
    indicators: Option<&IndicatorSnapshot>,
    ml: Option<(&MlPrediction, f64)>,
    sentiment: Option<&SentimentSummary>,
) -> Value {
    let mut features = Map::new();

    if let Some(s) = indicators {
        features.insert(
            "market".to_string(),
            json!({
                "rsi": s.rsi,
                "rsi_zone": s.rsi_zone.as_str(),
                "trend": s.trend.as_str(),
                "ema_cross": s.ema_cross,
                "ema_short": s.ema_short,
                "ema_long": s.ema_long,
                "current_price": s.current_price,
                "volume_avg": s.volume_avg,
                "volume_current": s.volume_current,
                "volume_ratio": s.volume_ratio,
                "price_change_pct": s.price_change_pct,
            }),
        );
    }
    if let Some((prediction, neutral_band)) = ml {
        features.insert(
            "ml".to_string(),
            json!({
                "up_probability": prediction.up_probability,
                "volatility": prediction.volatility,
                "confidence": prediction.confidence,
                "direction": prediction.direction(neutral_band),
            }),
        );
    }
    if let Some(summary) = sentiment {
        features.insert(
            "sentiment".to_string(),
            json!({
                "score": summary.score,
                "magnitude": summary.magnitude,
                "polarity": summary.polarity,
            }),
        );
    }

    Value::Object(features)
}

/// Resolve a dotted path such as `market.rsi`.
pub fn lookup<'a>(features: &'a Value, path: &str) -> Result<&'a Value, PipelineError> {
    path.split('.')
        .try_fold(features, |node, segment| node.get(segment))
        .ok_or_else(|| PipelineError::UnknownField(path.to_string()))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub fn evaluate_condition(condition: &Condition, features: &Value) -> Result<bool, PipelineError> {
    let actual = lookup(features, &condition.field)?;
    let expected = &condition.value;

    let result = match condition.operator {
        Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(e)) => match condition.operator {
                    Operator::Lt => a < e,
                    Operator::Gt => a > e,
                    Operator::Lte => a <= e,
                    _ => a >= e,
                },
                _ => false,
            }
        }
        Operator::Eq => values_equal(actual, expected),
        Operator::Neq => !values_equal(actual, expected),
        Operator::In | Operator::NotIn => {
            let contained = expected
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(actual, item)));
            (condition.operator == Operator::In) == contained
        }
    };
    Ok(result)
}

pub fn rule_fires(rule: &Rule, features: &Value) -> Result<bool, PipelineError> {
    // Every condition is resolved so an unknown path always surfaces.
    let results = rule
        .conditions
        .iter()
        .map(|c| evaluate_condition(c, features))
        .collect::<Result<Vec<bool>, _>>()?;

    Ok(match rule.logic {
        RuleLogic::And => results.iter().all(|r| *r),
        RuleLogic::Or => results.iter().any(|r| *r),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub action: TradeAction,
    pub confidence: f64,
    /// The winning rule, if any fired.
    pub matched_rule: Option<String>,
    /// Every rule that fired, in declaration order.
    pub fired: Vec<String>,
    pub evaluated: usize,
}

impl RuleOutcome {
    pub fn none(evaluated: usize) -> Self {
        Self {
            action: TradeAction::Hold,
            confidence: 0.0,
            matched_rule: None,
            fired: Vec::new(),
            evaluated,
        }
    }
}

/// Evaluate all rules. Highest confidence wins; ties go to the first declared.
pub fn evaluate(rules: &[Rule], features: &Value) -> Result<RuleOutcome, PipelineError> {
    let mut winner: Option<&Rule> = None;
    let mut fired = Vec::new();

    for rule in rules {
        if !rule_fires(rule, features)? {
            continue;
        }
        fired.push(rule.name.clone());
        if winner.map_or(true, |w| rule.confidence > w.confidence) {
            winner = Some(rule);
        }
    }

    Ok(match winner {
        Some(rule) => RuleOutcome {
            action: rule.action,
            confidence: rule.confidence,
            matched_rule: Some(rule.name.clone()),
            fired,
            evaluated: rules.len(),
        },
        None => RuleOutcome::none(rules.len()),
    })
}
