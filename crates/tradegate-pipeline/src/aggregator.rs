//! Joins the per-source signals, rule outcome and risk assessment into one
//! [`Decision`].
//!
//! Precedence: a risk veto (or a missing risk assessment) forces hold; a fired
//! rule above the confidence threshold is authoritative; otherwise a strict
//! majority of market/ml/sentiment labels decides.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tradegate_models::{
    Decision, PipelineConfig, RiskAssessment, Signal, SignalLabel, SignalSource, TradeAction,
};

use crate::risk::risk_signal;
use crate::rules::RuleOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationInput {
    pub symbol: String,
    pub latest_price: f64,
    pub market: Signal,
    pub ml: Signal,
    pub sentiment: Signal,
    /// None when the risk gate timed out or failed.
    pub risk: Option<RiskAssessment>,
    pub rules: RuleOutcome,
    pub degraded: Vec<SignalSource>,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

fn label_action(label: SignalLabel) -> TradeAction {
    match label {
        SignalLabel::Bullish => TradeAction::Buy,
        SignalLabel::Bearish => TradeAction::Sell,
        _ => TradeAction::Hold,
    }
}

/// Strict majority (two of three or better) over the voting signals.
pub fn majority_vote(votes: &[Signal]) -> Option<(TradeAction, f64, Vec<SignalSource>)> {
    [TradeAction::Buy, TradeAction::Sell, TradeAction::Hold]
        .into_iter()
        .find_map(|action| {
            let agreeing: Vec<&Signal> = votes
                .iter()
                .filter(|s| label_action(s.label) == action)
                .collect();
            if agreeing.len() * 2 <= votes.len() {
                return None;
            }
            let mean = agreeing.iter().map(|s| s.confidence).sum::<f64>() / agreeing.len() as f64;
            let confidence = mean * agreeing.len() as f64 / votes.len() as f64;
            Some((action, confidence, agreeing.iter().map(|s| s.source).collect()))
        })
}

fn price_level(price: f64, offset: f64) -> Option<Decimal> {
    Decimal::from_f64(price * (1.0 + offset)).map(|d| d.round_dp(8))
}

fn join_sources(sources: &[SignalSource]) -> String {
    sources
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn aggregate(input: AggregationInput, config: &PipelineConfig) -> Decision {
    let mut signals = BTreeMap::from([
        (SignalSource::Market, input.market.label),
        (SignalSource::Ml, input.ml.label),
        (SignalSource::Sentiment, input.sentiment.label),
    ]);
    let risk_label = input
        .risk
        .as_ref()
        .map_or(SignalLabel::Block, |r| risk_signal(r).label);
    signals.insert(SignalSource::Risk, risk_label);

    let mut matched_rule = None;
    let mut vetoed = false;

    let (action, mut confidence, mut reasoning) = match &input.risk {
        None => (
            TradeAction::Hold,
            0.0,
            "Risk assessment unavailable; holding".to_string(),
        ),
        Some(r) if !r.passes => {
            vetoed = true;
            (
                TradeAction::Hold,
                1.0,
                format!("Risk veto: {}", r.reasons.join("; ")),
            )
        }
        Some(_) => match &input.rules.matched_rule {
            Some(name) if input.rules.confidence > config.rule_confidence_threshold => {
                matched_rule = Some(name.clone());
                (
                    input.rules.action,
                    input.rules.confidence,
                    format!(
                        "Rule '{name}' fired ({} of {} rules matched) and selects {}",
                        input.rules.fired.len(),
                        input.rules.evaluated,
                        input.rules.action
                    ),
                )
            }
            _ => match majority_vote(&[input.market, input.ml, input.sentiment]) {
                Some((action, confidence, sources)) => (
                    action,
                    confidence,
                    format!(
                        "Majority vote: {} of 3 sources ({}) favour {action}",
                        sources.len(),
                        join_sources(&sources)
                    ),
                ),
                None => (
                    TradeAction::Hold,
                    0.0,
                    "No majority among market, ml and sentiment; holding".to_string(),
                ),
            },
        },
    };

    let degraded_voters: Vec<SignalSource> = input
        .degraded
        .iter()
        .copied()
        .filter(|s| *s != SignalSource::Risk)
        .collect();
    if !vetoed && !degraded_voters.is_empty() {
        confidence *= config
            .degraded_confidence_factor
            .powi(degraded_voters.len() as i32);
        reasoning.push_str(&format!(
            ". Degraded sources: {}",
            join_sources(&degraded_voters)
        ));
    }
    if let Some(r) = &input.risk {
        if !r.warnings.is_empty() {
            reasoning.push_str(&format!(". Warnings: {}", r.warnings.join("; ")));
        }
    }

    let (stop_loss, take_profit) = match action {
        TradeAction::Buy => (
            price_level(input.latest_price, -config.stop_loss_pct),
            price_level(input.latest_price, config.take_profit_pct),
        ),
        TradeAction::Sell => (
            price_level(input.latest_price, config.stop_loss_pct),
            price_level(input.latest_price, -config.take_profit_pct),
        ),
        TradeAction::Hold => (None, None),
    };

    let position_size = match (action, &input.risk) {
        (TradeAction::Hold, _) | (_, None) => Decimal::ZERO,
        (_, Some(r)) => r.adjusted_size,
    };

    let mut degraded_sources = input.degraded;
    degraded_sources.sort();
    degraded_sources.dedup();

    Decision {
        symbol: input.symbol,
        action,
        confidence: tradegate_models::signal::clamp_unit(confidence),
        reasoning,
        position_size,
        stop_loss,
        take_profit,
        risk_score: input.risk.as_ref().map_or(1.0, |r| r.risk_score),
        signals,
        matched_rule,
        degraded_sources,
        timestamp: input.timestamp,
        request_id: input.request_id,
    }
}
