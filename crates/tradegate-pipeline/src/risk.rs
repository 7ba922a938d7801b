use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tradegate_models::{RiskAssessment, RiskConfig, Signal, SignalLabel, SignalSource, TradeAction};

/// Everything the risk gate looks at for one proposed trade.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInput {
    pub action: TradeAction,
    pub proposed_size: Decimal,
    pub account_balance: Decimal,
    /// Volatility estimate from the ML scorer.
    pub volatility: f64,
    pub current_positions: BTreeMap<String, Decimal>,
    pub entry_price: Option<f64>,
    pub latest_price: f64,
}

/// Deterministic position and volatility limits. Never retries.
#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, input: &RiskInput) -> RiskAssessment {
        let limit = input
            .account_balance
            .checked_mul(self.config.max_position_pct)
            .unwrap_or(Decimal::MAX);
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        if input.proposed_size > limit {
            reasons.push(format!(
                "Position size {} exceeds limit {} ({} of balance {})",
                input.proposed_size.normalize(),
                limit.normalize(),
                self.config.max_position_pct.normalize(),
                input.account_balance.normalize()
            ));
        }

        if input.volatility > self.config.max_volatility {
            reasons.push(format!(
                "Volatility {:.4} exceeds maximum {:.4}",
                input.volatility, self.config.max_volatility
            ));
        }

        if input.action == TradeAction::Buy {
            let max_exposure = input
                .account_balance
                .checked_mul(self.config.max_total_exposure)
                .unwrap_or(Decimal::MAX);
            let exposure = input
                .current_positions
                .values()
                .try_fold(input.proposed_size, |acc, v| acc.checked_add(*v));
            match exposure {
                Some(exposure) if exposure <= max_exposure => {}
                Some(exposure) => reasons.push(format!(
                    "Total exposure {} exceeds maximum {}",
                    exposure.normalize(),
                    max_exposure.normalize()
                )),
                None => reasons.push(format!(
                    "Total exposure overflows; exceeds maximum {}",
                    max_exposure.normalize()
                )),
            }
        }

        // Stop-loss only concerns an open position being held or closed.
        if let Some(entry) = input
            .entry_price
            .filter(|_| input.action != TradeAction::Buy)
        {
            let loss = (entry - input.latest_price) / entry;
            if loss >= self.config.stop_loss_pct {
                warnings.push(format!(
                    "Stop-loss triggered: price {} is {:.2}% below entry {}",
                    input.latest_price,
                    loss * 100.0,
                    entry
                ));
            }
        }

        let passes = reasons.is_empty();
        let (adjusted_size, risk_score) = if passes {
            let size = input.proposed_size.min(limit);
            (size, self.score(size, limit, input.volatility))
        } else {
            (Decimal::ZERO, 1.0)
        };

        RiskAssessment {
            passes,
            adjusted_size,
            reasons,
            warnings,
            risk_score,
        }
    }

    fn score(&self, size: Decimal, limit: Decimal, volatility: f64) -> f64 {
        let size_ratio = if limit.is_zero() {
            if size.is_zero() {
                0.0
            } else {
                1.0
            }
        } else {
            (size / limit).to_f64().unwrap_or(1.0).min(1.0)
        };
        let vol_ratio = if self.config.max_volatility > 0.0 {
            (volatility / self.config.max_volatility).min(1.0)
        } else if volatility > 0.0 {
            1.0
        } else {
            0.0
        };
        (0.5 * size_ratio + 0.5 * vol_ratio).clamp(0.0, 1.0)
    }
}

/// Proceed with confidence `1 - risk_score`, or block with full confidence.
pub fn risk_signal(assessment: &RiskAssessment) -> Signal {
    if assessment.passes {
        Signal::new(SignalSource::Risk, SignalLabel::Proceed, 1.0 - assessment.risk_score)
    } else {
        Signal::new(SignalSource::Risk, SignalLabel::Block, 1.0)
    }
}
