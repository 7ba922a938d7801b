use serde::Serialize;

use crate::error::ValidationError;

/// Smallest accepted price. Protective levels are rounded to 8 decimal
/// places, so anything smaller would collapse toward zero.
pub const MIN_PRICE: f64 = 1e-6;

/// Largest accepted price. Keeps protective levels well inside `Decimal` range.
pub const MAX_PRICE: f64 = 1e15;

/// A validated, chronologically ordered market series for one symbol.
///
/// Only constructible through [`MarketContext::new`], so every instance holds
/// non-empty, equal-length, finite samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketContext {
    symbol: String,
    prices: Vec<f64>,
    volumes: Vec<f64>,
}

impl MarketContext {
    pub fn new(
        symbol: impl Into<String>,
        prices: Vec<f64>,
        volumes: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if prices.is_empty() {
            return Err(ValidationError::EmptySeries);
        }
        if prices.len() != volumes.len() {
            return Err(ValidationError::LengthMismatch {
                prices: prices.len(),
                volumes: volumes.len(),
            });
        }
        if let Some((index, &value)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !(MIN_PRICE..=MAX_PRICE).contains(*p))
        {
            return Err(ValidationError::InvalidPrice { index, value });
        }
        if let Some((index, &value)) = volumes
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ValidationError::InvalidVolume { index, value });
        }

        Ok(Self {
            symbol,
            prices,
            volumes,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Always false for a constructed context; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn latest_price(&self) -> f64 {
        // Non-empty by construction.
        self.prices[self.prices.len() - 1]
    }
}
