use thiserror::Error;

/// Reasons a request or one of its parts is rejected at ingestion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("price series must not be empty")]
    EmptySeries,

    #[error("prices and volumes differ in length: {prices} prices, {volumes} volumes")]
    LengthMismatch { prices: usize, volumes: usize },

    #[error("invalid price at index {index}: {value}")]
    InvalidPrice { index: usize, value: f64 },

    #[error("invalid volume at index {index}: {value}")]
    InvalidVolume { index: usize, value: f64 },

    #[error("invalid {field}: {reason}")]
    InvalidAmount { field: &'static str, reason: String },

    #[error("fear & greed index must be within 0..=100, got {0}")]
    FearGreedOutOfRange(f64),

    #[error("rule '{rule}' is malformed: {reason}")]
    InvalidRule { rule: String, reason: String },
}
