use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tradegate_models::{SignalSource, ValidationError};

/// Stable classification of pipeline failures, used in logs and API error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    NoSentimentData,
    UnknownField,
    CollaboratorTimeout,
    CollaboratorUnavailable,
    MalformedRequest,
    Exhausted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::NoSentimentData => "no_sentiment_data",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::CollaboratorTimeout => "collaborator_timeout",
            ErrorKind::CollaboratorUnavailable => "collaborator_unavailable",
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether this kind fails the whole request rather than degrading one source.
    pub fn is_request_level(&self) -> bool {
        matches!(self, ErrorKind::MalformedRequest | ErrorKind::Exhausted)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Insufficient data for {indicator}: need {required} samples, have {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("No sentiment sources available")]
    NoSentimentData,

    #[error("Unknown feature path: {0}")]
    UnknownField(String),

    #[error("{component} timed out after {timeout_ms} ms")]
    CollaboratorTimeout {
        component: SignalSource,
        timeout_ms: u64,
    },

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] ValidationError),

    #[error("All sources degraded, no decision can be made")]
    Exhausted,

    #[error("Cache error: {0}")]
    Cache(#[from] tradegate_cache::CacheError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InsufficientData { .. } => ErrorKind::InsufficientData,
            PipelineError::NoSentimentData => ErrorKind::NoSentimentData,
            PipelineError::UnknownField(_) => ErrorKind::UnknownField,
            PipelineError::CollaboratorTimeout { .. } => ErrorKind::CollaboratorTimeout,
            PipelineError::CollaboratorUnavailable(_) | PipelineError::Cache(_) => {
                ErrorKind::CollaboratorUnavailable
            }
            PipelineError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            PipelineError::Exhausted => ErrorKind::Exhausted,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}
