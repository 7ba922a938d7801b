pub mod aggregator;
pub mod error;
pub mod indicator;
pub mod lifecycle;
pub mod ml;
pub mod pipeline;
pub mod risk;
pub mod rules;
pub mod sentiment;

pub mod test_support;

pub use error::{ErrorKind, PipelineError};
pub use indicator::IndicatorSnapshot;
pub use lifecycle::{Lifecycle, RequestStage};
pub use ml::{MlPrediction, MlScorer, MomentumModel, PriceModel};
pub use pipeline::{Pipeline, PipelineStatus};
pub use risk::{RiskGate, RiskInput};
pub use rules::RuleOutcome;
pub use sentiment::{CachedSentimentFeed, SentimentFeed, SentimentSummary};
