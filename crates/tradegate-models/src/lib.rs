pub mod config;
pub mod decision;
pub mod error;
pub mod market;
pub mod request;
pub mod risk;
pub mod rule;
pub mod sentiment;
pub mod signal;

pub use config::{
    CacheConfig, IndicatorConfig, MlConfig, PipelineConfig, RiskConfig, SentimentConfig,
    ServerConfig, TradegateConfig,
};
pub use decision::{Decision, TradeAction};
pub use error::ValidationError;
pub use market::MarketContext;
pub use request::{DecisionRequest, ValidatedRequest};
pub use risk::RiskAssessment;
pub use rule::{Condition, Operator, Rule, RuleLogic};
pub use sentiment::{Polarity, SentimentReading, SentimentScore};
pub use signal::{Signal, SignalLabel, SignalSource};
