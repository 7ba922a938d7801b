use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tradegate_cache::MemoCache;
use tradegate_models::{
    Decision, DecisionRequest, MarketContext, Signal, SignalSource, TradegateConfig,
    ValidatedRequest,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{self, AggregationInput};
use crate::error::PipelineError;
use crate::indicator::{self, IndicatorSnapshot};
use crate::lifecycle::{Lifecycle, RequestStage};
use crate::ml::{self, MlScore, MlScorer, MomentumModel, PriceModel};
use crate::risk::{RiskGate, RiskInput};
use crate::rules::{self, RuleOutcome};
use crate::sentiment::{self, SentimentFeed, SentimentSummary};

/// Read-only view of how a pipeline is wired, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub ml_model: Option<String>,
    pub sentiment_feed: Option<String>,
    pub source_timeout_ms: u64,
    pub risk_timeout_ms: u64,
    pub memoized_indicators: u64,
}

/// The decision pipeline coordinates the sources and produces a Decision.
///
/// Indicator, ML and sentiment run as independent tasks with a per-source
/// deadline; a source that misses it is replaced by a neutral signal and its
/// task is left to finish on its own. Rules run on the joined features, then
/// the risk gate runs under its own deadline.
pub struct Pipeline {
    config: Arc<TradegateConfig>,
    model: Option<Arc<dyn PriceModel>>,
    sentiment_feed: Option<Arc<dyn SentimentFeed>>,
    risk_gate: Arc<RiskGate>,
    indicator_memo: Arc<MemoCache<Arc<IndicatorSnapshot>>>,
}

impl Pipeline {
    /// Default wiring: the momentum model when ML is enabled, no sentiment feed.
    pub fn new(config: TradegateConfig) -> Self {
        let model: Option<Arc<dyn PriceModel>> = if config.ml.enabled {
            Some(Arc::new(MomentumModel))
        } else {
            None
        };
        let indicator_memo = MemoCache::new(
            config.cache.memory_max_capacity,
            Duration::from_secs(config.cache.indicator_ttl_seconds),
        );

        Self {
            risk_gate: Arc::new(RiskGate::new(config.risk.clone())),
            config: Arc::new(config),
            model,
            sentiment_feed: None,
            indicator_memo: Arc::new(indicator_memo),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn PriceModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn without_model(mut self) -> Self {
        self.model = None;
        self
    }

    pub fn with_sentiment_feed(mut self, feed: Arc<dyn SentimentFeed>) -> Self {
        self.sentiment_feed = Some(feed);
        self
    }

    pub fn config(&self) -> &TradegateConfig {
        &self.config
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            ml_model: self.model.as_ref().map(|m| m.name().to_string()),
            sentiment_feed: self.sentiment_feed.as_ref().map(|f| f.name().to_string()),
            source_timeout_ms: self.config.pipeline.source_timeout_ms,
            risk_timeout_ms: self.config.pipeline.risk_timeout_ms,
            memoized_indicators: self.indicator_memo.entry_count(),
        }
    }

    /// The memoized snapshot for this market, if one was computed within the TTL.
    pub async fn cached_indicators(&self, market: &MarketContext) -> Option<Arc<IndicatorSnapshot>> {
        let key = indicator::fingerprint(market, &self.config.indicators);
        self.indicator_memo.get(&key).await
    }

    /// Validate a wire request and run it.
    pub async fn decide(&self, request: DecisionRequest) -> Result<Decision, PipelineError> {
        let symbol = request.symbol.clone();
        let validated = request.validate().map_err(|e| {
            warn!(symbol = %symbol, error = %e, "Rejected malformed request");
            PipelineError::from(e)
        })?;
        self.run(validated).await
    }

    pub async fn run(&self, request: ValidatedRequest) -> Result<Decision, PipelineError> {
        let start = Instant::now();
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let symbol = request.market.symbol().to_string();
        let mut lifecycle = Lifecycle::new();
        info!(symbol = %symbol, request_id = %request_id, samples = request.market.len(), "Starting decision");

        let market = Arc::new(request.market.clone());
        let source_timeout = Duration::from_millis(self.config.pipeline.source_timeout_ms);

        // 1. Fan out the independent sources
        let indicator_task = self.spawn_indicators(Arc::clone(&market));
        let ml_task = self.spawn_ml(Arc::clone(&market));
        let sentiment_task = self.spawn_sentiment(Arc::clone(&market), request.fear_greed_index);

        let (indicators, ml, sentiment) = tokio::join!(
            join_source(SignalSource::Market, indicator_task, source_timeout),
            join_source(SignalSource::Ml, ml_task, source_timeout),
            join_source(SignalSource::Sentiment, sentiment_task, source_timeout),
        );

        // 2. Collapse into signals, degrading whatever is missing
        let mut degraded = Vec::new();

        let snapshot = match indicators {
            Some(Ok(snapshot)) => Some(snapshot),
            Some(Err(e)) => {
                warn!(symbol = %symbol, kind = %e.kind(), error = %e, "Indicators unavailable");
                None
            }
            None => None,
        };
        let market_signal = match &snapshot {
            Some(s) => indicator::market_signal(s),
            None => {
                degraded.push(SignalSource::Market);
                Signal::neutral(SignalSource::Market)
            }
        };

        let ml_score = ml.unwrap_or_else(MlScore::fallback);
        let neutral_band = self.config.ml.neutral_band;
        let ml_signal = if ml_score.degraded {
            degraded.push(SignalSource::Ml);
            Signal::neutral(SignalSource::Ml)
        } else {
            ml::ml_signal(&ml_score.prediction, neutral_band)
        };

        let summary: Option<SentimentSummary> = match sentiment {
            Some(Ok(summary)) => Some(summary),
            Some(Err(e)) => {
                warn!(symbol = %symbol, kind = %e.kind(), error = %e, "Sentiment unavailable");
                None
            }
            None => None,
        };
        let sentiment_signal = match &summary {
            Some(s) => sentiment::sentiment_signal(s),
            None => {
                degraded.push(SignalSource::Sentiment);
                Signal::neutral(SignalSource::Sentiment)
            }
        };

        // 3. Rules over the joined features
        advance(&mut lifecycle, RequestStage::Evaluating)?;
        let outcome = if request.rules.is_empty() {
            RuleOutcome::none(0)
        } else {
            let features = rules::build_features(
                snapshot.as_deref(),
                (!ml_score.degraded).then_some((&ml_score.prediction, neutral_band)),
                summary.as_ref(),
            );
            rules::evaluate(&request.rules, &features).unwrap_or_else(|e| {
                warn!(symbol = %symbol, kind = %e.kind(), error = %e, "Rule evaluation failed, ignoring rules");
                RuleOutcome::none(request.rules.len())
            })
        };
        debug!(symbol = %symbol, fired = ?outcome.fired, "Rules evaluated");

        // 4. Mandatory risk gate
        advance(&mut lifecycle, RequestStage::RiskChecking)?;
        let volatility = if ml_score.degraded {
            MomentumModel::volatility(market.prices())
        } else {
            ml_score.prediction.volatility
        };
        let risk_input = RiskInput {
            action: request.proposed_action,
            proposed_size: request.proposed_size,
            account_balance: request.account_balance,
            volatility,
            current_positions: request.current_positions.clone(),
            entry_price: request.entry_price,
            latest_price: market.latest_price(),
        };
        let gate = Arc::clone(&self.risk_gate);
        let risk_task = tokio::spawn(async move { gate.assess(&risk_input) });
        let risk = join_source(
            SignalSource::Risk,
            risk_task,
            Duration::from_millis(self.config.pipeline.risk_timeout_ms),
        )
        .await;
        if risk.is_none() {
            degraded.push(SignalSource::Risk);
        }

        if let Err(err) = ensure_not_exhausted(&degraded) {
            error!(symbol = %symbol, request_id = %request_id, "All sources degraded");
            lifecycle
                .fail(err.kind())
                .map_err(|e| PipelineError::Internal(e.to_string()))?;
            return Err(err);
        }

        // 5. Join
        advance(&mut lifecycle, RequestStage::Aggregated)?;
        let decision = aggregator::aggregate(
            AggregationInput {
                symbol: symbol.clone(),
                latest_price: market.latest_price(),
                market: market_signal,
                ml: ml_signal,
                sentiment: sentiment_signal,
                risk,
                rules: outcome,
                degraded,
                request_id,
                timestamp: Utc::now(),
            },
            &self.config.pipeline,
        );
        advance(&mut lifecycle, RequestStage::Emitted)?;

        info!(
            symbol = %symbol,
            request_id = %decision.request_id,
            action = %decision.action,
            confidence = decision.confidence,
            degraded = decision.degraded_sources.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Decision emitted"
        );

        Ok(decision)
    }

    fn spawn_indicators(
        &self,
        market: Arc<MarketContext>,
    ) -> JoinHandle<Result<Arc<IndicatorSnapshot>, Arc<PipelineError>>> {
        let memo = Arc::clone(&self.indicator_memo);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            let key = indicator::fingerprint(&market, &config.indicators);
            memo.get_or_try_compute(key, async {
                indicator::compute(&market, &config.indicators).map(Arc::new)
            })
            .await
        })
    }

    fn spawn_ml(&self, market: Arc<MarketContext>) -> JoinHandle<MlScore> {
        let scorer = MlScorer::new(self.model.clone(), self.config.ml.neutral_band);
        tokio::spawn(async move { scorer.score(&market).await })
    }

    fn spawn_sentiment(
        &self,
        market: Arc<MarketContext>,
        fear_greed_index: Option<f64>,
    ) -> JoinHandle<Result<SentimentSummary, PipelineError>> {
        let feed = self.sentiment_feed.clone();
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            let readings = match &feed {
                Some(feed) => match feed.readings(market.symbol()).await {
                    Ok(readings) => readings,
                    // The request's own index can still carry the source.
                    Err(e) if fear_greed_index.is_some() => {
                        warn!(feed = feed.name(), error = %e, "Sentiment feed failed");
                        Vec::new()
                    }
                    Err(e) => return Err(e),
                },
                None => Vec::new(),
            };
            let scores = sentiment::collect_scores(&readings, fear_greed_index, &config.sentiment);
            sentiment::aggregate(&scores, &config.sentiment)
        })
    }
}

/// A request fails outright only when every source, risk included, fell back.
fn ensure_not_exhausted(degraded: &[SignalSource]) -> Result<(), PipelineError> {
    if SignalSource::ALL.iter().all(|s| degraded.contains(s)) {
        Err(PipelineError::Exhausted)
    } else {
        Ok(())
    }
}

fn advance(lifecycle: &mut Lifecycle, to: RequestStage) -> Result<(), PipelineError> {
    lifecycle
        .advance(to)
        .map_err(|e| PipelineError::Internal(e.to_string()))
}

/// Await a source task under a deadline. On expiry the task is detached, not aborted.
async fn join_source<T>(source: SignalSource, handle: JoinHandle<T>, deadline: Duration) -> Option<T> {
    let started = Instant::now();
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(value)) => {
            debug!(source = %source, elapsed_ms = started.elapsed().as_millis() as u64, "Source completed");
            Some(value)
        }
        Ok(Err(e)) => {
            error!(source = %source, error = %e, "Source task panicked");
            None
        }
        Err(_) => {
            let err = PipelineError::CollaboratorTimeout {
                component: source,
                timeout_ms: deadline.as_millis() as u64,
            };
            warn!(source = %source, error = %err, "Using neutral fallback");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request, rising_prices, FixedModel, SlowModel};
    use tradegate_models::TradeAction;

    fn fast_config() -> TradegateConfig {
        let mut config = TradegateConfig::default();
        config.pipeline.source_timeout_ms = 100;
        config.pipeline.risk_timeout_ms = 100;
        config
    }

    #[tokio::test]
    async fn short_series_degrades_market_only() {
        let pipeline = Pipeline::new(fast_config()).with_model(Arc::new(FixedModel::new(0.75, 0.01)));
        let mut req = request("BTC/USD", rising_prices(5, 100.0, 1.0));
        req.fear_greed_index = Some(80.0);

        let decision = pipeline.decide(req).await.unwrap();
        assert_eq!(decision.degraded_sources, vec![SignalSource::Market]);
        // ml and sentiment agree: buy at mean(0.5, 0.6) * 2/3 * 0.75
        assert_eq!(decision.action, TradeAction::Buy);
        assert!((decision.confidence - 0.275).abs() < 1e-9);
    }

    #[tokio::test]
    async fn slow_model_times_out_to_neutral() {
        let pipeline = Pipeline::new(fast_config())
            .with_model(Arc::new(SlowModel::new(Duration::from_millis(500))));
        let mut req = request("BTC/USD", rising_prices(30, 100.0, 1.0));
        req.fear_greed_index = Some(80.0);

        let started = Instant::now();
        let decision = pipeline.decide(req).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(450));
        assert!(decision.degraded_sources.contains(&SignalSource::Ml));
        assert_eq!(decision.signals[&SignalSource::Ml], tradegate_models::SignalLabel::Neutral);
    }

    #[tokio::test]
    async fn indicator_snapshot_is_memoized() {
        let pipeline = Pipeline::new(fast_config());
        let req = request("ETH/USD", rising_prices(30, 100.0, 1.0));
        let market = req.clone().validate().unwrap().market;

        assert!(pipeline.cached_indicators(&market).await.is_none());
        pipeline.decide(req).await.unwrap();
        assert!(pipeline.cached_indicators(&market).await.is_some());
    }

    #[test]
    fn exhaustion_needs_every_source() {
        let mut degraded = vec![SignalSource::Market, SignalSource::Ml, SignalSource::Sentiment];
        assert!(ensure_not_exhausted(&degraded).is_ok());
        degraded.push(SignalSource::Risk);
        assert!(matches!(
            ensure_not_exhausted(&degraded),
            Err(PipelineError::Exhausted)
        ));
    }

    #[tokio::test]
    async fn status_reports_wiring() {
        let pipeline = Pipeline::new(fast_config());
        let status = pipeline.status();
        assert_eq!(status.ml_model.as_deref(), Some("momentum"));
        assert!(status.sentiment_feed.is_none());

        let status = Pipeline::new(fast_config()).without_model().status();
        assert!(status.ml_model.is_none());
    }
}
