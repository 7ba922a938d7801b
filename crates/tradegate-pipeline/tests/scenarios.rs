//! End-to-end decision scenarios.
//!
//! Each test wires a `Pipeline` with deterministic collaborators from
//! `test_support`, feeds it a realistic request and checks the full Decision.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tradegate_cache::{SentimentReader, SentimentStore};
use tradegate_models::{
    Condition, IndicatorConfig, MarketContext, Operator, Rule, RuleLogic, SentimentConfig,
    SentimentReading, SentimentScore, SignalLabel, SignalSource, TradeAction, TradegateConfig,
};
use tradegate_pipeline::indicator;
use tradegate_pipeline::sentiment::aggregate;
use tradegate_pipeline::test_support::{
    bullish_buy_request, falling_prices, request, rising_prices, FailingSentimentFeed, FixedModel,
    StaticSentimentFeed,
};
use tradegate_pipeline::{CachedSentimentFeed, ErrorKind, Pipeline};

fn pipeline() -> Pipeline {
    Pipeline::new(TradegateConfig::default()).with_model(Arc::new(FixedModel::new(0.75, 0.01)))
}

fn rule(name: &str, action: TradeAction, confidence: f64, conditions: Vec<Condition>) -> Rule {
    Rule {
        name: name.to_string(),
        conditions,
        action,
        logic: RuleLogic::And,
        confidence,
    }
}

fn condition(field: &str, operator: Operator, value: serde_json::Value) -> Condition {
    Condition {
        field: field.to_string(),
        operator,
        value,
    }
}

#[tokio::test]
async fn rising_market_within_limits_buys() {
    let decision = pipeline()
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();

    assert_eq!(decision.action, TradeAction::Buy);
    assert_eq!(decision.signals[&SignalSource::Market], SignalLabel::Bullish);
    assert_eq!(decision.signals[&SignalSource::Ml], SignalLabel::Bullish);
    assert_eq!(decision.signals[&SignalSource::Sentiment], SignalLabel::Bullish);
    assert_eq!(decision.signals[&SignalSource::Risk], SignalLabel::Proceed);
    assert_eq!(decision.position_size, dec!(1000));
    assert!(decision.degraded_sources.is_empty());
    assert!(decision.matched_rule.is_none());

    // market 0.55 (overbought uptrend), ml 0.5, sentiment 0.6
    assert!((decision.confidence - 0.55).abs() < 1e-9);

    let stop_loss = decision.stop_loss.unwrap();
    let take_profit = decision.take_profit.unwrap();
    assert!(stop_loss < Decimal::from(129));
    assert!(take_profit > Decimal::from(129));
    assert_eq!(decision.request_id, "scenario");
}

#[tokio::test]
async fn oversized_position_forces_hold() {
    let decision = pipeline()
        .decide(bullish_buy_request(dec!(50000), dec!(10000)))
        .await
        .unwrap();

    assert_eq!(decision.action, TradeAction::Hold);
    assert_eq!(decision.confidence, 1.0);
    assert_eq!(decision.signals[&SignalSource::Risk], SignalLabel::Block);
    // The other sources are still reported.
    assert_eq!(decision.signals[&SignalSource::Market], SignalLabel::Bullish);
    assert_eq!(decision.position_size, Decimal::ZERO);
    assert!(decision.stop_loss.is_none());
    assert_eq!(decision.risk_score, 1.0);
    assert!(decision.reasoning.starts_with("Risk veto"));
}

#[tokio::test]
async fn falling_market_sells() {
    let mut req = request("ETH/USD", falling_prices(30, 200.0, 2.0));
    req.proposed_action = TradeAction::Sell;
    req.proposed_size = dec!(500);
    req.fear_greed_index = Some(15.0);

    let pipeline = Pipeline::new(TradegateConfig::default())
        .with_model(Arc::new(FixedModel::new(0.2, 0.01)));
    let decision = pipeline.decide(req).await.unwrap();

    assert_eq!(decision.action, TradeAction::Sell);
    assert_eq!(decision.position_size, dec!(500));
    assert!(decision.stop_loss.unwrap() > decision.take_profit.unwrap());
}

#[test]
fn short_series_is_insufficient_for_rsi() {
    let config = IndicatorConfig::default();
    for len in 1..=config.rsi_period {
        let market = MarketContext::new(
            "BTC/USD",
            rising_prices(len, 100.0, 1.0),
            vec![1.0; len],
        )
        .unwrap();
        let err = indicator::compute(&market, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }
}

#[test]
fn opposing_sentiment_is_neutral() {
    let config = SentimentConfig::default();
    let summary = aggregate(
        &[
            SentimentScore {
                source: "A".to_string(),
                score: -1.0,
                weight: 1.0,
            },
            SentimentScore {
                source: "B".to_string(),
                score: 1.0,
                weight: 1.0,
            },
        ],
        &config,
    )
    .unwrap();
    assert_eq!(summary.magnitude, 0.0);
    assert_eq!(summary.polarity, tradegate_models::Polarity::Neutral);
}

#[tokio::test]
async fn equal_confidence_rules_first_declared_wins() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.rules = Some(vec![
        rule(
            "r1",
            TradeAction::Sell,
            0.8,
            vec![condition("market.trend", Operator::Eq, json!("up"))],
        ),
        rule(
            "r2",
            TradeAction::Buy,
            0.8,
            vec![condition("sentiment.polarity", Operator::Eq, json!("positive"))],
        ),
    ]);

    let decision = pipeline().decide(req).await.unwrap();
    assert_eq!(decision.matched_rule.as_deref(), Some("r1"));
    assert_eq!(decision.action, TradeAction::Sell);
    assert_eq!(decision.confidence, 0.8);
}

#[tokio::test]
async fn rule_over_ml_features() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.rules = Some(vec![rule(
        "ml-confirmed",
        TradeAction::Buy,
        0.9,
        vec![
            condition("ml.up_probability", Operator::Gte, json!(0.7)),
            condition("market.rsi_zone", Operator::In, json!(["neutral", "overbought"])),
        ],
    )]);

    let decision = pipeline().decide(req).await.unwrap();
    assert_eq!(decision.matched_rule.as_deref(), Some("ml-confirmed"));
    assert_eq!(decision.confidence, 0.9);
}

#[tokio::test]
async fn unknown_rule_field_falls_back_to_vote() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.rules = Some(vec![rule(
        "bad-path",
        TradeAction::Sell,
        1.0,
        vec![condition("market.macd", Operator::Gt, json!(0))],
    )]);

    let decision = pipeline().decide(req).await.unwrap();
    assert!(decision.matched_rule.is_none());
    assert_eq!(decision.action, TradeAction::Buy);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let pipeline = pipeline();
    let mut first = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();
    let second = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();

    first.timestamp = second.timestamp;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn concurrent_requests_agree() {
    let pipeline = Arc::new(pipeline());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            pipeline
                .decide(bullish_buy_request(dec!(1000), dec!(10000)))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let decision = handle.await.unwrap();
        assert_eq!(decision.action, TradeAction::Buy);
        assert!((decision.confidence - 0.55).abs() < 1e-9);
    }
}

#[tokio::test]
async fn failing_feed_without_index_degrades_sentiment() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.fear_greed_index = None;

    let pipeline = pipeline().with_sentiment_feed(Arc::new(FailingSentimentFeed));
    let decision = pipeline.decide(req).await.unwrap();

    assert_eq!(decision.degraded_sources, vec![SignalSource::Sentiment]);
    assert_eq!(decision.signals[&SignalSource::Sentiment], SignalLabel::Neutral);
    // market 0.55 and ml 0.5 still agree: mean * 2/3 * 0.75
    assert_eq!(decision.action, TradeAction::Buy);
    assert!((decision.confidence - 0.525 * 2.0 / 3.0 * 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn failing_feed_with_index_uses_index() {
    let pipeline = pipeline().with_sentiment_feed(Arc::new(FailingSentimentFeed));
    let decision = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();
    assert!(decision.degraded_sources.is_empty());
    assert_eq!(decision.signals[&SignalSource::Sentiment], SignalLabel::Bullish);
}

#[tokio::test]
async fn slow_feed_times_out() {
    let mut config = TradegateConfig::default();
    config.pipeline.source_timeout_ms = 50;
    let pipeline = Pipeline::new(config)
        .with_model(Arc::new(FixedModel::new(0.75, 0.01)))
        .with_sentiment_feed(Arc::new(StaticSentimentFeed::slow(
            &[("twitter", 0.9)],
            Duration::from_millis(400),
        )));

    let decision = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();
    assert!(decision.degraded_sources.contains(&SignalSource::Sentiment));
}

#[tokio::test]
async fn feed_readings_blend_with_index() {
    let pipeline = pipeline().with_sentiment_feed(Arc::new(StaticSentimentFeed::new(&[
        ("twitter", -0.9),
        ("news", -0.8),
        ("reddit", -0.7),
    ])));

    // Bearish collectors outweigh the greedy index: (-0.27 - 0.24 - 0.14 + 0.12) / 1.0
    let decision = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();
    assert_eq!(decision.signals[&SignalSource::Sentiment], SignalLabel::Bearish);
    // market and ml still make a bullish majority.
    assert_eq!(decision.action, TradeAction::Buy);
}

#[tokio::test]
async fn sqlite_backed_feed() {
    let store = SentimentStore::open_in_memory().unwrap();
    let expires = chrono::Utc::now() + chrono::Duration::minutes(5);
    store
        .upsert(
            "BTC/USD",
            &SentimentReading {
                source: "news".to_string(),
                score: 0.9,
                observed_at: chrono::Utc::now(),
            },
            expires,
        )
        .unwrap();
    let reader = Arc::new(SentimentReader::new(store, 100, Duration::from_secs(60)));
    let pipeline = pipeline().with_sentiment_feed(Arc::new(CachedSentimentFeed::new(reader)));

    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.fear_greed_index = None;
    let decision = pipeline.decide(req).await.unwrap();
    assert!(decision.degraded_sources.is_empty());
    assert_eq!(decision.signals[&SignalSource::Sentiment], SignalLabel::Bullish);
}

#[tokio::test]
async fn stop_loss_warning_reaches_reasoning() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.entry_price = Some(150.0);
    let decision = pipeline().decide(req.clone()).await.unwrap();
    assert_eq!(decision.action, TradeAction::Buy);
    assert!(!decision.reasoning.contains("Stop-loss triggered"));

    req.proposed_action = TradeAction::Sell;
    let decision = pipeline().decide(req).await.unwrap();
    assert!(decision.reasoning.contains("Stop-loss triggered"));
}

#[tokio::test]
async fn open_exposure_blocks_new_buys() {
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.current_positions = Some(
        [("ETH/USD".to_string(), dec!(4500))]
            .into_iter()
            .collect(),
    );
    let decision = pipeline().decide(req).await.unwrap();
    assert_eq!(decision.action, TradeAction::Hold);
    assert!(decision.reasoning.contains("Total exposure"));
}

#[tokio::test]
async fn overflowing_exposure_is_vetoed_not_degraded() {
    let half = Decimal::MAX / dec!(2) + dec!(1);
    let mut req = bullish_buy_request(dec!(1000), dec!(10000));
    req.current_positions = Some(
        [("A".to_string(), half), ("B".to_string(), half)]
            .into_iter()
            .collect(),
    );
    let decision = pipeline().decide(req).await.unwrap();
    assert_eq!(decision.action, TradeAction::Hold);
    assert_eq!(decision.confidence, 1.0);
    assert!(decision.degraded_sources.is_empty());
    assert!(decision.reasoning.contains("Total exposure overflows"));
}

#[tokio::test]
async fn unrepresentable_prices_are_rejected() {
    let req = request("BTC/USD", rising_prices(30, 1e29, 1e27));
    let err = pipeline().decide(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);

    let req = request("DUST/USD", vec![1e-9; 30]);
    let err = pipeline().decide(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let mut req = request("BTC/USD", vec![100.0, 101.0]);
    req.volumes = vec![1.0];
    let err = pipeline().decide(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);

    let mut req = request("BTC/USD", vec![100.0, 101.0]);
    req.fear_greed_index = Some(120.0);
    let err = pipeline().decide(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);
}

#[tokio::test]
async fn disabled_model_degrades_ml() {
    let pipeline = Pipeline::new(TradegateConfig::default()).without_model();
    let decision = pipeline
        .decide(bullish_buy_request(dec!(1000), dec!(10000)))
        .await
        .unwrap();
    assert_eq!(decision.degraded_sources, vec![SignalSource::Ml]);
    assert_eq!(decision.signals[&SignalSource::Ml], SignalLabel::Neutral);
}
