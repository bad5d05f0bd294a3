// tests/liquidation.rs
mod common;

use common::MockGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use sweepdust::{
    ConversionOutcome, EngineError, ExchangeGateway, LiquidationEngine, LogSink, MarketCatalog,
    SafetyGate,
};

struct Harness {
    gateway: Arc<MockGateway>,
    gate: Arc<SafetyGate>,
    engine: Arc<LiquidationEngine>,
}

fn harness(gateway: MockGateway) -> Harness {
    let gateway = Arc::new(gateway);
    let catalog = Arc::new(MarketCatalog::new());
    catalog.load(gateway.markets.clone());
    let gate = Arc::new(SafetyGate::new());
    let sink = Arc::new(LogSink::new());
    let dyn_gateway: Arc<dyn ExchangeGateway> = gateway.clone();
    let engine = Arc::new(
        LiquidationEngine::new(dyn_gateway, catalog, gate.clone(), sink)
            .with_settle(Duration::from_millis(1), 1),
    );
    Harness {
        gateway,
        gate,
        engine,
    }
}

fn simulated(asset: &str, path: &[&str]) -> ConversionOutcome {
    ConversionOutcome::Simulated {
        asset: asset.to_string(),
        path: path.iter().map(|s| s.to_string()).collect(),
    }
}

fn skipped(asset: &str, reason: &str) -> ConversionOutcome {
    ConversionOutcome::Skipped {
        asset: asset.to_string(),
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn dust_is_skipped_and_direct_sale_simulated() {
    // BTC is worth 500, DUST has no price (value 0), ETH has no balance.
    let h = harness(
        MockGateway::new()
            .with_balance("BTC", dec!(0.01), dec!(0.01))
            .with_balance("ETH", dec!(0), dec!(0))
            .with_balance("DUST", dec!(1000), dec!(1000))
            .with_ticker("BTC/USDT", dec!(50000))
            .with_market("BTC/USDT", dec!(5), Some("0.00001")),
    );

    let report = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();

    assert!(report.completed);
    assert_eq!(
        report.outcomes,
        vec![
            simulated("BTC", &["USDT"]),
            skipped("DUST", "below dust threshold"),
        ]
    );
    // Simulate mode: nothing may reach an order endpoint.
    assert_eq!(h.gateway.submission_count(), 0);
}

#[tokio::test]
async fn banned_assets_are_invisible_to_the_pass() {
    let h = harness(
        MockGateway::new()
            .with_balance("PEPE", dec!(1000000), dec!(1000000))
            .with_ticker("PEPE/USDT", dec!(0.00001))
            .with_market("PEPE/USDT", dec!(0), Some("1")),
    );

    let report = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();

    assert!(report.outcomes.iter().all(|o| o.asset() != "PEPE"));
    assert_eq!(h.gateway.submission_count(), 0);
}

#[tokio::test]
async fn quote_asset_itself_is_not_processed() {
    let h = harness(MockGateway::new().with_balance("USDT", dec!(1000), dec!(1000)));
    let report = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();
    assert!(report.outcomes.is_empty());
}

#[tokio::test]
async fn simulated_pass_is_idempotent() {
    let h = harness(
        MockGateway::new()
            .with_balance("BTC", dec!(0.01), dec!(0.01))
            .with_balance("DUST", dec!(1000), dec!(1000))
            .with_ticker("BTC/USDT", dec!(50000))
            .with_market("BTC/USDT", dec!(5), Some("0.00001")),
    );

    let first = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();
    let second = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();

    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(h.gateway.submission_count(), 0);
}

#[tokio::test]
async fn rejected_direct_sale_is_terminal() {
    // FOO/BNB and BNB/USDT exist, but a rejected direct order must not fall
    // back to the intermediate path.
    let h = harness(
        MockGateway::new()
            .with_balance("FOO", dec!(10), dec!(10))
            .with_ticker("FOO/USDT", dec!(100))
            .with_market("FOO/USDT", dec!(0), Some("0.01"))
            .with_market("FOO/BNB", dec!(0), Some("0.01"))
            .with_market("BNB/USDT", dec!(0), Some("0.01"))
            .with_rejected_orders_on("FOO/USDT"),
    );
    h.gate.set_live(true);

    let report = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();

    match &report.outcomes[0] {
        ConversionOutcome::Failed { asset, reason } => {
            assert_eq!(asset, "FOO");
            assert!(reason.contains("insufficient liquidity"), "got: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(h.gateway.submission_count(), 1);
}

#[tokio::test]
async fn chained_sale_without_proceeds_moves_on_and_fails() {
    // Leg 1 fills but no BNB ever lands on the balance; with no further
    // candidates the asset reports no convertible path.
    let h = harness(
        MockGateway::new()
            .with_balance("FOO", dec!(1000), dec!(1000))
            .with_market("FOO/BNB", dec!(0), Some("1"))
            .with_market("BNB/USDT", dec!(0), Some("0.01")),
    );
    h.gate.set_live(true);

    let report = h.engine.liquidate_to_quote("USDT", dec!(0)).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![ConversionOutcome::Failed {
            asset: "FOO".to_string(),
            reason: "no convertible path".to_string(),
        }]
    );
    // Only leg 1 was submitted.
    assert_eq!(h.gateway.submission_count(), 1);
}

#[tokio::test]
async fn chained_sale_sells_settled_proceeds() {
    let h = harness(
        MockGateway::new()
            .with_balance("FOO", dec!(1000), dec!(1000))
            .with_market("FOO/BNB", dec!(0), Some("1"))
            .with_market("BNB/USDT", dec!(0), Some("0.01"))
            .with_credit_on_fill("FOO/BNB", "BNB", dec!(2.5)),
    );
    h.gate.set_live(true);

    let report = h.engine.liquidate_to_quote("USDT", dec!(0)).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![ConversionOutcome::Success {
            asset: "FOO".to_string(),
            path: vec!["BNB".to_string(), "USDT".to_string()],
        }]
    );
    assert_eq!(h.gateway.submission_count(), 2);
    assert!(h
        .gateway
        .calls()
        .contains(&"place_market SELL BNB/USDT 2.5".to_string()));
}

#[tokio::test]
async fn chained_sale_advances_to_a_later_candidate_that_succeeds() {
    // BTC comes first but its leg 1 is rejected; ETH fills but the proceeds
    // never settle; BNB is the first candidate that completes both legs.
    let h = harness(
        MockGateway::new()
            .with_balance("FOO", dec!(1000), dec!(1000))
            .with_market("FOO/BTC", dec!(0), Some("1"))
            .with_market("BTC/USDT", dec!(0), Some("0.00001"))
            .with_market("FOO/ETH", dec!(0), Some("1"))
            .with_market("ETH/USDT", dec!(0), Some("0.0001"))
            .with_market("FOO/BNB", dec!(0), Some("1"))
            .with_market("BNB/USDT", dec!(0), Some("0.01"))
            .with_rejected_orders_on("FOO/BTC")
            .with_credit_on_fill("FOO/BNB", "BNB", dec!(2.5)),
    );
    h.gate.set_live(true);

    let report = h.engine.liquidate_to_quote("USDT", dec!(0)).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![ConversionOutcome::Success {
            asset: "FOO".to_string(),
            path: vec!["BNB".to_string(), "USDT".to_string()],
        }]
    );
    // Rejected FOO/BTC attempt, FOO/ETH fill, then both BNB legs.
    assert_eq!(h.gateway.submission_count(), 4);
    let calls = h.gateway.calls();
    assert!(calls.contains(&"place_market SELL FOO/BTC 1000".to_string()));
    assert!(calls.contains(&"place_market SELL FOO/ETH 1000".to_string()));
    assert!(calls.contains(&"place_market SELL BNB/USDT 2.5".to_string()));
    // ETH/USDT must never be sold: no proceeds ever settled.
    assert!(!calls.iter().any(|c| c.starts_with("place_market SELL ETH/USDT")));
}

#[tokio::test]
async fn chained_sale_in_simulate_mode_stops_at_first_candidate() {
    let h = harness(
        MockGateway::new()
            .with_balance("FOO", dec!(1000), dec!(1000))
            .with_market("FOO/BNB", dec!(0), Some("1"))
            .with_market("BNB/USDT", dec!(0), Some("0.01"))
            .with_market("FOO/BUSD", dec!(0), Some("1"))
            .with_market("BUSD/USDT", dec!(0), Some("0.01")),
    );

    let report = h.engine.liquidate_to_quote("USDT", dec!(0)).await.unwrap();

    // BNB precedes BUSD in the candidate order.
    assert_eq!(report.outcomes, vec![simulated("FOO", &["BNB", "USDT"])]);
    assert_eq!(h.gateway.submission_count(), 0);
}

#[tokio::test]
async fn open_order_listing_failure_is_fatal() {
    let mut gateway = MockGateway::new().with_balance("BTC", dec!(1), dec!(1));
    gateway.fail_open_orders = true;
    let h = harness(gateway);

    let err = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap_err();
    assert!(matches!(err, EngineError::GatewayUnavailable(_)));
    assert_eq!(h.gateway.submission_count(), 0);
}

#[tokio::test]
async fn individual_cancel_failure_does_not_abort_the_pass() {
    let mut gateway = MockGateway::new()
        .with_open_order("10", "BTC/USDT")
        .with_open_order("11", "ETH/USDT");
    gateway.fail_cancel_ids.insert("10".to_string());
    let h = harness(gateway);

    let report = h.engine.liquidate_to_quote("USDT", dec!(5)).await.unwrap();

    assert!(report.completed);
    let calls = h.gateway.calls();
    assert!(calls.contains(&"cancel_order 10 BTC/USDT".to_string()));
    assert!(calls.contains(&"cancel_order 11 ETH/USDT".to_string()));
}

#[tokio::test]
async fn concurrent_passes_are_refused() {
    let mut gateway = MockGateway::new().with_balance("BTC", dec!(0.01), dec!(0.01));
    gateway.balance_delay = Some(Duration::from_millis(100));
    let h = harness(gateway);

    let first = h.engine.clone();
    let second = h.engine.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.liquidate_to_quote("USDT", dec!(5)).await }),
        async move {
            // Let the first pass get in flight before trying.
            tokio::time::sleep(Duration::from_millis(20)).await;
            second.liquidate_to_quote("USDT", dec!(5)).await
        }
    );

    assert!(a.unwrap().is_ok());
    assert!(matches!(b.unwrap_err(), EngineError::PassInFlight));
}

#[tokio::test]
async fn portfolio_value_counts_quote_at_face_value_and_skips_banned() {
    let h = harness(
        MockGateway::new()
            .with_balance("USDT", dec!(100), dec!(100))
            .with_balance("BTC", dec!(0.01), dec!(0.01))
            .with_balance("PEPE", dec!(1000000), dec!(1000000))
            .with_ticker("BTC/USDT", dec!(50000))
            .with_ticker("PEPE/USDT", dec!(0.00001)),
    );

    let total = h.engine.total_portfolio_value("USDT").await.unwrap();
    assert_eq!(total, dec!(600));
}
