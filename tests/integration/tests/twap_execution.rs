//! Integration test: risk-gated order execution on the offline ledger.
//!
//! Covers the daily volume gate, the circuit breaker and TWAP/VWAP/limit
//! preparation through the platform facade.

use tessera_core::Amount;
use tessera_integration_tests::{platform_with_ledger, xrp_usd, TRADER};
use tessera_ledger::TxPayload;
use tessera_trading::{Order, RiskDecision, RiskRejection, Side, Strategy, TradingError};

fn order(strategy: Strategy, side: Side, amount: u64) -> Order {
    Order::new(strategy, side, xrp_usd(), TRADER, Amount::from_whole(amount))
}

// =========================================================================
// Risk gate
// =========================================================================

#[test]
fn test_daily_volume_limit() {
    let (platform, _ledger) = platform_with_ledger();
    let risk = platform.trading().risk();
    assert_eq!(risk.config().max_daily_volume, Amount::from_whole(5_000_000));

    risk.record_execution(Amount::from_whole(4_800_000));
    assert!(matches!(
        risk.check_order(&order(Strategy::Twap, Side::Buy, 300_000)),
        RiskDecision::Rejected(RiskRejection::DailyVolumeExceeded { .. })
    ));
    assert!(risk.check_order(&order(Strategy::Twap, Side::Buy, 100_000)).is_allowed());

    risk.reset_daily();
    assert!(risk.check_order(&order(Strategy::Twap, Side::Buy, 300_000)).is_allowed());
}

#[tokio::test]
async fn test_circuit_breaker_blocks_all_strategies() {
    let (platform, ledger) = platform_with_ledger();
    let trading = platform.trading();
    trading.risk().trigger_circuit_breaker("price feed divergence");

    assert!(matches!(
        trading.risk().check_order(&order(Strategy::Twap, Side::Buy, 0)),
        RiskDecision::Rejected(RiskRejection::Halted)
    ));
    for strategy in [Strategy::Twap, Strategy::Vwap, Strategy::Limit] {
        let order = order(strategy, Side::Sell, 10).with_price(Amount::from_whole(1));
        let err = trading.execute_order(&order, true).await.unwrap_err();
        assert!(matches!(err, TradingError::RiskRejected(RiskRejection::Halted)));
    }
    assert_eq!(ledger.prepare_count(), 0);
    assert_eq!(platform.audit().by_type("order_rejected").len(), 4);

    trading.risk().clear_circuit_breaker();
    assert!(trading
        .execute_order(&order(Strategy::Twap, Side::Buy, 10), true)
        .await
        .is_ok());
}

// =========================================================================
// Slicing
// =========================================================================

#[tokio::test]
async fn test_twap_thousand_in_ten() {
    let (platform, ledger) = platform_with_ledger();

    let buys = platform
        .trading()
        .execute_order(&order(Strategy::Twap, Side::Buy, 1000), true)
        .await
        .expect("twap should prepare");
    assert_eq!(buys.len(), 10);
    let total = buys.iter().fold(Amount::ZERO, |acc, s| acc.saturating_add(s.amount));
    assert_eq!(total, Amount::from_whole(1000));

    let sells = platform
        .trading()
        .execute_order(&order(Strategy::Twap, Side::Sell, 1000), true)
        .await
        .expect("twap should prepare");

    for (buy, sell) in buys.iter().zip(&sells) {
        let (TxPayload::OfferCreate(b), TxPayload::OfferCreate(s)) =
            (&buy.prepared.payload, &sell.prepared.payload)
        else {
            panic!("slices must be offers");
        };
        assert_eq!(b.taker_pays, s.taker_gets);
        assert_eq!(b.taker_gets, s.taker_pays);
        assert_eq!(b.taker_pays.value, Amount::from_whole(100));
    }

    // Sequences are autofilled per account, one per slice.
    let sequences: Vec<u64> = buys
        .iter()
        .chain(&sells)
        .map(|s| s.prepared.native["Sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, (1..=20).collect::<Vec<u64>>());
    assert_eq!(ledger.prepare_count(), 20);
    assert_eq!(sells[4].prepared.metadata.description, "TWAP slice 5/10: sell 100.000000 XRP");
}

#[tokio::test]
async fn test_vwap_and_limit() {
    let (platform, _ledger) = platform_with_ledger();
    let trading = platform.trading();

    let vwap = trading
        .execute_order(&order(Strategy::Vwap, Side::Buy, 1000).with_slices(5), true)
        .await
        .unwrap();
    assert_eq!(vwap.len(), 10);

    let limit = trading
        .execute_order(
            &order(Strategy::Limit, Side::Buy, 400).with_price(Amount::parse("0.52").unwrap()),
            true,
        )
        .await
        .unwrap();
    assert_eq!(limit.len(), 1);
    let TxPayload::OfferCreate(offer) = &limit[0].prepared.payload else {
        panic!("limit order must be an offer");
    };
    assert_eq!(offer.taker_gets.value, Amount::parse("208").unwrap());
    assert_eq!(offer.flags, 0x0008_0000);

    let sliced = platform.audit().by_type("order_sliced");
    assert_eq!(sliced.len(), 2);
    assert_eq!(sliced[0].details["strategy"], "vwap");
    assert_eq!(sliced[1].details["slices"], 1);
}

#[tokio::test]
async fn test_uneven_split_final_slice_absorbs_remainder() {
    let (platform, _ledger) = platform_with_ledger();
    let slices = platform
        .trading()
        .execute_order(&order(Strategy::Twap, Side::Buy, 100).with_slices(3), true)
        .await
        .unwrap();
    let amounts: Vec<String> = slices.iter().map(|s| s.amount.to_string()).collect();
    assert_eq!(amounts, vec!["33.333333", "33.333333", "33.333334"]);
}
