//! Fixtures shared by the cross-crate tests.

use std::sync::Arc;

use tessera::{Platform, PlatformConfig};
use chrono::NaiveDate;
use tessera_bond::{BondParams, CouponFrequency};
use tessera_core::{Amount, Asset, LedgerKind};
use tessera_escrow::EscrowCreateRequest;
use tessera_ledger::OfflineLedger;
use tessera_trading::Pair;

pub const ISSUER: &str = "rBondIssuer7Yq1tYkWb5C3vXp";
pub const FUNDER: &str = "rFunderN4aC2sTg8HkWq1mZ";
pub const TRADER: &str = "rTraderQ9eV5bLs3Jd7Ru2";
pub const COUPON_PAYER: &str = "rCouponPayer6Hs2Wq8Lk4Ne";
pub const SETTLEMENT: &str = "rSettlement3Pd9Xc5Tr1Mb";
pub const GATEWAY: &str = "rStableGateway8Fw2Kn6Qa";

/// A platform on the offline XRPL testnet adapter with trading enabled
/// in dry-run mode.
pub fn platform() -> Arc<Platform> {
    platform_with_ledger().0
}

/// Same as [`platform`], also handing back the adapter so tests can seed
/// ledger state and count preparations.
pub fn platform_with_ledger() -> (Arc<Platform>, Arc<OfflineLedger>) {
    let mut config = PlatformConfig::default();
    config.trading.enabled = true;
    let ledger = Arc::new(OfflineLedger::new(config.ledger.network()));
    let platform = Platform::with_client(config, ledger.clone()).expect("default config should build");
    (Arc::new(platform), ledger)
}

/// A callable five-year note paying 6.5% semi-annually, already past
/// maturity so settlement can be prepared.
pub fn bond_params(name: &str) -> BondParams {
    BondParams {
        name: name.to_string(),
        description: "Senior secured infrastructure note".into(),
        currency: "BND".into(),
        face_value: Amount::from_whole(10_000_000),
        minimum_denomination: Amount::from_whole(100_000),
        coupon_rate: Amount::parse("0.065").expect("valid rate"),
        coupon_frequency: CouponFrequency::SemiAnnual,
        issue_date: NaiveDate::from_ymd_opt(2020, 6, 30).expect("valid date"),
        maturity_date: NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date"),
        callable: true,
        issuer_address: ISSUER.into(),
        coupon_account: COUPON_PAYER.into(),
        settlement_account: SETTLEMENT.into(),
        created_by: "structuring-desk".into(),
    }
}

/// The stablecoin coupons and principal are paid in.
pub fn stable_usd() -> Asset {
    Asset::issued("USD", GATEWAY)
}

pub fn escrow_request(template: &str, amount: u64) -> EscrowCreateRequest {
    EscrowCreateRequest {
        source_address: FUNDER.into(),
        destination_address: ISSUER.into(),
        amount: Amount::from_whole(amount),
        template_name: template.into(),
        counterparty_id: "cp-harbour".into(),
        instrument_id: "bond-series-a".into(),
        finish_after_days: None,
        cancel_after_days: None,
    }
}

pub fn xrp_usd() -> Pair {
    Pair::new(Asset::native(LedgerKind::Xrpl), Asset::issued("USD", ISSUER))
}
