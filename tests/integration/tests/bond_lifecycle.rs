//! Integration test: a bond from draft to redemption, and to default.
//!
//! Drives tessera-bond through the platform facade so that every step is
//! also checked against the shared audit trail.

use std::sync::{Arc, Mutex};

use tessera_bond::{
    BondEngine, BondError, BondEvent, BreachSeverity, CheckFrequency, CovenantDirection,
    CovenantKind, CovenantParams, CovenantStatus, CouponStatus, ParticipantParams,
};
use tessera_core::{Amount, BondStatus, LedgerNetwork};
use tessera_integration_tests::{
    bond_params, platform, platform_with_ledger, stable_usd, COUPON_PAYER, FUNDER, ISSUER,
    SETTLEMENT, TRADER,
};
use tessera_ledger::OfflineLedger;

fn lender(name: &str, amount: u64) -> ParticipantParams {
    holder(name, FUNDER, amount)
}

fn holder(name: &str, address: &str, amount: u64) -> ParticipantParams {
    ParticipantParams {
        name: name.to_string(),
        address: address.into(),
        participation_amount: Amount::from_whole(amount),
    }
}

// =========================================================================
// Happy path
// =========================================================================

#[test]
fn test_draft_to_redeemed() {
    let platform = platform();
    let bonds = platform.bonds();

    let bond = bonds.create_bond(bond_params("Series A")).expect("create should succeed");
    let anchor = bonds
        .onboard_participant(bond.id, lender("Anchor Fund", 2_000_000))
        .expect("onboarding should succeed");

    for (status, reason) in [
        (BondStatus::Approved, "credit committee"),
        (BondStatus::Offering, "book opened"),
    ] {
        bonds.transition_status(bond.id, status, reason).expect("legal transition");
    }

    bonds
        .approve_kyc(bond.id, anchor.id, "kyc-provider")
        .expect("participant exists");
    bonds
        .record_issuance(bond.id, anchor.id, Amount::from_whole(2_000_000))
        .expect("issuance within participation");

    for status in [
        BondStatus::Funded,
        BondStatus::Active,
        BondStatus::Matured,
        BondStatus::Redeemed,
    ] {
        bonds.transition_status(bond.id, status, "scheduled").expect("legal transition");
    }

    let bond = bonds.get_bond(bond.id).expect("bond exists");
    assert_eq!(bond.status, BondStatus::Redeemed);
    assert_eq!(bond.history.len(), 6);
    assert!(bond.history.windows(2).all(|w| w[0].to == w[1].from));
    assert_eq!(bond.outstanding_balance(), Amount::from_whole(2_000_000));

    // Redeemed is terminal.
    assert!(matches!(
        bonds.transition_status(bond.id, BondStatus::Active, "reopen"),
        Err(BondError::InvalidTransition { .. })
    ));
    assert_eq!(platform.audit().by_type("status_changed").len(), 6);
}

// =========================================================================
// Default
// =========================================================================

#[test]
fn test_default_snapshot_and_finality() {
    let platform = platform();
    let bonds = platform.bonds();

    let bond = bonds.create_bond(bond_params("Series B")).unwrap();
    let a = bonds.onboard_participant(bond.id, lender("A", 500_000)).unwrap();
    let b = bonds.onboard_participant(bond.id, lender("B", 300_000)).unwrap();
    for id in [a.id, b.id] {
        bonds.approve_kyc(bond.id, id, "kyc-provider").unwrap();
    }
    for status in [BondStatus::Approved, BondStatus::Offering, BondStatus::Funded, BondStatus::Active] {
        bonds.transition_status(bond.id, status, "").unwrap();
        if status == BondStatus::Offering {
            bonds.record_issuance(bond.id, a.id, Amount::from_whole(500_000)).unwrap();
            bonds.record_issuance(bond.id, b.id, Amount::from_whole(120_000)).unwrap();
        }
    }

    let notice = bonds
        .trigger_default(bond.id, "missed coupon", "trustee")
        .expect("default from active");
    assert_eq!(notice.previous_status, BondStatus::Active);
    assert_eq!(notice.outstanding_balance, Amount::from_whole(620_000));
    assert_eq!(notice.participants.len(), 2);

    assert!(matches!(
        bonds.trigger_default(bond.id, "again", "trustee"),
        Err(BondError::AlreadyDefaulted(_))
    ));
    assert!(matches!(
        bonds.record_issuance(bond.id, b.id, Amount::from_whole(1)),
        Err(BondError::IssuanceNotAllowed { .. })
    ));
    assert!(matches!(
        bonds.onboard_participant(bond.id, lender("C", 100_000)),
        Err(BondError::BondClosed { .. })
    ));

    let audited = platform.audit().by_type("bond_defaulted");
    assert_eq!(audited.len(), 1);
    assert_eq!(audited[0].details["outstanding_balance"], "620000");
    assert_eq!(audited[0].details["previous_status"], "active");
}

#[test]
fn test_concurrent_default_applies_once() {
    let platform = platform();
    let bond = platform.bonds().create_bond(bond_params("Series C")).unwrap();
    platform
        .bonds()
        .transition_status(bond.id, BondStatus::Approved, "")
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let platform = Arc::clone(&platform);
            std::thread::spawn(move || {
                platform
                    .bonds()
                    .trigger_default(bond.id, "cross default", &format!("agent-{i}"))
                    .is_ok()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(wins, 1);
    let bond = platform.bonds().get_bond(bond.id).unwrap();
    assert_eq!(bond.status, BondStatus::Defaulted);
    assert_eq!(bond.history.len(), 2);
}

// =========================================================================
// Covenants
// =========================================================================

#[test]
fn test_covenant_breach_does_not_move_bond() {
    let platform = platform();
    let bonds = platform.bonds();
    let bond = bonds.create_bond(bond_params("Series D")).unwrap();
    for status in [BondStatus::Approved, BondStatus::Offering, BondStatus::Funded, BondStatus::Active] {
        bonds.transition_status(bond.id, status, "").unwrap();
    }

    let breached = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let breached = Arc::clone(&breached);
        bonds.subscribe(move |event| {
            if let BondEvent::CovenantBreached { breach, .. } = event {
                breached.lock().unwrap().push(breach.severity);
            }
        })
    };

    let ltv = bonds
        .register_covenant(
            bond.id,
            CovenantParams {
                kind: CovenantKind::Ltv,
                description: "Loan to value at most 65%".into(),
                threshold: 0.65,
                direction: CovenantDirection::Below,
                frequency: CheckFrequency::Monthly,
                cure_deadline_days: Some(45),
            },
        )
        .unwrap();

    let ok = bonds.check_covenant(ltv.id, 0.40).unwrap();
    assert!(ok.breach.is_none());

    let check = bonds.check_covenant(ltv.id, 0.90).unwrap();
    let breach = check.breach.expect("reading above threshold breaches");
    assert_eq!(breach.severity, BreachSeverity::Material);
    assert_eq!(
        (breach.cure_deadline - breach.detected_at).num_days(),
        45
    );
    assert_eq!(*breached.lock().unwrap(), vec![BreachSeverity::Material]);
    assert_eq!(bonds.get_bond(bond.id).unwrap().status, BondStatus::Active);

    bonds.record_cure(ltv.id, breach.id).unwrap();
    assert_eq!(bonds.covenant(ltv.id).unwrap().status, CovenantStatus::Compliant);
    assert!(bonds.breached_covenants().is_empty());
    assert_eq!(bonds.get_bond(bond.id).unwrap().status, BondStatus::Active);

    let audit = platform.audit();
    assert_eq!(audit.by_type("covenant_registered").len(), 1);
    assert_eq!(audit.by_type("covenant_breached").len(), 1);
    assert_eq!(audit.by_type("covenant_cured").len(), 1);
}

// =========================================================================
// Ledger settlement
// =========================================================================

#[tokio::test]
async fn test_issuance_coupon_redemption_and_maturity_on_ledger() {
    let (platform, ledger) = platform_with_ledger();
    let bonds = platform.bonds();

    let bond = bonds.create_bond(bond_params("Series E")).unwrap();
    assert_eq!(bond.coupons.len(), 10);
    let anchor = bonds
        .onboard_participant(bond.id, holder("Anchor", FUNDER, 4_000_000))
        .unwrap();
    let desk = bonds
        .onboard_participant(bond.id, holder("Desk", TRADER, 1_000_000))
        .unwrap();
    for status in [BondStatus::Approved, BondStatus::Offering] {
        bonds.transition_status(bond.id, status, "").unwrap();
    }

    assert!(matches!(
        bonds.issue_to_participant(bond.id, anchor.id, true).await,
        Err(BondError::KycNotApproved(_))
    ));
    assert_eq!(ledger.prepare_count(), 0);

    for id in [anchor.id, desk.id] {
        bonds.approve_kyc(bond.id, id, "kyc-provider").unwrap();
        let issued = bonds.issue_to_participant(bond.id, id, true).await.unwrap();
        assert_eq!(issued.trustline.native["TransactionType"], "TrustSet");
        assert_eq!(issued.issuance.native["Account"], ISSUER);
    }
    assert_eq!(bonds.outstanding_balance(bond.id).unwrap(), Amount::from_whole(5_000_000));

    for status in [BondStatus::Funded, BondStatus::Active] {
        bonds.transition_status(bond.id, status, "").unwrap();
    }

    // 6.5% semi-annual on 10M is 325,000 per coupon, split by holding.
    let coupons = bonds
        .prepare_coupon_payments(bond.id, 1, &stable_usd(), true)
        .await
        .unwrap();
    assert_eq!(coupons.len(), 2);
    assert_eq!(coupons[0].native["Account"], COUPON_PAYER);
    assert_eq!(coupons[0].native["Destination"], FUNDER);
    assert_eq!(coupons[0].native["Amount"]["value"], "130000");
    assert_eq!(coupons[1].native["Destination"], TRADER);
    assert_eq!(coupons[1].native["Amount"]["value"], "32500");
    assert_eq!(
        bonds.get_bond(bond.id).unwrap().coupon(1).unwrap().status,
        CouponStatus::Processing
    );

    let redemption = bonds
        .prepare_early_redemption(bond.id, desk.id, Amount::from_whole(400_000), &stable_usd(), true)
        .await
        .unwrap();
    assert_eq!(redemption.burn.native["Destination"], ISSUER);
    assert_eq!(redemption.payment.native["Account"], SETTLEMENT);

    let settlement = bonds
        .prepare_maturity_settlement(bond.id, &stable_usd(), true)
        .await
        .unwrap();
    assert_eq!(settlement.burns.len(), 2);
    assert_eq!(settlement.principal[0].native["Amount"]["value"], "4000000");
    assert_eq!(settlement.principal[1].native["Amount"]["value"], "600000");
    assert_eq!(bonds.get_bond(bond.id).unwrap().status, BondStatus::Matured);
    assert_eq!(ledger.prepare_count(), 4 + 2 + 2 + 4);

    let audit = platform.audit();
    for (event_type, count) in [
        ("kyc_approved", 2),
        ("issuance_recorded", 2),
        ("coupon_prepared", 1),
        ("early_redemption", 1),
        ("maturity_prepared", 1),
    ] {
        assert_eq!(audit.by_type(event_type).len(), count, "{event_type}");
    }
    assert_eq!(audit.by_type("maturity_prepared")[0].details["principal"], "4600000");
}

#[tokio::test]
async fn test_stellar_issuance_opens_trust_line_with_change_trust() {
    let ledger = Arc::new(OfflineLedger::new(LedgerNetwork::stellar_testnet()));
    let bonds = BondEngine::new(ledger.clone());

    let mut params = bond_params("Series S");
    params.issuer_address = "GBONDISSUER".into();
    params.coupon_account = "GCOUPONS".into();
    params.settlement_account = "GSETTLE".into();
    let bond = bonds.create_bond(params).unwrap();
    let anchor = bonds
        .onboard_participant(bond.id, holder("Anchor", "GANCHOR", 1_000_000))
        .unwrap();
    bonds.approve_kyc(bond.id, anchor.id, "kyc-provider").unwrap();
    for status in [BondStatus::Approved, BondStatus::Offering] {
        bonds.transition_status(bond.id, status, "").unwrap();
    }

    let issued = bonds.issue_to_participant(bond.id, anchor.id, false).await.unwrap();
    let trust = &issued.trustline.native["operations"][0];
    assert_eq!(trust["type"], "change_trust");
    assert_eq!(trust["line"]["code"], "BND");
    assert_eq!(trust["line"]["issuer"], "GBONDISSUER");
    assert_eq!(trust["limit"], "1000000.0000000");
    assert_eq!(issued.issuance.native["operations"][0]["type"], "payment");
    assert_eq!(ledger.prepare_count(), 2);
}
