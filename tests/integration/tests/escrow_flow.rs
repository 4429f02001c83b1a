//! Integration test: conditional escrow from creation to finish/cancel.
//!
//! Exercises tessera-escrow, tessera-crypto and the offline ledger adapter
//! together, with the fulfillment travelling through the vault.

use chrono::Utc;
use tessera_core::Amount;
use tessera_crypto::{condition_fingerprint, verify_fulfillment};
use tessera_escrow::{EscrowError, EscrowState, FulfillmentVault};
use tessera_integration_tests::{escrow_request, platform_with_ledger, FUNDER, ISSUER, TRADER};
use tessera_ledger::xrpl::to_ripple_time;
use tessera_ledger::{EscrowObject, LedgerError, TxPayload};

// =========================================================================
// Create → finish with the vaulted fulfillment
// =========================================================================

#[tokio::test]
async fn test_conditional_escrow_round_trip() {
    let (platform, ledger) = platform_with_ledger();
    let escrow = platform.escrow();

    let created = escrow
        .prepare_create(escrow_request("bond_settlement", 250_000), true)
        .await
        .expect("create should succeed");

    // Amount survives exactly, in drops.
    assert_eq!(created.prepared.native["Amount"], "250000000000");
    assert_eq!(created.prepared.native["Account"], FUNDER);
    assert_eq!(created.prepared.metadata.required_signers, 2);

    let pair = created.condition.as_ref().expect("template requires a condition");
    assert!(verify_fulfillment(&pair.condition, &pair.fulfillment));
    assert_eq!(created.prepared.native["Condition"], pair.condition.as_str());

    // The vault holds the fulfillment under the condition's fingerprint.
    let fingerprint = condition_fingerprint(&pair.condition).expect("valid condition");
    let fulfillment = platform.vault().take(&fingerprint).expect("fulfillment was vaulted");
    assert!(platform.vault().take(&fingerprint).is_none());
    assert_eq!(fulfillment, pair.fulfillment);

    let sequence = created.prepared.native["Sequence"].as_u64().expect("autofilled") as u32;
    let finish = escrow
        .prepare_finish(
            ISSUER,
            FUNDER,
            sequence,
            Some(fulfillment),
            Some(pair.condition.clone()),
            true,
        )
        .await
        .expect("finish should succeed");

    match &finish.payload {
        TxPayload::EscrowFinish(tx) => {
            assert_eq!(tx.owner, FUNDER);
            assert_eq!(tx.offer_sequence, sequence);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    // The fulfillment never appears in debug output.
    assert!(!format!("{finish:?}").contains(&pair.fulfillment.expose_hex()));
    assert_eq!(ledger.prepare_count(), 2);
}

#[tokio::test]
async fn test_unconditional_template_and_cancel() {
    let (platform, _ledger) = platform_with_ledger();
    let escrow = platform.escrow();

    let created = escrow
        .prepare_create(escrow_request("coupon_payment", 5_000), false)
        .await
        .expect("create should succeed");
    assert!(created.condition.is_none());
    assert!(created.prepared.native.get("Condition").is_none());
    assert!(platform.vault().is_empty());

    let cancel = escrow
        .prepare_cancel(FUNDER, FUNDER, 7, false)
        .await
        .expect("cancel should succeed");
    assert_eq!(cancel.metadata.description, format!("Cancel escrow: owner={FUNDER}, seq=7"));
    assert!(!cancel.dry_run);
}

// =========================================================================
// Validation happens before the adapter is touched
// =========================================================================

#[tokio::test]
async fn test_rejections_never_reach_the_ledger() {
    let (platform, ledger) = platform_with_ledger();
    let escrow = platform.escrow();

    let below = escrow
        .prepare_create(escrow_request("participant_escrow", 999), true)
        .await;
    assert!(matches!(below, Err(EscrowError::AmountOutOfRange { .. })));

    let unknown = escrow.prepare_create(escrow_request("bridge_loan", 1_000), true).await;
    assert!(matches!(unknown, Err(EscrowError::UnknownTemplate(_))));

    let mut request = escrow_request("coupon_payment", 100);
    request.finish_after_days = Some(40);
    let inverted = escrow.prepare_create(request, true).await;
    assert!(matches!(inverted, Err(EscrowError::InvalidSchedule { .. })));

    let partial = escrow
        .prepare_finish(ISSUER, FUNDER, 3, None, Some("A0258020".into()), true)
        .await;
    assert!(matches!(partial, Err(EscrowError::PartialCondition)));

    assert_eq!(ledger.prepare_count(), 0);
    assert!(platform.audit().is_empty());
}

#[tokio::test]
async fn test_adapter_failure_propagates_unchanged() {
    let (platform, ledger) = platform_with_ledger();
    ledger.set_reachable(false);

    let err = platform
        .escrow()
        .prepare_create(escrow_request("bond_settlement", 1_000), true)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Ledger(LedgerError::Unreachable(_))));
    // Nothing was vaulted for a transaction that was never prepared.
    assert!(platform.vault().is_empty());
}

// =========================================================================
// Reading escrows back from the ledger
// =========================================================================

#[tokio::test]
async fn test_get_escrows_maps_ledger_objects() {
    let (platform, ledger) = platform_with_ledger();
    let finish = to_ripple_time(Utc::now()).expect("after ripple epoch");
    ledger.seed_escrow(EscrowObject {
        account: FUNDER.into(),
        destination: ISSUER.into(),
        amount: "1500000".into(),
        finish_after: Some(finish),
        cancel_after: None,
        condition: None,
        previous_txn_lgr_seq: 42,
    });

    let escrows = platform.escrow().get_escrows(FUNDER).await.expect("query should succeed");
    assert_eq!(escrows.len(), 1);
    assert_eq!(escrows[0].sequence, 42);
    assert_eq!(escrows[0].amount, Amount::parse("1.5").unwrap());
    assert_eq!(escrows[0].state, EscrowState::Active);
    assert!(escrows[0].finish_after.as_deref().is_some_and(|t| t.ends_with('Z')));
    assert!(escrows[0].cancel_after.is_none());

    // The destination sees the same escrow.
    let due = platform.escrow().get_escrows(ISSUER).await.expect("query should succeed");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].account, FUNDER);
    assert_eq!(due[0].destination, ISSUER);
    assert!(platform.escrow().get_escrows(TRADER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_escrow_events_are_audited() {
    let (platform, _ledger) = platform_with_ledger();
    platform
        .escrow()
        .prepare_create(escrow_request("bond_settlement", 10_000), true)
        .await
        .expect("create should succeed");

    let events = platform.audit().by_type("escrow_created");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "tessera-escrow");
    assert_eq!(events[0].layer, 5);
    assert_eq!(events[0].details["has_condition"], true);
    assert_eq!(events[0].details["amount"], "10000");
}
