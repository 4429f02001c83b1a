use serde_json::json;
use tessera_core::{Amount, AuditEvent, Auditable};
use uuid::Uuid;

pub const COMPONENT: &str = "tessera-escrow";
pub const AUDIT_LAYER: u8 = 5;

/// Events published by [`EscrowManager`](crate::EscrowManager).
///
/// None of them carries a fulfillment.
#[derive(Debug, Clone, PartialEq)]
pub enum EscrowEvent {
    Created {
        tx_id: Uuid,
        source: String,
        destination: String,
        amount: Amount,
        template: String,
        instrument_id: String,
        counterparty_id: String,
        has_condition: bool,
        dry_run: bool,
    },
    FinishPrepared {
        tx_id: Uuid,
        finisher: String,
        owner: String,
        sequence: u32,
        has_condition: bool,
        dry_run: bool,
    },
    CancelPrepared {
        tx_id: Uuid,
        canceller: String,
        owner: String,
        sequence: u32,
        dry_run: bool,
    },
}

impl Auditable for EscrowEvent {
    fn audit_event(&self) -> AuditEvent {
        let (event_type, details) = match self {
            Self::Created {
                tx_id,
                source,
                destination,
                amount,
                template,
                instrument_id,
                counterparty_id,
                has_condition,
                dry_run,
            } => (
                "escrow_created",
                json!({
                    "tx_id": tx_id.to_string(),
                    "source": source,
                    "destination": destination,
                    "amount": amount.to_string(),
                    "template": template,
                    "instrument_id": instrument_id,
                    "counterparty_id": counterparty_id,
                    "has_condition": has_condition,
                    "dry_run": dry_run,
                }),
            ),
            Self::FinishPrepared {
                tx_id,
                finisher,
                owner,
                sequence,
                has_condition,
                dry_run,
            } => (
                "escrow_finish_prepared",
                json!({
                    "tx_id": tx_id.to_string(),
                    "finisher": finisher,
                    "owner": owner,
                    "sequence": sequence,
                    "has_condition": has_condition,
                    "dry_run": dry_run,
                }),
            ),
            Self::CancelPrepared {
                tx_id,
                canceller,
                owner,
                sequence,
                dry_run,
            } => (
                "escrow_cancel_prepared",
                json!({
                    "tx_id": tx_id.to_string(),
                    "canceller": canceller,
                    "owner": owner,
                    "sequence": sequence,
                    "dry_run": dry_run,
                }),
            ),
        };
        AuditEvent::new(event_type, COMPONENT, AUDIT_LAYER, details)
    }
}
