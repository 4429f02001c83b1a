use chrono::NaiveDate;
use serde_json::json;
use tessera_core::{Amount, AuditEvent, Auditable, BondId, BondStatus, BreachId, CovenantId, ParticipantId};

use crate::covenant::{Breach, CovenantDirection, CovenantKind};
use crate::types::DefaultNotice;

pub const COMPONENT: &str = "tessera-bond";
pub const AUDIT_LAYER: u8 = 4;

/// Events published by [`BondEngine`](crate::BondEngine).
#[derive(Debug, Clone, PartialEq)]
pub enum BondEvent {
    BondCreated {
        bond_id: BondId,
        name: String,
        created_by: String,
    },
    ParticipantOnboarded {
        bond_id: BondId,
        participant_id: ParticipantId,
        name: String,
        participation_amount: Amount,
    },
    KycApproved {
        bond_id: BondId,
        participant_id: ParticipantId,
        provider: String,
    },
    IssuanceRecorded {
        bond_id: BondId,
        participant_id: ParticipantId,
        amount: Amount,
        balance: Amount,
    },
    CouponPrepared {
        bond_id: BondId,
        coupon_number: u32,
        payment_date: NaiveDate,
        payments: usize,
        total: Amount,
        dry_run: bool,
    },
    MaturityPrepared {
        bond_id: BondId,
        holders: usize,
        principal: Amount,
        dry_run: bool,
    },
    EarlyRedemption {
        bond_id: BondId,
        participant_id: ParticipantId,
        amount: Amount,
        balance: Amount,
        dry_run: bool,
    },
    StatusChanged {
        bond_id: BondId,
        from: BondStatus,
        to: BondStatus,
        reason: String,
    },
    BondDefaulted(DefaultNotice),
    CovenantRegistered {
        covenant_id: CovenantId,
        bond_id: BondId,
        kind: CovenantKind,
        threshold: f64,
        direction: CovenantDirection,
    },
    CovenantWarning {
        covenant_id: CovenantId,
        bond_id: BondId,
        observed: f64,
        threshold: f64,
        headroom: f64,
    },
    CovenantBreached {
        covenant_id: CovenantId,
        bond_id: BondId,
        breach: Breach,
    },
    CovenantCured {
        covenant_id: CovenantId,
        bond_id: BondId,
        breach_id: BreachId,
    },
    CovenantWaived {
        covenant_id: CovenantId,
        bond_id: BondId,
        breach_id: BreachId,
        waived_by: String,
    },
}

impl BondEvent {
    pub fn bond_id(&self) -> BondId {
        match self {
            Self::BondCreated { bond_id, .. }
            | Self::ParticipantOnboarded { bond_id, .. }
            | Self::KycApproved { bond_id, .. }
            | Self::IssuanceRecorded { bond_id, .. }
            | Self::CouponPrepared { bond_id, .. }
            | Self::MaturityPrepared { bond_id, .. }
            | Self::EarlyRedemption { bond_id, .. }
            | Self::StatusChanged { bond_id, .. }
            | Self::CovenantRegistered { bond_id, .. }
            | Self::CovenantWarning { bond_id, .. }
            | Self::CovenantBreached { bond_id, .. }
            | Self::CovenantCured { bond_id, .. }
            | Self::CovenantWaived { bond_id, .. } => *bond_id,
            Self::BondDefaulted(notice) => notice.bond_id,
        }
    }
}

impl Auditable for BondEvent {
    fn audit_event(&self) -> AuditEvent {
        let (event_type, details) = match self {
            Self::BondCreated {
                bond_id,
                name,
                created_by,
            } => (
                "bond_created",
                json!({ "bond_id": bond_id.to_string(), "name": name, "created_by": created_by }),
            ),
            Self::ParticipantOnboarded {
                bond_id,
                participant_id,
                name,
                participation_amount,
            } => (
                "participant_onboarded",
                json!({
                    "bond_id": bond_id.to_string(),
                    "participant_id": participant_id.to_string(),
                    "name": name,
                    "participation_amount": participation_amount.to_string(),
                }),
            ),
            Self::KycApproved {
                bond_id,
                participant_id,
                provider,
            } => (
                "kyc_approved",
                json!({
                    "bond_id": bond_id.to_string(),
                    "participant_id": participant_id.to_string(),
                    "provider": provider,
                }),
            ),
            Self::CouponPrepared {
                bond_id,
                coupon_number,
                payment_date,
                payments,
                total,
                dry_run,
            } => (
                "coupon_prepared",
                json!({
                    "bond_id": bond_id.to_string(),
                    "coupon_number": coupon_number,
                    "payment_date": payment_date.to_string(),
                    "payments": payments,
                    "total": total.to_string(),
                    "dry_run": dry_run,
                }),
            ),
            Self::MaturityPrepared {
                bond_id,
                holders,
                principal,
                dry_run,
            } => (
                "maturity_prepared",
                json!({
                    "bond_id": bond_id.to_string(),
                    "holders": holders,
                    "principal": principal.to_string(),
                    "dry_run": dry_run,
                }),
            ),
            Self::EarlyRedemption {
                bond_id,
                participant_id,
                amount,
                balance,
                dry_run,
            } => (
                "early_redemption",
                json!({
                    "bond_id": bond_id.to_string(),
                    "participant_id": participant_id.to_string(),
                    "amount": amount.to_string(),
                    "balance": balance.to_string(),
                    "dry_run": dry_run,
                }),
            ),
            Self::IssuanceRecorded {
                bond_id,
                participant_id,
                amount,
                balance,
            } => (
                "issuance_recorded",
                json!({
                    "bond_id": bond_id.to_string(),
                    "participant_id": participant_id.to_string(),
                    "amount": amount.to_string(),
                    "balance": balance.to_string(),
                }),
            ),
            Self::StatusChanged {
                bond_id,
                from,
                to,
                reason,
            } => (
                "status_changed",
                json!({
                    "bond_id": bond_id.to_string(),
                    "from": from.as_str(),
                    "to": to.as_str(),
                    "reason": reason,
                }),
            ),
            Self::BondDefaulted(notice) => (
                "bond_defaulted",
                json!({
                    "bond_id": notice.bond_id.to_string(),
                    "previous_status": notice.previous_status.as_str(),
                    "reason": notice.reason,
                    "triggered_by": notice.triggered_by,
                    "outstanding_balance": notice.outstanding_balance.to_string(),
                    "participants": notice.participants.len(),
                    "balances": notice
                        .participants
                        .iter()
                        .map(|p| json!({ "participant_id": p.id.to_string(), "balance": p.balance.to_string() }))
                        .collect::<Vec<_>>(),
                }),
            ),
            Self::CovenantRegistered {
                covenant_id,
                bond_id,
                kind,
                threshold,
                direction,
            } => (
                "covenant_registered",
                json!({
                    "covenant_id": covenant_id.to_string(),
                    "bond_id": bond_id.to_string(),
                    "kind": kind,
                    "threshold": threshold,
                    "direction": direction,
                }),
            ),
            Self::CovenantWarning {
                covenant_id,
                bond_id,
                observed,
                threshold,
                headroom,
            } => (
                "covenant_warning",
                json!({
                    "covenant_id": covenant_id.to_string(),
                    "bond_id": bond_id.to_string(),
                    "observed": observed,
                    "threshold": threshold,
                    "headroom": headroom,
                }),
            ),
            Self::CovenantBreached {
                covenant_id,
                bond_id,
                breach,
            } => (
                "covenant_breached",
                json!({
                    "covenant_id": covenant_id.to_string(),
                    "bond_id": bond_id.to_string(),
                    "breach_id": breach.id.to_string(),
                    "observed": breach.observed,
                    "threshold": breach.threshold,
                    "severity": breach.severity,
                    "cure_deadline": breach.cure_deadline.to_rfc3339(),
                }),
            ),
            Self::CovenantCured {
                covenant_id,
                bond_id,
                breach_id,
            } => (
                "covenant_cured",
                json!({
                    "covenant_id": covenant_id.to_string(),
                    "bond_id": bond_id.to_string(),
                    "breach_id": breach_id.to_string(),
                }),
            ),
            Self::CovenantWaived {
                covenant_id,
                bond_id,
                breach_id,
                waived_by,
            } => (
                "covenant_waived",
                json!({
                    "covenant_id": covenant_id.to_string(),
                    "bond_id": bond_id.to_string(),
                    "breach_id": breach_id.to_string(),
                    "waived_by": waived_by,
                }),
            ),
        };
        AuditEvent::new(event_type, COMPONENT, AUDIT_LAYER, details)
    }
}
