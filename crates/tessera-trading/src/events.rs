use serde_json::json;
use tessera_core::{Amount, AuditEvent, Auditable};
use uuid::Uuid;

use crate::types::{Pair, Side, Strategy};

pub const COMPONENT: &str = "tessera-trading";
pub const AUDIT_LAYER: u8 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum TradingEvent {
    OrderRejected {
        order_id: Uuid,
        reason: String,
    },
    OrderSliced {
        order_id: Uuid,
        strategy: Strategy,
        side: Side,
        pair: Pair,
        amount: Amount,
        slices: u32,
        dry_run: bool,
    },
    VolumeRecorded {
        amount: Amount,
        daily_volume: Amount,
    },
    FillRecorded {
        pair: Pair,
        side: Side,
        amount: Amount,
        /// Net position in micro-units after the fill; negative is short.
        position: i128,
    },
    OffersCancelled {
        account: String,
        sequences: Vec<u32>,
        dry_run: bool,
    },
    CircuitBreakerTriggered {
        reason: String,
    },
    CircuitBreakerCleared,
    DailyReset {
        previous_volume: Amount,
    },
}

impl Auditable for TradingEvent {
    fn audit_event(&self) -> AuditEvent {
        let (event_type, details) = match self {
            Self::OrderRejected { order_id, reason } => (
                "order_rejected",
                json!({ "order_id": order_id.to_string(), "reason": reason }),
            ),
            Self::OrderSliced {
                order_id,
                strategy,
                side,
                pair,
                amount,
                slices,
                dry_run,
            } => (
                "order_sliced",
                json!({
                    "order_id": order_id.to_string(),
                    "strategy": strategy.as_str(),
                    "side": side.as_str(),
                    "pair": pair.to_string(),
                    "amount": amount.to_string(),
                    "slices": slices,
                    "dry_run": dry_run,
                }),
            ),
            Self::VolumeRecorded {
                amount,
                daily_volume,
            } => (
                "volume_recorded",
                json!({ "amount": amount.to_string(), "daily_volume": daily_volume.to_string() }),
            ),
            Self::FillRecorded {
                pair,
                side,
                amount,
                position,
            } => (
                "fill_recorded",
                json!({
                    "pair": pair.to_string(),
                    "side": side.as_str(),
                    "amount": amount.to_string(),
                    "position_units": position.to_string(),
                }),
            ),
            Self::OffersCancelled {
                account,
                sequences,
                dry_run,
            } => (
                "offers_cancelled",
                json!({ "account": account, "sequences": sequences, "dry_run": dry_run }),
            ),
            Self::CircuitBreakerTriggered { reason } => {
                ("circuit_breaker_triggered", json!({ "reason": reason }))
            }
            Self::CircuitBreakerCleared => ("circuit_breaker_cleared", json!({})),
            Self::DailyReset { previous_volume } => (
                "daily_reset",
                json!({ "previous_volume": previous_volume.to_string() }),
            ),
        };
        AuditEvent::new(event_type, COMPONENT, AUDIT_LAYER, details)
    }
}
