use chrono::{DateTime, Utc};
use tessera_core::{Amount, ErrorClass};
use tessera_ledger::LedgerError;

/// Escrow-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("unknown escrow template: {0}")]
    UnknownTemplate(String),

    #[error("invalid escrow template {name}: {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("amount {amount} outside template limits [{min}, {max}]")]
    AmountOutOfRange {
        amount: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("finish_after {finish_after} must be before cancel_after {cancel_after}")]
    InvalidSchedule {
        finish_after: DateTime<Utc>,
        cancel_after: DateTime<Utc>,
    },

    #[error("schedule offset of {days} days is out of range")]
    ScheduleOutOfRange { days: u32 },

    #[error("condition and fulfillment must be supplied together")]
    PartialCondition,

    #[error("fulfillment vault rejected deposit: {0}")]
    VaultRejected(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EscrowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::VaultRejected(_) => ErrorClass::Adapter,
            Self::Ledger(e) => e.class(),
            _ => ErrorClass::Validation,
        }
    }
}
