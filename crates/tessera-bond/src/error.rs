use chrono::NaiveDate;
use tessera_core::{Amount, BondId, BondStatus, BreachId, CoreError, CovenantId, ErrorClass, ParticipantId};
use tessera_ledger::LedgerError;

/// Bond-engine errors.
#[derive(Debug, thiserror::Error)]
pub enum BondError {
    #[error("bond not found: {0}")]
    UnknownBond(BondId),

    #[error("participant {participant_id} not found on bond {bond_id}")]
    UnknownParticipant {
        bond_id: BondId,
        participant_id: ParticipantId,
    },

    #[error("invalid transition: {from} → {to}")]
    InvalidTransition { from: BondStatus, to: BondStatus },

    #[error("bond already defaulted: {0}")]
    AlreadyDefaulted(BondId),

    #[error("bond {bond_id} is {status} and no longer accepts changes")]
    BondClosed { bond_id: BondId, status: BondStatus },

    #[error("participation {amount} is below the minimum denomination {minimum}")]
    BelowMinimumDenomination { amount: Amount, minimum: Amount },

    #[error("issuance not allowed while bond {bond_id} is {status}")]
    IssuanceNotAllowed { bond_id: BondId, status: BondStatus },

    #[error("issuance of {requested} to {participant_id} exceeds remaining participation {available}")]
    ExceedsParticipation {
        participant_id: ParticipantId,
        requested: Amount,
        available: Amount,
    },

    #[error("KYC not approved for participant {0}")]
    KycNotApproved(ParticipantId),

    #[error("participant {0} has already been issued its full participation")]
    FullyIssued(ParticipantId),

    #[error("{operation} not allowed while bond {bond_id} is {status}")]
    NotAllowed {
        operation: &'static str,
        bond_id: BondId,
        status: BondStatus,
    },

    #[error("coupon {number} not found on bond {bond_id}")]
    UnknownCoupon { bond_id: BondId, number: u32 },

    #[error("coupon {number} is not scheduled")]
    CouponNotScheduled { number: u32 },

    #[error("bond {bond_id} matures on {maturity_date}")]
    NotMatured { bond_id: BondId, maturity_date: NaiveDate },

    #[error("bond {0} is not callable")]
    NotCallable(BondId),

    #[error("redemption of {requested} exceeds balance {balance}")]
    InsufficientBalance { requested: Amount, balance: Amount },

    #[error("covenant not found: {0}")]
    UnknownCovenant(CovenantId),

    #[error("breach {breach_id} not found on covenant {covenant_id}")]
    UnknownBreach {
        covenant_id: CovenantId,
        breach_id: BreachId,
    },

    #[error("breach already resolved: {0}")]
    BreachAlreadyCured(BreachId),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl BondError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::BondClosed { .. }
            | Self::BelowMinimumDenomination { .. }
            | Self::IssuanceNotAllowed { .. }
            | Self::ExceedsParticipation { .. }
            | Self::KycNotApproved(_)
            | Self::FullyIssued(_)
            | Self::NotAllowed { .. }
            | Self::CouponNotScheduled { .. }
            | Self::NotMatured { .. }
            | Self::NotCallable(_)
            | Self::InsufficientBalance { .. } => ErrorClass::Policy,
            Self::Ledger(e) => e.class(),
            _ => ErrorClass::Validation,
        }
    }
}

impl From<CoreError> for BondError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStateTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::InvalidParams(other.to_string()),
        }
    }
}
