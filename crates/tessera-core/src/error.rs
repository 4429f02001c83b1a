use crate::state_machine::BondStatus;

/// Coarse classification shared by every error type in the workspace.
///
/// - `Validation`: the request itself is wrong (unknown id, bad amount,
///   illegal transition). Raised before any transaction is built.
/// - `Policy`: the request is well-formed but a risk or governance rule
///   refused it.
/// - `Adapter`: the ledger client failed; passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    Validation,
    Policy,
    Adapter,
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: BondStatus, to: BondStatus },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("invalid bond status: {0}")]
    InvalidStatus(String),
}

impl CoreError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}
