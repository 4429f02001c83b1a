use tessera_core::ErrorClass;
use tessera_ledger::LedgerError;

use crate::risk::RiskRejection;

#[derive(Debug, thiserror::Error)]
pub enum TradingError {
    #[error("trading is disabled; enable it in the platform configuration")]
    TradingDisabled,

    #[error("risk check failed: {0}")]
    RiskRejected(#[from] RiskRejection),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl TradingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TradingDisabled | Self::RiskRejected(_) => ErrorClass::Policy,
            Self::InvalidOrder(_) => ErrorClass::Validation,
            Self::Ledger(e) => e.class(),
        }
    }
}
