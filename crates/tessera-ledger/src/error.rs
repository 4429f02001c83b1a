use tessera_core::{ErrorClass, LedgerKind};

/// Ledger-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("account not funded: {0}")]
    Unfunded(String),

    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error("{kind} is not supported on {network}")]
    Unsupported {
        network: LedgerKind,
        kind: &'static str,
    },

    #[error("invalid transaction payload: {0}")]
    InvalidPayload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidPayload(_) => ErrorClass::Validation,
            _ => ErrorClass::Adapter,
        }
    }
}
