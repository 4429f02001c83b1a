use tessera_core::ErrorClass;

/// Crypto-condition errors.
///
/// Messages never include fulfillment bytes.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid hex encoding in {0}")]
    InvalidHex(&'static str),

    #[error("malformed PREIMAGE-SHA-256 condition: {0}")]
    MalformedCondition(String),

    #[error("malformed PREIMAGE-SHA-256 fulfillment")]
    MalformedFulfillment,
}

impl CryptoError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}
