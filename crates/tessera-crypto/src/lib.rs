pub mod error;
pub mod hashing;
pub mod condition;

pub use condition::{
    condition_fingerprint, generate_condition, verify_fulfillment, EscrowCondition, Fulfillment,
};
pub use error::CryptoError;
pub use hashing::{sha256, Hash};
