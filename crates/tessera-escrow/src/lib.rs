//! Tessera Escrow
//!
//! Prepares XRPL escrows that lock native funds between a finish and a
//! cancel time, optionally behind a PREIMAGE-SHA-256 crypto-condition.
//! Fulfillments are handed to a [`FulfillmentVault`] and never logged.

pub mod error;
pub mod types;
pub mod events;
pub mod vault;
pub mod manager;

pub use error::EscrowError;
pub use events::EscrowEvent;
pub use manager::EscrowManager;
pub use types::{
    default_templates, CreatedEscrow, EscrowCreateRequest, EscrowState, EscrowStatus,
    EscrowTemplate,
};
pub use vault::{FulfillmentVault, InMemoryVault};
