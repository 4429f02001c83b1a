//! Tessera Ledger Layer
//!
//! Defines the ledger client contract, the tagged transaction payloads the
//! engines build, the per-network codecs that shape those payloads into
//! unsigned XRPL and Stellar transactions, and an offline adapter.
//!
//! Nothing in this crate signs or submits a transaction.

pub mod error;
pub mod types;
pub mod traits;
pub mod xrpl;
pub mod stellar;
pub mod adapters;

pub use adapters::offline::OfflineLedger;
pub use error::LedgerError;
pub use traits::LedgerClient;
pub use types::{
    EscrowCancel, EscrowCreate, EscrowFinish, EscrowObject, LedgerAmount, Memo, OfferCancel,
    OfferCreate, OpenOffer, Payment, PreparedTransaction, TrustSet, TxMetadata, TxPayload,
    DEFAULT_REQUIRED_SIGNERS,
};
