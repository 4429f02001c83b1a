use async_trait::async_trait;
use tessera_core::LedgerNetwork;

use crate::error::LedgerError;
use crate::types::{EscrowObject, OpenOffer, PreparedTransaction, TxPayload};

/// Ledger client adapter interface.
///
/// Each implementation bridges the engines to one ledger network. It
/// autofills network fields (sequence, fee) and returns an unsigned
/// transaction ready for the external multisig signer.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The network this client prepares transactions for.
    fn network(&self) -> LedgerNetwork;

    /// Unique identifier of this adapter (e.g. "offline-xrpl-testnet").
    fn adapter_id(&self) -> &str;

    /// Build an unsigned, autofilled transaction. Never signs or submits.
    async fn prepare_transaction(
        &self,
        payload: TxPayload,
        description: &str,
        dry_run: bool,
    ) -> Result<PreparedTransaction, LedgerError>;

    /// Escrow objects owned by `address` or payable to it.
    async fn get_escrow_objects(&self, address: &str) -> Result<Vec<EscrowObject>, LedgerError>;

    /// Offers placed by `address` that are still on the book.
    async fn get_open_offers(&self, address: &str) -> Result<Vec<OpenOffer>, LedgerError>;
}
