use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tessera_core::{LedgerKind, LedgerNetwork};

use crate::error::LedgerError;
use crate::traits::LedgerClient;
use crate::types::{
    EscrowObject, OpenOffer, PreparedTransaction, TxMetadata, TxPayload, DEFAULT_REQUIRED_SIGNERS,
};
use crate::{stellar, xrpl};

/// Ledger adapter that never leaves the process.
///
/// Encodes payloads with the network codec and autofills them from local
/// state: a per-account sequence counter, a fixed fee and the configured
/// signer quorum. Escrow objects and open offers are served from seeded
/// in-memory tables.
/// Useful for dry runs, tests and air-gapped preparation.
pub struct OfflineLedger {
    id: String,
    network: LedgerNetwork,
    fee: String,
    required_signers: u8,
    /// Last sequence handed out, per account.
    sequences: DashMap<String, u32>,
    /// Escrow objects keyed by every address they concern: owner and destination.
    escrows: DashMap<String, Vec<EscrowObject>>,
    offers: DashMap<String, Vec<OpenOffer>>,
    unfunded: DashSet<String>,
    reachable: AtomicBool,
    prepared: AtomicU64,
}

impl OfflineLedger {
    /// Create an adapter with the network's default fee and a 2-signer quorum.
    pub fn new(network: LedgerNetwork) -> Self {
        let fee = match network.kind {
            LedgerKind::Xrpl => xrpl::DEFAULT_FEE_DROPS,
            LedgerKind::Stellar => stellar::DEFAULT_BASE_FEE,
        };
        Self {
            id: format!("offline-{}", network),
            network,
            fee: fee.to_string(),
            required_signers: DEFAULT_REQUIRED_SIGNERS,
            sequences: DashMap::new(),
            escrows: DashMap::new(),
            offers: DashMap::new(),
            unfunded: DashSet::new(),
            reachable: AtomicBool::new(true),
            prepared: AtomicU64::new(0),
        }
    }

    pub fn with_fee(mut self, fee: impl Into<String>) -> Self {
        self.fee = fee.into();
        self
    }

    pub fn with_required_signers(mut self, required_signers: u8) -> Self {
        self.required_signers = required_signers;
        self
    }

    /// Add an escrow object to the `account_objects` of its owner and of
    /// its destination.
    pub fn seed_escrow(&self, escrow: EscrowObject) {
        if escrow.destination != escrow.account {
            self.escrows
                .entry(escrow.destination.clone())
                .or_default()
                .push(escrow.clone());
        }
        self.escrows
            .entry(escrow.account.clone())
            .or_default()
            .push(escrow);
    }

    /// Put an offer on the book for its account.
    pub fn seed_offer(&self, offer: OpenOffer) {
        self.offers.entry(offer.account.clone()).or_default().push(offer);
    }

    /// Treat `account` as not existing on the ledger.
    pub fn mark_unfunded(&self, account: impl Into<String>) {
        self.unfunded.insert(account.into());
    }

    /// Simulate losing (or regaining) the connection to the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
        tracing::info!(adapter_id = %self.id, reachable, "Offline ledger reachability changed");
    }

    /// Number of transactions prepared so far.
    pub fn prepare_count(&self) -> u64 {
        self.prepared.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<(), LedgerError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unreachable(self.network.to_string()))
        }
    }

    fn next_sequence(&self, account: &str) -> u32 {
        let mut entry = self.sequences.entry(account.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn autofill(&self, native: &mut Value, sequence: u32) -> Result<(), LedgerError> {
        let tx = native
            .as_object_mut()
            .ok_or_else(|| LedgerError::Internal("codec produced a non-object transaction".into()))?;
        match self.network.kind {
            LedgerKind::Xrpl => {
                tx.insert("Sequence".into(), json!(sequence));
                tx.insert("Fee".into(), json!(self.fee));
                // Empty for multisigned transactions.
                tx.insert("SigningPubKey".into(), json!(""));
            }
            LedgerKind::Stellar => {
                tx.insert("sequence".into(), json!(sequence.to_string()));
                tx.insert("fee".into(), json!(self.fee));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for OfflineLedger {
    fn network(&self) -> LedgerNetwork {
        self.network
    }

    fn adapter_id(&self) -> &str {
        &self.id
    }

    async fn prepare_transaction(
        &self,
        payload: TxPayload,
        description: &str,
        dry_run: bool,
    ) -> Result<PreparedTransaction, LedgerError> {
        self.ensure_reachable()?;

        let account = payload.account().to_string();
        if self.unfunded.contains(&account) {
            return Err(LedgerError::Unfunded(account));
        }

        let mut native = match self.network.kind {
            LedgerKind::Xrpl => xrpl::encode(&payload)?,
            LedgerKind::Stellar => stellar::encode(&payload)?,
        };
        let sequence = self.next_sequence(&account);
        self.autofill(&mut native, sequence)?;

        let prepared = PreparedTransaction::new(
            self.network,
            payload,
            native,
            dry_run,
            TxMetadata {
                description: description.to_string(),
                required_signers: self.required_signers,
                estimated_fee: self.fee.clone(),
                timestamp: Utc::now(),
            },
        );
        self.prepared.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            adapter_id = %self.id,
            tx_id = %prepared.id,
            kind = prepared.payload.kind(),
            account = %account,
            sequence,
            dry_run,
            "Transaction prepared: {}",
            description
        );
        Ok(prepared)
    }

    async fn get_escrow_objects(&self, address: &str) -> Result<Vec<EscrowObject>, LedgerError> {
        self.ensure_reachable()?;
        Ok(self
            .escrows
            .get(address)
            .map(|objects| objects.clone())
            .unwrap_or_default())
    }

    async fn get_open_offers(&self, address: &str) -> Result<Vec<OpenOffer>, LedgerError> {
        self.ensure_reachable()?;
        let mut offers = self
            .offers
            .get(address)
            .map(|offers| offers.clone())
            .unwrap_or_default();
        offers.sort_by_key(|o| o.sequence);
        Ok(offers)
    }
}
