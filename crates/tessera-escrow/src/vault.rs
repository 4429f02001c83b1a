use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tessera_crypto::{Fulfillment, Hash};

use crate::error::EscrowError;

/// Secure store for escrow fulfillments, keyed by condition fingerprint.
///
/// Production deployments back this with an HSM or KMS.
pub trait FulfillmentVault: Send + Sync {
    /// Store a fulfillment. A fingerprint may only be deposited once.
    fn deposit(&self, fingerprint: Hash, fulfillment: Fulfillment) -> Result<(), EscrowError>;

    /// Remove and return the fulfillment. Subsequent calls return `None`.
    fn take(&self, fingerprint: &Hash) -> Option<Fulfillment>;
}

/// Process-local vault for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    entries: DashMap<Hash, Fulfillment>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FulfillmentVault for InMemoryVault {
    fn deposit(&self, fingerprint: Hash, fulfillment: Fulfillment) -> Result<(), EscrowError> {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(_) => Err(EscrowError::VaultRejected(format!(
                "fingerprint {} already deposited",
                hex::encode(fingerprint)
            ))),
            Entry::Vacant(slot) => {
                slot.insert(fulfillment);
                Ok(())
            }
        }
    }

    fn take(&self, fingerprint: &Hash) -> Option<Fulfillment> {
        self.entries.remove(fingerprint).map(|(_, fulfillment)| fulfillment)
    }
}
