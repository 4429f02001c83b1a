use serde::{Deserialize, Serialize};
use tessera_core::Amount;
use tessera_crypto::EscrowCondition;
use tessera_ledger::PreparedTransaction;

use crate::error::EscrowError;

/// Rules shared by a family of escrows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTemplate {
    pub name: String,
    /// Default distance, in days, from creation to `cancel_after`.
    pub duration_days: u32,
    pub use_crypto_condition: bool,
    /// Inclusive lower bound on the escrowed amount.
    pub min_amount: Amount,
    /// Inclusive upper bound on the escrowed amount.
    pub max_amount: Amount,
}

impl EscrowTemplate {
    pub fn validate(&self) -> Result<(), EscrowError> {
        let invalid = |reason: &str| EscrowError::InvalidTemplate {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.duration_days == 0 {
            return Err(invalid("duration_days must be at least 1"));
        }
        if self.min_amount > self.max_amount {
            return Err(invalid("min_amount exceeds max_amount"));
        }
        Ok(())
    }

    pub fn allows(&self, amount: Amount) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}

/// Standard templates for bond settlement, coupon payments and
/// participant escrows.
pub fn default_templates() -> Vec<EscrowTemplate> {
    vec![
        EscrowTemplate {
            name: "bond_settlement".into(),
            duration_days: 90,
            use_crypto_condition: true,
            min_amount: Amount::from_whole(100),
            max_amount: Amount::from_whole(100_000_000),
        },
        EscrowTemplate {
            name: "coupon_payment".into(),
            duration_days: 30,
            use_crypto_condition: false,
            min_amount: Amount::from_whole(1),
            max_amount: Amount::from_whole(10_000_000),
        },
        EscrowTemplate {
            name: "participant_escrow".into(),
            duration_days: 180,
            use_crypto_condition: true,
            min_amount: Amount::from_whole(1_000),
            max_amount: Amount::from_whole(50_000_000),
        },
    ]
}

/// Input to [`EscrowManager::prepare_create`](crate::EscrowManager::prepare_create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowCreateRequest {
    pub source_address: String,
    pub destination_address: String,
    /// Native amount (XRP).
    pub amount: Amount,
    pub template_name: String,
    pub counterparty_id: String,
    pub instrument_id: String,
    /// Days until the escrow may be finished. Defaults to 1.
    #[serde(default)]
    pub finish_after_days: Option<u32>,
    /// Days until the escrow may be cancelled. Defaults to the template duration.
    #[serde(default)]
    pub cancel_after_days: Option<u32>,
}

/// A prepared EscrowCreate plus, for conditional templates, the generated
/// condition pair.
#[derive(Debug, Clone)]
pub struct CreatedEscrow {
    pub prepared: PreparedTransaction,
    pub condition: Option<EscrowCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowState {
    Active,
    Finished,
    Cancelled,
    Expired,
}

/// An escrow as seen on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowStatus {
    pub sequence: u32,
    pub account: String,
    pub destination: String,
    pub amount: Amount,
    /// ISO-8601.
    pub finish_after: Option<String>,
    /// ISO-8601.
    pub cancel_after: Option<String>,
    pub condition: Option<String>,
    pub state: EscrowState,
}
