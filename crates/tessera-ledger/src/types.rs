use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::{Amount, Asset, LedgerNetwork};
use tessera_crypto::{condition_fingerprint, Fulfillment};
use uuid::Uuid;

use crate::error::LedgerError;

/// Signatures required by the multisig quorum unless configured otherwise.
pub const DEFAULT_REQUIRED_SIGNERS: u8 = 2;

/// A quantity of a specific asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAmount {
    pub value: Amount,
    pub asset: Asset,
}

impl LedgerAmount {
    pub fn new(value: Amount, asset: Asset) -> Self {
        Self { value, asset }
    }
}

impl fmt::Display for LedgerAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.asset.code)
    }
}

/// A plain-text memo. Codecs take care of the network encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub memo_type: String,
    pub memo_data: String,
}

impl Memo {
    pub fn new(memo_type: impl Into<String>, memo_data: impl Into<String>) -> Self {
        Self {
            memo_type: memo_type.into(),
            memo_data: memo_data.into(),
        }
    }

    /// A memo whose data is the JSON rendering of `body`.
    pub fn json(memo_type: impl Into<String>, body: &serde_json::Value) -> Self {
        Self::new(memo_type, body.to_string())
    }
}

fn require_account(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidPayload(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Lock native funds until a time window opens, optionally behind a
/// crypto-condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowCreate {
    pub account: String,
    pub destination: String,
    pub amount: Amount,
    pub finish_after: DateTime<Utc>,
    pub cancel_after: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memos: Vec<Memo>,
}

impl EscrowCreate {
    pub fn new(
        account: impl Into<String>,
        destination: impl Into<String>,
        amount: Amount,
        finish_after: DateTime<Utc>,
        cancel_after: DateTime<Utc>,
        condition: Option<String>,
        memos: Vec<Memo>,
    ) -> Result<Self, LedgerError> {
        let account = account.into();
        let destination = destination.into();
        require_account("account", &account)?;
        require_account("destination", &destination)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidPayload("escrow amount must be positive".into()));
        }
        if finish_after >= cancel_after {
            return Err(LedgerError::InvalidPayload(
                "finish_after must be before cancel_after".into(),
            ));
        }
        if let Some(condition) = &condition {
            condition_fingerprint(condition)
                .map_err(|e| LedgerError::InvalidPayload(e.to_string()))?;
        }
        Ok(Self {
            account,
            destination,
            amount,
            finish_after,
            cancel_after,
            condition,
            memos,
        })
    }
}

/// Release an escrow to its destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowFinish {
    pub account: String,
    pub owner: String,
    pub offer_sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<Fulfillment>,
}

impl EscrowFinish {
    /// `condition` and `fulfillment` must be supplied together or not at all.
    pub fn new(
        account: impl Into<String>,
        owner: impl Into<String>,
        offer_sequence: u32,
        condition: Option<String>,
        fulfillment: Option<Fulfillment>,
    ) -> Result<Self, LedgerError> {
        let account = account.into();
        let owner = owner.into();
        require_account("account", &account)?;
        require_account("owner", &owner)?;
        if condition.is_some() != fulfillment.is_some() {
            return Err(LedgerError::InvalidPayload(
                "condition and fulfillment must be supplied together".into(),
            ));
        }
        Ok(Self {
            account,
            owner,
            offer_sequence,
            condition,
            fulfillment,
        })
    }
}

/// Return an expired escrow to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowCancel {
    pub account: String,
    pub owner: String,
    pub offer_sequence: u32,
}

impl EscrowCancel {
    pub fn new(
        account: impl Into<String>,
        owner: impl Into<String>,
        offer_sequence: u32,
    ) -> Result<Self, LedgerError> {
        let account = account.into();
        let owner = owner.into();
        require_account("account", &account)?;
        require_account("owner", &owner)?;
        Ok(Self {
            account,
            owner,
            offer_sequence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub account: String,
    pub destination: String,
    pub amount: LedgerAmount,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memos: Vec<Memo>,
}

impl Payment {
    pub fn new(
        account: impl Into<String>,
        destination: impl Into<String>,
        amount: LedgerAmount,
        memos: Vec<Memo>,
    ) -> Result<Self, LedgerError> {
        let account = account.into();
        let destination = destination.into();
        require_account("account", &account)?;
        require_account("destination", &destination)?;
        if amount.value.is_zero() {
            return Err(LedgerError::InvalidPayload("payment amount must be positive".into()));
        }
        Ok(Self {
            account,
            destination,
            amount,
            memos,
        })
    }
}

/// Open (or resize) a trust line so `account` can hold an issued asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustSet {
    pub account: String,
    /// Maximum balance of the issued asset the account accepts.
    pub limit: LedgerAmount,
}

impl TrustSet {
    pub fn new(account: impl Into<String>, limit: LedgerAmount) -> Result<Self, LedgerError> {
        let account = account.into();
        require_account("account", &account)?;
        match &limit.asset.issuer {
            None => {
                return Err(LedgerError::InvalidPayload(format!(
                    "trust lines need an issued asset, {} has no issuer",
                    limit.asset.code
                )))
            }
            Some(issuer) if *issuer == account => {
                return Err(LedgerError::InvalidPayload("an issuer cannot trust itself".into()))
            }
            Some(_) => {}
        }
        Ok(Self { account, limit })
    }
}

/// Place an order on the ledger's native order book.
///
/// The taker of this offer pays `taker_pays` to the account and receives
/// `taker_gets` from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCreate {
    pub account: String,
    pub taker_pays: LedgerAmount,
    pub taker_gets: LedgerAmount,
    #[serde(default)]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memos: Vec<Memo>,
}

impl OfferCreate {
    /// Offer flag: do not consume matching offers, only rest on the book.
    pub const FLAG_PASSIVE: u32 = 0x0001_0000;
    /// Offer flag: sell exactly `taker_gets`, even for more than `taker_pays`.
    pub const FLAG_SELL: u32 = 0x0008_0000;

    pub fn new(
        account: impl Into<String>,
        taker_pays: LedgerAmount,
        taker_gets: LedgerAmount,
        flags: u32,
        memos: Vec<Memo>,
    ) -> Result<Self, LedgerError> {
        let account = account.into();
        require_account("account", &account)?;
        if taker_pays.value.is_zero() || taker_gets.value.is_zero() {
            return Err(LedgerError::InvalidPayload("offer legs must be positive".into()));
        }
        if taker_pays.asset == taker_gets.asset {
            return Err(LedgerError::InvalidPayload(format!(
                "offer legs must use different assets, both are {}",
                taker_pays.asset
            )));
        }
        Ok(Self {
            account,
            taker_pays,
            taker_gets,
            flags,
            memos,
        })
    }
}

/// Withdraw a resting offer, identified by the sequence of the transaction
/// that placed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCancel {
    pub account: String,
    pub offer_sequence: u32,
}

impl OfferCancel {
    pub fn new(account: impl Into<String>, offer_sequence: u32) -> Result<Self, LedgerError> {
        let account = account.into();
        require_account("account", &account)?;
        Ok(Self {
            account,
            offer_sequence,
        })
    }
}

/// An offer resting on the ledger's order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOffer {
    pub account: String,
    pub sequence: u32,
    pub taker_pays: LedgerAmount,
    pub taker_gets: LedgerAmount,
}

/// Tagged union of every transaction the engines prepare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TxPayload {
    EscrowCreate(EscrowCreate),
    EscrowFinish(EscrowFinish),
    EscrowCancel(EscrowCancel),
    Payment(Payment),
    OfferCreate(OfferCreate),
    OfferCancel(OfferCancel),
    TrustSet(TrustSet),
}

impl TxPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EscrowCreate(_) => "EscrowCreate",
            Self::EscrowFinish(_) => "EscrowFinish",
            Self::EscrowCancel(_) => "EscrowCancel",
            Self::Payment(_) => "Payment",
            Self::OfferCreate(_) => "OfferCreate",
            Self::OfferCancel(_) => "OfferCancel",
            Self::TrustSet(_) => "TrustSet",
        }
    }

    /// The account that originates (and must sign) the transaction.
    pub fn account(&self) -> &str {
        match self {
            Self::EscrowCreate(tx) => &tx.account,
            Self::EscrowFinish(tx) => &tx.account,
            Self::EscrowCancel(tx) => &tx.account,
            Self::Payment(tx) => &tx.account,
            Self::OfferCreate(tx) => &tx.account,
            Self::OfferCancel(tx) => &tx.account,
            Self::TrustSet(tx) => &tx.account,
        }
    }
}

impl From<EscrowCreate> for TxPayload {
    fn from(tx: EscrowCreate) -> Self {
        Self::EscrowCreate(tx)
    }
}

impl From<EscrowFinish> for TxPayload {
    fn from(tx: EscrowFinish) -> Self {
        Self::EscrowFinish(tx)
    }
}

impl From<EscrowCancel> for TxPayload {
    fn from(tx: EscrowCancel) -> Self {
        Self::EscrowCancel(tx)
    }
}

impl From<Payment> for TxPayload {
    fn from(tx: Payment) -> Self {
        Self::Payment(tx)
    }
}

impl From<OfferCreate> for TxPayload {
    fn from(tx: OfferCreate) -> Self {
        Self::OfferCreate(tx)
    }
}

impl From<OfferCancel> for TxPayload {
    fn from(tx: OfferCancel) -> Self {
        Self::OfferCancel(tx)
    }
}

impl From<TrustSet> for TxPayload {
    fn from(tx: TrustSet) -> Self {
        Self::TrustSet(tx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxMetadata {
    pub description: String,
    pub required_signers: u8,
    pub estimated_fee: String,
    pub timestamp: DateTime<Utc>,
}

/// An unsigned transaction, ready to be routed to the signer quorum.
#[derive(Clone, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub id: Uuid,
    pub network: LedgerNetwork,
    pub payload: TxPayload,
    /// Network-shaped unsigned transaction, autofilled.
    pub native: serde_json::Value,
    pub dry_run: bool,
    pub metadata: TxMetadata,
}

impl PreparedTransaction {
    pub fn new(
        network: LedgerNetwork,
        payload: TxPayload,
        native: serde_json::Value,
        dry_run: bool,
        metadata: TxMetadata,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            network,
            payload,
            native,
            dry_run,
            metadata,
        }
    }
}

// `native` may carry a fulfillment for EscrowFinish, so it is left out.
impl fmt::Debug for PreparedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedTransaction")
            .field("id", &self.id)
            .field("network", &self.network)
            .field("payload", &self.payload)
            .field("dry_run", &self.dry_run)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// An escrow ledger object, in XRPL `account_objects` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EscrowObject {
    pub account: String,
    pub destination: String,
    /// Amount in drops.
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_after: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_after: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub previous_txn_lgr_seq: u32,
}
