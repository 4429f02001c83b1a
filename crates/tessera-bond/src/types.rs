use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{Amount, BondId, BondStatus, CovenantId, ParticipantId};
use tessera_ledger::PreparedTransaction;

use crate::coupon::{build_schedule, Coupon, CouponFrequency};
use crate::error::BondError;

/// Longest tenor accepted, in years.
pub const MAX_TENOR_YEARS: u32 = 100;

/// Terms supplied when registering a new bond.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Settlement currency / IOU code, e.g. "USD".
    pub currency: String,
    pub face_value: Amount,
    pub minimum_denomination: Amount,
    /// Annual rate as a decimal, e.g. 0.065.
    pub coupon_rate: Amount,
    #[serde(default)]
    pub coupon_frequency: CouponFrequency,
    pub issue_date: NaiveDate,
    pub maturity_date: NaiveDate,
    /// Whether holders may be redeemed before maturity.
    #[serde(default)]
    pub callable: bool,
    /// Account that issues the bond IOUs.
    pub issuer_address: String,
    /// Account that pays coupons.
    pub coupon_account: String,
    /// Account that returns principal.
    pub settlement_account: String,
    pub created_by: String,
}

impl BondParams {
    pub(crate) fn validate(&self) -> Result<(), BondError> {
        if self.name.trim().is_empty() {
            return Err(BondError::InvalidParams("bond name must not be empty".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(BondError::InvalidParams("currency must not be empty".into()));
        }
        if self.face_value.is_zero() {
            return Err(BondError::InvalidParams("face value must be positive".into()));
        }
        if self.minimum_denomination > self.face_value {
            return Err(BondError::InvalidParams(format!(
                "minimum denomination {} exceeds face value {}",
                self.minimum_denomination, self.face_value
            )));
        }
        if self.coupon_rate >= Amount::from_whole(1) {
            return Err(BondError::InvalidParams(format!(
                "coupon rate {} must be a decimal below 1",
                self.coupon_rate
            )));
        }
        if self.maturity_date <= self.issue_date {
            return Err(BondError::InvalidParams(format!(
                "maturity {} must follow issue date {}",
                self.maturity_date, self.issue_date
            )));
        }
        let latest = self.issue_date.checked_add_months(Months::new(12 * MAX_TENOR_YEARS));
        if latest.map_or(true, |latest| self.maturity_date > latest) {
            return Err(BondError::InvalidParams(format!(
                "tenor exceeds {} years",
                MAX_TENOR_YEARS
            )));
        }
        for (field, account) in [
            ("issuer address", &self.issuer_address),
            ("coupon account", &self.coupon_account),
            ("settlement account", &self.settlement_account),
        ] {
            if account.trim().is_empty() {
                return Err(BondError::InvalidParams(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantParams {
    pub name: String,
    /// Ledger address that receives the bond IOUs.
    pub address: String,
    pub participation_amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    #[default]
    Pending,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub address: String,
    /// Committed subscription.
    pub participation_amount: Amount,
    /// IOUs issued so far.
    pub balance: Amount,
    #[serde(default)]
    pub kyc_status: KycStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_provider: Option<String>,
    /// A TrustSet for the bond IOU has been prepared for this holder.
    #[serde(default)]
    pub trustline_prepared: bool,
    pub onboarded_at: DateTime<Utc>,
}

impl Participant {
    pub fn is_kyc_approved(&self) -> bool {
        self.kyc_status == KycStatus::Approved
    }

    /// Committed amount not yet issued.
    pub fn unissued(&self) -> Amount {
        self.participation_amount
            .checked_sub(self.balance)
            .unwrap_or(Amount::ZERO)
    }
}

/// One entry of a bond's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: BondStatus,
    pub to: BondStatus,
    pub reason: String,
    /// Who triggered the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(from: BondStatus, to: BondStatus, reason: impl Into<String>, actor: Option<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            actor,
            timestamp: Utc::now(),
        }
    }
}

/// A bond and everything the engine knows about it.
///
/// Callers only ever see clones; the status is changed through
/// [`BondEngine`](crate::BondEngine) alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub id: BondId,
    pub name: String,
    pub description: String,
    pub currency: String,
    pub face_value: Amount,
    pub minimum_denomination: Amount,
    pub coupon_rate: Amount,
    pub coupon_frequency: CouponFrequency,
    pub issue_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub callable: bool,
    pub issuer_address: String,
    pub coupon_account: String,
    pub settlement_account: String,
    pub status: BondStatus,
    pub participants: Vec<Participant>,
    pub coupons: Vec<Coupon>,
    pub covenant_ids: Vec<CovenantId>,
    pub history: Vec<TransitionRecord>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bond {
    pub(crate) fn new(params: BondParams) -> Result<Self, BondError> {
        let coupons = build_schedule(
            params.face_value,
            params.coupon_rate,
            params.coupon_frequency,
            params.issue_date,
            params.maturity_date,
        )?;
        let now = Utc::now();
        Ok(Self {
            id: BondId::new(),
            name: params.name,
            description: params.description,
            currency: params.currency,
            face_value: params.face_value,
            minimum_denomination: params.minimum_denomination,
            coupon_rate: params.coupon_rate,
            coupon_frequency: params.coupon_frequency,
            issue_date: params.issue_date,
            maturity_date: params.maturity_date,
            callable: params.callable,
            issuer_address: params.issuer_address,
            coupon_account: params.coupon_account,
            settlement_account: params.settlement_account,
            status: BondStatus::Draft,
            participants: Vec::new(),
            coupons,
            covenant_ids: Vec::new(),
            history: Vec::new(),
            created_by: params.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// The bond IOU as a ledger asset.
    pub fn iou(&self) -> tessera_core::Asset {
        tessera_core::Asset::issued(self.currency.as_str(), self.issuer_address.as_str())
    }

    pub fn coupon(&self, number: u32) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.number == number)
    }

    /// Sum of issued participant balances.
    pub fn outstanding_balance(&self) -> Amount {
        self.participants
            .iter()
            .fold(Amount::ZERO, |total, p| total.saturating_add(p.balance))
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub(crate) fn participant_mut(&mut self, id: ParticipantId) -> Result<&mut Participant, BondError> {
        let bond_id = self.id;
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BondError::UnknownParticipant {
                bond_id,
                participant_id: id,
            })
    }

    pub(crate) fn apply(&mut self, record: TransitionRecord) {
        self.status = record.to;
        self.updated_at = record.timestamp;
        self.history.push(record);
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Transactions that put a holder's IOUs on the ledger.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub participant_id: ParticipantId,
    pub amount: Amount,
    pub trustline: PreparedTransaction,
    pub issuance: PreparedTransaction,
}

/// IOU burns and principal returns for every holder at maturity.
#[derive(Debug, Clone, Default)]
pub struct MaturitySettlement {
    pub burns: Vec<PreparedTransaction>,
    pub principal: Vec<PreparedTransaction>,
}

/// An early redemption: the holder burns IOUs and is paid principal.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub participant_id: ParticipantId,
    pub amount: Amount,
    pub burn: PreparedTransaction,
    pub payment: PreparedTransaction,
}

/// What was outstanding when a bond was declared in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultNotice {
    pub bond_id: BondId,
    pub previous_status: BondStatus,
    pub reason: String,
    pub triggered_by: String,
    pub outstanding_balance: Amount,
    pub participants: Vec<Participant>,
    pub timestamp: DateTime<Utc>,
}
