use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tessera_core::{
    Amount, Asset, BondId, BondStateMachine, BondStatus, BreachId, CovenantId, EventBus,
    ParticipantId, Subscription,
};
use tessera_ledger::{LedgerAmount, LedgerClient, Memo, Payment, PreparedTransaction, TrustSet};

use crate::coupon::{pro_rata, Coupon, CouponStatus};
use crate::covenant::{Covenant, CovenantCheck, CovenantParams, CovenantStatus};
use crate::error::BondError;
use crate::events::BondEvent;
use crate::types::{
    Bond, BondParams, DefaultNotice, Issuance, KycStatus, MaturitySettlement, Participant,
    ParticipantParams, Redemption, TransitionRecord,
};

/// Statuses in which IOUs may be issued and a bond counts as active.
const LIVE_STATUSES: [BondStatus; 3] = [BondStatus::Offering, BondStatus::Funded, BondStatus::Active];

pub const ISSUANCE_MEMO_TYPE: &str = "bond/issuance";
pub const COUPON_MEMO_TYPE: &str = "bond/coupon";
pub const MATURITY_BURN_MEMO_TYPE: &str = "bond/maturity-burn";
pub const MATURITY_PRINCIPAL_MEMO_TYPE: &str = "bond/maturity-principal";
pub const REDEMPTION_MEMO_TYPE: &str = "bond/early-redemption";

/// Bond registry and lifecycle engine.
///
/// Each bond lives in its own map entry, so read-validate-write on one bond
/// runs under that entry's lock. Events are emitted only after the lock is
/// released, which lets observers call back into the engine.
///
/// Operations that prepare ledger transactions reserve their effect under
/// the lock first, then call the ledger client with no lock held. If the
/// client fails the reservation is released and nothing is emitted.
pub struct BondEngine {
    client: Arc<dyn LedgerClient>,
    bonds: DashMap<BondId, Bond>,
    covenants: DashMap<CovenantId, Covenant>,
    events: EventBus<BondEvent>,
}

impl BondEngine {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            bonds: DashMap::new(),
            covenants: DashMap::new(),
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus<BondEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&BondEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer)
    }

    // ---- Bonds ----

    /// Register a new bond in `draft`.
    pub fn create_bond(&self, params: BondParams) -> Result<Bond, BondError> {
        params.validate()?;
        let bond = Bond::new(params)?;
        self.bonds.insert(bond.id, bond.clone());

        tracing::info!(
            bond_id = %bond.id,
            name = %bond.name,
            maturity = %bond.maturity_date,
            coupons = bond.coupons.len(),
            "Bond created"
        );
        self.events.emit(&BondEvent::BondCreated {
            bond_id: bond.id,
            name: bond.name.clone(),
            created_by: bond.created_by.clone(),
        });
        Ok(bond)
    }

    pub fn get_bond(&self, bond_id: BondId) -> Option<Bond> {
        self.bonds.get(&bond_id).map(|b| b.clone())
    }

    /// All bonds, oldest first.
    pub fn bonds(&self) -> Vec<Bond> {
        let mut bonds: Vec<Bond> = self.bonds.iter().map(|b| b.clone()).collect();
        bonds.sort_by_key(|b| b.id.0);
        bonds
    }

    /// Bonds that are offering, funded or active.
    pub fn active_bonds(&self) -> Vec<Bond> {
        self.bonds()
            .into_iter()
            .filter(|b| LIVE_STATUSES.contains(&b.status))
            .collect()
    }

    pub fn outstanding_balance(&self, bond_id: BondId) -> Result<Amount, BondError> {
        self.bonds
            .get(&bond_id)
            .map(|b| b.outstanding_balance())
            .ok_or(BondError::UnknownBond(bond_id))
    }

    /// Add a subscriber. The participation must meet the bond's minimum
    /// denomination.
    pub fn onboard_participant(
        &self,
        bond_id: BondId,
        params: ParticipantParams,
    ) -> Result<Participant, BondError> {
        let participant = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;

            if bond.status.is_terminal() {
                return Err(BondError::BondClosed {
                    bond_id,
                    status: bond.status,
                });
            }
            if params.participation_amount < bond.minimum_denomination
                || params.participation_amount.is_zero()
            {
                return Err(BondError::BelowMinimumDenomination {
                    amount: params.participation_amount,
                    minimum: bond.minimum_denomination,
                });
            }
            if params.address.trim().is_empty() {
                return Err(BondError::InvalidParams("participant address must not be empty".into()));
            }

            let participant = Participant {
                id: ParticipantId::new(),
                name: params.name,
                address: params.address,
                participation_amount: params.participation_amount,
                balance: Amount::ZERO,
                kyc_status: KycStatus::Pending,
                kyc_provider: None,
                trustline_prepared: false,
                onboarded_at: Utc::now(),
            };
            bond.participants.push(participant.clone());
            bond.touch();
            participant
        };

        tracing::info!(
            bond_id = %bond_id,
            participant_id = %participant.id,
            amount = %participant.participation_amount,
            "Participant onboarded"
        );
        self.events.emit(&BondEvent::ParticipantOnboarded {
            bond_id,
            participant_id: participant.id,
            name: participant.name.clone(),
            participation_amount: participant.participation_amount,
        });
        Ok(participant)
    }

    /// Mark a participant's KYC as approved. Issuance requires it.
    pub fn approve_kyc(
        &self,
        bond_id: BondId,
        participant_id: ParticipantId,
        provider: &str,
    ) -> Result<(), BondError> {
        {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            if bond.status.is_terminal() {
                return Err(BondError::BondClosed {
                    bond_id,
                    status: bond.status,
                });
            }
            let participant = bond.participant_mut(participant_id)?;
            participant.kyc_status = KycStatus::Approved;
            participant.kyc_provider = Some(provider.to_string());
            bond.touch();
        }

        tracing::info!(bond_id = %bond_id, participant_id = %participant_id, provider, "KYC approved");
        self.events.emit(&BondEvent::KycApproved {
            bond_id,
            participant_id,
            provider: provider.to_string(),
        });
        Ok(())
    }

    /// Credit IOUs issued out of band to a participant. Returns the new
    /// balance.
    pub fn record_issuance(
        &self,
        bond_id: BondId,
        participant_id: ParticipantId,
        amount: Amount,
    ) -> Result<Amount, BondError> {
        let balance = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;

            if !LIVE_STATUSES.contains(&bond.status) {
                return Err(BondError::IssuanceNotAllowed {
                    bond_id,
                    status: bond.status,
                });
            }
            if amount.is_zero() {
                return Err(BondError::InvalidParams("issuance amount must be positive".into()));
            }

            let participant = bond.participant_mut(participant_id)?;
            if !participant.is_kyc_approved() {
                return Err(BondError::KycNotApproved(participant_id));
            }

            let available = participant.unissued();
            if amount > available {
                return Err(BondError::ExceedsParticipation {
                    participant_id,
                    requested: amount,
                    available,
                });
            }
            participant.balance = participant.balance.saturating_add(amount);
            let balance = participant.balance;
            bond.touch();
            balance
        };

        tracing::info!(
            bond_id = %bond_id,
            participant_id = %participant_id,
            amount = %amount,
            balance = %balance,
            "Issuance recorded"
        );
        self.events.emit(&BondEvent::IssuanceRecorded {
            bond_id,
            participant_id,
            amount,
            balance,
        });
        Ok(balance)
    }

    /// Move a bond along the lifecycle table.
    ///
    /// An illegal move leaves the bond untouched.
    pub fn transition_status(
        &self,
        bond_id: BondId,
        new_status: BondStatus,
        reason: &str,
    ) -> Result<TransitionRecord, BondError> {
        let record = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            let to = BondStateMachine::transition(bond.status, new_status)?;
            let record = TransitionRecord::new(bond.status, to, reason, None);
            bond.apply(record.clone());
            record
        };

        tracing::info!(
            bond_id = %bond_id,
            from = %record.from,
            to = %record.to,
            reason = %record.reason,
            "Bond status changed"
        );
        self.events.emit(&BondEvent::StatusChanged {
            bond_id,
            from: record.from,
            to: record.to,
            reason: record.reason.clone(),
        });
        Ok(record)
    }

    /// Declare an event of default.
    ///
    /// Allowed from any live status, including those the adjacency table
    /// would not otherwise connect to `defaulted`.
    pub fn trigger_default(
        &self,
        bond_id: BondId,
        reason: &str,
        triggered_by: &str,
    ) -> Result<DefaultNotice, BondError> {
        let notice = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;

            match bond.status {
                BondStatus::Defaulted => return Err(BondError::AlreadyDefaulted(bond_id)),
                status if status.is_terminal() => {
                    return Err(BondError::InvalidTransition {
                        from: status,
                        to: BondStatus::Defaulted,
                    })
                }
                _ => {}
            }

            let record = TransitionRecord::new(
                bond.status,
                BondStatus::Defaulted,
                reason,
                Some(triggered_by.to_string()),
            );
            let notice = DefaultNotice {
                bond_id,
                previous_status: bond.status,
                reason: reason.to_string(),
                triggered_by: triggered_by.to_string(),
                outstanding_balance: bond.outstanding_balance(),
                participants: bond.participants.clone(),
                timestamp: record.timestamp,
            };
            bond.apply(record);
            notice
        };

        tracing::warn!(
            bond_id = %bond_id,
            previous_status = %notice.previous_status,
            outstanding = %notice.outstanding_balance,
            triggered_by = %notice.triggered_by,
            "Bond defaulted: {}",
            notice.reason
        );
        self.events.emit(&BondEvent::BondDefaulted(notice.clone()));
        Ok(notice)
    }

    // ---- Ledger operations ----

    /// Prepare the trust line and IOU payment that issue a participant's
    /// remaining commitment. The balance is credited once both are prepared.
    pub async fn issue_to_participant(
        &self,
        bond_id: BondId,
        participant_id: ParticipantId,
        dry_run: bool,
    ) -> Result<Issuance, BondError> {
        let (bond, holder, amount) = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            if !LIVE_STATUSES.contains(&bond.status) {
                return Err(BondError::IssuanceNotAllowed {
                    bond_id,
                    status: bond.status,
                });
            }
            let holder = bond.participant_mut(participant_id)?;
            if !holder.is_kyc_approved() {
                return Err(BondError::KycNotApproved(participant_id));
            }
            let amount = holder.unissued();
            if amount.is_zero() {
                return Err(BondError::FullyIssued(participant_id));
            }
            holder.balance = holder.participation_amount;
            let holder = holder.clone();
            bond.touch();
            (bond.clone(), holder, amount)
        };

        let (trustline, issuance) = match self.issuance_transactions(&bond, &holder, amount, dry_run).await {
            Ok(txs) => txs,
            Err(err) => {
                self.release(bond_id, "issuance", |bond| {
                    if let Ok(holder) = bond.participant_mut(participant_id) {
                        holder.balance = holder.balance.checked_sub(amount).unwrap_or(Amount::ZERO);
                    }
                });
                return Err(err);
            }
        };
        if let Some(mut bond) = self.bonds.get_mut(&bond_id) {
            if let Ok(holder) = bond.participant_mut(participant_id) {
                holder.trustline_prepared = true;
            }
        }

        tracing::info!(
            bond_id = %bond_id,
            participant_id = %participant_id,
            amount = %amount,
            trustline_tx = %trustline.id,
            issuance_tx = %issuance.id,
            dry_run,
            "Issuance prepared"
        );
        self.events.emit(&BondEvent::IssuanceRecorded {
            bond_id,
            participant_id,
            amount,
            balance: holder.balance,
        });
        Ok(Issuance {
            participant_id,
            amount,
            trustline,
            issuance,
        })
    }

    async fn issuance_transactions(
        &self,
        bond: &Bond,
        holder: &Participant,
        amount: Amount,
        dry_run: bool,
    ) -> Result<(PreparedTransaction, PreparedTransaction), BondError> {
        let iou = bond.iou();
        let trust = TrustSet::new(
            holder.address.as_str(),
            LedgerAmount::new(holder.participation_amount, iou.clone()),
        )?;
        let description = format!(
            "Bond trust line: {} -> {} (limit {})",
            holder.name, bond.currency, holder.participation_amount
        );
        let trustline = self
            .client
            .prepare_transaction(trust.into(), &description, dry_run)
            .await?;

        let memo = Memo::json(
            ISSUANCE_MEMO_TYPE,
            &json!({
                "bond_id": bond.id.to_string(),
                "bond_name": bond.name,
                "participant_id": holder.id.to_string(),
                "amount": amount.to_string(),
                "coupon_rate": bond.coupon_rate.to_string(),
                "maturity_date": bond.maturity_date.to_string(),
            }),
        );
        let payment = Payment::new(
            bond.issuer_address.as_str(),
            holder.address.as_str(),
            LedgerAmount::new(amount, iou),
            vec![memo],
        )?;
        let description = format!("Bond issue: {} {} to {}", amount, bond.currency, holder.name);
        let issuance = self
            .client
            .prepare_transaction(payment.into(), &description, dry_run)
            .await?;
        Ok((trustline, issuance))
    }

    /// Prepare one coupon payment per KYC-approved holder, pro rata to the
    /// IOUs they hold, paid in `gateway` from the coupon account.
    ///
    /// The coupon moves to `processing`, or to `skipped` when no holder is
    /// owed anything.
    pub async fn prepare_coupon_payments(
        &self,
        bond_id: BondId,
        coupon_number: u32,
        gateway: &Asset,
        dry_run: bool,
    ) -> Result<Vec<PreparedTransaction>, BondError> {
        let (bond, coupon) = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            if bond.status != BondStatus::Active {
                return Err(BondError::NotAllowed {
                    operation: "coupon payment",
                    bond_id,
                    status: bond.status,
                });
            }
            let coupon = bond
                .coupons
                .iter_mut()
                .find(|c| c.number == coupon_number)
                .ok_or(BondError::UnknownCoupon {
                    bond_id,
                    number: coupon_number,
                })?;
            if coupon.status != CouponStatus::Scheduled {
                return Err(BondError::CouponNotScheduled { number: coupon_number });
            }
            coupon.status = CouponStatus::Processing;
            let coupon = coupon.clone();
            bond.touch();
            (bond.clone(), coupon)
        };

        let (payments, total) = match self.coupon_transactions(&bond, &coupon, gateway, dry_run).await {
            Ok(prepared) => prepared,
            Err(err) => {
                self.release(bond_id, "coupon", |bond| set_coupon_status(bond, coupon_number, CouponStatus::Scheduled));
                return Err(err);
            }
        };
        if payments.is_empty() {
            if let Some(mut bond) = self.bonds.get_mut(&bond_id) {
                set_coupon_status(&mut *bond, coupon_number, CouponStatus::Skipped);
            }
        }

        tracing::info!(
            bond_id = %bond_id,
            coupon = coupon_number,
            payment_date = %coupon.payment_date,
            payments = payments.len(),
            total = %total,
            dry_run,
            "Coupon payments prepared"
        );
        self.events.emit(&BondEvent::CouponPrepared {
            bond_id,
            coupon_number,
            payment_date: coupon.payment_date,
            payments: payments.len(),
            total,
            dry_run,
        });
        Ok(payments)
    }

    async fn coupon_transactions(
        &self,
        bond: &Bond,
        coupon: &Coupon,
        gateway: &Asset,
        dry_run: bool,
    ) -> Result<(Vec<PreparedTransaction>, Amount), BondError> {
        let mut payments = Vec::new();
        let mut total = Amount::ZERO;
        for holder in &bond.participants {
            if !holder.is_kyc_approved() || holder.balance.is_zero() {
                continue;
            }
            let amount = pro_rata(coupon.amount, holder.balance, bond.face_value).ok_or_else(|| {
                BondError::InvalidParams(format!("coupon share for {} overflows", holder.id))
            })?;
            if amount.is_zero() {
                continue;
            }

            let memo = Memo::json(
                COUPON_MEMO_TYPE,
                &json!({
                    "bond_id": bond.id.to_string(),
                    "coupon_number": coupon.number,
                    "payment_date": coupon.payment_date.to_string(),
                    "participant_id": holder.id.to_string(),
                    "amount": amount.to_string(),
                    "rate": bond.coupon_rate.to_string(),
                }),
            );
            let payment = Payment::new(
                bond.coupon_account.as_str(),
                holder.address.as_str(),
                LedgerAmount::new(amount, gateway.clone()),
                vec![memo],
            )?;
            let description = format!(
                "Coupon {}: {} {} to {} ({})",
                coupon.number, amount, gateway.code, holder.name, coupon.payment_date
            );
            payments.push(
                self.client
                    .prepare_transaction(payment.into(), &description, dry_run)
                    .await?,
            );
            total = total.saturating_add(amount);
        }
        Ok((payments, total))
    }

    /// Confirm a processing coupon as paid.
    pub fn record_coupon_paid(&self, bond_id: BondId, coupon_number: u32) -> Result<Coupon, BondError> {
        let mut bond = self
            .bonds
            .get_mut(&bond_id)
            .ok_or(BondError::UnknownBond(bond_id))?;
        let coupon = bond
            .coupons
            .iter_mut()
            .find(|c| c.number == coupon_number)
            .ok_or(BondError::UnknownCoupon {
                bond_id,
                number: coupon_number,
            })?;
        if coupon.status != CouponStatus::Processing {
            return Err(BondError::InvalidParams(format!(
                "coupon {} is {:?}, not processing",
                coupon_number, coupon.status
            )));
        }
        coupon.status = CouponStatus::Paid;
        let coupon = coupon.clone();
        bond.touch();
        tracing::info!(bond_id = %bond_id, coupon = coupon_number, "Coupon paid");
        Ok(coupon)
    }

    /// Prepare maturity settlement: every holder burns their IOUs back to
    /// the issuer and is paid the same amount of `gateway` principal from
    /// the settlement account. Moves the bond to `matured`.
    pub async fn prepare_maturity_settlement(
        &self,
        bond_id: BondId,
        gateway: &Asset,
        dry_run: bool,
    ) -> Result<MaturitySettlement, BondError> {
        let today = Utc::now().date_naive();
        let (bond, record) = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            if bond.status != BondStatus::Active {
                return Err(BondError::NotAllowed {
                    operation: "maturity settlement",
                    bond_id,
                    status: bond.status,
                });
            }
            if today < bond.maturity_date {
                return Err(BondError::NotMatured {
                    bond_id,
                    maturity_date: bond.maturity_date,
                });
            }
            let to = BondStateMachine::transition(bond.status, BondStatus::Matured)?;
            let record = TransitionRecord::new(bond.status, to, "maturity settlement prepared", None);
            bond.apply(record.clone());
            (bond.clone(), record)
        };

        let settlement = match self.maturity_transactions(&bond, gateway, dry_run).await {
            Ok(settlement) => settlement,
            Err(err) => {
                self.release(bond_id, "maturity", |bond| {
                    if bond.history.last() == Some(&record) {
                        bond.history.pop();
                        bond.status = record.from;
                        bond.touch();
                    }
                });
                return Err(err);
            }
        };
        let principal = bond.outstanding_balance();

        tracing::info!(
            bond_id = %bond_id,
            holders = settlement.burns.len(),
            principal = %principal,
            dry_run,
            "Maturity settlement prepared"
        );
        self.events.emit(&BondEvent::StatusChanged {
            bond_id,
            from: record.from,
            to: record.to,
            reason: record.reason.clone(),
        });
        self.events.emit(&BondEvent::MaturityPrepared {
            bond_id,
            holders: settlement.burns.len(),
            principal,
            dry_run,
        });
        Ok(settlement)
    }

    async fn maturity_transactions(
        &self,
        bond: &Bond,
        gateway: &Asset,
        dry_run: bool,
    ) -> Result<MaturitySettlement, BondError> {
        let mut settlement = MaturitySettlement::default();
        for holder in bond.participants.iter().filter(|p| !p.balance.is_zero()) {
            let (burn, principal) = self
                .settlement_pair(bond, holder, holder.balance, gateway, dry_run, SettlementKind::Maturity)
                .await?;
            settlement.burns.push(burn);
            settlement.principal.push(principal);
        }
        Ok(settlement)
    }

    /// Redeem part of a holder's IOUs before maturity. Only callable bonds
    /// allow it.
    pub async fn prepare_early_redemption(
        &self,
        bond_id: BondId,
        participant_id: ParticipantId,
        amount: Amount,
        gateway: &Asset,
        dry_run: bool,
    ) -> Result<Redemption, BondError> {
        let (bond, holder, balance) = {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            if !bond.callable {
                return Err(BondError::NotCallable(bond_id));
            }
            if !LIVE_STATUSES.contains(&bond.status) {
                return Err(BondError::NotAllowed {
                    operation: "early redemption",
                    bond_id,
                    status: bond.status,
                });
            }
            if amount.is_zero() {
                return Err(BondError::InvalidParams("redemption amount must be positive".into()));
            }
            let holder = bond.participant_mut(participant_id)?;
            let balance = holder
                .balance
                .checked_sub(amount)
                .ok_or(BondError::InsufficientBalance {
                    requested: amount,
                    balance: holder.balance,
                })?;
            holder.balance = balance;
            let holder = holder.clone();
            bond.touch();
            (bond.clone(), holder, balance)
        };

        let (burn, payment) = match self
            .settlement_pair(&bond, &holder, amount, gateway, dry_run, SettlementKind::Redemption)
            .await
        {
            Ok(pair) => pair,
            Err(err) => {
                self.release(bond_id, "redemption", |bond| {
                    if let Ok(holder) = bond.participant_mut(participant_id) {
                        holder.balance = holder.balance.saturating_add(amount);
                    }
                });
                return Err(err);
            }
        };

        tracing::info!(
            bond_id = %bond_id,
            participant_id = %participant_id,
            amount = %amount,
            balance = %balance,
            dry_run,
            "Early redemption prepared"
        );
        self.events.emit(&BondEvent::EarlyRedemption {
            bond_id,
            participant_id,
            amount,
            balance,
            dry_run,
        });
        Ok(Redemption {
            participant_id,
            amount,
            burn,
            payment,
        })
    }

    /// Burn `amount` IOUs from `holder` and pay the same principal back.
    async fn settlement_pair(
        &self,
        bond: &Bond,
        holder: &Participant,
        amount: Amount,
        gateway: &Asset,
        dry_run: bool,
        kind: SettlementKind,
    ) -> Result<(PreparedTransaction, PreparedTransaction), BondError> {
        let (burn_memo, principal_memo, label) = match kind {
            SettlementKind::Maturity => (MATURITY_BURN_MEMO_TYPE, MATURITY_PRINCIPAL_MEMO_TYPE, "Maturity"),
            SettlementKind::Redemption => (REDEMPTION_MEMO_TYPE, REDEMPTION_MEMO_TYPE, "Early redemption"),
        };
        let body = json!({
            "bond_id": bond.id.to_string(),
            "participant_id": holder.id.to_string(),
            "amount": amount.to_string(),
            "maturity_date": bond.maturity_date.to_string(),
        });

        let burn = Payment::new(
            holder.address.as_str(),
            bond.issuer_address.as_str(),
            LedgerAmount::new(amount, bond.iou()),
            vec![Memo::json(burn_memo, &body)],
        )?;
        let description = format!("{} burn: {} {} from {}", label, amount, bond.currency, holder.name);
        let burn = self
            .client
            .prepare_transaction(burn.into(), &description, dry_run)
            .await?;

        let payment = Payment::new(
            bond.settlement_account.as_str(),
            holder.address.as_str(),
            LedgerAmount::new(amount, gateway.clone()),
            vec![Memo::json(principal_memo, &body)],
        )?;
        let description = format!("{} principal: {} {} to {}", label, amount, gateway.code, holder.name);
        let payment = self
            .client
            .prepare_transaction(payment.into(), &description, dry_run)
            .await?;
        Ok((burn, payment))
    }

    /// Undo a reservation after the ledger client failed.
    fn release<F>(&self, bond_id: BondId, operation: &str, undo: F)
    where
        F: FnOnce(&mut Bond),
    {
        match self.bonds.get_mut(&bond_id) {
            Some(mut bond) => {
                undo(&mut *bond);
                tracing::warn!(bond_id = %bond_id, operation, "Ledger preparation failed, reservation released");
            }
            None => tracing::error!(bond_id = %bond_id, operation, "Bond vanished before reservation release"),
        }
    }

    // ---- Covenants ----

    pub fn register_covenant(
        &self,
        bond_id: BondId,
        params: CovenantParams,
    ) -> Result<Covenant, BondError> {
        let covenant = Covenant::new(bond_id, params)?;
        {
            let mut bond = self
                .bonds
                .get_mut(&bond_id)
                .ok_or(BondError::UnknownBond(bond_id))?;
            bond.covenant_ids.push(covenant.id);
            bond.touch();
        }
        self.covenants.insert(covenant.id, covenant.clone());

        tracing::info!(
            covenant_id = %covenant.id,
            bond_id = %bond_id,
            kind = ?covenant.kind,
            threshold = covenant.threshold,
            "Covenant registered"
        );
        self.events.emit(&BondEvent::CovenantRegistered {
            covenant_id: covenant.id,
            bond_id,
            kind: covenant.kind,
            threshold: covenant.threshold,
            direction: covenant.direction,
        });
        Ok(covenant)
    }

    pub fn covenant(&self, covenant_id: CovenantId) -> Option<Covenant> {
        self.covenants.get(&covenant_id).map(|c| c.clone())
    }

    pub fn covenants_for_bond(&self, bond_id: BondId) -> Vec<Covenant> {
        let mut covenants: Vec<Covenant> = self
            .covenants
            .iter()
            .filter(|c| c.bond_id == bond_id)
            .map(|c| c.clone())
            .collect();
        covenants.sort_by_key(|c| c.id.0);
        covenants
    }

    pub fn breached_covenants(&self) -> Vec<Covenant> {
        self.covenants
            .iter()
            .filter(|c| c.status == CovenantStatus::Breach)
            .map(|c| c.clone())
            .collect()
    }

    /// Covenants whose next check is due before `now`.
    pub fn overdue_covenants(&self, now: DateTime<Utc>) -> Vec<Covenant> {
        self.covenants
            .iter()
            .filter(|c| c.is_overdue(now))
            .map(|c| c.clone())
            .collect()
    }

    /// Record an observation. A reading on the wrong side of the threshold
    /// opens a breach.
    pub fn check_covenant(
        &self,
        covenant_id: CovenantId,
        observed: f64,
    ) -> Result<CovenantCheck, BondError> {
        let (bond_id, threshold, check) = {
            let mut covenant = self
                .covenants
                .get_mut(&covenant_id)
                .ok_or(BondError::UnknownCovenant(covenant_id))?;
            let check = covenant.check(observed)?;
            (covenant.bond_id, covenant.threshold, check)
        };

        match &check.breach {
            Some(breach) => {
                tracing::warn!(
                    covenant_id = %covenant_id,
                    bond_id = %bond_id,
                    observed,
                    severity = ?breach.severity,
                    "Covenant breached"
                );
                self.events.emit(&BondEvent::CovenantBreached {
                    covenant_id,
                    bond_id,
                    breach: breach.clone(),
                });
            }
            None if check.warning => {
                tracing::warn!(
                    covenant_id = %covenant_id,
                    bond_id = %bond_id,
                    observed,
                    headroom = check.headroom,
                    "Covenant near threshold"
                );
                self.events.emit(&BondEvent::CovenantWarning {
                    covenant_id,
                    bond_id,
                    observed,
                    threshold,
                    headroom: check.headroom,
                });
            }
            None => {
                tracing::debug!(covenant_id = %covenant_id, observed, "Covenant checked");
            }
        }
        Ok(check)
    }

    /// Mark an open breach as cured. Never changes the bond's status.
    pub fn record_cure(&self, covenant_id: CovenantId, breach_id: BreachId) -> Result<(), BondError> {
        let bond_id = {
            let mut covenant = self
                .covenants
                .get_mut(&covenant_id)
                .ok_or(BondError::UnknownCovenant(covenant_id))?;
            covenant.cure(breach_id)?;
            covenant.bond_id
        };

        tracing::info!(covenant_id = %covenant_id, breach_id = %breach_id, "Covenant breach cured");
        self.events.emit(&BondEvent::CovenantCured {
            covenant_id,
            bond_id,
            breach_id,
        });
        Ok(())
    }

    pub fn waive_breach(
        &self,
        covenant_id: CovenantId,
        breach_id: BreachId,
        waived_by: &str,
    ) -> Result<(), BondError> {
        let bond_id = {
            let mut covenant = self
                .covenants
                .get_mut(&covenant_id)
                .ok_or(BondError::UnknownCovenant(covenant_id))?;
            covenant.waive(breach_id, waived_by)?;
            covenant.bond_id
        };

        tracing::info!(
            covenant_id = %covenant_id,
            breach_id = %breach_id,
            waived_by = %waived_by,
            "Covenant breach waived"
        );
        self.events.emit(&BondEvent::CovenantWaived {
            covenant_id,
            bond_id,
            breach_id,
            waived_by: waived_by.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum SettlementKind {
    Maturity,
    Redemption,
}

fn set_coupon_status(bond: &mut Bond, number: u32, status: CouponStatus) {
    if let Some(coupon) = bond.coupons.iter_mut().find(|c| c.number == number) {
        coupon.status = status;
        bond.updated_at = Utc::now();
    }
}
