use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{EventBus, Subscription};
use tessera_crypto::{condition_fingerprint, generate_condition, Fulfillment};
use tessera_ledger::xrpl::{drops_to_xrp, ripple_time_to_iso};
use tessera_ledger::{
    EscrowCancel, EscrowCreate, EscrowFinish, LedgerClient, Memo, PreparedTransaction,
};

use crate::error::EscrowError;
use crate::events::EscrowEvent;
use crate::types::{CreatedEscrow, EscrowCreateRequest, EscrowState, EscrowStatus, EscrowTemplate};
use crate::vault::FulfillmentVault;

/// Memo type attached to every escrow this manager creates.
pub const ESCROW_MEMO_TYPE: &str = "escrow/bond-funding";

const DEFAULT_FINISH_AFTER_DAYS: u32 = 1;

fn days_from(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, EscrowError> {
    Duration::try_days(i64::from(days))
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or(EscrowError::ScheduleOutOfRange { days })
}

/// Prepares escrow create, finish and cancel transactions.
///
/// Templates are fixed at construction. Validation failures are raised
/// before any transaction is built; ledger errors propagate unchanged.
pub struct EscrowManager {
    client: Arc<dyn LedgerClient>,
    templates: HashMap<String, EscrowTemplate>,
    vault: Option<Arc<dyn FulfillmentVault>>,
    events: EventBus<EscrowEvent>,
}

impl EscrowManager {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        templates: impl IntoIterator<Item = EscrowTemplate>,
    ) -> Result<Self, EscrowError> {
        let mut by_name = HashMap::new();
        for template in templates {
            template.validate()?;
            tracing::info!(
                template = %template.name,
                duration_days = template.duration_days,
                use_crypto_condition = template.use_crypto_condition,
                "Registering escrow template"
            );
            by_name.insert(template.name.clone(), template);
        }
        Ok(Self {
            client,
            templates: by_name,
            vault: None,
            events: EventBus::new(),
        })
    }

    /// Deposit generated fulfillments into `vault`.
    pub fn with_vault(mut self, vault: Arc<dyn FulfillmentVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn template(&self, name: &str) -> Option<&EscrowTemplate> {
        self.templates.get(name)
    }

    /// All templates, sorted by name.
    pub fn templates(&self) -> Vec<&EscrowTemplate> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub fn events(&self) -> &EventBus<EscrowEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&EscrowEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer)
    }

    /// Prepare an unsigned EscrowCreate for `request`.
    pub async fn prepare_create(
        &self,
        request: EscrowCreateRequest,
        dry_run: bool,
    ) -> Result<CreatedEscrow, EscrowError> {
        let template = self
            .template(&request.template_name)
            .ok_or_else(|| EscrowError::UnknownTemplate(request.template_name.clone()))?;

        if !template.allows(request.amount) {
            return Err(EscrowError::AmountOutOfRange {
                amount: request.amount,
                min: template.min_amount,
                max: template.max_amount,
            });
        }

        let now = Utc::now();
        let finish_days = request.finish_after_days.unwrap_or(DEFAULT_FINISH_AFTER_DAYS);
        let cancel_days = request.cancel_after_days.unwrap_or(template.duration_days);
        let finish_after = days_from(now, finish_days)?;
        let cancel_after = days_from(now, cancel_days)?;
        if finish_after >= cancel_after {
            return Err(EscrowError::InvalidSchedule {
                finish_after,
                cancel_after,
            });
        }

        let currency = self.client.network().kind.native_code();
        let memo = Memo::json(
            ESCROW_MEMO_TYPE,
            &json!({
                "instrument_id": request.instrument_id,
                "counterparty_id": request.counterparty_id,
                "template": request.template_name,
                "amount": request.amount.to_string(),
                "currency": currency,
                "created_at": now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            }),
        );

        let condition = template.use_crypto_condition.then(generate_condition);
        let payload = EscrowCreate::new(
            request.source_address.as_str(),
            request.destination_address.as_str(),
            request.amount,
            finish_after,
            cancel_after,
            condition.as_ref().map(|c| c.condition.clone()),
            vec![memo],
        )?;

        let description = format!(
            "Create escrow: {} {} from {} to {} (template: {})",
            request.amount,
            currency,
            request.source_address,
            request.destination_address,
            request.template_name
        );
        let prepared = self
            .client
            .prepare_transaction(payload.into(), &description, dry_run)
            .await?;

        if let (Some(vault), Some(condition)) = (&self.vault, &condition) {
            let fingerprint = condition_fingerprint(&condition.condition)
                .map_err(|e| EscrowError::VaultRejected(e.to_string()))?;
            vault.deposit(fingerprint, condition.fulfillment.clone())?;
        }

        tracing::info!(
            tx_id = %prepared.id,
            template = %request.template_name,
            amount = %request.amount,
            has_condition = condition.is_some(),
            dry_run,
            "Escrow create prepared"
        );
        self.events.emit(&EscrowEvent::Created {
            tx_id: prepared.id,
            source: request.source_address,
            destination: request.destination_address,
            amount: request.amount,
            template: request.template_name,
            instrument_id: request.instrument_id,
            counterparty_id: request.counterparty_id,
            has_condition: condition.is_some(),
            dry_run,
        });

        Ok(CreatedEscrow {
            prepared,
            condition,
        })
    }

    /// Prepare an unsigned EscrowFinish.
    ///
    /// `fulfillment` and `condition` must be given together or not at all.
    /// They are passed through for the ledger to verify.
    pub async fn prepare_finish(
        &self,
        finisher: &str,
        owner: &str,
        sequence: u32,
        fulfillment: Option<Fulfillment>,
        condition: Option<String>,
        dry_run: bool,
    ) -> Result<PreparedTransaction, EscrowError> {
        if fulfillment.is_some() != condition.is_some() {
            return Err(EscrowError::PartialCondition);
        }
        let has_condition = condition.is_some();
        let payload = EscrowFinish::new(finisher, owner, sequence, condition, fulfillment)?;

        let description = format!("Finish escrow: owner={}, seq={}", owner, sequence);
        let prepared = self
            .client
            .prepare_transaction(payload.into(), &description, dry_run)
            .await?;

        tracing::info!(tx_id = %prepared.id, owner, sequence, has_condition, dry_run, "Escrow finish prepared");
        self.events.emit(&EscrowEvent::FinishPrepared {
            tx_id: prepared.id,
            finisher: finisher.to_string(),
            owner: owner.to_string(),
            sequence,
            has_condition,
            dry_run,
        });
        Ok(prepared)
    }

    /// Prepare an unsigned EscrowCancel.
    pub async fn prepare_cancel(
        &self,
        canceller: &str,
        owner: &str,
        sequence: u32,
        dry_run: bool,
    ) -> Result<PreparedTransaction, EscrowError> {
        let payload = EscrowCancel::new(canceller, owner, sequence)?;

        let description = format!("Cancel escrow: owner={}, seq={}", owner, sequence);
        let prepared = self
            .client
            .prepare_transaction(payload.into(), &description, dry_run)
            .await?;

        tracing::info!(tx_id = %prepared.id, owner, sequence, dry_run, "Escrow cancel prepared");
        self.events.emit(&EscrowEvent::CancelPrepared {
            tx_id: prepared.id,
            canceller: canceller.to_string(),
            owner: owner.to_string(),
            sequence,
            dry_run,
        });
        Ok(prepared)
    }

    /// Escrows owned by `address` or due to it.
    pub async fn get_escrows(&self, address: &str) -> Result<Vec<EscrowStatus>, EscrowError> {
        let objects = self.client.get_escrow_objects(address).await?;
        objects
            .into_iter()
            .map(|obj| -> Result<EscrowStatus, EscrowError> {
                Ok(EscrowStatus {
                    sequence: obj.previous_txn_lgr_seq,
                    amount: drops_to_xrp(&obj.amount)?,
                    finish_after: obj.finish_after.map(ripple_time_to_iso),
                    cancel_after: obj.cancel_after.map(ripple_time_to_iso),
                    condition: obj.condition,
                    account: obj.account,
                    destination: obj.destination,
                    state: EscrowState::Active,
                })
            })
            .collect()
    }
}
