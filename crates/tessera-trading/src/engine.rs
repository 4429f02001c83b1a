use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::{EventBus, Subscription};
use tessera_ledger::{LedgerClient, OfferCancel, OfferCreate, PreparedTransaction, TxPayload};

use crate::error::TradingError;
use crate::events::TradingEvent;
use crate::risk::{RiskConfig, RiskController};
use crate::twap::{offer_legs, TwapStrategy};
use crate::types::{Order, Slice, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every prepared transaction is flagged `dry_run`.
    #[default]
    DryRun,
    Live,
}

/// Trading is off unless explicitly enabled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub risk: RiskConfig,
}

/// Dispatches orders to their execution strategy behind a shared risk gate.
pub struct TradingEngine {
    config: TradingConfig,
    client: Arc<dyn LedgerClient>,
    risk: Arc<RiskController>,
    twap: TwapStrategy,
    events: EventBus<TradingEvent>,
}

impl TradingEngine {
    pub fn new(client: Arc<dyn LedgerClient>, config: TradingConfig) -> Self {
        let events = EventBus::new();
        let risk = Arc::new(RiskController::with_events(config.risk.clone(), events.clone()));
        let twap = TwapStrategy::new(client.clone(), risk.clone());
        Self {
            config,
            client,
            risk,
            twap,
            events,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn risk(&self) -> &Arc<RiskController> {
        &self.risk
    }

    pub fn events(&self) -> &EventBus<TradingEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&TradingEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer)
    }

    fn ensure_enabled(&self) -> Result<(), TradingError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(TradingError::TradingDisabled)
        }
    }

    /// Prepare unsigned offers for `order`. In dry-run mode the `dry_run`
    /// argument is ignored and always treated as true.
    pub async fn execute_order(&self, order: &Order, dry_run: bool) -> Result<Vec<Slice>, TradingError> {
        self.ensure_enabled()?;
        let dry_run = dry_run || self.config.mode == ExecutionMode::DryRun;

        tracing::debug!(order_id = %order.id, strategy = %order.strategy, dry_run, "Executing order");
        match order.strategy {
            Strategy::Twap => self.twap.prepare_slices(order, dry_run).await,
            Strategy::Vwap => {
                // Volume weighting uses twice the slice count of the TWAP
                // schedule until a volume curve is available.
                let doubled = order.slice_count().checked_mul(2).ok_or_else(|| {
                    TradingError::InvalidOrder("slice count too large".into())
                })?;
                let vwap = order.clone().with_slices(doubled);
                self.twap.prepare_slices(&vwap, dry_run).await
            }
            Strategy::Limit => self.prepare_limit(order, dry_run).await.map(|slice| vec![slice]),
        }
    }

    /// Prepare an OfferCancel for every offer `account` still has on the
    /// book. Not risk-gated; the dry-run mode applies as for orders.
    pub async fn prepare_cancel_all(
        &self,
        account: &str,
        dry_run: bool,
    ) -> Result<Vec<PreparedTransaction>, TradingError> {
        self.ensure_enabled()?;
        let dry_run = dry_run || self.config.mode == ExecutionMode::DryRun;

        let offers = self.client.get_open_offers(account).await?;
        let cancels = offers
            .iter()
            .map(|offer| OfferCancel::new(account, offer.sequence).map(|cancel| (offer, cancel)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut prepared = Vec::with_capacity(cancels.len());
        for (offer, cancel) in cancels {
            let description = format!(
                "Cancel offer seq={}: {} for {}",
                offer.sequence, offer.taker_gets, offer.taker_pays
            );
            prepared.push(
                self.client
                    .prepare_transaction(cancel.into(), &description, dry_run)
                    .await?,
            );
        }

        tracing::info!(account, offers = prepared.len(), dry_run, "Offer cancellations prepared");
        self.events.emit(&TradingEvent::OffersCancelled {
            account: account.to_string(),
            sequences: offers.iter().map(|o| o.sequence).collect(),
            dry_run,
        });
        Ok(prepared)
    }

    async fn prepare_limit(&self, order: &Order, dry_run: bool) -> Result<Slice, TradingError> {
        self.risk.check_order(order).into_result()?;

        let price = order
            .price
            .ok_or_else(|| TradingError::InvalidOrder("limit orders require a price".into()))?;
        let (taker_pays, taker_gets) = offer_legs(order, order.amount)?;
        let offer = OfferCreate::new(
            order.account.clone(),
            taker_pays,
            taker_gets,
            OfferCreate::FLAG_SELL,
            Vec::new(),
        )?;
        let description = format!(
            "Limit {} {} {} @ {}",
            order.side, order.amount, order.pair.base.code, price
        );
        let prepared = self
            .client
            .prepare_transaction(TxPayload::from(offer), &description, dry_run)
            .await?;

        tracing::info!(
            order_id = %order.id,
            side = %order.side,
            pair = %order.pair,
            amount = %order.amount,
            price = %price,
            dry_run,
            "Limit order prepared"
        );
        self.events.emit(&TradingEvent::OrderSliced {
            order_id: order.id,
            strategy: order.strategy,
            side: order.side,
            pair: order.pair.clone(),
            amount: order.amount,
            slices: 1,
            dry_run,
        });

        Ok(Slice {
            order_id: order.id,
            index: 0,
            total_slices: 1,
            scheduled_at: Utc::now(),
            amount: order.amount,
            estimated_price: Some(price),
            prepared,
        })
    }
}
