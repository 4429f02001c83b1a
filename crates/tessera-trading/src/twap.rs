use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tessera_core::{Amount, Asset, EventBus};
use tessera_ledger::{LedgerAmount, LedgerClient, Memo, OfferCreate, TxPayload};

use crate::error::TradingError;
use crate::events::TradingEvent;
use crate::risk::RiskController;
use crate::types::{Order, Side, Slice, MAX_SLICES};

const SLICE_MEMO_TYPE: &str = "trading/twap-slice";

/// Split `total` into `parts` slices truncated to micro-units. The last
/// slice takes whatever the truncation left over, so the slices always sum
/// to `total`.
pub fn split_evenly(total: Amount, parts: u32) -> Result<Vec<Amount>, TradingError> {
    if parts == 0 {
        return Err(TradingError::InvalidOrder("slice count must be at least 1".into()));
    }
    if parts > MAX_SLICES {
        return Err(TradingError::InvalidOrder(format!(
            "slice count {} exceeds the maximum of {}",
            parts, MAX_SLICES
        )));
    }
    let slice = total
        .checked_div(parts)
        .ok_or_else(|| TradingError::InvalidOrder("slice count must be at least 1".into()))?;
    if slice.is_zero() {
        return Err(TradingError::InvalidOrder(format!(
            "{} split into {} slices leaves empty slices",
            total, parts
        )));
    }

    let mut slices = vec![slice; parts as usize];
    let allocated = Amount::from_units(slice.units() * (parts as u128 - 1));
    let last = total
        .checked_sub(allocated)
        .ok_or_else(|| TradingError::InvalidOrder("slice arithmetic underflow".into()))?;
    if let Some(final_slice) = slices.last_mut() {
        *final_slice = last;
    }
    Ok(slices)
}

/// The two offer legs for `quantity` of base: what the account receives
/// (`taker_pays`) and what it gives (`taker_gets`).
pub(crate) fn offer_legs(
    order: &Order,
    quantity: Amount,
) -> Result<(LedgerAmount, LedgerAmount), TradingError> {
    let quote_value = match order.price {
        Some(price) => quantity
            .checked_mul(price)
            .ok_or_else(|| TradingError::InvalidOrder("price overflow".into()))?,
        None => quantity,
    };
    let base = leg(&order.pair.base, quantity);
    let quote = leg(&order.pair.quote, quote_value);
    Ok(match order.side {
        Side::Buy => (base, quote),
        Side::Sell => (quote, base),
    })
}

/// Start time of each of `count` slices, `interval` apart from `start`.
fn schedule(
    start: DateTime<Utc>,
    interval: Option<Duration>,
    count: u32,
) -> Result<Vec<DateTime<Utc>>, TradingError> {
    let out_of_range = || TradingError::InvalidOrder("slice schedule out of range".into());
    let interval = interval.ok_or_else(out_of_range)?;
    (0..count)
        .map(|index| {
            i32::try_from(index)
                .ok()
                .and_then(|i| interval.checked_mul(i))
                .and_then(|offset| start.checked_add_signed(offset))
                .ok_or_else(out_of_range)
        })
        .collect()
}

fn leg(asset: &Asset, value: Amount) -> LedgerAmount {
    LedgerAmount::new(value, asset.clone())
}

/// Time-weighted slicing of one order into resting offers.
pub struct TwapStrategy {
    client: Arc<dyn LedgerClient>,
    risk: Arc<RiskController>,
    events: EventBus<TradingEvent>,
}

impl TwapStrategy {
    pub fn new(client: Arc<dyn LedgerClient>, risk: Arc<RiskController>) -> Self {
        let events = risk.events().clone();
        Self {
            client,
            risk,
            events,
        }
    }

    /// Gate the order once on its total, then prepare one unsigned
    /// `OfferCreate` per slice.
    pub async fn prepare_slices(&self, order: &Order, dry_run: bool) -> Result<Vec<Slice>, TradingError> {
        self.risk.check_order(order).into_result()?;

        let total_slices = order.slice_count();
        let amounts = split_evenly(order.amount, total_slices)?;
        let times = schedule(Utc::now(), order.interval(), total_slices)?;

        // Everything is built before the adapter sees the first slice.
        let mut offers = Vec::with_capacity(amounts.len());
        for (index, amount) in (0u32..).zip(amounts) {
            let (taker_pays, taker_gets) = offer_legs(order, amount)?;
            let memo = Memo::json(
                SLICE_MEMO_TYPE,
                &serde_json::json!({
                    "order_id": order.id.to_string(),
                    "slice": index + 1,
                    "of": total_slices,
                }),
            );
            let offer = OfferCreate::new(order.account.clone(), taker_pays, taker_gets, 0, vec![memo])?;
            let description = format!(
                "TWAP slice {}/{}: {} {} {}",
                index + 1,
                total_slices,
                order.side,
                amount.to_fixed(6),
                order.pair.base.code
            );
            offers.push((index, amount, offer, description));
        }

        let mut slices = Vec::with_capacity(offers.len());
        for ((index, amount, offer, description), scheduled_at) in offers.into_iter().zip(times) {
            let prepared = self
                .client
                .prepare_transaction(TxPayload::from(offer), &description, dry_run)
                .await?;

            slices.push(Slice {
                order_id: order.id,
                index,
                total_slices,
                scheduled_at,
                amount,
                estimated_price: order.price,
                prepared,
            });
        }

        tracing::info!(
            order_id = %order.id,
            side = %order.side,
            pair = %order.pair,
            amount = %order.amount,
            slices = total_slices,
            dry_run,
            "Order sliced"
        );
        self.events.emit(&TradingEvent::OrderSliced {
            order_id: order.id,
            strategy: order.strategy,
            side: order.side,
            pair: order.pair.clone(),
            amount: order.amount,
            slices: total_slices,
            dry_run,
        });
        Ok(slices)
    }
}
