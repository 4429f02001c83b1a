use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::{Amount, Asset};
use tessera_ledger::PreparedTransaction;
use uuid::Uuid;

pub const DEFAULT_SLICES: u32 = 10;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Upper bound on slices per order, after any strategy multiplier.
pub const MAX_SLICES: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Twap,
    Vwap,
    Limit,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twap => "twap",
            Self::Vwap => "vwap",
            Self::Limit => "limit",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument traded: `base` priced in `quote`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub base: Asset,
    pub quote: Asset,
}

impl Pair {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// An order as submitted. Never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub strategy: Strategy,
    pub side: Side,
    pub pair: Pair,
    /// Trading account the offers are prepared for.
    pub account: String,
    /// Total quantity of the base asset.
    pub amount: Amount,
    /// Quote units per base unit. Required for limit orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slices: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl Order {
    pub fn new(
        strategy: Strategy,
        side: Side,
        pair: Pair,
        account: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            strategy,
            side,
            pair,
            account: account.into(),
            amount,
            price: None,
            slices: None,
            interval_secs: None,
        }
    }

    pub fn with_price(mut self, price: Amount) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_slices(mut self, slices: u32) -> Self {
        self.slices = Some(slices);
        self
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    pub fn slice_count(&self) -> u32 {
        self.slices.unwrap_or(DEFAULT_SLICES)
    }

    /// Spacing between slices. `None` when the configured interval does
    /// not fit a `Duration`.
    pub fn interval(&self) -> Option<Duration> {
        let secs = self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        i64::try_from(secs).ok().and_then(Duration::try_seconds)
    }
}

/// One prepared piece of an order.
#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    pub order_id: Uuid,
    /// Zero-based.
    pub index: u32,
    pub total_slices: u32,
    pub scheduled_at: DateTime<Utc>,
    pub amount: Amount,
    /// `None` for market slices.
    pub estimated_price: Option<Amount>,
    pub prepared: PreparedTransaction,
}

impl Slice {
    /// Price label as shown to approvers.
    pub fn price_label(&self) -> String {
        match self.estimated_price {
            Some(price) => price.to_string(),
            None => "market".to_string(),
        }
    }
}
