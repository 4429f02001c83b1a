//! Tessera Trading
//!
//! Every order passes the [`RiskController`] before anything is prepared.
//! Approved orders become unsigned `OfferCreate` transactions: one per
//! time slice for TWAP/VWAP, a single resting offer for limit orders.
//! Nothing here submits or schedules; slice times are only computed.

pub mod error;
pub mod types;
pub mod events;
pub mod risk;
pub mod twap;
pub mod engine;

pub use engine::{ExecutionMode, TradingConfig, TradingEngine};
pub use error::TradingError;
pub use events::TradingEvent;
pub use risk::{RiskConfig, RiskController, RiskDecision, RiskRejection, RiskSnapshot};
pub use twap::{split_evenly, TwapStrategy};
pub use types::{
    Order, Pair, Side, Slice, Strategy, DEFAULT_INTERVAL_SECS, DEFAULT_SLICES,
    MAX_SLICES,
};
