//! Tessera Bond Lifecycle
//!
//! Tracks bonds from draft to redemption, enforcing the status adjacency
//! table from `tessera-core`, recording defaults with a snapshot of what
//! was outstanding, and monitoring financial covenants for breaches.
//!
//! Issuance, coupons, maturity and early redemption are prepared as
//! unsigned ledger transactions through a `tessera-ledger` client.

pub mod error;
pub mod types;
pub mod coupon;
pub mod covenant;
pub mod events;
pub mod engine;

pub use coupon::{Coupon, CouponFrequency, CouponStatus};
pub use covenant::{
    Breach, BreachSeverity, BreachState, CheckFrequency, Covenant, CovenantCheck, CovenantDirection,
    CovenantKind, CovenantParams, CovenantStatus,
};
pub use engine::BondEngine;
pub use error::BondError;
pub use events::BondEvent;
pub use types::{
    Bond, BondParams, DefaultNotice, Issuance, KycStatus, MaturitySettlement, Participant,
    ParticipantParams, Redemption, TransitionRecord,
};
