//! Tessera
//!
//! Prepares unsigned XRPL and Stellar transactions for bond issuance,
//! conditional escrow settlement and risk-gated execution. Nothing is
//! signed or submitted here; every prepared transaction goes to a
//! multi-signature quorum.
//!
//! This crate wires the engines together from a TOML [`PlatformConfig`]
//! and re-exports the component crates.

pub mod config;
pub mod platform;
pub mod telemetry;

pub use config::{EscrowConfig, LedgerConfig, LogFormat, LoggingConfig, PlatformConfig};
pub use platform::Platform;

pub use {tessera_bond, tessera_core, tessera_crypto, tessera_escrow, tessera_ledger, tessera_trading};
