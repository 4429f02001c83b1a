use std::sync::Arc;
use tessera_bond::BondEngine;
use tessera_core::{AuditTrail, Subscription};
use tessera_escrow::{EscrowManager, InMemoryVault};
use tessera_ledger::{LedgerClient, OfflineLedger};
use tessera_trading::TradingEngine;

use crate::config::PlatformConfig;

/// All engines built from one [`PlatformConfig`], sharing a ledger client
/// and a single audit trail.
pub struct Platform {
    config: PlatformConfig,
    client: Arc<dyn LedgerClient>,
    vault: Arc<InMemoryVault>,
    escrow: EscrowManager,
    bonds: BondEngine,
    trading: TradingEngine,
    audit: Arc<AuditTrail>,
    _audit_subscriptions: Vec<Subscription>,
}

impl Platform {
    /// Build against an [`OfflineLedger`] for the configured network.
    pub fn from_config(config: PlatformConfig) -> anyhow::Result<Self> {
        let mut ledger = OfflineLedger::new(config.ledger.network())
            .with_required_signers(config.ledger.required_signers);
        if let Some(fee) = &config.ledger.fee {
            ledger = ledger.with_fee(fee.clone());
        }
        Self::with_client(config, Arc::new(ledger))
    }

    /// Build against any ledger adapter.
    pub fn with_client(config: PlatformConfig, client: Arc<dyn LedgerClient>) -> anyhow::Result<Self> {
        let vault = Arc::new(InMemoryVault::new());
        let escrow = EscrowManager::new(client.clone(), config.escrow.templates.clone())?
            .with_vault(vault.clone());
        let bonds = BondEngine::new(client.clone());
        let trading = TradingEngine::new(client.clone(), config.trading.clone());

        let audit = Arc::new(AuditTrail::new());
        let subscriptions = vec![
            audit.attach(escrow.events()),
            audit.attach(bonds.events()),
            audit.attach(trading.events()),
        ];

        tracing::info!(
            adapter_id = %client.adapter_id(),
            network = %client.network(),
            templates = config.escrow.templates.len(),
            trading_enabled = config.trading.enabled,
            "Platform initialised"
        );

        Ok(Self {
            config,
            client,
            vault,
            escrow,
            bonds,
            trading,
            audit,
            _audit_subscriptions: subscriptions,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    pub fn vault(&self) -> &Arc<InMemoryVault> {
        &self.vault
    }

    pub fn escrow(&self) -> &EscrowManager {
        &self.escrow
    }

    pub fn bonds(&self) -> &BondEngine {
        &self.bonds
    }

    pub fn trading(&self) -> &TradingEngine {
        &self.trading
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tessera_bond::{BondParams, CouponFrequency};
    use tessera_core::{Amount, Asset, BondStatus, LedgerKind};
    use tessera_escrow::EscrowCreateRequest;
    use tessera_trading::{Order, Pair, Side, Strategy};

    fn bond_params() -> BondParams {
        BondParams {
            name: "Harbour Bond".into(),
            description: String::new(),
            currency: "HBR".into(),
            face_value: Amount::from_whole(1_000_000),
            minimum_denomination: Amount::from_whole(1_000),
            coupon_rate: Amount::parse("0.05").unwrap(),
            coupon_frequency: CouponFrequency::Annual,
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            maturity_date: NaiveDate::from_ymd_opt(2031, 1, 1).unwrap(),
            callable: false,
            issuer_address: "rIssuer".into(),
            coupon_account: "rIssuer".into(),
            settlement_account: "rIssuer".into(),
            created_by: "ops".into(),
        }
    }

    #[test]
    fn test_from_default_config() {
        let platform = Platform::from_config(PlatformConfig::default()).unwrap();
        assert_eq!(platform.ledger().adapter_id(), "offline-xrpl-testnet");
        assert_eq!(platform.escrow().templates().len(), 3);
        assert!(platform.audit().is_empty());
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut config = PlatformConfig::default();
        config.escrow.templates[0].duration_days = 0;
        assert!(Platform::from_config(config).is_err());
    }

    #[tokio::test]
    async fn test_shared_audit_trail() {
        let mut config = PlatformConfig::default();
        config.trading.enabled = true;
        config.ledger.fee = Some("20".into());
        let platform = Platform::from_config(config).unwrap();

        let bond = platform.bonds().create_bond(bond_params()).unwrap();
        platform
            .bonds()
            .transition_status(bond.id, BondStatus::Approved, "committee")
            .unwrap();

        let created = platform
            .escrow()
            .prepare_create(
                EscrowCreateRequest {
                    source_address: "rSource".into(),
                    destination_address: "rDest".into(),
                    amount: Amount::from_whole(5_000),
                    template_name: "bond_settlement".into(),
                    counterparty_id: "cp-1".into(),
                    instrument_id: bond.id.to_string(),
                    finish_after_days: None,
                    cancel_after_days: None,
                },
                true,
            )
            .await
            .unwrap();
        assert_eq!(created.prepared.native["Fee"], "20");
        assert_eq!(platform.vault().len(), 1);

        let pair = Pair::new(Asset::native(LedgerKind::Xrpl), Asset::issued("USD", "rIssuer"));
        let order = Order::new(Strategy::Twap, Side::Buy, pair, "rTrader", Amount::from_whole(100));
        platform.trading().execute_order(&order, true).await.unwrap();

        let components: Vec<String> = platform
            .audit()
            .events()
            .into_iter()
            .map(|e| e.component)
            .collect();
        assert_eq!(
            components,
            vec!["tessera-bond", "tessera-bond", "tessera-escrow", "tessera-trading"]
        );
    }
}
