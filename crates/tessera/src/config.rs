//! Platform configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{LedgerKind, LedgerNetwork, NetworkEnvironment};
use tessera_escrow::{default_templates, EscrowTemplate};
use tessera_ledger::DEFAULT_REQUIRED_SIGNERS;
use tessera_trading::TradingConfig;

/// Full configuration for a Tessera platform instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    /// Target ledger and preparation defaults.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Escrow templates.
    #[serde(default)]
    pub escrow: EscrowConfig,

    /// Trading engine and risk limits.
    #[serde(default)]
    pub trading: TradingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_kind")]
    pub kind: LedgerKind,
    #[serde(default)]
    pub environment: NetworkEnvironment,
    /// Fee override; the network default is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    /// Signatures a prepared transaction needs.
    #[serde(default = "default_required_signers")]
    pub required_signers: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    #[serde(default = "default_templates")]
    pub templates: Vec<EscrowTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `tessera_bond=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_ledger_kind() -> LedgerKind {
    LedgerKind::Xrpl
}
fn default_required_signers() -> u8 {
    DEFAULT_REQUIRED_SIGNERS
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind: default_ledger_kind(),
            environment: NetworkEnvironment::default(),
            fee: None,
            required_signers: default_required_signers(),
        }
    }
}

impl LedgerConfig {
    pub fn network(&self) -> LedgerNetwork {
        LedgerNetwork::new(self.kind, self.environment)
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl PlatformConfig {
    /// Load config from a TOML file, falling back to defaults when the file
    /// is absent or a field is missing.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: PlatformConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Amount;
    use tessera_trading::ExecutionMode;

    #[test]
    fn test_default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.ledger.network(), LedgerNetwork::xrpl_testnet());
        assert_eq!(config.ledger.required_signers, 2);
        assert_eq!(config.escrow.templates.len(), 3);
        assert!(!config.trading.enabled);
        assert_eq!(config.trading.mode, ExecutionMode::DryRun);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let config = PlatformConfig::load(Path::new("/nonexistent/tessera.toml")).unwrap();
        assert_eq!(config.escrow.templates.len(), 3);
    }

    #[test]
    fn test_config_from_toml_partial() {
        let toml_str = r#"
[ledger]
kind = "stellar"

[trading]
enabled = true
mode = "live"

[trading.risk]
max_daily_volume = 250000

[[escrow.templates]]
name = "short_hold"
duration_days = 7
use_crypto_condition = false
min_amount = "10"
max_amount = "5000"

[logging]
format = "json"
"#;
        let config: PlatformConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.ledger.network(), LedgerNetwork::stellar_testnet());
        assert!(config.trading.enabled);
        assert_eq!(config.trading.mode, ExecutionMode::Live);
        assert_eq!(config.trading.risk.max_daily_volume, Amount::from_whole(250_000));
        // Unset risk limits keep their defaults.
        assert_eq!(config.trading.risk.stop_loss_pct, 0.05);
        assert_eq!(config.escrow.templates.len(), 1);
        assert_eq!(config.escrow.templates[0].max_amount, Amount::from_whole(5000));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("tessera-{}", uuid::Uuid::now_v7()))
            .join("tessera.toml");
        let mut config = PlatformConfig::default();
        config.ledger.fee = Some("15".into());
        config.trading.enabled = true;
        config.save(&path).unwrap();

        let loaded = PlatformConfig::load(&path).unwrap();
        assert_eq!(loaded.ledger.fee.as_deref(), Some("15"));
        assert!(loaded.trading.enabled);
        assert_eq!(loaded.escrow.templates, config.escrow.templates);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
