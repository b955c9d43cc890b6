//! # Store Configuration
//!
//! `pos.toml` settings for a Grocer POS installation.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     GROCER_DB_PATH=/srv/pos/pos.db                                      │
//! │     GROCER_TAX_RATE_BPS=1800                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/pos/pos.toml (Linux)                                      │
//! │     ~/Library/Application Support/com.grocer.pos/pos.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/pos/pos.db"
//! max_connections = 5
//!
//! [store]
//! name = "Kandy Road Grocers"
//! currency = "LKR"
//! tax_rate_bps = 0
//!
//! [settlement]
//! on_missing_product = "skip"   # skip | fail
//! allow_negative_stock = true
//!
//! [discounts]
//! eligible_tiers = ["retail", "wholesale", "credit", "other"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use grocer_core::discount::DiscountPolicy;
use grocer_core::money::CURRENCY_CODE;
use grocer_core::settlement::{OnMissingProduct, SettlementPolicy};
use grocer_core::{ErrorKind, PriceTier, TaxRate};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("grocer-pos.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub name: String,
    /// Informational; amounts are always stored in cents of this currency.
    pub currency: String,
    /// VAT in basis points. Zero when the store is not VAT-registered.
    pub tax_rate_bps: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: "Grocer POS".to_string(),
            currency: CURRENCY_CODE.to_string(),
            tax_rate_bps: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    pub on_missing_product: OnMissingProduct,
    pub allow_negative_stock: bool,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        SettlementSettings {
            on_missing_product: OnMissingProduct::Skip,
            allow_negative_stock: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountSettings {
    /// Price tiers whose carts get automatic discounts.
    pub eligible_tiers: Vec<PriceTier>,
}

impl Default for DiscountSettings {
    fn default() -> Self {
        DiscountSettings {
            eligible_tiers: PriceTier::ALL.to_vec(),
        }
    }
}

// =============================================================================
// PosConfig
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub settlement: SettlementSettings,
    #[serde(default)]
    pub discounts: DiscountSettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`pos.toml`), if it exists
    /// 3. `GROCER_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml::to_string_pretty(self)?)?;

        info!(?path, "Store config saved");
        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment
    /// in [`load`](Self::load)). Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("GROCER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(name) = lookup("GROCER_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(rate) = lookup("GROCER_TAX_RATE_BPS") {
            match rate.trim().parse::<u32>() {
                Ok(bps) => {
                    debug!(bps, "Overriding tax rate from environment");
                    self.store.tax_rate_bps = bps;
                }
                Err(_) => warn!(value = %rate, "Ignoring invalid GROCER_TAX_RATE_BPS"),
            }
        }

        if let Some(flag) = lookup("GROCER_ALLOW_NEGATIVE_STOCK") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.settlement.allow_negative_stock = true,
                "0" | "false" | "no" => self.settlement.allow_negative_stock = false,
                _ => warn!(value = %flag, "Ignoring invalid GROCER_ALLOW_NEGATIVE_STOCK"),
            }
        }

        if let Some(mode) = lookup("GROCER_ON_MISSING_PRODUCT") {
            match mode.parse::<OnMissingProduct>() {
                Ok(parsed) => self.settlement.on_missing_product = parsed,
                Err(_) => warn!(value = %mode, "Ignoring invalid GROCER_ON_MISSING_PRODUCT"),
            }
        }

        if let Some(tiers) = lookup("GROCER_DISCOUNT_TIERS") {
            let parsed: Result<Vec<PriceTier>, _> = tiers
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(parsed) => self.discounts.eligible_tiers = parsed,
                Err(_) => warn!(value = %tiers, "Ignoring invalid GROCER_DISCOUNT_TIERS"),
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.store.currency != CURRENCY_CODE {
            return Err(ConfigError::Invalid(format!(
                "store.currency must be {CURRENCY_CODE}, got {}",
                self.store.currency
            )));
        }
        if self.store.tax_rate_bps > 10000 {
            return Err(ConfigError::Invalid(
                "store.tax_rate_bps must be between 0 and 10000".into(),
            ));
        }
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "grocer", "pos")
            .map(|dirs| dirs.config_dir().join("pos.toml"))
    }

    // =========================================================================
    // Derived settings
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn settlement_policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            tax_rate: TaxRate::from_bps(self.store.tax_rate_bps),
            on_missing_product: self.settlement.on_missing_product,
            allow_negative_stock: self.settlement.allow_negative_stock,
        }
    }

    pub fn discount_policy(&self) -> DiscountPolicy {
        DiscountPolicy {
            eligible_tiers: self.discounts.eligible_tiers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = PosConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settlement_policy(), SettlementPolicy::default());
        assert_eq!(config.discount_policy(), DiscountPolicy::default());
        assert_eq!(config.db_config().max_connections, 5);
    }

    #[test]
    fn test_partial_toml() {
        let config: PosConfig = toml::from_str(
            r#"
            [store]
            name = "Kandy Road Grocers"
            tax_rate_bps = 1800

            [settlement]
            on_missing_product = "fail"

            [discounts]
            eligible_tiers = ["retail"]
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "Kandy Road Grocers");
        assert_eq!(config.store.currency, "LKR");
        assert_eq!(config.database, DatabaseSettings::default());

        let policy = config.settlement_policy();
        assert_eq!(policy.tax_rate.bps(), 1800);
        assert_eq!(policy.on_missing_product, OnMissingProduct::Fail);
        assert!(policy.allow_negative_stock);

        assert!(!config.discount_policy().allows(PriceTier::Wholesale));
    }

    #[test]
    fn test_overrides() {
        let vars = env(&[
            ("GROCER_DB_PATH", "/srv/pos/pos.db"),
            ("GROCER_TAX_RATE_BPS", "800"),
            ("GROCER_ALLOW_NEGATIVE_STOCK", "false"),
            ("GROCER_ON_MISSING_PRODUCT", "FAIL"),
            ("GROCER_DISCOUNT_TIERS", "retail, credit"),
            ("GROCER_STORE_NAME", "Galle Branch"),
        ]);

        let mut config = PosConfig::default();
        config.apply_overrides(|k| vars.get(k).cloned());

        assert_eq!(config.database.path, PathBuf::from("/srv/pos/pos.db"));
        assert_eq!(config.store.tax_rate_bps, 800);
        assert!(!config.settlement.allow_negative_stock);
        assert_eq!(config.settlement.on_missing_product, OnMissingProduct::Fail);
        assert_eq!(
            config.discounts.eligible_tiers,
            vec![PriceTier::Retail, PriceTier::Credit]
        );
        assert_eq!(config.store.name, "Galle Branch");
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let vars = env(&[
            ("GROCER_TAX_RATE_BPS", "eighteen"),
            ("GROCER_ALLOW_NEGATIVE_STOCK", "maybe"),
            ("GROCER_DISCOUNT_TIERS", "retail,vip"),
        ]);

        let mut config = PosConfig::default();
        config.apply_overrides(|k| vars.get(k).cloned());

        assert_eq!(config, PosConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = PosConfig::default();
        config.store.tax_rate_bps = 12_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PosConfig::default();
        config.store.currency = "USD".into();
        assert!(config.validate().is_err());

        let mut config = PosConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_and_save_file() {
        let path = std::env::temp_dir().join(format!("grocer-pos-{}.toml", uuid::Uuid::new_v4()));

        let mut config = PosConfig::default();
        config.store.tax_rate_bps = 1500;
        config.save(&path).unwrap();

        let loaded = PosConfig::from_file(&path).unwrap();
        assert_eq!(loaded.store.tax_rate_bps, 1500);

        std::fs::write(&path, "[store\nname = ").unwrap();
        assert!(matches!(PosConfig::from_file(&path), Err(ConfigError::Parse(_))));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&PosConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[settlement]"));
        assert!(toml_str.contains("on_missing_product = \"skip\""));
    }
}
