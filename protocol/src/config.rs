//! # Engine Configuration & Constants
//!
//! Every magic number lives here. If you're hardcoding an account label or
//! a voucher lifetime somewhere else, move it here.
//!
//! [`EngineConfig`] is what a host hands the settlement engine at startup.
//! It can be built in code (`Default` is a working devnet setup) or loaded
//! from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{AccountId, AssetId};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Default account label of the exchange desk contract.
pub const DEFAULT_DESK_ACCOUNT: &str = "exchange-desk";

/// Default account label of the reserve vault contract.
pub const DEFAULT_VAULT_ACCOUNT: &str = "reserve-vault";

/// Default owner/admin of both contracts.
pub const DEFAULT_ADMIN_ACCOUNT: &str = "owner";

// ---------------------------------------------------------------------------
// Payment asset
// ---------------------------------------------------------------------------

/// Symbol of the payment asset used when none is configured.
pub const DEFAULT_PAYMENT_SYMBOL: &str = "USDC";

/// Issuer of the default payment asset.
pub const DEFAULT_PAYMENT_ISSUER: &str = "devnet";

// ---------------------------------------------------------------------------
// Vouchers
// ---------------------------------------------------------------------------

/// Domain tag mixed into every voucher digest. Change it and every
/// outstanding voucher becomes invalid, which is the point.
pub const DEFAULT_VOUCHER_DOMAIN: &str = "reserve-engine/devnet/v1";

/// Longest a voucher may be valid for, in seconds. One day.
pub const DEFAULT_MAX_VOUCHER_TTL_SECS: u64 = 86_400;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config text is not valid JSON for [`EngineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The config parsed but describes an unusable engine.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// The payment asset the vault reserves in, described by symbol and issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAssetConfig {
    /// Ticker symbol, e.g. `USDC`.
    pub symbol: String,
    /// Issuer label; part of the asset's identity.
    pub issuer: String,
}

impl PaymentAssetConfig {
    /// The content-addressed identifier of this asset.
    pub fn asset_id(&self) -> AssetId {
        AssetId::derive(&self.symbol, &self.issuer)
    }
}

/// Startup configuration for a settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Account label of the exchange desk.
    pub desk_account: String,
    /// Account label of the reserve vault.
    pub vault_account: String,
    /// Owner/admin of both contracts.
    pub admin_account: String,
    /// The asset the vault holds and pays out.
    pub payment_asset: PaymentAssetConfig,
    /// Domain tag for voucher digests.
    pub voucher_domain: String,
    /// Maximum voucher lifetime in seconds.
    pub max_voucher_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            desk_account: DEFAULT_DESK_ACCOUNT.to_string(),
            vault_account: DEFAULT_VAULT_ACCOUNT.to_string(),
            admin_account: DEFAULT_ADMIN_ACCOUNT.to_string(),
            payment_asset: PaymentAssetConfig {
                symbol: DEFAULT_PAYMENT_SYMBOL.to_string(),
                issuer: DEFAULT_PAYMENT_ISSUER.to_string(),
            },
            voucher_domain: DEFAULT_VOUCHER_DOMAIN.to_string(),
            max_voucher_ttl_secs: DEFAULT_MAX_VOUCHER_TTL_SECS,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject configs the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let labels = [
            ("desk_account", &self.desk_account),
            ("vault_account", &self.vault_account),
            ("admin_account", &self.admin_account),
        ];
        for (field, value) in labels {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        // Outstanding supply excludes both contract balances; they must differ.
        if self.desk_account == self.vault_account {
            return Err(ConfigError::Invalid(
                "desk_account and vault_account must differ".into(),
            ));
        }
        if self.admin_account == self.desk_account || self.admin_account == self.vault_account {
            return Err(ConfigError::Invalid(
                "admin_account must not be a contract account".into(),
            ));
        }
        if self.payment_asset.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("payment_asset.symbol must not be empty".into()));
        }
        if self.voucher_domain.is_empty() {
            return Err(ConfigError::Invalid("voucher_domain must not be empty".into()));
        }
        if self.max_voucher_ttl_secs == 0 {
            return Err(ConfigError::Invalid("max_voucher_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    /// The desk's account id.
    pub fn desk(&self) -> AccountId {
        AccountId::new(self.desk_account.clone())
    }

    /// The vault's account id.
    pub fn vault(&self) -> AccountId {
        AccountId::new(self.vault_account.clone())
    }

    /// The admin's account id.
    pub fn admin(&self) -> AccountId {
        AccountId::new(self.admin_account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "admin_account": "treasurer" }"#).unwrap();
        assert_eq!(config.admin_account, "treasurer");
        assert_eq!(config.desk_account, DEFAULT_DESK_ACCOUNT);
        assert_eq!(config.max_voucher_ttl_secs, DEFAULT_MAX_VOUCHER_TTL_SECS);
    }

    #[test]
    fn same_desk_and_vault_rejected() {
        let json = r#"{ "desk_account": "x", "vault_account": "x" }"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn admin_as_contract_rejected() {
        let json = r#"{ "admin_account": "reserve-vault" }"#;
        assert!(EngineConfig::from_json_str(json).is_err());
    }

    #[test]
    fn zero_ttl_rejected() {
        let json = r#"{ "max_voucher_ttl_secs": 0 }"#;
        assert!(EngineConfig::from_json_str(json).is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn payment_asset_id_matches_derivation() {
        let config = EngineConfig::default();
        assert_eq!(
            config.payment_asset.asset_id(),
            AssetId::derive(DEFAULT_PAYMENT_SYMBOL, DEFAULT_PAYMENT_ISSUER)
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "payment_asset": {{ "symbol": "BRL", "issuer": "bcb" }} }}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.payment_asset.symbol, "BRL");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
