//! Configuration management for tokensend
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, TokenSendError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for tokensend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Wallet and RPC endpoint settings
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Token unit settings
    #[serde(default)]
    pub token: TokenConfig,
    /// Receipt polling settings
    #[serde(default)]
    pub poller: PollerConfig,
    /// Confirmation time estimate settings
    #[serde(default)]
    pub estimate: EstimateConfig,
    /// Field store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wallet configuration
///
/// The wallet signs with local private keys read from an environment
/// variable and talks to a JSON-RPC node over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the node
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Name of the environment variable holding the private key(s),
    /// comma-separated when more than one account is available
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,

    /// Skip the interactive authorization prompt on connect
    #[serde(default)]
    pub auto_approve: bool,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_private_key_env() -> String {
    "TOKENSEND_PRIVATE_KEY".to_string()
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            private_key_env: default_private_key_env(),
            auto_approve: false,
        }
    }
}

/// Token unit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Decimals used to convert display amounts to base units.
    ///
    /// Every token is assumed to use 18 decimals unless this is changed.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    crate::units::DEFAULT_DECIMALS
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
        }
    }
}

/// Receipt polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between receipt lookups (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Give up after this many lookups; unbounded when absent
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
        }
    }
}

/// Confirmation time estimate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Compute the rough gas-based estimate after submission
    #[serde(default = "default_estimate_enabled")]
    pub enabled: bool,
}

fn default_estimate_enabled() -> bool {
    true
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            enabled: default_estimate_enabled(),
        }
    }
}

/// Field store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the sled database; platform data dir when absent
    #[serde(default)]
    pub path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append logs to this file
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "tokensend=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TokenSendError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| TokenSendError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(rpc_url) = std::env::var("TOKENSEND_RPC_URL") {
            self.wallet.rpc_url = rpc_url;
        }

        if let Ok(var) = std::env::var("TOKENSEND_PRIVATE_KEY_ENV") {
            self.wallet.private_key_env = var;
        }

        if let Ok(auto) = std::env::var("TOKENSEND_AUTO_APPROVE") {
            if let Ok(value) = auto.parse() {
                self.wallet.auto_approve = value;
            } else {
                tracing::warn!("Invalid TOKENSEND_AUTO_APPROVE: {}", auto);
            }
        }

        if let Ok(decimals) = std::env::var("TOKENSEND_DECIMALS") {
            if let Ok(value) = decimals.parse() {
                self.token.decimals = value;
            } else {
                tracing::warn!("Invalid TOKENSEND_DECIMALS: {}", decimals);
            }
        }

        if let Ok(interval) = std::env::var("TOKENSEND_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse() {
                self.poller.interval_ms = value;
            } else {
                tracing::warn!("Invalid TOKENSEND_POLL_INTERVAL_MS: {}", interval);
            }
        }

        if let Ok(attempts) = std::env::var("TOKENSEND_POLL_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse() {
                self.poller.max_attempts = Some(value);
            } else {
                tracing::warn!("Invalid TOKENSEND_POLL_MAX_ATTEMPTS: {}", attempts);
            }
        }

        if let Ok(level) = std::env::var("TOKENSEND_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }

        if cli.verbose {
            self.logging.level = "tokensend=debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.wallet.rpc_url.is_empty() {
            return Err(TokenSendError::Config("wallet.rpc_url cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.wallet.rpc_url).map_err(|e| {
            TokenSendError::Config(format!(
                "wallet.rpc_url is not a valid URL ({}): {}",
                self.wallet.rpc_url, e
            ))
        })?;

        if self.wallet.private_key_env.is_empty() {
            return Err(TokenSendError::Config(
                "wallet.private_key_env cannot be empty".to_string(),
            )
            .into());
        }

        if self.token.decimals > crate::units::MAX_DECIMALS {
            return Err(TokenSendError::Config(format!(
                "token.decimals must be less than or equal to {}",
                crate::units::MAX_DECIMALS
            ))
            .into());
        }

        if self.poller.interval_ms == 0 {
            return Err(TokenSendError::Config(
                "poller.interval_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.poller.max_attempts == Some(0) {
            return Err(TokenSendError::Config(
                "poller.max_attempts must be greater than 0 when set".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
