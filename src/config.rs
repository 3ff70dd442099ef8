//! Configuration module for tokenforge
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;

use crate::errors::{ForgeError, ForgeResult};

/// Transfer-hook program every deployed mint points at
pub const DEFAULT_TRANSFER_HOOK_PROGRAM: &str = "71KWoZM3r9KgkCrY5d5keYH4z7c8poJQBHpyZVmPAcnQ";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Parameters of every token the deployment workflow creates
    #[serde(default)]
    pub token: TokenConfig,

    /// Metadata relay HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the deployment workflow reaches the metadata relay
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The single RPC endpoint used for the whole process lifetime
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Commitment used for reads ("processed", "confirmed", "finalized")
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Interval between signature status polls while confirming
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_interval_ms: u64,

    /// Give up confirming after this many seconds. Unset waits indefinitely.
    #[serde(default)]
    pub confirm_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Decimal precision of the mint
    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Transfer fee in basis points (100 = 1%)
    #[serde(default = "default_fee_basis_points")]
    pub fee_basis_points: u16,

    /// Maximum fee charged per transfer, in base units
    #[serde(default = "default_max_fee")]
    pub max_fee: u64,

    /// Program invoked on every transfer
    #[serde(default = "default_transfer_hook_program")]
    pub transfer_hook_program: String,

    /// Whole tokens minted into the payer's account after deployment
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the relay listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// JSON document holding the deployed token ledger
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Requests with larger bodies are rejected
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the metadata relay
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// HTTP timeout for relay requests
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_confirm_poll_ms() -> u64 { 500 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_decimals() -> u8 { 9 }
fn default_fee_basis_points() -> u16 { 100 }
fn default_max_fee() -> u64 { 1_000_000 }
fn default_transfer_hook_program() -> String { DEFAULT_TRANSFER_HOOK_PROGRAM.to_string() }
fn default_initial_supply() -> u64 { 10 }
fn default_bind_addr() -> String { "0.0.0.0:3001".to_string() }
fn default_ledger_path() -> String { "deployedTokens.json".to_string() }
fn default_max_body_bytes() -> usize { 64 * 1024 }
fn default_backend_url() -> String { "http://localhost:3001".to_string() }
fn default_backend_timeout() -> u64 { 30 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            commitment: default_commitment(),
            confirm_poll_interval_ms: default_confirm_poll_ms(),
            confirm_timeout_secs: None,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { keypair_path: default_keypair_path() }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            fee_basis_points: default_fee_basis_points(),
            max_fee: default_max_fee(),
            transfer_hook_program: default_transfer_hook_program(),
            initial_supply: default_initial_supply(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_path: default_ledger_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            wallet: WalletConfig::default(),
            token: TokenConfig::default(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TOKENFORGE_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TOKENFORGE_RPC_URL") {
            self.network.rpc_url = v;
        }
        if let Some(v) = lookup("TOKENFORGE_KEYPAIR_PATH") {
            self.wallet.keypair_path = v;
        }
        if let Some(v) = lookup("TOKENFORGE_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("TOKENFORGE_LEDGER_PATH") {
            self.server.ledger_path = v;
        }
        if let Some(v) = lookup("TOKENFORGE_BACKEND_URL") {
            self.backend.url = v;
        }
    }

    /// Reject values the workflows cannot operate with
    pub fn validate(&self) -> ForgeResult<()> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(ForgeError::Configuration("network.rpc_url is empty".to_string()));
        }
        self.commitment()?;
        if self.token.fee_basis_points > 10_000 {
            return Err(ForgeError::Configuration(format!(
                "token.fee_basis_points must be <= 10000, got {}",
                self.token.fee_basis_points
            )));
        }
        if self.token.decimals > 9 {
            return Err(ForgeError::Configuration(format!(
                "token.decimals must be <= 9, got {}",
                self.token.decimals
            )));
        }
        self.transfer_hook_program()?;
        Ok(())
    }

    /// Parsed read commitment
    pub fn commitment(&self) -> ForgeResult<CommitmentConfig> {
        CommitmentConfig::from_str(&self.network.commitment).map_err(|_| {
            ForgeError::Configuration(format!(
                "unknown commitment level '{}'",
                self.network.commitment
            ))
        })
    }

    /// Parsed transfer-hook program id
    pub fn transfer_hook_program(&self) -> ForgeResult<Pubkey> {
        Pubkey::from_str(&self.token.transfer_hook_program).map_err(|e| {
            ForgeError::Configuration(format!("token.transfer_hook_program: {}", e))
        })
    }
}
