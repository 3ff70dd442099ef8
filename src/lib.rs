//! TokenForge - Token-2022 deployment toolkit
//!
//! Deploys a token carrying transfer-fee, metadata-pointer and transfer-hook
//! extensions, writes its metadata through a small relay service, and
//! collects the transfer fees it withholds.
//!
//! Workflows receive their chain and wallet as explicit capabilities
//! ([`chain::ChainClient`], [`wallet::WalletCapability`]) so tests can run
//! them against the in-memory doubles in [`test_utils`].

pub mod chain;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod fees;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod relay;
pub mod rent;
pub mod server;
pub mod token_ops;
pub mod tx_builder;
pub mod wallet;

pub mod test_utils;


// Re-export commonly used types
pub use errors::{ForgeError, ForgeResult};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
