//! Wallet capability
//!
//! The workflows only need three things from a wallet: connect, expose the
//! connected public key, and sign a transaction as fee payer. Anything that
//! provides those (a keypair file, a hardware signer, a browser bridge) can
//! drive a deployment.

use async_trait::async_trait;
use parking_lot::RwLock;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::Arc;
use tracing::info;

use crate::errors::{ForgeError, ForgeResult};

/// Signing capability handed to every workflow
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Connect and return the wallet's public key. A wallet that cannot be
    /// reached fails with `WalletConnectionFailed` and stays disconnected.
    async fn connect(&self) -> ForgeResult<Pubkey>;

    /// Public key of the connected wallet, `None` before `connect`
    fn public_key(&self) -> Option<Pubkey>;

    /// Sign `transaction` as fee payer, keeping any signatures already present
    async fn sign_transaction(&self, transaction: Transaction) -> ForgeResult<Transaction>;
}

/// Public key of a connected wallet, or `WalletUnavailable`
pub fn require_connected(wallet: &dyn WalletCapability) -> ForgeResult<Pubkey> {
    wallet.public_key().ok_or_else(|| {
        ForgeError::WalletUnavailable("wallet not connected".to_string())
    })
}

/// Wallet backed by a local keypair file
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
    connected: RwLock<Option<Pubkey>>,
}

impl KeypairWallet {
    /// Load a keypair from a JSON array file or a raw 64-byte file
    pub fn from_file(path: &str) -> ForgeResult<Self> {
        let expanded = expand_home(path);
        let keypair_bytes = std::fs::read(&expanded).map_err(|e| {
            ForgeError::WalletUnavailable(format!(
                "failed to read keypair file {}: {}",
                expanded, e
            ))
        })?;

        let raw: Vec<u8> = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice(&keypair_bytes).map_err(|e| {
                ForgeError::WalletUnavailable(format!("failed to parse keypair JSON: {}", e))
            })?
        };

        Self::from_bytes(&raw)
    }

    /// Build from 64 secret key bytes
    pub fn from_bytes(bytes: &[u8]) -> ForgeResult<Self> {
        if bytes.len() != 64 {
            return Err(ForgeError::WalletUnavailable(format!(
                "invalid keypair length: expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        if bytes.iter().all(|&b| b == 0) {
            return Err(ForgeError::WalletUnavailable(
                "invalid keypair: all-zero key rejected".to_string(),
            ));
        }
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| ForgeError::WalletUnavailable(format!("invalid keypair bytes: {}", e)))?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
            connected: RwLock::new(None),
        }
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home, rest),
        _ => path.to_string(),
    }
}

#[async_trait]
impl WalletCapability for KeypairWallet {
    async fn connect(&self) -> ForgeResult<Pubkey> {
        let pubkey = self.keypair.pubkey();
        *self.connected.write() = Some(pubkey);
        info!(wallet = %pubkey, "Wallet connected");
        Ok(pubkey)
    }

    fn public_key(&self) -> Option<Pubkey> {
        *self.connected.read()
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> ForgeResult<Transaction> {
        if self.public_key().is_none() {
            return Err(ForgeError::WalletUnavailable("wallet not connected".to_string()));
        }
        let blockhash = transaction.message.recent_blockhash;
        transaction.try_partial_sign(&[self.keypair.as_ref()], blockhash)?;
        Ok(transaction)
    }
}
