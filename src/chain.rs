//! Chain client capability
//!
//! Workflows never touch an RPC client directly; they receive a
//! [`ChainClient`] so tests can substitute an in-memory chain. The RPC-backed
//! implementation targets one fixed endpoint for the whole process lifetime.

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::{
    config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    filter::RpcFilterType,
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction,
};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{ForgeError, ForgeResult};
use crate::metrics::{metrics, Timer};

/// Network facade consumed by every workflow
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch a recent blockhash. Blockhashes expire, so call immediately before use.
    async fn get_latest_blockhash(&self) -> ForgeResult<Hash>;

    /// Lamports an account of `data_len` bytes needs to be rent-exempt
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> ForgeResult<u64>;

    /// Submit a signed transaction
    async fn send_transaction(&self, transaction: &Transaction) -> ForgeResult<Signature>;

    /// Block until `signature` reaches `commitment` or is reported failed
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> ForgeResult<()>;

    /// Read an account; `None` when it does not exist
    async fn get_account_info(&self, address: &Pubkey) -> ForgeResult<Option<Account>>;

    /// Every account owned by `program_id` passing `filters`.
    ///
    /// Memcmp filters are evaluated by the node over the program's full
    /// account set; cost is linear in the number of accounts the program owns.
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> ForgeResult<Vec<(Pubkey, Account)>>;
}

/// [`ChainClient`] backed by a nonblocking Solana RPC client
pub struct RpcChainClient {
    client: RpcClient,
    poll_interval: Duration,
    confirm_timeout: Option<Duration>,
}

impl RpcChainClient {
    pub fn new(
        url: String,
        commitment: CommitmentConfig,
        poll_interval: Duration,
        confirm_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url, commitment),
            poll_interval,
            confirm_timeout,
        }
    }

    /// Build from the `[network]` section
    pub fn from_config(config: &Config) -> ForgeResult<Self> {
        Ok(Self::new(
            config.network.rpc_url.clone(),
            config.commitment()?,
            Duration::from_millis(config.network.confirm_poll_interval_ms),
            config.network.confirm_timeout_secs.map(Duration::from_secs),
        ))
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    async fn poll_until_confirmed(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> ForgeResult<()> {
        loop {
            match self
                .client
                .get_signature_status_with_commitment(signature, commitment)
                .await?
            {
                Some(Ok(())) => return Ok(()),
                Some(Err(err)) => {
                    return Err(ForgeError::confirmation(signature, err.to_string()));
                }
                None => {
                    debug!(signature = %signature, "Signature not yet at requested commitment");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_latest_blockhash(&self) -> ForgeResult<Hash> {
        let timer = Timer::new();
        let hash = self.client.get_latest_blockhash().await?;
        timer.observe_duration(&metrics().rpc_latency);
        Ok(hash)
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> ForgeResult<u64> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ForgeResult<Signature> {
        let timer = Timer::new();
        let signature = self.client.send_transaction(transaction).await?;
        timer.observe_duration(&metrics().rpc_latency);
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> ForgeResult<()> {
        let timer = Timer::new();
        let result = match self.confirm_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.poll_until_confirmed(signature, commitment))
                    .await
                {
                    Ok(inner) => inner,
                    Err(_) => {
                        warn!(
                            signature = %signature,
                            timeout_secs = limit.as_secs(),
                            "Confirmation timed out"
                        );
                        Err(ForgeError::confirmation(
                            signature,
                            format!("not confirmed within {}s", limit.as_secs()),
                        ))
                    }
                }
            }
            None => self.poll_until_confirmed(signature, commitment).await,
        };
        timer.observe_duration(&metrics().confirmation_latency);
        result
    }

    async fn get_account_info(&self, address: &Pubkey) -> ForgeResult<Option<Account>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> ForgeResult<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.client.commitment()),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };
        Ok(self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?)
    }
}
