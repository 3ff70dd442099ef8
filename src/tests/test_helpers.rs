//! Shared fixtures for the workflow scenario tests

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    signature::Keypair,
    transaction::Transaction,
};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::Config;
use crate::deploy::{
    DeploymentError, DeploymentReport, DeploymentSettings, DeploymentWorkflow, TokenRequest,
};
use crate::ledger::DeployedTokenLedger;
use crate::relay::{MetadataBackend, MetadataRelay};
use crate::test_utils::{MockChainClient, MockWallet};

pub const PAYER_FUNDS: u64 = 10_000_000_000;

/// In-memory chain, connected wallet and in-process relay over a temp ledger
pub struct Harness {
    pub chain: Arc<MockChainClient>,
    pub wallet: MockWallet,
    pub relay: MetadataRelay,
    pub ledger: Arc<DeployedTokenLedger>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_wallet(MockWallet::connected())
    }

    pub fn with_wallet(wallet: MockWallet) -> Self {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(MockChainClient::new());
        chain.fund(wallet.pubkey(), PAYER_FUNDS);
        let ledger = Arc::new(DeployedTokenLedger::new(dir.path().join("deployedTokens.json")));
        let relay = MetadataRelay::new(chain.clone(), Arc::clone(&ledger));
        Self {
            chain,
            wallet,
            relay,
            ledger,
            _dir: dir,
        }
    }

    pub fn settings() -> DeploymentSettings {
        DeploymentSettings::from_config(&Config::default().token).unwrap()
    }

    pub async fn deploy(&self, symbol: &str) -> Result<DeploymentReport, DeploymentError> {
        self.deploy_via(&self.relay, symbol, Keypair::new()).await
    }

    pub async fn deploy_via(
        &self,
        backend: &dyn MetadataBackend,
        symbol: &str,
        mint: Keypair,
    ) -> Result<DeploymentReport, DeploymentError> {
        let workflow =
            DeploymentWorkflow::new(self.chain.as_ref(), &self.wallet, backend, Self::settings());
        workflow.run_with_mint(&token_request(symbol), mint).await
    }
}

pub fn token_request(symbol: &str) -> TokenRequest {
    TokenRequest {
        name: format!("{} Token", symbol),
        symbol: symbol.to_string(),
        uri: format!("https://example.com/{}.json", symbol.to_lowercase()),
    }
}

/// Instructions of a compiled transaction, with enough account metadata for
/// classification
pub fn decompile(tx: &Transaction) -> Vec<Instruction> {
    let keys = &tx.message.account_keys;
    tx.message
        .instructions
        .iter()
        .map(|ix| Instruction {
            program_id: keys[ix.program_id_index as usize],
            accounts: ix
                .accounts
                .iter()
                .map(|&i| AccountMeta::new(keys[i as usize], tx.message.is_signer(i as usize)))
                .collect(),
            data: ix.data.clone(),
        })
        .collect()
}
