//! Core transaction building and submission
//!
//! Every transaction goes through the same pipeline: fresh blockhash, fee
//! payer, co-signer partial signatures, wallet signature, submit, and block
//! until the requested commitment. Nothing is retried.

use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use tracing::{debug, info};

use crate::chain::ChainClient;
use crate::errors::ForgeResult;
use crate::wallet::{require_connected, WalletCapability};

/// Builds, signs and submits transactions for one workflow run
pub struct TxBuilder<'a> {
    chain: &'a dyn ChainClient,
    wallet: &'a dyn WalletCapability,
    commitment: CommitmentConfig,
}

impl<'a> TxBuilder<'a> {
    /// Builder confirming at `processed`, as the workflows require
    pub fn new(chain: &'a dyn ChainClient, wallet: &'a dyn WalletCapability) -> Self {
        Self::with_commitment(chain, wallet, CommitmentConfig::processed())
    }

    pub fn with_commitment(
        chain: &'a dyn ChainClient,
        wallet: &'a dyn WalletCapability,
        commitment: CommitmentConfig,
    ) -> Self {
        Self {
            chain,
            wallet,
            commitment,
        }
    }

    /// Unsigned transaction with a blockhash fetched right now and `payer` as fee payer
    pub async fn prepare(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
    ) -> ForgeResult<Transaction> {
        let mut tx = Transaction::new_with_payer(instructions, Some(payer));
        tx.message.recent_blockhash = self.chain.get_latest_blockhash().await?;
        Ok(tx)
    }

    /// Partially sign with `co_signers`, then wallet-sign, submit and confirm
    pub async fn sign_submit_confirm(
        &self,
        mut tx: Transaction,
        co_signers: &[&Keypair],
    ) -> ForgeResult<Signature> {
        if !co_signers.is_empty() {
            let blockhash = tx.message.recent_blockhash;
            tx.try_partial_sign(co_signers, blockhash)?;
        }
        let signed = self.wallet.sign_transaction(tx).await?;
        self.submit_and_confirm(&signed).await
    }

    /// Submit an already fully signed transaction and wait for confirmation
    pub async fn submit_and_confirm(&self, tx: &Transaction) -> ForgeResult<Signature> {
        let signature = self.chain.send_transaction(tx).await?;
        debug!(signature = %signature, "Transaction submitted");
        self.chain
            .confirm_transaction(&signature, self.commitment)
            .await?;
        info!(
            signature = %signature,
            commitment = ?self.commitment.commitment,
            "Transaction confirmed"
        );
        Ok(signature)
    }

    /// Prepare with the connected wallet as fee payer, then sign, submit and confirm
    pub async fn execute(
        &self,
        instructions: &[Instruction],
        co_signers: &[&Keypair],
    ) -> ForgeResult<Signature> {
        let payer = require_connected(self.wallet)?;
        let tx = self.prepare(instructions, &payer).await?;
        self.sign_submit_confirm(tx, co_signers).await
    }
}
