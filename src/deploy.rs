//! Token deployment workflow
//!
//! Deploying a token takes four transactions, each built with a fresh
//! blockhash, signed, submitted and confirmed at `processed` before the next
//! one starts:
//!
//! 1. mint account creation + extension initialization, co-signed by the new
//!    mint key pair
//! 2. metadata initialization, built by the relay and signed here
//! 3. idempotent creation of the payer's associated account
//! 4. initial supply minted into that account
//!
//! Any failure stops the workflow where it is. Nothing is rolled back: a
//! failure after stage 1 leaves a mint on chain without metadata or supply,
//! and [`DeploymentError::stage`] says exactly how far it got.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::fmt;
use thiserror::Error;
use tracing::{error, info, Instrument};

use crate::chain::ChainClient;
use crate::config::TokenConfig;
use crate::errors::{ForgeError, ForgeResult};
use crate::metrics::metrics;
use crate::observability::CorrelationId;
use crate::relay::{CreateMetadataRequest, MetadataBackend};
use crate::token_ops::{mint_to_instruction, whole_to_base_units};
use crate::tx_builder::{
    create_associated_account_instruction, decode_transaction, mint_space,
    plan_mint_creation_instructions, MintCreationParams, TxBuilder,
};
use crate::wallet::{require_connected, WalletCapability};

/// Named states of the deployment, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeploymentStage {
    MintAccountCreation,
    ExtensionInitialization,
    SigningAndSubmission,
    MetadataRelayRoundTrip,
    AssociatedAccountCreation,
    InitialMint,
}

impl DeploymentStage {
    pub const ALL: [DeploymentStage; 6] = [
        Self::MintAccountCreation,
        Self::ExtensionInitialization,
        Self::SigningAndSubmission,
        Self::MetadataRelayRoundTrip,
        Self::AssociatedAccountCreation,
        Self::InitialMint,
    ];

    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MintAccountCreation => "mint_account_creation",
            Self::ExtensionInitialization => "extension_initialization",
            Self::SigningAndSubmission => "signing_and_submission",
            Self::MetadataRelayRoundTrip => "metadata_relay_round_trip",
            Self::AssociatedAccountCreation => "associated_account_creation",
            Self::InitialMint => "initial_mint",
        }
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow aborted at `stage`
#[derive(Debug, Clone, Error)]
#[error("deployment of {mint} aborted at {stage}: {source}")]
pub struct DeploymentError {
    pub stage: DeploymentStage,
    /// Mint being deployed; it may already exist on chain
    pub mint: Pubkey,
    pub source: ForgeError,
}

/// Token parameters fixed for every deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSettings {
    pub decimals: u8,
    pub fee_basis_points: u16,
    pub max_fee: u64,
    pub transfer_hook_program: Pubkey,
    /// Whole tokens
    pub initial_supply: u64,
}

impl DeploymentSettings {
    pub fn from_config(token: &TokenConfig) -> ForgeResult<Self> {
        let transfer_hook_program = token.transfer_hook_program.parse().map_err(|e| {
            ForgeError::Configuration(format!("token.transfer_hook_program: {}", e))
        })?;
        Ok(Self {
            decimals: token.decimals,
            fee_basis_points: token.fee_basis_points,
            max_fee: token.max_fee,
            transfer_hook_program,
            initial_supply: token.initial_supply,
        })
    }
}

/// What the user asked to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

impl TokenRequest {
    /// Same rule the relay applies: every field non-empty, whitespace counts
    fn validate(&self) -> ForgeResult<()> {
        let fields = [("name", &self.name), ("symbol", &self.symbol), ("uri", &self.uri)];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(ForgeError::validation(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// Everything a completed deployment produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub mint: Pubkey,
    pub associated_account: Pubkey,
    pub mint_signature: Signature,
    pub metadata_signature: Signature,
    pub associated_account_signature: Signature,
    pub initial_mint_signature: Signature,
    /// Base units minted in the last stage
    pub initial_supply: u64,
}

/// Runs deployments with explicitly supplied chain, wallet and relay
pub struct DeploymentWorkflow<'a> {
    chain: &'a dyn ChainClient,
    wallet: &'a dyn WalletCapability,
    backend: &'a dyn MetadataBackend,
    settings: DeploymentSettings,
}

impl<'a> DeploymentWorkflow<'a> {
    pub fn new(
        chain: &'a dyn ChainClient,
        wallet: &'a dyn WalletCapability,
        backend: &'a dyn MetadataBackend,
        settings: DeploymentSettings,
    ) -> Self {
        Self {
            chain,
            wallet,
            backend,
            settings,
        }
    }

    /// Deploy with a freshly generated mint key pair
    pub async fn run(&self, request: &TokenRequest) -> Result<DeploymentReport, DeploymentError> {
        self.run_with_mint(request, Keypair::new()).await
    }

    /// Deploy using `mint_keypair` as the new mint's identity
    pub async fn run_with_mint(
        &self,
        request: &TokenRequest,
        mint_keypair: Keypair,
    ) -> Result<DeploymentReport, DeploymentError> {
        let correlation_id = CorrelationId::new();
        let span = correlation_id.span("deploy");
        metrics().deployments_started.inc();

        let result = self.execute(request, &mint_keypair).instrument(span.clone()).await;
        let _entered = span.enter();
        match &result {
            Ok(report) => {
                metrics().deployments_completed.inc();
                info!(
                    mint = %report.mint,
                    associated_account = %report.associated_account,
                    supply = report.initial_supply,
                    "Deployment complete"
                );
            }
            Err(e) => {
                metrics()
                    .deployments_aborted
                    .with_label_values(&[e.stage.as_str()])
                    .inc();
                error!(mint = %e.mint, stage = %e.stage, error = %e.source, "Deployment aborted");
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &TokenRequest,
        mint_keypair: &Keypair,
    ) -> Result<DeploymentReport, DeploymentError> {
        let mint = mint_keypair.pubkey();
        let abort = |stage: DeploymentStage| {
            move |source: ForgeError| DeploymentError {
                stage,
                mint,
                source,
            }
        };
        let builder = TxBuilder::new(self.chain, self.wallet);

        // Nothing has touched the chain until the first submission
        let (payer, lamports, space) = self
            .mint_account_inputs(request)
            .await
            .map_err(abort(DeploymentStage::MintAccountCreation))?;

        let plan = plan_mint_creation_instructions(&MintCreationParams {
            payer,
            mint,
            decimals: self.settings.decimals,
            fee_basis_points: self.settings.fee_basis_points,
            max_fee: self.settings.max_fee,
            transfer_hook_program: self.settings.transfer_hook_program,
            lamports,
            space,
        })
        .map_err(abort(DeploymentStage::ExtensionInitialization))?;

        let mint_signature = async {
            let tx = builder.prepare(&plan.instructions, &payer).await?;
            builder.sign_submit_confirm(tx, &[mint_keypair]).await
        }
        .await
        .map_err(abort(DeploymentStage::SigningAndSubmission))?;
        info!(mint = %mint, signature = %mint_signature, "Mint created");

        let metadata_signature = self
            .metadata_round_trip(&builder, request, &mint, &payer)
            .await
            .map_err(abort(DeploymentStage::MetadataRelayRoundTrip))?;
        info!(mint = %mint, signature = %metadata_signature, "Metadata initialized");

        let (associated_account, create_ix) =
            create_associated_account_instruction(&payer, &payer, &mint);
        let associated_account_signature = builder
            .execute(&[create_ix], &[])
            .await
            .map_err(abort(DeploymentStage::AssociatedAccountCreation))?;
        info!(
            account = %associated_account,
            signature = %associated_account_signature,
            "Associated account ready"
        );

        let initial_supply =
            whole_to_base_units(self.settings.initial_supply, self.settings.decimals)
                .map_err(abort(DeploymentStage::InitialMint))?;
        let initial_mint_signature = async {
            let ix = mint_to_instruction(
                &mint,
                &associated_account,
                &payer,
                initial_supply,
                self.settings.decimals,
            )?;
            builder.execute(&[ix], &[]).await
        }
        .await
        .map_err(abort(DeploymentStage::InitialMint))?;

        Ok(DeploymentReport {
            mint,
            associated_account,
            mint_signature,
            metadata_signature,
            associated_account_signature,
            initial_mint_signature,
            initial_supply,
        })
    }

    async fn mint_account_inputs(
        &self,
        request: &TokenRequest,
    ) -> ForgeResult<(Pubkey, u64, usize)> {
        request.validate()?;
        let payer = require_connected(self.wallet)?;
        let space = mint_space()?;
        let lamports = self
            .chain
            .get_minimum_balance_for_rent_exemption(space)
            .await?;
        Ok((payer, lamports, space))
    }

    async fn metadata_round_trip(
        &self,
        builder: &TxBuilder<'_>,
        request: &TokenRequest,
        mint: &Pubkey,
        payer: &Pubkey,
    ) -> ForgeResult<Signature> {
        let relay_request = CreateMetadataRequest::new(
            mint,
            payer,
            payer,
            &request.name,
            &request.symbol,
            &request.uri,
        );
        let encoded = self.backend.create_metadata(&relay_request).await?;
        let tx = decode_transaction(&encoded)?;
        if tx.message.account_keys.first() != Some(payer) {
            return Err(ForgeError::Backend(
                "relay transaction has an unexpected fee payer".to_string(),
            ));
        }
        builder.sign_submit_confirm(tx, &[]).await
    }
}
