//! TokenForge command line
//!
//! Runs the metadata relay server, deploys tokens through it, and manages
//! supply and withheld fees for deployed tokens.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenforge::chain::{ChainClient, RpcChainClient};
use tokenforge::config::Config;
use tokenforge::deploy::{DeploymentSettings, DeploymentWorkflow, TokenRequest};
use tokenforge::fees::{collect_withheld_fees, CollectionOutcome};
use tokenforge::ledger::{DeployedTokenLedger, LedgerDocument};
use tokenforge::relay::{HttpMetadataBackend, MetadataRelay};
use tokenforge::server::{AppState, RelayServer};
use tokenforge::token_ops;
use tokenforge::wallet::{KeypairWallet, WalletCapability};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "tokenforge.toml", global = true)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the metadata relay HTTP server
    Serve,

    /// Deploy a new token and mint its initial supply
    Deploy {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        /// URI of the off-chain metadata JSON
        #[arg(long)]
        uri: String,
    },

    /// Withdraw withheld transfer fees (defaults to every mint in the ledger)
    CollectFees {
        #[arg(long = "mint")]
        mints: Vec<String>,
    },

    /// Mint tokens into the payer's associated account
    MintTo {
        #[arg(long)]
        mint: String,
        /// Amount in base units
        #[arg(long)]
        amount: u64,
    },

    /// Burn tokens from the payer's associated account
    Burn {
        #[arg(long)]
        mint: String,
        /// Amount in base units
        #[arg(long)]
        amount: u64,
    },

    /// Print the deployed token ledger
    Tokens,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    match args.command {
        Commands::Serve => serve(&config).await,
        Commands::Deploy { name, symbol, uri } => {
            deploy(&config, TokenRequest { name, symbol, uri }).await
        }
        Commands::CollectFees { mints } => collect_fees(&config, &mints).await,
        Commands::MintTo { mint, amount } => {
            let (chain, wallet) = connect(&config).await?;
            let mint = parse_mint(&mint)?;
            let change = token_ops::mint_to(
                chain.as_ref(),
                &wallet,
                &mint,
                amount,
                config.token.decimals,
            )
            .await
            .map_err(|e| report_failure("mint-to", e))?;
            println!("Minted {} to {} ({})", change.amount, change.account, change.signature);
            Ok(())
        }
        Commands::Burn { mint, amount } => {
            let (chain, wallet) = connect(&config).await?;
            let mint = parse_mint(&mint)?;
            let change =
                token_ops::burn(chain.as_ref(), &wallet, &mint, amount, config.token.decimals)
                    .await
                    .map_err(|e| report_failure("burn", e))?;
            println!("Burned {} from {} ({})", change.amount, change.account, change.signature);
            Ok(())
        }
        Commands::Tokens => {
            let ledger = DeployedTokenLedger::new(&config.server.ledger_path);
            let document = ledger.read().await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "tokenforge=debug,info"
    } else {
        "tokenforge=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn rpc_chain(config: &Config) -> Result<Arc<RpcChainClient>> {
    let chain = RpcChainClient::from_config(config)?;
    info!(rpc = %chain.url(), "Chain client ready");
    Ok(Arc::new(chain))
}

async fn connect(config: &Config) -> Result<(Arc<RpcChainClient>, KeypairWallet)> {
    let chain = rpc_chain(config)?;
    let wallet = KeypairWallet::from_file(&config.wallet.keypair_path)
        .context("Failed to load wallet")?;
    let pubkey = wallet.connect().await?;
    info!(wallet = %pubkey, "Wallet address");
    Ok((chain, wallet))
}

fn parse_mint(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("'{}' is not a valid mint address", value))
}

/// Log the full error, show the user the generic message
fn report_failure(action: &str, e: tokenforge::ForgeError) -> anyhow::Error {
    error!(action, error = %e, category = e.category(), "Operation failed");
    anyhow::anyhow!("{}", e.user_message())
}

async fn serve(config: &Config) -> Result<()> {
    let chain: Arc<dyn ChainClient> = rpc_chain(config)?;
    let ledger = Arc::new(DeployedTokenLedger::new(&config.server.ledger_path));
    let relay = MetadataRelay::new(chain, ledger);
    let server = RelayServer::bind(
        &config.server.bind_addr,
        AppState::new(relay),
        config.server.max_body_bytes,
    )
    .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    Ok(())
}

async fn deploy(config: &Config, request: TokenRequest) -> Result<()> {
    let (chain, wallet) = connect(config).await?;
    let backend = HttpMetadataBackend::new(
        &config.backend.url,
        Duration::from_secs(config.backend.timeout_secs),
    )?;
    let settings = DeploymentSettings::from_config(&config.token)?;
    let workflow = DeploymentWorkflow::new(chain.as_ref(), &wallet, &backend, settings);

    match workflow.run(&request).await {
        Ok(report) => {
            println!("Mint:               {}", report.mint);
            println!("Associated account: {}", report.associated_account);
            println!("Initial supply:     {} base units", report.initial_supply);
            println!("Signatures:");
            println!("  mint creation     {}", report.mint_signature);
            println!("  metadata          {}", report.metadata_signature);
            println!("  associated acct   {}", report.associated_account_signature);
            println!("  initial mint      {}", report.initial_mint_signature);
            Ok(())
        }
        Err(e) => {
            error!(stage = %e.stage, mint = %e.mint, error = %e.source, "Deployment failed");
            Err(anyhow::anyhow!(
                "{} (stopped at {}; mint {})",
                e.source.user_message(),
                e.stage,
                e.mint
            ))
        }
    }
}

async fn collect_fees(config: &Config, mints: &[String]) -> Result<()> {
    let mints: Vec<Pubkey> = if mints.is_empty() {
        let ledger = DeployedTokenLedger::new(&config.server.ledger_path);
        let document = if ledger.exists().await {
            ledger.read().await?
        } else {
            LedgerDocument::default()
        };
        let mut seen = Vec::new();
        for record in document.minted_token_details {
            let mint = parse_mint(&record.address)?;
            if !seen.contains(&mint) {
                seen.push(mint);
            }
        }
        seen
    } else {
        mints.iter().map(|m| parse_mint(m)).collect::<Result<_>>()?
    };
    if mints.is_empty() {
        warn!("No mints to collect fees for");
        return Ok(());
    }

    let (chain, wallet) = connect(config).await?;
    let reports =
        collect_withheld_fees(chain.as_ref(), &wallet, &mints, config.token.decimals).await;

    for report in reports {
        match report.outcome {
            CollectionOutcome::Withdrawn {
                signature,
                accounts,
                ui_total,
                ..
            } => println!(
                "{}: withdrew {} from {} accounts ({})",
                report.mint,
                ui_total,
                accounts.len(),
                signature
            ),
            CollectionOutcome::NothingToWithdraw => {
                println!("{}: no fees to withdraw", report.mint)
            }
            CollectionOutcome::Failed { error } => {
                println!("{}: failed: {}", report.mint, error.user_message())
            }
        }
    }
    Ok(())
}
