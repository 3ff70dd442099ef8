//! Withheld transfer fee collection
//!
//! Transfer fees accumulate on each recipient's token account. Collecting
//! them means finding every token account of the mint and withdrawing the
//! non-zero balances into the payer's associated account.
//!
//! Cost model: accounts are found with a `getProgramAccounts` memcmp on the
//! mint address at offset 0. There is no index behind it; the node scans
//! every account the token program owns, so one scan is O(n) in program
//! accounts.
//!
//! Mints are processed one by one and a failure on one mint does not stop
//! the others.

use solana_rpc_client_api::filter::{Memcmp, RpcFilterType};
use solana_sdk::{account::Account, pubkey::Pubkey, signature::Signature};
use spl_token_2022::{
    extension::{
        transfer_fee::{instruction::withdraw_withheld_tokens_from_accounts, TransferFeeAmount},
        BaseStateWithExtensions, StateWithExtensions,
    },
    state::Account as TokenAccount,
};
use tracing::{info, warn, Instrument};

use crate::chain::ChainClient;
use crate::errors::{ForgeError, ForgeResult};
use crate::metrics::metrics;
use crate::observability::CorrelationId;
use crate::tx_builder::{create_associated_account_instruction, TxBuilder};
use crate::wallet::{require_connected, WalletCapability};

/// Token accounts carrying withheld fees for one mint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithheldScan {
    /// Accounts with a non-zero withheld amount, in scan order
    pub accounts: Vec<Pubkey>,
    /// Sum of their withheld amounts in base units
    pub total_withheld: u64,
}

/// Result for one mint
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    Withdrawn {
        signature: Signature,
        accounts: Vec<Pubkey>,
        total_withheld: u64,
        /// `total_withheld` scaled by the mint decimals
        ui_total: f64,
    },
    NothingToWithdraw,
    Failed {
        error: ForgeError,
    },
}

impl CollectionOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Withdrawn { .. } => "withdrawn",
            Self::NothingToWithdraw => "nothing",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintCollectionReport {
    pub mint: Pubkey,
    pub outcome: CollectionOutcome,
}

/// Withheld amount recorded on one token account
pub fn withheld_amount(data: &[u8]) -> ForgeResult<u64> {
    let state = StateWithExtensions::<TokenAccount>::unpack(data)?;
    let fee = state.get_extension::<TransferFeeAmount>()?;
    Ok(u64::from(fee.withheld_amount))
}

/// Pick the accounts worth withdrawing from. Any account that fails to
/// decode fails the whole scan.
pub fn select_withheld(accounts: &[(Pubkey, Account)]) -> ForgeResult<WithheldScan> {
    let mut scan = WithheldScan::default();
    for (address, account) in accounts {
        let withheld = withheld_amount(&account.data).map_err(|e| {
            ForgeError::Serialization(format!("token account {}: {}", address, e))
        })?;
        if withheld > 0 {
            scan.accounts.push(*address);
            scan.total_withheld = scan.total_withheld.saturating_add(withheld);
        }
    }
    Ok(scan)
}

/// Every token account of `mint` with fees withheld
pub async fn scan_withheld(chain: &dyn ChainClient, mint: &Pubkey) -> ForgeResult<WithheldScan> {
    let filters = vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
        0,
        mint.as_ref(),
    ))];
    let accounts = chain
        .get_program_accounts(&spl_token_2022::id(), filters)
        .await?;
    select_withheld(&accounts)
}

/// Collect withheld fees for each of `mints` into the payer's associated
/// accounts. `decimals` scales the reported totals.
pub async fn collect_withheld_fees(
    chain: &dyn ChainClient,
    wallet: &dyn WalletCapability,
    mints: &[Pubkey],
    decimals: u8,
) -> Vec<MintCollectionReport> {
    let correlation_id = CorrelationId::new();
    let mut reports = Vec::with_capacity(mints.len());

    for mint in mints {
        let outcome = match collect_for_mint(chain, wallet, mint, decimals)
            .instrument(correlation_id.span("collect_fees"))
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(mint = %mint, error = %error, "Fee collection failed for mint");
                CollectionOutcome::Failed { error }
            }
        };
        metrics()
            .fee_collections
            .with_label_values(&[outcome.label()])
            .inc();
        reports.push(MintCollectionReport {
            mint: *mint,
            outcome,
        });
    }
    reports
}

async fn collect_for_mint(
    chain: &dyn ChainClient,
    wallet: &dyn WalletCapability,
    mint: &Pubkey,
    decimals: u8,
) -> ForgeResult<CollectionOutcome> {
    let payer = require_connected(wallet)?;
    let builder = TxBuilder::new(chain, wallet);

    let (destination, create_ix) = create_associated_account_instruction(&payer, &payer, mint);
    if chain.get_account_info(&destination).await?.is_none() {
        builder.execute(&[create_ix], &[]).await?;
    }

    let scan = scan_withheld(chain, mint).await?;
    if scan.accounts.is_empty() {
        info!(mint = %mint, "No withheld fees to withdraw");
        return Ok(CollectionOutcome::NothingToWithdraw);
    }

    let sources: Vec<&Pubkey> = scan.accounts.iter().collect();
    let ix = withdraw_withheld_tokens_from_accounts(
        &spl_token_2022::id(),
        mint,
        &destination,
        &payer,
        &[],
        &sources,
    )?;
    let signature = builder.execute(&[ix], &[]).await?;

    let ui_total = spl_token_2022::amount_to_ui_amount(scan.total_withheld, decimals);
    info!(
        mint = %mint,
        accounts = scan.accounts.len(),
        total_withheld = scan.total_withheld,
        ui_total,
        signature = %signature,
        "Withheld fees withdrawn"
    );
    Ok(CollectionOutcome::Withdrawn {
        signature,
        accounts: scan.accounts,
        total_withheld: scan.total_withheld,
        ui_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{token_account_data, token_owned};

    fn holder(mint: Pubkey, withheld: u64) -> (Pubkey, Account) {
        let data = token_account_data(mint, Pubkey::new_unique(), 100, withheld);
        (Pubkey::new_unique(), token_owned(data, 1))
    }

    #[test]
    fn test_select_keeps_only_nonzero() {
        let mint = Pubkey::new_unique();
        let accounts: Vec<_> = [0, 5, 0, 12].iter().map(|&w| holder(mint, w)).collect();

        let scan = select_withheld(&accounts).unwrap();

        assert_eq!(scan.accounts, vec![accounts[1].0, accounts[3].0]);
        assert_eq!(scan.total_withheld, 17);
    }

    #[test]
    fn test_undecodable_account_fails_scan() {
        let mint = Pubkey::new_unique();
        let mut accounts = vec![holder(mint, 3)];
        accounts.push((Pubkey::new_unique(), token_owned(vec![1, 2, 3], 1)));

        assert!(matches!(
            select_withheld(&accounts),
            Err(ForgeError::Serialization(_))
        ));
    }

    #[test]
    fn test_empty_scan() {
        assert_eq!(select_withheld(&[]).unwrap(), WithheldScan::default());
    }
}
