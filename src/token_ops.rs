//! Supply changes against the payer's associated account
//!
//! Both operations use the checked Token-2022 instructions, so a decimals
//! mismatch between the caller and the mint fails on chain instead of
//! moving the wrong amount.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use spl_token_2022::instruction as token_ix;
use tracing::info;

use crate::chain::ChainClient;
use crate::errors::{ForgeError, ForgeResult};
use crate::tx_builder::{associated_account, create_associated_account_instruction, TxBuilder};
use crate::wallet::{require_connected, WalletCapability};

/// Outcome of a supply change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyChange {
    pub signature: Signature,
    /// Associated account that was credited or debited
    pub account: Pubkey,
    /// Base units
    pub amount: u64,
}

/// `MintToChecked` with a single-key authority
pub fn mint_to_instruction(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> ForgeResult<Instruction> {
    Ok(token_ix::mint_to_checked(
        &spl_token_2022::id(),
        mint,
        destination,
        authority,
        &[],
        amount,
        decimals,
    )?)
}

/// Whole tokens to base units, rejecting overflow
pub fn whole_to_base_units(whole: u64, decimals: u8) -> ForgeResult<u64> {
    10u64
        .checked_pow(decimals as u32)
        .and_then(|factor| whole.checked_mul(factor))
        .ok_or_else(|| {
            ForgeError::validation(format!(
                "{} tokens at {} decimals overflows a u64 amount",
                whole, decimals
            ))
        })
}

/// Mint `amount` base units into the payer's associated account, creating
/// the account first if needed
pub async fn mint_to(
    chain: &dyn ChainClient,
    wallet: &dyn WalletCapability,
    mint: &Pubkey,
    amount: u64,
    decimals: u8,
) -> ForgeResult<SupplyChange> {
    if amount == 0 {
        return Err(ForgeError::validation("amount must be greater than zero"));
    }
    let payer = require_connected(wallet)?;
    let (account, create_ix) = create_associated_account_instruction(&payer, &payer, mint);
    let mint_ix = mint_to_instruction(mint, &account, &payer, amount, decimals)?;

    let signature = TxBuilder::new(chain, wallet)
        .execute(&[create_ix, mint_ix], &[])
        .await?;
    info!(mint = %mint, account = %account, amount, signature = %signature, "Tokens minted");
    Ok(SupplyChange {
        signature,
        account,
        amount,
    })
}

/// Burn `amount` base units from the payer's associated account
pub async fn burn(
    chain: &dyn ChainClient,
    wallet: &dyn WalletCapability,
    mint: &Pubkey,
    amount: u64,
    decimals: u8,
) -> ForgeResult<SupplyChange> {
    if amount == 0 {
        return Err(ForgeError::validation("amount must be greater than zero"));
    }
    let payer = require_connected(wallet)?;
    let account = associated_account(&payer, mint);
    let burn_ix = token_ix::burn_checked(
        &spl_token_2022::id(),
        &account,
        mint,
        &payer,
        &[],
        amount,
        decimals,
    )?;

    let signature = TxBuilder::new(chain, wallet).execute(&[burn_ix], &[]).await?;
    info!(mint = %mint, account = %account, amount, signature = %signature, "Tokens burned");
    Ok(SupplyChange {
        signature,
        account,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mint_account_data, token_owned, MockChainClient, MockWallet};
    use solana_sdk::rent::Rent;

    fn setup() -> (MockChainClient, MockWallet, Pubkey) {
        let chain = MockChainClient::new();
        let wallet = MockWallet::connected();
        let mint = Pubkey::new_unique();
        let data = mint_account_data(wallet.pubkey(), 6);
        let lamports = Rent::default().minimum_balance(data.len());
        chain.set_account(mint, token_owned(data, lamports));
        chain.fund(wallet.pubkey(), 1_000_000_000);
        (chain, wallet, mint)
    }

    #[test]
    fn test_whole_to_base_units() {
        assert_eq!(whole_to_base_units(10, 9).unwrap(), 10_000_000_000);
        assert_eq!(whole_to_base_units(7, 0).unwrap(), 7);
        assert!(whole_to_base_units(u64::MAX, 9).is_err());
    }

    #[tokio::test]
    async fn test_mint_then_burn_moves_supply() {
        let (chain, wallet, mint) = setup();

        let minted = mint_to(&chain, &wallet, &mint, 5_000, 6).await.unwrap();
        assert_eq!(chain.token_amount(&minted.account), Some(5_000));

        let burned = burn(&chain, &wallet, &mint, 2_000, 6).await.unwrap();
        assert_eq!(burned.account, minted.account);
        assert_eq!(chain.token_amount(&minted.account), Some(3_000));
        assert_eq!(chain.mint_state(&mint).unwrap().supply, 3_000);
    }

    #[tokio::test]
    async fn test_wrong_decimals_fails() {
        let (chain, wallet, mint) = setup();
        assert!(mint_to(&chain, &wallet, &mint, 5_000, 9).await.is_err());
        assert!(chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_is_rejected_before_signing() {
        let (chain, wallet, mint) = setup();
        let err = burn(&chain, &wallet, &mint, 0, 6).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(chain.blockhash_requests(), 0);
    }
}
