//! Rent top-up for growing a mint to hold its token metadata
//!
//! A Token-2022 mint stores its metadata inline as a variable-length TLV
//! entry. Writing that entry reallocates the account, and the program refuses
//! unless the account already holds the rent-exempt minimum for the new size.
//! The caller funds the difference with a system transfer before the
//! metadata-initialize instruction.
//!
//! The result reflects chain state at call time only. Callers that wait
//! before submitting must recompute.

use solana_sdk::pubkey::Pubkey;
use spl_pod::optional_keys::OptionalNonZeroPubkey;
use spl_token_2022::{
    extension::{BaseStateWithExtensions, StateWithExtensions},
    state::Mint,
};
use spl_token_metadata_interface::state::TokenMetadata;
use tracing::debug;

use crate::chain::ChainClient;
use crate::errors::{ForgeError, ForgeResult};

/// Metadata record as it will be stored on the mint
pub fn token_metadata(
    mint: Pubkey,
    update_authority: Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> ForgeResult<TokenMetadata> {
    let update_authority = OptionalNonZeroPubkey::try_from(Some(update_authority))
        .map_err(|e| ForgeError::validation(format!("update authority: {}", e)))?;
    Ok(TokenMetadata {
        update_authority,
        mint,
        name: name.to_string(),
        symbol: symbol.to_string(),
        uri: uri.to_string(),
        additional_metadata: vec![],
    })
}

/// Account length needed once `metadata` replaces (or joins) the existing extensions
pub fn required_account_len(data: &[u8], metadata: &TokenMetadata) -> ForgeResult<usize> {
    let state = StateWithExtensions::<Mint>::unpack(data)?;
    Ok(state.try_get_new_account_len_for_variable_len_extension(metadata)?)
}

/// Lamports to transfer into `address` before writing `metadata`.
///
/// Zero when the account already has room; otherwise the shortfall between
/// the rent-exempt minimum at the new length and the current balance.
pub async fn additional_rent<C>(
    chain: &C,
    address: &Pubkey,
    metadata: &TokenMetadata,
) -> ForgeResult<u64>
where
    C: ChainClient + ?Sized,
{
    let info = chain
        .get_account_info(address)
        .await?
        .ok_or_else(|| ForgeError::AccountNotFound(address.to_string()))?;

    let current_len = info.data.len();
    let new_len = required_account_len(&info.data, metadata)?;

    if new_len <= current_len {
        debug!(account = %address, current_len, new_len, "Account already has room for metadata");
        return Ok(0);
    }

    let minimum = chain.get_minimum_balance_for_rent_exemption(new_len).await?;
    let top_up = minimum.saturating_sub(info.lamports);
    debug!(
        account = %address,
        current_len,
        new_len,
        minimum,
        lamports = info.lamports,
        top_up,
        "Computed metadata rent top-up"
    );
    Ok(top_up)
}
