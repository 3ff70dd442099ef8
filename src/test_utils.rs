//! Test Utilities Module
//!
//! In-memory stand-ins for the chain and the wallet so every workflow can be
//! driven deterministically without a validator.
//!
//! [`MockChainClient`] executes the subset of programs the workflows touch
//! (system create/transfer, associated account creation, and the Token-2022
//! instructions used for deployment, supply changes and fee withdrawal)
//! against an account map, atomically per transaction.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_rpc_client_api::filter::RpcFilterType;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::CompiledInstruction,
    program_option::COption,
    pubkey::Pubkey,
    rent::Rent,
    signature::{Keypair, Signature, Signer},
    system_instruction::SystemInstruction,
    system_program,
    transaction::Transaction,
};
use spl_pod::optional_keys::OptionalNonZeroPubkey;
use spl_token_2022::{
    extension::{
        metadata_pointer::MetadataPointer,
        transfer_fee::{instruction::TransferFeeInstruction, TransferFeeAmount, TransferFeeConfig},
        transfer_hook::TransferHook,
        BaseStateWithExtensions, BaseStateWithExtensionsMut, ExtensionType, StateWithExtensions,
        StateWithExtensionsMut,
    },
    instruction::TokenInstruction,
    state::{Account as TokenAccount, AccountState, Mint},
};
use spl_token_metadata_interface::{instruction::TokenMetadataInstruction, state::TokenMetadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chain::ChainClient;
use crate::errors::{ForgeError, ForgeResult};
use crate::wallet::WalletCapability;

const TAG_TRANSFER_FEE_EXTENSION: u8 = 26;
const TAG_TRANSFER_HOOK_EXTENSION: u8 = 36;
const TAG_METADATA_POINTER_EXTENSION: u8 = 39;
const FEE_INITIALIZE_CONFIG: u8 = 0;
const FEE_WITHDRAW_FROM_ACCOUNTS: u8 = 3;

#[derive(Default)]
struct ChainState {
    accounts: HashMap<Pubkey, Account>,
    blockhash_requests: usize,
    sends: usize,
    confirms: usize,
    fail_send_at: Option<usize>,
    fail_confirm_at: Option<usize>,
    sent: Vec<Transaction>,
    confirmations: Vec<(Signature, CommitmentConfig)>,
}

/// In-memory [`ChainClient`]
#[derive(Default)]
pub struct MockChainClient {
    state: Mutex<ChainState>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.state.lock().accounts.insert(address, account);
    }

    /// Give `address` a system-owned balance of `lamports`
    pub fn fund(&self, address: Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .entry(address)
            .or_insert_with(|| system_account(0));
        account.lamports = lamports;
    }

    pub fn account(&self, address: &Pubkey) -> Option<Account> {
        self.state.lock().accounts.get(address).cloned()
    }

    /// Make the `n`th `send_transaction` call (1-based) fail
    pub fn fail_send_at(&self, n: usize) {
        self.state.lock().fail_send_at = Some(n);
    }

    /// Make the `n`th `confirm_transaction` call (1-based) report failure
    pub fn fail_confirm_at(&self, n: usize) {
        self.state.lock().fail_confirm_at = Some(n);
    }

    pub fn blockhash_requests(&self) -> usize {
        self.state.lock().blockhash_requests
    }

    /// Successfully applied transactions, in submission order
    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.state.lock().sent.clone()
    }

    pub fn confirmations(&self) -> Vec<(Signature, CommitmentConfig)> {
        self.state.lock().confirmations.clone()
    }

    /// Token amount held by a token account
    pub fn token_amount(&self, address: &Pubkey) -> Option<u64> {
        let account = self.account(address)?;
        let state = StateWithExtensions::<TokenAccount>::unpack(&account.data).ok()?;
        Some(state.base.amount)
    }

    /// Fees withheld on a token account
    pub fn withheld_amount(&self, address: &Pubkey) -> Option<u64> {
        let account = self.account(address)?;
        let state = StateWithExtensions::<TokenAccount>::unpack(&account.data).ok()?;
        let fee = state.get_extension::<TransferFeeAmount>().ok()?;
        Some(u64::from(fee.withheld_amount))
    }

    pub fn mint_state(&self, address: &Pubkey) -> Option<Mint> {
        let account = self.account(address)?;
        let state = StateWithExtensions::<Mint>::unpack(&account.data).ok()?;
        Some(state.base)
    }

    /// Metadata stored inline on a mint
    pub fn metadata(&self, mint: &Pubkey) -> Option<TokenMetadata> {
        let account = self.account(mint)?;
        let state = StateWithExtensions::<Mint>::unpack(&account.data).ok()?;
        state.get_variable_len_extension::<TokenMetadata>().ok()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_latest_blockhash(&self) -> ForgeResult<Hash> {
        let mut state = self.state.lock();
        state.blockhash_requests += 1;
        Ok(Hash::new_unique())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> ForgeResult<u64> {
        Ok(Rent::default().minimum_balance(data_len))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ForgeResult<Signature> {
        let mut state = self.state.lock();
        state.sends += 1;
        if state.fail_send_at == Some(state.sends) {
            return Err(ForgeError::rpc("injected send failure"));
        }
        transaction
            .verify()
            .map_err(|e| ForgeError::rpc(format!("signature verification failed: {}", e)))?;

        // Work on a copy so a failing instruction leaves no partial writes
        let mut accounts = state.accounts.clone();
        let keys = &transaction.message.account_keys;
        for (idx, ix) in transaction.message.instructions.iter().enumerate() {
            apply_instruction(&mut accounts, keys, ix).map_err(|e| {
                ForgeError::rpc(format!("instruction {} failed: {}", idx, e))
            })?;
        }
        state.accounts = accounts;
        state.sent.push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> ForgeResult<()> {
        let mut state = self.state.lock();
        state.confirms += 1;
        if state.fail_confirm_at == Some(state.confirms) {
            return Err(ForgeError::confirmation(signature, "injected confirmation failure"));
        }
        state.confirmations.push((*signature, commitment));
        Ok(())
    }

    async fn get_account_info(&self, address: &Pubkey) -> ForgeResult<Option<Account>> {
        Ok(self.account(address))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> ForgeResult<Vec<(Pubkey, Account)>> {
        let state = self.state.lock();
        let mut matches: Vec<(Pubkey, Account)> = state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| {
                filters.iter().all(|filter| match filter {
                    RpcFilterType::DataSize(size) => account.data.len() as u64 == *size,
                    RpcFilterType::Memcmp(memcmp) => memcmp.bytes_match(&account.data),
                    _ => true,
                })
            })
            .map(|(address, account)| (*address, account.clone()))
            .collect();
        matches.sort_by_key(|(address, _)| *address);
        Ok(matches)
    }
}

type ApplyResult = Result<(), String>;

fn apply_instruction(
    accounts: &mut HashMap<Pubkey, Account>,
    keys: &[Pubkey],
    ix: &CompiledInstruction,
) -> ApplyResult {
    let program_id = keys[ix.program_id_index as usize];
    let metas: Vec<Pubkey> = ix.accounts.iter().map(|&i| keys[i as usize]).collect();

    if program_id == system_program::id() {
        apply_system(accounts, &metas, &ix.data)
    } else if program_id == spl_associated_token_account::id() {
        apply_associated_account(accounts, &metas, &ix.data)
    } else if program_id == spl_token_2022::id() {
        apply_token(accounts, &metas, &ix.data)
    } else {
        Err(format!("unsupported program {}", program_id))
    }
}

fn debit(accounts: &mut HashMap<Pubkey, Account>, from: &Pubkey, lamports: u64) -> ApplyResult {
    let account = accounts
        .get_mut(from)
        .ok_or_else(|| format!("account {} not found", from))?;
    account.lamports = account
        .lamports
        .checked_sub(lamports)
        .ok_or_else(|| format!("insufficient funds in {}", from))?;
    Ok(())
}

fn apply_system(
    accounts: &mut HashMap<Pubkey, Account>,
    metas: &[Pubkey],
    data: &[u8],
) -> ApplyResult {
    let instruction: SystemInstruction =
        bincode::deserialize(data).map_err(|e| format!("bad system instruction: {}", e))?;
    match instruction {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let (from, to) = (metas[0], metas[1]);
            if accounts.get(&to).is_some_and(|a| a.lamports > 0) {
                return Err(format!("account {} already in use", to));
            }
            debit(accounts, &from, lamports)?;
            accounts.insert(
                to,
                Account {
                    lamports,
                    data: vec![0; space as usize],
                    owner,
                    executable: false,
                    rent_epoch: 0,
                },
            );
            Ok(())
        }
        SystemInstruction::Transfer { lamports } => {
            let (from, to) = (metas[0], metas[1]);
            debit(accounts, &from, lamports)?;
            accounts
                .entry(to)
                .or_insert_with(|| system_account(0))
                .lamports += lamports;
            Ok(())
        }
        other => Err(format!("unsupported system instruction {:?}", other)),
    }
}

fn apply_associated_account(
    accounts: &mut HashMap<Pubkey, Account>,
    metas: &[Pubkey],
    data: &[u8],
) -> ApplyResult {
    let idempotent = match data {
        [] | [0] => false,
        [1] => true,
        _ => return Err("unsupported associated account instruction".to_string()),
    };
    let (payer, address, owner, mint) = (metas[0], metas[1], metas[2], metas[3]);

    if accounts.contains_key(&address) {
        return if idempotent {
            Ok(())
        } else {
            Err(format!("associated account {} already exists", address))
        };
    }
    let mint_ok = accounts
        .get(&mint)
        .is_some_and(|a| StateWithExtensions::<Mint>::unpack(&a.data).is_ok());
    if !mint_ok {
        return Err(format!("mint {} is not initialized", mint));
    }

    let data = token_account_data(mint, owner, 0, 0);
    let lamports = Rent::default().minimum_balance(data.len());
    debit(accounts, &payer, lamports)?;
    accounts.insert(address, token_owned(data, lamports));
    Ok(())
}

fn apply_token(
    accounts: &mut HashMap<Pubkey, Account>,
    metas: &[Pubkey],
    data: &[u8],
) -> ApplyResult {
    if let Ok(TokenMetadataInstruction::Initialize(init)) = TokenMetadataInstruction::unpack(data)
    {
        let metadata = TokenMetadata {
            update_authority: OptionalNonZeroPubkey(metas[1]),
            mint: metas[2],
            name: init.name,
            symbol: init.symbol,
            uri: init.uri,
            additional_metadata: vec![],
        };
        return apply_metadata_initialize(accounts, &metas[0], &metas[3], &metadata);
    }

    let tag = *data.first().ok_or("empty token instruction")?;
    match tag {
        TAG_METADATA_POINTER_EXTENSION | TAG_TRANSFER_HOOK_EXTENSION => {
            if data.get(1) != Some(&0) || data.len() < 66 {
                return Err("unsupported extension instruction".to_string());
            }
            let first = pubkey_at(data, 2)?;
            let second = pubkey_at(data, 34)?;
            with_uninitialized_mint(accounts, &metas[0], |state| {
                if tag == TAG_METADATA_POINTER_EXTENSION {
                    let ext = state.init_extension::<MetadataPointer>(true)?;
                    ext.authority = OptionalNonZeroPubkey(first);
                    ext.metadata_address = OptionalNonZeroPubkey(second);
                } else {
                    let ext = state.init_extension::<TransferHook>(true)?;
                    ext.authority = OptionalNonZeroPubkey(first);
                    ext.program_id = OptionalNonZeroPubkey(second);
                }
                Ok(())
            })
        }
        TAG_TRANSFER_FEE_EXTENSION => match data.get(1).copied() {
            Some(FEE_INITIALIZE_CONFIG) => {
                let Ok(TransferFeeInstruction::InitializeTransferFeeConfig {
                    transfer_fee_config_authority,
                    withdraw_withheld_authority,
                    transfer_fee_basis_points,
                    maximum_fee,
                }) = TransferFeeInstruction::unpack(&data[1..])
                else {
                    return Err("bad transfer fee config instruction".to_string());
                };
                with_uninitialized_mint(accounts, &metas[0], |state| {
                    let ext = state.init_extension::<TransferFeeConfig>(true)?;
                    let config_authority: Option<Pubkey> = transfer_fee_config_authority.into();
                    let withdraw_authority: Option<Pubkey> = withdraw_withheld_authority.into();
                    ext.transfer_fee_config_authority =
                        OptionalNonZeroPubkey::try_from(config_authority)?;
                    ext.withdraw_withheld_authority =
                        OptionalNonZeroPubkey::try_from(withdraw_authority)?;
                    let fee = &mut ext.older_transfer_fee;
                    fee.transfer_fee_basis_points = transfer_fee_basis_points.into();
                    fee.maximum_fee = maximum_fee.into();
                    ext.newer_transfer_fee = ext.older_transfer_fee;
                    Ok(())
                })
            }
            Some(FEE_WITHDRAW_FROM_ACCOUNTS) => apply_withdraw_withheld(accounts, metas),
            _ => Err("unsupported transfer fee instruction".to_string()),
        },
        _ => match TokenInstruction::unpack(data).map_err(|e| e.to_string())? {
            TokenInstruction::InitializeMint {
                decimals,
                mint_authority,
                freeze_authority,
            } => with_uninitialized_mint(accounts, &metas[0], |state| {
                state.base = Mint {
                    mint_authority: COption::Some(mint_authority),
                    supply: 0,
                    decimals,
                    is_initialized: true,
                    freeze_authority,
                };
                state.pack_base();
                state.init_account_type()?;
                Ok(())
            }),
            TokenInstruction::MintToChecked { amount, decimals } => {
                let (mint, destination, authority) = (metas[0], metas[1], metas[2]);
                update_mint(accounts, &mint, |base| {
                    if base.decimals != decimals {
                        return Err("decimals mismatch".to_string());
                    }
                    if base.mint_authority != COption::Some(authority) {
                        return Err("owner does not match mint authority".to_string());
                    }
                    base.supply = base.supply.checked_add(amount).ok_or("supply overflow")?;
                    Ok(())
                })?;
                update_token_account(accounts, &destination, |base| {
                    base.amount = base.amount.checked_add(amount).ok_or("amount overflow")?;
                    Ok(())
                })
            }
            TokenInstruction::BurnChecked { amount, decimals } => {
                let (source, mint, owner) = (metas[0], metas[1], metas[2]);
                update_token_account(accounts, &source, |base| {
                    if base.owner != owner {
                        return Err("owner does not match".to_string());
                    }
                    base.amount = base.amount.checked_sub(amount).ok_or("insufficient funds")?;
                    Ok(())
                })?;
                update_mint(accounts, &mint, |base| {
                    if base.decimals != decimals {
                        return Err("decimals mismatch".to_string());
                    }
                    base.supply = base.supply.saturating_sub(amount);
                    Ok(())
                })
            }
            _ => Err(format!("unsupported token instruction tag {}", tag)),
        },
    }
}

fn pubkey_at(data: &[u8], offset: usize) -> Result<Pubkey, String> {
    data.get(offset..offset + 32)
        .and_then(|bytes| Pubkey::try_from(bytes).ok())
        .ok_or_else(|| format!("no pubkey at offset {}", offset))
}

fn with_uninitialized_mint<F>(
    accounts: &mut HashMap<Pubkey, Account>,
    mint: &Pubkey,
    f: F,
) -> ApplyResult
where
    F: FnOnce(
        &mut StateWithExtensionsMut<'_, Mint>,
    ) -> Result<(), solana_sdk::program_error::ProgramError>,
{
    let account = accounts
        .get_mut(mint)
        .ok_or_else(|| format!("mint {} not found", mint))?;
    if account.owner != spl_token_2022::id() {
        return Err(format!("mint {} not owned by the token program", mint));
    }
    let mut state = StateWithExtensionsMut::<Mint>::unpack_uninitialized(&mut account.data)
        .map_err(|e| format!("mint {} already initialized or malformed: {}", mint, e))?;
    f(&mut state).map_err(|e| e.to_string())
}

fn update_mint<F>(accounts: &mut HashMap<Pubkey, Account>, mint: &Pubkey, f: F) -> ApplyResult
where
    F: FnOnce(&mut Mint) -> ApplyResult,
{
    let account = accounts
        .get_mut(mint)
        .ok_or_else(|| format!("mint {} not found", mint))?;
    let mut state =
        StateWithExtensionsMut::<Mint>::unpack(&mut account.data).map_err(|e| e.to_string())?;
    f(&mut state.base)?;
    state.pack_base();
    Ok(())
}

fn update_token_account<F>(
    accounts: &mut HashMap<Pubkey, Account>,
    address: &Pubkey,
    f: F,
) -> ApplyResult
where
    F: FnOnce(&mut TokenAccount) -> ApplyResult,
{
    let account = accounts
        .get_mut(address)
        .ok_or_else(|| format!("token account {} not found", address))?;
    let mut state = StateWithExtensionsMut::<TokenAccount>::unpack(&mut account.data)
        .map_err(|e| e.to_string())?;
    f(&mut state.base)?;
    state.pack_base();
    Ok(())
}

fn apply_metadata_initialize(
    accounts: &mut HashMap<Pubkey, Account>,
    metadata_address: &Pubkey,
    mint_authority: &Pubkey,
    metadata: &TokenMetadata,
) -> ApplyResult {
    if *metadata_address != metadata.mint {
        return Err("metadata must live on the mint".to_string());
    }
    let account = accounts
        .get_mut(metadata_address)
        .ok_or_else(|| format!("mint {} not found", metadata_address))?;
    let new_len = {
        let state = StateWithExtensions::<Mint>::unpack(&account.data).map_err(|e| e.to_string())?;
        if state.base.mint_authority != COption::Some(*mint_authority) {
            return Err("incorrect mint authority".to_string());
        }
        state
            .try_get_new_account_len_for_variable_len_extension(metadata)
            .map_err(|e| e.to_string())?
    };
    let minimum = Rent::default().minimum_balance(new_len);
    if account.lamports < minimum {
        return Err(format!(
            "insufficient funds for rent: {} < {}",
            account.lamports, minimum
        ));
    }
    if new_len > account.data.len() {
        account.data.resize(new_len, 0);
    }
    let mut state =
        StateWithExtensionsMut::<Mint>::unpack(&mut account.data).map_err(|e| e.to_string())?;
    state
        .init_variable_len_extension(metadata, false)
        .map_err(|e| e.to_string())
}

fn apply_withdraw_withheld(
    accounts: &mut HashMap<Pubkey, Account>,
    metas: &[Pubkey],
) -> ApplyResult {
    let (mint, destination, authority) = (metas[0], metas[1], metas[2]);
    {
        let account = accounts
            .get(&mint)
            .ok_or_else(|| format!("mint {} not found", mint))?;
        let state = StateWithExtensions::<Mint>::unpack(&account.data).map_err(|e| e.to_string())?;
        let config = state
            .get_extension::<TransferFeeConfig>()
            .map_err(|e| e.to_string())?;
        if Option::<Pubkey>::from(config.withdraw_withheld_authority) != Some(authority) {
            return Err("incorrect withdraw withheld authority".to_string());
        }
    }

    let mut total = 0u64;
    for source in &metas[3..] {
        let account = accounts
            .get_mut(source)
            .ok_or_else(|| format!("token account {} not found", source))?;
        let mut state = StateWithExtensionsMut::<TokenAccount>::unpack(&mut account.data)
            .map_err(|e| e.to_string())?;
        if state.base.mint != mint {
            return Err(format!("{} belongs to another mint", source));
        }
        let fee = state
            .get_extension_mut::<TransferFeeAmount>()
            .map_err(|e| e.to_string())?;
        total = total
            .checked_add(u64::from(fee.withheld_amount))
            .ok_or("withheld overflow")?;
        fee.withheld_amount = 0u64.into();
    }
    update_token_account(accounts, &destination, |base| {
        base.amount = base.amount.checked_add(total).ok_or("amount overflow")?;
        Ok(())
    })
}

fn system_account(lamports: u64) -> Account {
    Account {
        lamports,
        data: vec![],
        owner: system_program::id(),
        executable: false,
        rent_epoch: 0,
    }
}

/// Account owned by the token program holding `data`
pub fn token_owned(data: Vec<u8>, lamports: u64) -> Account {
    Account {
        lamports,
        data,
        owner: spl_token_2022::id(),
        executable: false,
        rent_epoch: 0,
    }
}

/// Initialized mint carrying only a metadata pointer, the minimum a mint
/// needs before metadata can be written into it
pub fn mint_account_data(authority: Pubkey, decimals: u8) -> Vec<u8> {
    let space = ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer])
        .unwrap();
    let mut data = vec![0u8; space];
    {
        let mut state = StateWithExtensionsMut::<Mint>::unpack_uninitialized(&mut data).unwrap();
        let pointer = state.init_extension::<MetadataPointer>(true).unwrap();
        pointer.authority = OptionalNonZeroPubkey(authority);
        state.base = Mint {
            mint_authority: COption::Some(authority),
            supply: 0,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        state.pack_base();
        state.init_account_type().unwrap();
    }
    data
}

/// Initialized token account with a withheld-fee record
pub fn token_account_data(mint: Pubkey, owner: Pubkey, amount: u64, withheld: u64) -> Vec<u8> {
    let space = ExtensionType::try_calculate_account_len::<TokenAccount>(&[
        ExtensionType::TransferFeeAmount,
    ])
    .unwrap();
    let mut data = vec![0u8; space];
    {
        let mut state =
            StateWithExtensionsMut::<TokenAccount>::unpack_uninitialized(&mut data).unwrap();
        state.base = TokenAccount {
            mint,
            owner,
            amount,
            state: AccountState::Initialized,
            ..Default::default()
        };
        state.pack_base();
        state.init_account_type().unwrap();
        let fee = state.init_extension::<TransferFeeAmount>(true).unwrap();
        fee.withheld_amount = withheld.into();
    }
    data
}

/// Wallet signing with a real key pair
pub struct MockWallet {
    keypair: Keypair,
    connected: AtomicBool,
    reject: bool,
    refuse_connect: bool,
}

impl MockWallet {
    /// Already connected, signs everything
    pub fn connected() -> Self {
        Self {
            keypair: Keypair::new(),
            connected: AtomicBool::new(true),
            reject: false,
            refuse_connect: false,
        }
    }

    /// Not connected until `connect` is called
    pub fn disconnected() -> Self {
        Self {
            keypair: Keypair::new(),
            connected: AtomicBool::new(false),
            reject: false,
            refuse_connect: false,
        }
    }

    /// Disconnected, and every `connect` attempt fails
    pub fn unreachable() -> Self {
        Self {
            refuse_connect: true,
            ..Self::disconnected()
        }
    }

    /// Connected, but the user declines every signature request
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::connected()
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletCapability for MockWallet {
    async fn connect(&self) -> ForgeResult<Pubkey> {
        if self.refuse_connect {
            return Err(ForgeError::WalletConnectionFailed(
                "wallet did not respond".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.keypair.pubkey())
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> ForgeResult<Transaction> {
        if self.public_key().is_none() {
            return Err(ForgeError::WalletUnavailable("wallet not connected".to_string()));
        }
        if self.reject {
            return Err(ForgeError::SignatureRejected(
                "user rejected the request".to_string(),
            ));
        }
        let blockhash = transaction.message.recent_blockhash;
        transaction.try_partial_sign(&[&self.keypair], blockhash)?;
        Ok(transaction)
    }
}
