//! Instruction planning and ordering validation
//!
//! The mint-creation transaction must carry its instructions in this order:
//! 1. system `create_account` sized for the three mint extensions
//! 2. metadata pointer initialize (pointing at the mint itself)
//! 3. transfer hook initialize
//! 4. transfer fee config initialize
//! 5. `initialize_mint`
//!
//! `initialize_mint` finalizes the account layout, so every extension
//! initializer operating on the same space has to run before it.
//! [`sanity_check_mint_creation_order`] enforces this in every build.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction, system_program};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use spl_token_2022::{
    extension::{
        metadata_pointer, transfer_fee::instruction as transfer_fee_ix, transfer_hook,
        ExtensionType,
    },
    instruction as token_ix,
    state::Mint,
};
use spl_token_metadata_interface::state::TokenMetadata;

use crate::errors::{ForgeError, ForgeResult};

/// Extensions every deployed mint is allocated with
pub const MINT_EXTENSIONS: [ExtensionType; 3] = [
    ExtensionType::TransferFeeConfig,
    ExtensionType::MetadataPointer,
    ExtensionType::TransferHook,
];

// Token-2022 instruction tags (first data byte)
const TAG_INITIALIZE_MINT: u8 = 0;
const TAG_TRANSFER_FEE_EXTENSION: u8 = 26;
const TAG_TRANSFER_HOOK_EXTENSION: u8 = 36;
const TAG_METADATA_POINTER_EXTENSION: u8 = 39;
// Sub-instruction tag shared by the extension initializers
const EXT_INITIALIZE: u8 = 0;

/// Account space for a mint carrying [`MINT_EXTENSIONS`]
pub fn mint_space() -> ForgeResult<usize> {
    Ok(ExtensionType::try_calculate_account_len::<Mint>(&MINT_EXTENSIONS)?)
}

/// Inputs for the mint-creation transaction
#[derive(Debug, Clone)]
pub struct MintCreationParams {
    /// Fee payer; also mint authority, fee-config authority and withdraw authority
    pub payer: Pubkey,
    /// Address of the freshly generated mint key pair
    pub mint: Pubkey,
    pub decimals: u8,
    pub fee_basis_points: u16,
    pub max_fee: u64,
    pub transfer_hook_program: Pubkey,
    /// Rent-exempt minimum for `space`
    pub lamports: u64,
    /// Allocated account size, normally [`mint_space`]
    pub space: usize,
}

/// Plan of instructions for one transaction
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,
}

impl InstructionPlan {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn kinds(&self) -> Vec<InstructionKind> {
        self.instructions.iter().map(classify).collect()
    }
}

/// Build the mint-creation instruction list in its required order
pub fn plan_mint_creation_instructions(
    params: &MintCreationParams,
) -> ForgeResult<InstructionPlan> {
    if params.space == 0 || params.lamports == 0 {
        return Err(ForgeError::validation(
            "mint account needs non-zero space and lamports",
        ));
    }

    let program_id = spl_token_2022::id();
    let instructions = vec![
        system_instruction::create_account(
            &params.payer,
            &params.mint,
            params.lamports,
            params.space as u64,
            &program_id,
        ),
        metadata_pointer::instruction::initialize(
            &program_id,
            &params.mint,
            Some(params.payer),
            Some(params.mint),
        )?,
        transfer_hook::instruction::initialize(
            &program_id,
            &params.mint,
            Some(params.payer),
            Some(params.transfer_hook_program),
        )?,
        transfer_fee_ix::initialize_transfer_fee_config(
            &program_id,
            &params.mint,
            Some(&params.payer),
            Some(&params.payer),
            params.fee_basis_points,
            params.max_fee,
        )?,
        token_ix::initialize_mint(
            &program_id,
            &params.mint,
            &params.payer,
            None,
            params.decimals,
        )?,
    ];

    let plan = InstructionPlan::new(instructions);
    sanity_check_mint_creation_order(&plan.instructions)?;
    Ok(plan)
}

/// Optional rent top-up followed by the metadata initialize instruction
pub fn plan_metadata_instructions(
    payer: &Pubkey,
    mint_authority: &Pubkey,
    metadata: &TokenMetadata,
    rent_lamports: u64,
) -> ForgeResult<InstructionPlan> {
    let update_authority = Option::<Pubkey>::from(metadata.update_authority).ok_or_else(|| {
        ForgeError::validation("metadata must carry an update authority")
    })?;

    let mut instructions = Vec::with_capacity(2);
    if rent_lamports > 0 {
        instructions.push(system_instruction::transfer(
            payer,
            &metadata.mint,
            rent_lamports,
        ));
    }
    instructions.push(spl_token_metadata_interface::instruction::initialize(
        &spl_token_2022::id(),
        &metadata.mint,
        &update_authority,
        &metadata.mint,
        mint_authority,
        metadata.name.clone(),
        metadata.symbol.clone(),
        metadata.uri.clone(),
    ));
    Ok(InstructionPlan::new(instructions))
}

/// Associated holding account address for (`owner`, `mint`)
pub fn associated_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, &spl_token_2022::id())
}

/// Idempotent associated-account creation; a no-op when the account exists
pub fn create_associated_account_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> (Pubkey, Instruction) {
    let address = associated_account(owner, mint);
    let ix = create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token_2022::id(),
    );
    (address, ix)
}

/// What a mint-creation instruction does, decoded from program id and tag bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    CreateAccount,
    InitMetadataPointer,
    InitTransferHook,
    InitTransferFeeConfig,
    InitMint,
    Other,
}

/// Decode the kind of `ix`
pub fn classify(ix: &Instruction) -> InstructionKind {
    if ix.program_id == system_program::id() {
        // SystemInstruction::CreateAccount is variant 0, encoded as u32 LE
        return if ix.data.len() >= 4 && ix.data[..4] == [0, 0, 0, 0] {
            InstructionKind::CreateAccount
        } else {
            InstructionKind::Other
        };
    }
    if ix.program_id != spl_token_2022::id() || ix.data.is_empty() {
        return InstructionKind::Other;
    }
    let sub = ix.data.get(1).copied();
    match (ix.data[0], sub) {
        (TAG_INITIALIZE_MINT, _) => InstructionKind::InitMint,
        (TAG_METADATA_POINTER_EXTENSION, Some(EXT_INITIALIZE)) => {
            InstructionKind::InitMetadataPointer
        }
        (TAG_TRANSFER_HOOK_EXTENSION, Some(EXT_INITIALIZE)) => InstructionKind::InitTransferHook,
        (TAG_TRANSFER_FEE_EXTENSION, Some(EXT_INITIALIZE)) => {
            InstructionKind::InitTransferFeeConfig
        }
        _ => InstructionKind::Other,
    }
}

/// Required order of the mint-creation transaction
pub const MINT_CREATION_ORDER: [InstructionKind; 5] = [
    InstructionKind::CreateAccount,
    InstructionKind::InitMetadataPointer,
    InstructionKind::InitTransferHook,
    InstructionKind::InitTransferFeeConfig,
    InstructionKind::InitMint,
];

/// Reject any mint-creation instruction list not in [`MINT_CREATION_ORDER`]
pub fn sanity_check_mint_creation_order(instructions: &[Instruction]) -> ForgeResult<()> {
    if instructions.len() != MINT_CREATION_ORDER.len() {
        return Err(ForgeError::invalid_order(format!(
            "mint creation needs {} instructions, got {}",
            MINT_CREATION_ORDER.len(),
            instructions.len()
        )));
    }

    for (idx, (ix, expected)) in instructions.iter().zip(MINT_CREATION_ORDER).enumerate() {
        let actual = classify(ix);
        if actual != expected {
            return Err(ForgeError::invalid_order(format!(
                "position {}: expected {:?}, got {:?} (program_id: {})",
                idx, expected, actual, ix.program_id
            )));
        }
    }

    // Every initializer must target the account created at position 0
    let mint = instructions[0]
        .accounts
        .get(1)
        .map(|meta| meta.pubkey)
        .ok_or_else(|| ForgeError::invalid_order("create_account has no new account"))?;
    for (idx, ix) in instructions.iter().enumerate().skip(1) {
        if ix.accounts.first().map(|meta| meta.pubkey) != Some(mint) {
            return Err(ForgeError::invalid_order(format!(
                "position {} does not operate on the created mint {}",
                idx, mint
            )));
        }
    }

    Ok(())
}
