//! Transaction builder
//!
//! ## Architecture
//!
//! - **instructions**: instruction planning in the fixed order each
//!   transaction needs, plus the mint-creation ordering conformance check
//! - **builder**: blockhash + fee payer attachment, co-signing, wallet
//!   signature, submission and confirmation
//! - **codec**: base64 transport of unsigned transactions
//!
//! Each transaction fetches its own blockhash immediately before signing;
//! blockhashes expire, so a prepared transaction is never reused across
//! workflow stages.

mod builder;
pub mod codec;
pub mod instructions;

pub use builder::TxBuilder;
pub use codec::{decode_transaction, encode_transaction};
pub use instructions::{
    associated_account, classify, create_associated_account_instruction, mint_space,
    plan_metadata_instructions, plan_mint_creation_instructions,
    sanity_check_mint_creation_order, InstructionKind, InstructionPlan, MintCreationParams,
    MINT_CREATION_ORDER, MINT_EXTENSIONS,
};
