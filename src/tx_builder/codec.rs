//! Wire encoding for transactions handed between the relay and its callers
//!
//! The relay returns a partially constructed transaction that the caller
//! still has to sign, so encoding must not require signatures. Unsigned
//! slots serialize as all-zero signatures.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::{sanitize::Sanitize, transaction::Transaction};

use crate::errors::{ForgeError, ForgeResult};

/// bincode + base64, signatures optional
pub fn encode_transaction(tx: &Transaction) -> ForgeResult<String> {
    let bytes = bincode::serialize(tx)?;
    Ok(STANDARD.encode(bytes))
}

/// Inverse of [`encode_transaction`]
pub fn decode_transaction(encoded: &str) -> ForgeResult<Transaction> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ForgeError::Serialization(format!("invalid base64 transaction: {}", e)))?;
    let tx: Transaction = bincode::deserialize(&bytes)?;
    tx.sanitize()
        .map_err(|e| ForgeError::Serialization(format!("malformed transaction: {}", e)))?;
    Ok(tx)
}
