//! Error taxonomy for token deployment, fee collection and the metadata relay
//!
//! Every failure is scoped to the single user-triggered action that produced
//! it. Nothing in this crate retries: chain, network and signing errors
//! propagate to the caller, which reports a generic message to the user and
//! keeps the full detail in the log.

use solana_client::client_error::ClientError;
use solana_sdk::{program_error::ProgramError, signer::SignerError};
use thiserror::Error;

/// Crate-wide result alias
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Comprehensive error type for all operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForgeError {
    /// No wallet is available (not configured or not connected)
    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The wallet exists but the connection handshake failed
    #[error("Wallet connection failed: {0}")]
    WalletConnectionFailed(String),

    /// A required input field is missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The target account does not exist on-chain
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Chain RPC communication or instruction-encoding failure
    #[error("Chain RPC error: {0}")]
    ChainRpc(String),

    /// The wallet declined (or was unable) to sign
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// The submitted transaction failed or never reached the requested commitment
    #[error("Confirmation failure (signature={signature}): {reason}")]
    ConfirmationFailure {
        /// Signature of the transaction being confirmed
        signature: String,
        /// Why confirmation failed
        reason: String,
    },

    /// The metadata relay backend returned an error or an unusable response
    #[error("Backend error: {0}")]
    Backend(String),

    /// Reading or writing the deployed token ledger failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Transaction or JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Instruction list does not follow the required order
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),
}

impl ForgeError {
    /// Nothing in the system retries. Kept explicit so callers never guess.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Whether this error was caught at the input boundary, before any chain work
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::WalletUnavailable(_) => "wallet_unavailable",
            Self::WalletConnectionFailed(_) => "wallet_connection",
            Self::Validation(_) => "validation",
            Self::AccountNotFound(_) => "account_not_found",
            Self::ChainRpc(_) => "rpc",
            Self::SignatureRejected(_) => "signature_rejected",
            Self::ConfirmationFailure { .. } => "confirmation",
            Self::Backend(_) => "backend",
            Self::Ledger(_) => "ledger",
            Self::Serialization(_) => "serialization",
            Self::Configuration(_) => "config",
            Self::InvalidInstructionOrder(_) => "instruction_order",
        }
    }

    /// Generic message suitable for showing to an end user.
    ///
    /// Validation errors are shown verbatim; everything else hides detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::WalletUnavailable(_) => {
                "Wallet not found. Please install or configure a wallet.".to_string()
            }
            Self::WalletConnectionFailed(_) => "Connection to wallet failed.".to_string(),
            Self::SignatureRejected(_) => "Transaction was not signed.".to_string(),
            _ => "Operation failed. Please check the logs for details.".to_string(),
        }
    }
}

// Convenience constructors for common error scenarios
impl ForgeError {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Create a chain RPC error
    pub fn rpc(reason: impl Into<String>) -> Self {
        Self::ChainRpc(reason.into())
    }

    /// Create a confirmation failure for a specific signature
    pub fn confirmation(signature: impl ToString, reason: impl Into<String>) -> Self {
        Self::ConfirmationFailure {
            signature: signature.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid instruction order error
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }
}

impl From<ClientError> for ForgeError {
    fn from(err: ClientError) -> Self {
        Self::ChainRpc(err.to_string())
    }
}

impl From<ProgramError> for ForgeError {
    fn from(err: ProgramError) -> Self {
        Self::ChainRpc(format!("instruction or account encoding: {}", err))
    }
}

impl From<SignerError> for ForgeError {
    fn from(err: SignerError) -> Self {
        Self::SignatureRejected(err.to_string())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ForgeError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForgeError::Validation("name is required".to_string());
        assert_eq!(err.to_string(), "Validation error: name is required");

        let err = ForgeError::confirmation("5xyz", "blockhash expired");
        assert_eq!(
            err.to_string(),
            "Confirmation failure (signature=5xyz): blockhash expired"
        );
    }

    #[test]
    fn test_nothing_is_retryable() {
        assert!(!ForgeError::rpc("timeout").is_retryable());
        assert!(!ForgeError::Backend("502".to_string()).is_retryable());
        assert!(!ForgeError::confirmation("sig", "dropped").is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ForgeError::validation("x").category(), "validation");
        assert_eq!(ForgeError::rpc("x").category(), "rpc");
        assert_eq!(
            ForgeError::AccountNotFound("x".to_string()).category(),
            "account_not_found"
        );
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = ForgeError::rpc("connection reset by peer at 10.0.0.3");
        assert!(!err.user_message().contains("10.0.0.3"));

        let err = ForgeError::validation("uri is required");
        assert_eq!(err.user_message(), "uri is required");
        assert!(err.is_validation());
    }

    #[test]
    fn test_program_error_conversion() {
        let err: ForgeError = ProgramError::IncorrectProgramId.into();
        assert!(matches!(err, ForgeError::ChainRpc(_)));
    }
}
