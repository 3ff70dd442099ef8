//! Deployed token ledger
//!
//! A single JSON document listing every token the relay has built metadata
//! for:
//!
//! ```json
//! {"mintedTokenDetails":[{"address":"...","symbol":"..."}]}
//! ```
//!
//! Entries are only ever appended. There is no dedup: building metadata for
//! the same mint or symbol twice records it twice. Every append reads the
//! whole file and rewrites it; appends within this process are serialised,
//! other processes writing the same file are not.
//!
//! Reading requires the file to exist; it is created by the first append.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::{ForgeError, ForgeResult};
use crate::metrics::metrics;

/// One deployed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub address: String,
    pub symbol: String,
}

/// The persisted document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    #[serde(default)]
    pub minted_token_details: Vec<TokenRecord>,
}

/// Append-only store over the ledger file
pub struct DeployedTokenLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DeployedTokenLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document. A missing, unreadable or corrupt file is a
    /// `Ledger` error.
    pub async fn read(&self) -> ForgeResult<LedgerDocument> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ForgeError::Ledger(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ForgeError::Ledger(format!("corrupt ledger {}: {}", self.path.display(), e))
        })
    }

    /// Whether the file has been created yet
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Append one record and rewrite the file. Returns the new entry count.
    ///
    /// A missing file is created. One that cannot be read or parsed is
    /// treated as empty and overwritten.
    pub async fn append(&self, record: TokenRecord) -> ForgeResult<usize> {
        let _guard = self.write_lock.lock().await;

        let mut document = if !self.exists().await {
            LedgerDocument::default()
        } else {
            match self.read().await {
                Ok(document) => document,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Ledger unreadable, starting empty"
                    );
                    LedgerDocument::default()
                }
            }
        };
        document.minted_token_details.push(record);

        let json = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ForgeError::Ledger(format!("failed to write {}: {}", self.path.display(), e))
        })?;

        metrics().ledger_appends.inc();
        let entries = document.minted_token_details.len();
        debug!(path = %self.path.display(), entries, "Ledger entry appended");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(address: &str, symbol: &str) -> TokenRecord {
        TokenRecord {
            address: address.to_string(),
            symbol: symbol.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_error_until_first_append() {
        let dir = TempDir::new().unwrap();
        let ledger = DeployedTokenLedger::new(dir.path().join("deployedTokens.json"));

        assert!(!ledger.exists().await);
        assert!(matches!(ledger.read().await, Err(ForgeError::Ledger(_))));

        assert_eq!(ledger.append(record("A1", "ONE")).await.unwrap(), 1);
        assert!(ledger.exists().await);
        assert_eq!(ledger.read().await.unwrap().minted_token_details.len(), 1);
    }

    #[tokio::test]
    async fn test_append_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let ledger = DeployedTokenLedger::new(dir.path().join("absent/ledger.json"));

        assert!(matches!(
            ledger.append(record("A1", "ONE")).await,
            Err(ForgeError::Ledger(_))
        ));
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deployedTokens.json");
        let ledger = DeployedTokenLedger::new(&path);

        ledger.append(record("A1", "ONE")).await.unwrap();
        ledger.append(record("B2", "TWO")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["mintedTokenDetails"][0]["address"], "A1");
        assert_eq!(raw["mintedTokenDetails"][1]["symbol"], "TWO");
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let dir = TempDir::new().unwrap();
        let ledger = DeployedTokenLedger::new(dir.path().join("ledger.json"));

        ledger.append(record("A1", "ONE")).await.unwrap();
        let count = ledger.append(record("A1", "ONE")).await.unwrap();

        assert_eq!(count, 2);
        let doc = ledger.read().await.unwrap();
        assert_eq!(doc.minted_token_details[0], doc.minted_token_details[1]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error_on_read_but_reset_on_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();
        let ledger = DeployedTokenLedger::new(&path);

        assert!(matches!(ledger.read().await, Err(ForgeError::Ledger(_))));
        assert_eq!(ledger.append(record("A1", "ONE")).await.unwrap(), 1);
        assert_eq!(ledger.read().await.unwrap().minted_token_details.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(DeployedTokenLedger::new(dir.path().join("ledger.json")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    ledger
                        .append(record(&format!("ADDR{}", i), "SYM"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.read().await.unwrap().minted_token_details.len(), 16);
    }
}
