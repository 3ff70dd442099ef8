//! Metadata relay
//!
//! Given a freshly created mint and the desired name/symbol/uri, compute the
//! rent top-up the mint needs, build the metadata transaction with the payer
//! as fee payer, and hand it back base64-encoded and unsigned. The caller
//! co-signs and submits.
//!
//! A successful build appends the mint to the deployed token ledger. The
//! append happens whether or not the caller ever submits the transaction.
//! A ledger that cannot be written is logged and the transaction is still
//! returned.
//!
//! Requests missing `mintAuthority`, `name`, `symbol` or `uri`, and requests
//! whose mint, payer or mint authority key is absent or not a valid public
//! key, are rejected as validation errors and served as 400 before the chain
//! is touched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::errors::{ForgeError, ForgeResult};
use crate::ledger::{DeployedTokenLedger, TokenRecord};
use crate::metrics::metrics;
use crate::rent::{additional_rent, token_metadata};
use crate::tx_builder::{encode_transaction, plan_metadata_instructions};

/// Message returned for requests missing a required field
pub const MISSING_FIELDS_MESSAGE: &str = "mintAuthority, name, symbol, and uri are required.";

/// Body of `POST /create-metadata`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetadataRequest {
    #[serde(default)]
    pub mint_public_key: Option<String>,
    #[serde(default)]
    pub payer_public_key: Option<String>,
    #[serde(default)]
    pub mint_authority: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    /// Accepted for compatibility, never used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_signers: Option<serde_json::Value>,
}

impl CreateMetadataRequest {
    pub fn new(
        mint: &Pubkey,
        payer: &Pubkey,
        mint_authority: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Self {
        Self {
            mint_public_key: Some(mint.to_string()),
            payer_public_key: Some(payer.to_string()),
            mint_authority: Some(mint_authority.to_string()),
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            uri: Some(uri.to_string()),
            multi_signers: None,
        }
    }

    fn validate(&self) -> ForgeResult<ValidatedRequest> {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        if !(present(&self.mint_authority)
            && present(&self.name)
            && present(&self.symbol)
            && present(&self.uri))
        {
            return Err(ForgeError::validation(MISSING_FIELDS_MESSAGE));
        }

        Ok(ValidatedRequest {
            mint: parse_key("mintPublicKey", self.mint_public_key.as_deref())?,
            payer: parse_key("payerPublicKey", self.payer_public_key.as_deref())?,
            mint_authority: parse_key("mintAuthority", self.mint_authority.as_deref())?,
            name: self.name.clone().unwrap_or_default(),
            symbol: self.symbol.clone().unwrap_or_default(),
            uri: self.uri.clone().unwrap_or_default(),
        })
    }
}

struct ValidatedRequest {
    mint: Pubkey,
    payer: Pubkey,
    mint_authority: Pubkey,
    name: String,
    symbol: String,
    uri: String,
}

fn parse_key(field: &str, value: Option<&str>) -> ForgeResult<Pubkey> {
    let value = value.ok_or_else(|| ForgeError::validation(format!("{} is required.", field)))?;
    Pubkey::from_str(value)
        .map_err(|_| ForgeError::validation(format!("{} is not a valid public key.", field)))
}

/// Successful body of `POST /create-metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMetadataResponse {
    /// base64 of the bincode-serialized, unsigned transaction
    pub transaction: String,
}

/// Anything that can turn a metadata request into an unsigned transaction
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    async fn create_metadata(&self, request: &CreateMetadataRequest) -> ForgeResult<String>;
}

/// The relay itself, running in this process
pub struct MetadataRelay {
    chain: Arc<dyn ChainClient>,
    ledger: Arc<DeployedTokenLedger>,
}

impl MetadataRelay {
    pub fn new(chain: Arc<dyn ChainClient>, ledger: Arc<DeployedTokenLedger>) -> Self {
        Self { chain, ledger }
    }

    pub fn ledger(&self) -> &Arc<DeployedTokenLedger> {
        &self.ledger
    }

    async fn build(&self, request: &CreateMetadataRequest) -> ForgeResult<String> {
        let req = request.validate()?;
        if req.mint_authority != req.payer {
            // The payer signs as mint authority; a different key would be rejected on chain
            warn!(
                mint_authority = %req.mint_authority,
                payer = %req.payer,
                "Requested mint authority differs from payer, payer will sign"
            );
        }

        let metadata = token_metadata(req.mint, req.payer, &req.name, &req.symbol, &req.uri)?;
        let rent = additional_rent(self.chain.as_ref(), &req.mint, &metadata).await?;
        let plan = plan_metadata_instructions(&req.payer, &req.payer, &metadata, rent)?;

        let mut tx = Transaction::new_with_payer(&plan.instructions, Some(&req.payer));
        tx.message.recent_blockhash = self.chain.get_latest_blockhash().await?;
        let encoded = encode_transaction(&tx)?;
        debug!(
            mint = %req.mint,
            rent,
            instructions = plan.instructions.len(),
            "Metadata transaction built"
        );

        let record = TokenRecord {
            address: req.mint.to_string(),
            symbol: req.symbol.clone(),
        };
        if let Err(e) = self.ledger.append(record).await {
            error!(mint = %req.mint, error = %e, "Failed to record mint in ledger");
        }

        info!(mint = %req.mint, symbol = %req.symbol, rent, "Metadata transaction ready");
        Ok(encoded)
    }
}

#[async_trait]
impl MetadataBackend for MetadataRelay {
    async fn create_metadata(&self, request: &CreateMetadataRequest) -> ForgeResult<String> {
        let result = self.build(request).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_validation() => "invalid",
            Err(_) => "error",
        };
        metrics().relay_requests.with_label_values(&[outcome]).inc();
        result
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Relay reached over HTTP
pub struct HttpMetadataBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMetadataBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ForgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::Backend(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MetadataBackend for HttpMetadataBackend {
    async fn create_metadata(&self, request: &CreateMetadataRequest) -> ForgeResult<String> {
        let url = format!("{}/create-metadata", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ForgeError::Backend(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "no error body".to_string());
            return Err(ForgeError::Backend(format!(
                "relay returned {}: {}",
                status, detail
            )));
        }

        let body: CreateMetadataResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::Backend(format!("invalid relay response: {}", e)))?;
        Ok(body.transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mint_account_data, token_owned, MockChainClient};
    use crate::tx_builder::decode_transaction;
    use solana_sdk::{rent::Rent, system_program};
    use tempfile::TempDir;

    struct Fixture {
        chain: Arc<MockChainClient>,
        relay: MetadataRelay,
        mint: Pubkey,
        payer: Pubkey,
        _dir: TempDir,
    }

    fn fixture(mint_lamports: Option<u64>) -> Fixture {
        fixture_with_ledger(mint_lamports, "ledger.json")
    }

    fn fixture_with_ledger(mint_lamports: Option<u64>, ledger_file: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(MockChainClient::new());
        let mint = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let data = mint_account_data(payer, 9);
        let lamports = mint_lamports.unwrap_or_else(|| Rent::default().minimum_balance(data.len()));
        chain.set_account(mint, token_owned(data, lamports));
        let ledger = Arc::new(DeployedTokenLedger::new(dir.path().join(ledger_file)));
        let relay = MetadataRelay::new(chain.clone(), ledger);
        Fixture {
            chain,
            relay,
            mint,
            payer,
            _dir: dir,
        }
    }

    fn request(f: &Fixture) -> CreateMetadataRequest {
        let uri = "https://x.y/frg.json";
        CreateMetadataRequest::new(&f.mint, &f.payer, &f.payer, "Forge", "FRG", uri)
    }

    #[tokio::test]
    async fn test_builds_transfer_then_initialize_when_rent_is_short() {
        let f = fixture(None);
        let encoded = f.relay.create_metadata(&request(&f)).await.unwrap();
        let tx = decode_transaction(&encoded).unwrap();

        assert_eq!(tx.message.account_keys[0], f.payer);
        assert!(!tx.is_signed());
        assert_eq!(tx.message.instructions.len(), 2);
        let first_program = tx.message.instructions[0].program_id(&tx.message.account_keys);
        assert_eq!(*first_program, system_program::id());
        assert_eq!(f.chain.blockhash_requests(), 1);
    }

    #[tokio::test]
    async fn test_skips_transfer_when_mint_already_funded() {
        let f = fixture(Some(10_000_000_000));
        let encoded = f.relay.create_metadata(&request(&f)).await.unwrap();
        let tx = decode_transaction(&encoded).unwrap();

        assert_eq!(tx.message.instructions.len(), 1);
        let ix = &tx.message.instructions[0];
        assert_eq!(*ix.program_id(&tx.message.account_keys), spl_token_2022::id());
    }

    #[tokio::test]
    async fn test_missing_uri_is_validation_error_without_ledger_write() {
        let f = fixture(None);
        let mut req = request(&f);
        req.uri = None;

        let err = f.relay.create_metadata(&req).await.unwrap_err();
        assert_eq!(err, ForgeError::validation(MISSING_FIELDS_MESSAGE));
        assert!(!f.relay.ledger().path().exists());

        req.uri = Some(String::new());
        assert!(f.relay.create_metadata(&req).await.unwrap_err().is_validation());
        assert!(!f.relay.ledger().path().exists());
    }

    #[tokio::test]
    async fn test_unparseable_key_is_validation_error() {
        let f = fixture(None);
        let mut req = request(&f);
        req.mint_public_key = Some("not-a-key".to_string());

        assert!(f.relay.create_metadata(&req).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_missing_or_bad_payer_key_is_validation_error() {
        let f = fixture(None);
        let mut req = request(&f);
        req.payer_public_key = None;
        let err = f.relay.create_metadata(&req).await.unwrap_err();
        assert_eq!(err, ForgeError::validation("payerPublicKey is required."));

        req.payer_public_key = Some("zzz".to_string());
        let err = f.relay.create_metadata(&req).await.unwrap_err();
        assert_eq!(err, ForgeError::validation("payerPublicKey is not a valid public key."));
        assert_eq!(f.chain.blockhash_requests(), 0);
        assert!(!f.relay.ledger().path().exists());
    }

    #[tokio::test]
    async fn test_unwritable_ledger_still_returns_transaction() {
        let f = fixture_with_ledger(None, "no/such/dir/ledger.json");
        let encoded = f.relay.create_metadata(&request(&f)).await.unwrap();

        let tx = decode_transaction(&encoded).unwrap();
        assert_eq!(tx.message.account_keys[0], f.payer);
        assert!(!f.relay.ledger().path().exists());
    }

    #[tokio::test]
    async fn test_whitespace_only_symbol_is_accepted() {
        let f = fixture(None);
        let mut req = request(&f);
        req.symbol = Some(" ".to_string());

        assert!(f.relay.create_metadata(&req).await.is_ok());
        let doc = f.relay.ledger().read().await.unwrap();
        assert_eq!(doc.minted_token_details[0].symbol, " ");
    }

    #[tokio::test]
    async fn test_unknown_mint_is_account_not_found() {
        let f = fixture(None);
        let mut req = request(&f);
        req.mint_public_key = Some(Pubkey::new_unique().to_string());

        let err = f.relay.create_metadata(&req).await.unwrap_err();
        assert!(matches!(err, ForgeError::AccountNotFound(_)));
        assert!(!f.relay.ledger().path().exists());
    }

    #[test]
    fn test_request_accepts_multi_signers_and_camel_case() {
        let json = r#"{"mintPublicKey":"a","payerPublicKey":"b","mintAuthority":"c",
            "name":"n","symbol":"s","uri":"u","multiSigners":["x","y"]}"#;
        let req: CreateMetadataRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mint_authority.as_deref(), Some("c"));
        assert!(req.multi_signers.is_some());
    }

    #[tokio::test]
    async fn test_http_backend_returns_transaction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/create-metadata")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction":"AQID"}"#)
            .create_async()
            .await;

        let backend = HttpMetadataBackend::new(server.url(), Duration::from_secs(5)).unwrap();
        let req = CreateMetadataRequest::new(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            "n",
            "s",
            "u",
        );
        assert_eq!(backend.create_metadata(&req).await.unwrap(), "AQID");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_backend_non_ok_is_backend_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/create-metadata")
            .with_status(400)
            .with_body(format!(r#"{{"error":"{}"}}"#, MISSING_FIELDS_MESSAGE))
            .create_async()
            .await;

        let backend = HttpMetadataBackend::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = backend
            .create_metadata(&CreateMetadataRequest::default())
            .await
            .unwrap_err();
        match err {
            ForgeError::Backend(msg) => assert!(msg.contains("are required")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
