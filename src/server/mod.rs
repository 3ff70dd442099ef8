//! HTTP front end for the metadata relay
//!
//! Routes:
//! - `GET /deployed-tokens`: the ledger document
//! - `POST /create-metadata`: build an unsigned metadata transaction
//! - `GET /health`
//! - `GET /metrics`: Prometheus text format
//!
//! Every response carries permissive CORS headers so a browser UI on another
//! origin can call the relay; `OPTIONS` preflights get an empty 204.

mod http;
mod routes;

pub use http::{read_request, HttpError, Request, Response};
pub use routes::{route, AppState};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, Instrument};

use crate::errors::{ForgeError, ForgeResult};
use crate::observability::CorrelationId;

/// How long to drain unread request bytes after responding
const LINGER: Duration = Duration::from_millis(250);

/// Bound listener plus the state every connection shares
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<AppState>,
    max_body_bytes: usize,
}

impl RelayServer {
    pub async fn bind(addr: &str, state: AppState, max_body_bytes: usize) -> ForgeResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ForgeError::Configuration(format!("failed to bind {}: {}", addr, e)))?;
        Ok(Self {
            listener,
            state: Arc::new(state),
            max_body_bytes,
        })
    }

    pub fn local_addr(&self) -> ForgeResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ForgeError::Configuration(format!("listener has no address: {}", e)))
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> ForgeResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %self.local_addr()?, "Metadata relay listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Metadata relay shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let state = Arc::clone(&self.state);
                        let max_body_bytes = self.max_body_bytes;
                        let span = CorrelationId::new().span("http_request");
                        tokio::spawn(
                            async move {
                                handle_connection(socket, peer, &state, max_body_bytes).await;
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    /// Serve forever
    pub async fn run(self) -> ForgeResult<()> {
        self.run_until(std::future::pending()).await
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    state: &AppState,
    max_body_bytes: usize,
) {
    let (read_half, mut write_half) = socket.split();
    let mut reader = BufReader::new(read_half);

    let response = match read_request(&mut reader, max_body_bytes).await {
        Ok(request) => {
            debug!(peer = %peer, method = %request.method, path = %request.path, "Request");
            let response = route(state, &request).await;
            info!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                "Handled"
            );
            response
        }
        Err(HttpError::ConnectionClosed) => return,
        Err(HttpError::BodyTooLarge { size, limit }) => {
            debug!(peer = %peer, size, limit, "Request body too large");
            Response::error(413, "Request body too large.")
        }
        Err(HttpError::Malformed(reason)) => {
            debug!(peer = %peer, reason = %reason, "Malformed request");
            Response::error(400, "Malformed request.")
        }
        Err(HttpError::Io(e)) => {
            error!(peer = %peer, "Failed to read from socket: {}", e);
            return;
        }
    };

    if let Err(e) = write_half.write_all(&response.to_bytes()).await {
        error!(peer = %peer, "Failed to write response: {}", e);
        return;
    }
    let _ = write_half.shutdown().await;
    // Unread input at close makes the kernel reset the connection, which can
    // discard the response before the client reads it
    let _ = tokio::time::timeout(
        LINGER,
        tokio::io::copy(&mut reader, &mut tokio::io::sink()),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DeployedTokenLedger, TokenRecord};
    use crate::relay::MetadataRelay;
    use crate::test_utils::{mint_account_data, token_owned, MockChainClient};
    use crate::tx_builder::decode_transaction;
    use solana_sdk::{pubkey::Pubkey, rent::Rent};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::sync::oneshot;

    struct Running {
        addr: SocketAddr,
        ledger: Arc<DeployedTokenLedger>,
        chain: Arc<MockChainClient>,
        stop: Option<oneshot::Sender<()>>,
        _dir: TempDir,
    }

    impl Drop for Running {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
        }
    }

    async fn start(max_body_bytes: usize) -> Running {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(MockChainClient::new());
        let ledger = Arc::new(DeployedTokenLedger::new(dir.path().join("deployedTokens.json")));
        let relay = MetadataRelay::new(chain.clone(), Arc::clone(&ledger));
        let server = RelayServer::bind("127.0.0.1:0", AppState::new(relay), max_body_bytes)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));
        Running {
            addr,
            ledger,
            chain,
            stop: Some(stop),
            _dir: dir,
        }
    }

    async fn send(addr: SocketAddr, raw: String) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        let status = response[9..12].parse().unwrap();
        let body = response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {} HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        )
    }

    fn get(path: &str) -> String {
        format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", path)
    }

    #[tokio::test]
    async fn test_deployed_tokens_lists_ledger() {
        let running = start(64 * 1024).await;
        running
            .ledger
            .append(TokenRecord {
                address: "Mint111".to_string(),
                symbol: "AAA".to_string(),
            })
            .await
            .unwrap();

        let (status, body) = send(running.addr, get("/deployed-tokens")).await;
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["mintedTokenDetails"][0]["symbol"], "AAA");
    }

    #[tokio::test]
    async fn test_deployed_tokens_without_ledger_file_is_500() {
        let running = start(64 * 1024).await;
        assert!(!running.ledger.path().exists());

        let (status, body) = send(running.addr, get("/deployed-tokens")).await;
        assert_eq!(status, 500);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Error reading token data");
    }

    #[tokio::test]
    async fn test_create_metadata_missing_uri_is_400_without_ledger_write() {
        let running = start(64 * 1024).await;
        let body = serde_json::json!({
            "mintPublicKey": Pubkey::new_unique().to_string(),
            "payerPublicKey": Pubkey::new_unique().to_string(),
            "mintAuthority": Pubkey::new_unique().to_string(),
            "name": "Forge",
            "symbol": "FRG",
        })
        .to_string();

        let (status, body) = send(running.addr, post("/create-metadata", &body)).await;
        assert_eq!(status, 400);
        assert!(body.contains("mintAuthority, name, symbol, and uri are required."));
        assert!(!running.ledger.path().exists());
    }

    #[tokio::test]
    async fn test_create_metadata_returns_transaction_and_appends() {
        let running = start(64 * 1024).await;
        let mint = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let data = mint_account_data(payer, 9);
        let lamports = Rent::default().minimum_balance(data.len());
        running.chain.set_account(mint, token_owned(data, lamports));
        let body = serde_json::json!({
            "mintPublicKey": mint.to_string(),
            "payerPublicKey": payer.to_string(),
            "mintAuthority": payer.to_string(),
            "name": "Forge",
            "symbol": "FRG",
            "uri": "https://x.y/frg.json",
            "multiSigners": [],
        })
        .to_string();

        let (status, body) = send(running.addr, post("/create-metadata", &body)).await;
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let tx = decode_transaction(json["transaction"].as_str().unwrap()).unwrap();
        assert_eq!(tx.message.account_keys[0], payer);

        let doc = running.ledger.read().await.unwrap();
        assert_eq!(doc.minted_token_details.len(), 1);
        assert_eq!(doc.minted_token_details[0].address, mint.to_string());
    }

    #[tokio::test]
    async fn test_unknown_mint_is_500_with_generic_message() {
        let running = start(64 * 1024).await;
        let body = serde_json::json!({
            "mintPublicKey": Pubkey::new_unique().to_string(),
            "payerPublicKey": Pubkey::new_unique().to_string(),
            "mintAuthority": Pubkey::new_unique().to_string(),
            "name": "Forge",
            "symbol": "FRG",
            "uri": "https://x.y",
        })
        .to_string();

        let (status, body) = send(running.addr, post("/create-metadata", &body)).await;
        assert_eq!(status, 500);
        assert!(body.contains("Please check the server console."));
    }

    #[tokio::test]
    async fn test_routing_edges() {
        let running = start(64).await;

        assert_eq!(send(running.addr, get("/nope")).await.0, 404);
        assert_eq!(send(running.addr, get("/create-metadata")).await.0, 405);
        assert_eq!(send(running.addr, get("/health")).await.0, 200);
        assert_eq!(send(running.addr, post("/create-metadata", "not json")).await.0, 400);
        let big = "x".repeat(65);
        assert_eq!(send(running.addr, post("/create-metadata", &big)).await.0, 413);

        let preflight =
            "OPTIONS /create-metadata HTTP/1.1\r\nOrigin: http://ui\r\n\r\n".to_string();
        assert_eq!(send(running.addr, preflight).await.0, 204);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_text() {
        let running = start(1024).await;
        crate::metrics::metrics().ledger_appends.inc();
        let (status, body) = send(running.addr, get("/metrics")).await;
        assert_eq!(status, 200);
        assert!(body.contains("ledger_appends_total"));
    }
}
