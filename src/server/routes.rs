//! Request routing

use std::sync::Arc;
use tracing::{error, warn};

use super::http::{Request, Response};
use crate::errors::ForgeError;
use crate::ledger::DeployedTokenLedger;
use crate::metrics::metrics;
use crate::relay::{CreateMetadataRequest, CreateMetadataResponse, MetadataBackend, MetadataRelay};

const LEDGER_READ_ERROR: &str = "Error reading token data";
const CREATE_METADATA_ERROR: &str = "Error creating metadata. Please check the server console.";

/// Shared by every connection
pub struct AppState {
    pub relay: MetadataRelay,
    pub ledger: Arc<DeployedTokenLedger>,
}

impl AppState {
    /// Relay and ledger endpoint over the same ledger file
    pub fn new(relay: MetadataRelay) -> Self {
        let ledger = Arc::clone(relay.ledger());
        Self { relay, ledger }
    }
}

pub async fn route(state: &AppState, request: &Request) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => Response::no_content(),
        ("GET", "/deployed-tokens") => deployed_tokens(state).await,
        ("POST", "/create-metadata") => create_metadata(state, request).await,
        ("GET", "/health") => Response::json(200, &serde_json::json!({ "status": "ok" })),
        ("GET", "/metrics") => match metrics().render() {
            Ok(body) => Response::text(200, "text/plain; version=0.0.4", body),
            Err(e) => {
                error!(error = %e, "Failed to render metrics");
                Response::error(500, "Error rendering metrics")
            }
        },
        (_, "/deployed-tokens" | "/create-metadata" | "/health" | "/metrics") => {
            Response::error(405, "Method not allowed")
        }
        _ => Response::error(404, "Not found"),
    }
}

async fn deployed_tokens(state: &AppState) -> Response {
    match state.ledger.read().await {
        Ok(document) => Response::json(200, &document),
        Err(e) => {
            error!(error = %e, "Failed to read ledger");
            Response::error(500, LEDGER_READ_ERROR)
        }
    }
}

async fn create_metadata(state: &AppState, request: &Request) -> Response {
    let body: CreateMetadataRequest = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Rejected malformed create-metadata body");
            return Response::error(400, "Request body must be a JSON object.");
        }
    };

    match state.relay.create_metadata(&body).await {
        Ok(transaction) => Response::json(200, &CreateMetadataResponse { transaction }),
        Err(ForgeError::Validation(message)) => Response::error(400, &message),
        Err(e) => {
            error!(error = %e, category = e.category(), "Error creating metadata");
            Response::error(500, CREATE_METADATA_ERROR)
        }
    }
}
