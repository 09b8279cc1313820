//! Axum HTTP handlers for Esplora API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::chain::{MockChain, MockError};
use crate::types::*;

/// Shared application state
pub type AppState = Arc<MockChain>;

/// Custom error type for handlers
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, message).into_response()
    }
}

impl From<MockError> for ApiError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// GET /blocks/tip/height
/// Returns the current blockchain height as plain text
pub async fn get_tip_height(State(chain): State<AppState>) -> String {
    chain.tip_height().to_string()
}

/// GET /v1/fees/recommended
pub async fn get_recommended_fees(State(chain): State<AppState>) -> Json<FeeRecommendation> {
    Json(chain.fee_recommendation())
}

/// POST /tx
/// Broadcasts a raw transaction (hex string in body)
/// Returns the txid as plain text
pub async fn broadcast_transaction(
    State(chain): State<AppState>,
    body: String,
) -> Result<String, ApiError> {
    let txid = chain.submit(&body).map_err(|e| {
        log::warn!("Rejected broadcast: {}", e);
        ApiError::from(e)
    })?;
    Ok(txid.to_string())
}

/// GET /tx/{txid}
/// Returns transaction details in Esplora JSON format
pub async fn get_transaction(
    State(chain): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<TxResponse>, ApiError> {
    Ok(Json(chain.transaction(&txid)?))
}

/// GET /tx/{txid}/status
pub async fn get_transaction_status(
    State(chain): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<TxStatusResponse>, ApiError> {
    Ok(Json(chain.transaction_status(&txid)?))
}

/// GET /tx/{txid}/hex
pub async fn get_transaction_hex(
    State(chain): State<AppState>,
    Path(txid): Path<String>,
) -> Result<String, ApiError> {
    Ok(chain.raw_transaction_hex(&txid)?)
}

/// GET /address/{address}/utxo
/// Returns all UTXOs for an address
pub async fn get_address_utxos(
    State(chain): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<UtxoResponse>>, ApiError> {
    Ok(Json(chain.address_utxos(&address)?))
}

// ============================================================================
// REGTEST HELPER ENDPOINTS (not part of standard Esplora API)
// ============================================================================

/// POST /regtest/mine
/// Confirms everything in the mempool
pub async fn mine_blocks(
    State(chain): State<AppState>,
    Json(req): Json<MineBlocksRequest>,
) -> Result<Json<MineBlocksResponse>, ApiError> {
    log::info!("Mining {} blocks", req.count);

    let response = chain.mine(req.count)?;

    log::info!(
        "Confirmed {} transactions, new height: {}",
        response.confirmed_txids.len(),
        response.new_height
    );

    Ok(Json(response))
}

/// POST /regtest/fund
/// Credit an address with a fresh confirmed output
pub async fn fund_address(
    State(chain): State<AppState>,
    Json(req): Json<FundRequest>,
) -> Result<Json<FundResponse>, ApiError> {
    let outpoint = chain.fund(&req.address, req.amount_sats)?;
    Ok(Json(FundResponse {
        txid: outpoint.txid.to_string(),
        vout: outpoint.vout,
    }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
