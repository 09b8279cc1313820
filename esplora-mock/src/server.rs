//! Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chain::MockChain;
use crate::handlers::*;

pub fn create_router(chain: Arc<MockChain>) -> Router {
    // Configure CORS to allow requests from wallet frontend/tests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Block and fee endpoints
        .route("/blocks/tip/height", get(get_tip_height))
        .route("/v1/fees/recommended", get(get_recommended_fees))

        // Transaction endpoints
        .route("/tx", post(broadcast_transaction))
        .route("/tx/:txid", get(get_transaction))
        .route("/tx/:txid/status", get(get_transaction_status))
        .route("/tx/:txid/hex", get(get_transaction_hex))

        // Address endpoints
        .route("/address/:address/utxo", get(get_address_utxos))

        // Regtest helper endpoints
        .route("/regtest/mine", post(mine_blocks))
        .route("/regtest/fund", post(fund_address))

        // Shared state
        .with_state(chain)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(chain: Arc<MockChain>, host: String, port: u16) -> anyhow::Result<()> {
    let network = chain.network();

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Esplora mock server listening on http://{}", addr);
    log::info!("📡 Serving in-memory {} chain", network);
    log::info!("🔨 Regtest helpers: POST /regtest/mine, POST /regtest/fund");

    serve(listener, chain).await
}

/// Serve the API on an already bound listener (tests bind port 0)
pub async fn serve(listener: TcpListener, chain: Arc<MockChain>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(chain)).await?;
    Ok(())
}
