//! Esplora Mock Server
//!
//! A lightweight Esplora-compatible server backed by an in-memory chain.
//! Designed for Regtest testing and development.

use anyhow::{Context, Result};
use bitcoin::Network;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use esplora_mock::{run_server, MockChain};

#[derive(Debug)]
struct Config {
    network: Network,
    fee_rate: f64,

    // Optional seed funding
    fund_address: Option<String>,
    fund_sats: u64,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let network = env::var("BITCOIN_NETWORK").unwrap_or_else(|_| "regtest".to_string());
        let network = Network::from_str(&network)
            .with_context(|| format!("Invalid BITCOIN_NETWORK: {}", network))?;

        let fee_rate = env::var("MOCK_FEE_RATE")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("Invalid MOCK_FEE_RATE")?;

        let fund_address = env::var("FUND_ADDRESS").ok().filter(|a| !a.is_empty());

        let fund_sats = env::var("FUND_SATS")
            .unwrap_or_else(|_| "1000000".to_string())
            .parse()
            .context("Invalid FUND_SATS")?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            network,
            fee_rate,
            fund_address,
            fund_sats,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Esplora Mock Server...");

    let config = Config::from_env().context("Failed to load configuration")?;

    log::info!("Network: {}, fee rate: {} sat/vB", config.network, config.fee_rate);
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let chain = Arc::new(MockChain::with_fee_rate(config.network, config.fee_rate));

    if let Some(address) = &config.fund_address {
        chain
            .fund(address, config.fund_sats)
            .with_context(|| format!("Failed to fund {}", address))?;
    }

    run_server(chain, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
