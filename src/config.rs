//! Vault sender configuration from environment variables
//!
//! Controls the Bitcoin network, the Esplora API endpoint, the sending wallet
//! and the vault destination. Defaults to Signet.

use bitcoin::{Address, Network};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::bitcoin::network::{default_esplora_url, default_explorer_url, parse_network};
use crate::bitcoin::FeeRateEstimate;
use crate::error::VaultError;

pub const DEFAULT_AMOUNT_SATS: u64 = 200_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct VaultConfig {
    /// Bitcoin network the addresses and key belong to
    pub network: Network,
    /// Esplora API base URL
    pub esplora_url: String,
    /// Block explorer base URL (for human-readable links)
    pub explorer_url: String,
    /// P2WPKH address holding the funds
    pub sender_address: Address,
    /// WIF-encoded private key controlling `sender_address`
    pub sender_private_key: String,
    /// Vault deposit address
    pub vault_address: Address,
    /// Amount sent when none is given on the command line
    pub default_amount_sats: u64,
    /// Upper bound on every indexer request
    pub request_timeout: Duration,
    /// Whether mempool (unconfirmed) outputs may be spent
    pub spend_unconfirmed: bool,
    /// Skip the indexer's fee recommendation and use this rate instead
    pub fee_rate_override: Option<FeeRateEstimate>,
}

impl VaultConfig {
    /// Load configuration from environment variables (and `.env` if present)
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "signet" (default), "testnet" or "regtest"
    /// - `ESPLORA_URL` (or `MEMPOOL_API_URL`): Esplora API endpoint
    /// - `EXPLORER_URL`: block explorer base for transaction links
    /// - `SENDER_ADDRESS`, `SENDER_PRIVATE_KEY`: the funding wallet (required)
    /// - `VAULT_ADDRESS_BTC`: vault deposit address (required)
    /// - `SEND_AMOUNT_SATS`: default amount (200000)
    /// - `REQUEST_TIMEOUT_SECS`: per-request timeout (30)
    /// - `SPEND_UNCONFIRMED`: "true" (default) or "false"
    /// - `FEE_RATE_SAT_VB`: fixed fee rate overriding the indexer's
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Use Regtest with the local Esplora mock
    /// BITCOIN_NETWORK=regtest ESPLORA_URL=http://localhost:3000 cargo run --bin send-to-vault
    /// ```
    pub fn from_env() -> Result<Self, VaultError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| VaultError::Config(format!("{} is missing from .env", key)))
        };

        let network = parse_network(&var("BITCOIN_NETWORK").unwrap_or_default());

        let esplora_url = var("ESPLORA_URL")
            .or_else(|| var("MEMPOOL_API_URL"))
            .unwrap_or_else(|| default_esplora_url(network).to_string());
        log::info!("📡 Esplora URL: {}", esplora_url);

        let explorer_url =
            var("EXPLORER_URL").unwrap_or_else(|| default_explorer_url(network).to_string());

        let sender_address = parse_address("SENDER_ADDRESS", &required("SENDER_ADDRESS")?, network)?;
        let vault_address =
            parse_address("VAULT_ADDRESS_BTC", &required("VAULT_ADDRESS_BTC")?, network)?;
        let sender_private_key = required("SENDER_PRIVATE_KEY")?;

        let default_amount_sats = match var("SEND_AMOUNT_SATS") {
            Some(value) => parse_number("SEND_AMOUNT_SATS", &value)?,
            None => DEFAULT_AMOUNT_SATS,
        };

        let timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => parse_number("REQUEST_TIMEOUT_SECS", &value)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(VaultError::Config(
                "REQUEST_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let spend_unconfirmed = match var("SPEND_UNCONFIRMED") {
            Some(value) => parse_bool("SPEND_UNCONFIRMED", &value)?,
            None => true,
        };

        let fee_rate_override = match var("FEE_RATE_SAT_VB") {
            Some(value) => {
                let rate: f64 = value.trim().parse().map_err(|_| {
                    VaultError::Config(format!("FEE_RATE_SAT_VB is not a number: {}", value))
                })?;
                log::info!("Using fixed fee rate: {} sat/vB", rate);
                Some(FeeRateEstimate::new(rate))
            }
            None => None,
        };

        Ok(Self {
            network,
            esplora_url,
            explorer_url,
            sender_address,
            sender_private_key,
            vault_address,
            default_amount_sats,
            request_timeout: Duration::from_secs(timeout_secs),
            spend_unconfirmed,
            fee_rate_override,
        })
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("network", &self.network)
            .field("esplora_url", &self.esplora_url)
            .field("explorer_url", &self.explorer_url)
            .field("sender_address", &self.sender_address)
            .field("sender_private_key", &"<redacted>")
            .field("vault_address", &self.vault_address)
            .field("default_amount_sats", &self.default_amount_sats)
            .field("request_timeout", &self.request_timeout)
            .field("spend_unconfirmed", &self.spend_unconfirmed)
            .field("fee_rate_override", &self.fee_rate_override)
            .finish()
    }
}

fn parse_address(key: &str, value: &str, network: Network) -> Result<Address, VaultError> {
    Address::from_str(value.trim())
        .map_err(|e| VaultError::Config(format!("{} is not a valid address: {}", key, e)))?
        .require_network(network)
        .map_err(|e| VaultError::Config(format!("{} network mismatch: {}", key, e)))
}

fn parse_number(key: &str, value: &str) -> Result<u64, VaultError> {
    value
        .trim()
        .parse()
        .map_err(|_| VaultError::Config(format!("{} is not a whole number: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, VaultError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(VaultError::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}
