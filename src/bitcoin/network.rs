//! Bitcoin network selection and per-network service defaults

use bitcoin::Network;

/// Parse a network name, defaulting to Signet for anything unrecognized
pub fn parse_network(name: &str) -> Network {
    match name.trim().to_lowercase().as_str() {
        "regtest" => {
            log::info!("🔧 Using REGTEST network");
            Network::Regtest
        }
        "testnet" | "testnet3" => {
            log::info!("🧪 Using TESTNET network");
            Network::Testnet
        }
        "bitcoin" | "mainnet" => {
            log::warn!("⚠️  Using MAINNET network, real funds will move");
            Network::Bitcoin
        }
        "signet" | "" => {
            log::info!("🌐 Using SIGNET network");
            Network::Signet
        }
        other => {
            log::warn!("⚠️  Unknown network '{}', defaulting to Signet", other);
            Network::Signet
        }
    }
}

/// Esplora-compatible API base URL used when none is configured
pub fn default_esplora_url(network: Network) -> &'static str {
    match network {
        Network::Regtest => "http://localhost:3000",
        Network::Testnet => "https://mempool.space/testnet/api",
        Network::Bitcoin => "https://mempool.space/api",
        _ => "https://mempool.space/signet/api",
    }
}

/// Block explorer base URL; transaction pages live under `{base}/tx/{txid}`
pub fn default_explorer_url(network: Network) -> &'static str {
    match network {
        Network::Regtest => "http://localhost:3000",
        Network::Testnet => "https://mempool.space/testnet",
        Network::Bitcoin => "https://mempool.space",
        _ => "https://mempool.space/signet",
    }
}

/// Human-readable link to a transaction on the explorer
pub fn explorer_tx_url(explorer_base: &str, txid: &str) -> String {
    format!("{}/tx/{}", explorer_base.trim_end_matches('/'), txid)
}
