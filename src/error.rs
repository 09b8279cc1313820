//! Error types for vault payment construction
//!
//! Network faults, business-state failures (empty or insufficient balance),
//! key misconfiguration and broadcast rejections are kept as distinct
//! variants so callers can decide what to do next.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// Indexer unreachable, timed out, non-2xx on a read, or malformed response
    #[error("Network error: {0}")]
    Network(String),

    #[error("No UTXOs found for sender address {address}")]
    EmptyBalance { address: String },

    #[error(
        "Insufficient funds. Have {available} sats, need {required} sats (short by {shortfall} sats)"
    )]
    InsufficientFunds {
        available: u64,
        required: u64,
        shortfall: u64,
    },

    /// Wrong, malformed or mismatched signing key
    #[error("Signing error: {0}")]
    Signing(String),

    /// Indexer rejected the transaction; `body` is its response verbatim
    #[error("Broadcast failed: {status}\n{body}")]
    Broadcast { status: u16, body: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bitcoin error: {0}")]
    Bitcoin(String),
}

impl VaultError {
    /// True for legitimate wallet states (nothing to spend, not enough to spend)
    /// as opposed to faults in the network or configuration.
    pub fn is_balance_error(&self) -> bool {
        matches!(
            self,
            VaultError::EmptyBalance { .. } | VaultError::InsufficientFunds { .. }
        )
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VaultError::Network(format!("request timed out: {}", err))
        } else {
            VaultError::Network(err.to_string())
        }
    }
}
