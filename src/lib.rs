//! PrivateBTC Vault: Bitcoin payment constructor
//!
//! Funds a vault address (or pays a withdrawal recipient) from a single-key
//! P2WPKH wallet through an Esplora-compatible indexer.
//!
//! # Architecture
//!
//! - **Indexer**: fetches UTXOs, fee rates and previous outputs; broadcasts
//! - **Coin selection**: greedy largest-first with an iterative fee estimate
//! - **Transaction builder**: PSBT assembly, P2WPKH signing, finalization
//! - **Vault sender**: the sequential flow tying them together, and deposit
//!   confirmation tracking
//!
//! # Example
//!
//! ```ignore
//! use privatebtc_vault::{VaultConfig, VaultSender};
//!
//! let sender = VaultSender::from_config(VaultConfig::from_env()?)?;
//! let intent = sender.vault_intent(Some(200_000))?;
//! let receipt = sender.send(&intent).await?;
//! println!("TXID: {}", receipt.txid);
//! ```

pub mod bitcoin;
pub mod config;
pub mod error;
pub mod indexer;
pub mod sender;

// Re-exports for convenience
pub use crate::bitcoin::{
    BuiltTransaction, FeeRateEstimate, P2wpkhSigner, PaymentIntent, SelectionResult,
    UnspentOutput,
};
pub use crate::config::VaultConfig;
pub use crate::error::VaultError;
pub use crate::indexer::{EsploraClient, Indexer};
pub use crate::sender::{BalanceReport, DepositStatus, SendReceipt, VaultSender};
