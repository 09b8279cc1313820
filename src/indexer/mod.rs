//! Blockchain indexer access
//!
//! The payment and deposit-tracking flows need six capabilities from an
//! indexer, collected in the [`Indexer`] trait. [`EsploraClient`] implements
//! them over the Esplora / mempool.space HTTP API; tests substitute in-memory
//! fakes.

pub mod esplora;
pub mod types;

use async_trait::async_trait;
use bitcoin::{Address, TxOut, Txid};

use crate::bitcoin::{FeeRateEstimate, UnspentOutput};
use crate::error::VaultError;

pub use esplora::EsploraClient;

#[async_trait]
pub trait Indexer: Send + Sync {
    /// Unspent outputs currently locked to `address`, in indexer order
    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<UnspentOutput>, VaultError>;

    /// Recommended fee rate for fast confirmation
    async fn fetch_fee_rate(&self) -> Result<FeeRateEstimate, VaultError>;

    /// Output `vout` of transaction `txid`, including its locking script
    async fn fetch_tx_output(&self, txid: &Txid, vout: u32) -> Result<TxOut, VaultError>;

    /// Submit a raw transaction (consensus hex) and return its id
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, VaultError>;

    /// Height of the block that confirmed `txid`, `None` while unconfirmed
    async fn fetch_tx_status(&self, txid: &Txid) -> Result<Option<u64>, VaultError>;

    /// Height of the current chain tip
    async fn fetch_tip_height(&self) -> Result<u64, VaultError>;
}

/// Fetch the outputs `address` can spend.
///
/// An address with nothing to spend is reported as
/// [`VaultError::EmptyBalance`], never as a network fault.
pub async fn fetch_spendable_utxos<I: Indexer + ?Sized>(
    indexer: &I,
    address: &Address,
    include_unconfirmed: bool,
) -> Result<Vec<UnspentOutput>, VaultError> {
    let utxos = indexer.fetch_utxos(address).await?;
    let fetched = utxos.len();

    let spendable: Vec<_> = utxos
        .into_iter()
        .filter(|utxo| include_unconfirmed || utxo.confirmed)
        .collect();

    if spendable.len() < fetched {
        log::info!(
            "Skipping {} unconfirmed UTXO(s) for {}",
            fetched - spendable.len(),
            address
        );
    }

    if spendable.is_empty() {
        return Err(VaultError::EmptyBalance {
            address: address.to_string(),
        });
    }

    Ok(spendable)
}
