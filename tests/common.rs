//! Common test utilities for vault sender integration tests
//!
//! - Deterministic keys and addresses
//! - `VaultConfig` assembled from an in-memory variable map
//! - `FakeIndexer`, an in-memory [`Indexer`] that counts calls

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, Amount, CompressedPublicKey, Network, PrivateKey, TxOut, Txid};
use privatebtc_vault::{FeeRateEstimate, Indexer, UnspentOutput, VaultConfig, VaultError};

pub fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// Deterministic P2WPKH key: (WIF, address)
pub fn test_key(seed: u8, network: Network) -> (String, Address) {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&[seed; 32]).expect("Valid secret key");
    let private_key = PrivateKey::new(secret_key, network);
    let public_key =
        CompressedPublicKey::from_private_key(&secp, &private_key).expect("Compressed key");
    (private_key.to_wif(), Address::p2wpkh(&public_key, network))
}

pub const SENDER_SEED: u8 = 0x11;
pub const VAULT_SEED: u8 = 0x22;

/// Variables describing a sender and vault on `network`
pub fn test_vars(network: Network, esplora_url: &str) -> HashMap<String, String> {
    let (sender_wif, sender_address) = test_key(SENDER_SEED, network);
    let (_, vault_address) = test_key(VAULT_SEED, network);

    let mut vars = HashMap::new();
    vars.insert("BITCOIN_NETWORK".to_string(), network.to_string());
    vars.insert("ESPLORA_URL".to_string(), esplora_url.to_string());
    vars.insert("EXPLORER_URL".to_string(), "https://explorer.test".to_string());
    vars.insert("SENDER_ADDRESS".to_string(), sender_address.to_string());
    vars.insert("SENDER_PRIVATE_KEY".to_string(), sender_wif);
    vars.insert("VAULT_ADDRESS_BTC".to_string(), vault_address.to_string());
    vars.insert("REQUEST_TIMEOUT_SECS".to_string(), "5".to_string());
    vars
}

pub fn config_from(vars: HashMap<String, String>) -> VaultConfig {
    VaultConfig::from_lookup(|key| vars.get(key).cloned()).expect("Valid test config")
}

pub fn signet_config() -> VaultConfig {
    config_from(test_vars(Network::Signet, "http://indexer.invalid"))
}

pub fn fake_txid(byte: u8) -> Txid {
    Txid::from_byte_array([byte; 32])
}

/// Indexer answers served from memory
pub struct FakeIndexer {
    pub utxos: Vec<UnspentOutput>,
    pub fee_rate: f64,
    pub prevouts: HashMap<(Txid, u32), TxOut>,
    /// `Some` makes every broadcast fail with this (status, body)
    pub broadcast_failure: Option<(u16, String)>,
    pub broadcasts: Mutex<Vec<String>>,
    pub tip_height: u64,
    /// Confirming block per txid; unknown txids are a network error
    pub tx_heights: HashMap<Txid, Option<u64>>,
    pub utxo_calls: AtomicUsize,
    pub fee_calls: AtomicUsize,
    pub tx_calls: AtomicUsize,
}

impl FakeIndexer {
    pub fn new(fee_rate: f64) -> Self {
        Self {
            utxos: Vec::new(),
            fee_rate,
            prevouts: HashMap::new(),
            broadcast_failure: None,
            broadcasts: Mutex::new(Vec::new()),
            tip_height: 0,
            tx_heights: HashMap::new(),
            utxo_calls: AtomicUsize::new(0),
            fee_calls: AtomicUsize::new(0),
            tx_calls: AtomicUsize::new(0),
        }
    }

    /// Add a UTXO locked to `owner`, serving its previous output too
    pub fn with_utxo(mut self, id: u8, value: u64, confirmed: bool, owner: &Address) -> Self {
        let txid = fake_txid(id);
        self.utxos.push(UnspentOutput {
            txid,
            vout: 0,
            value,
            confirmed,
        });
        self.prevouts.insert(
            (txid, 0),
            TxOut {
                value: Amount::from_sat(value),
                script_pubkey: owner.script_pubkey(),
            },
        );
        self
    }

    pub fn at_tip(mut self, tip_height: u64) -> Self {
        self.tip_height = tip_height;
        self
    }

    pub fn with_tx_height(mut self, id: u8, block_height: Option<u64>) -> Self {
        self.tx_heights.insert(fake_txid(id), block_height);
        self
    }

    pub fn failing_broadcast(mut self, status: u16, body: &str) -> Self {
        self.broadcast_failure = Some((status, body.to_string()));
        self
    }

    pub fn total_calls(&self) -> usize {
        self.utxo_calls.load(Ordering::SeqCst)
            + self.fee_calls.load(Ordering::SeqCst)
            + self.tx_calls.load(Ordering::SeqCst)
            + self.broadcasts.lock().expect("lock").len()
    }
}

#[async_trait]
impl Indexer for FakeIndexer {
    async fn fetch_utxos(&self, _address: &Address) -> Result<Vec<UnspentOutput>, VaultError> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.utxos.clone())
    }

    async fn fetch_fee_rate(&self) -> Result<FeeRateEstimate, VaultError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FeeRateEstimate::new(self.fee_rate))
    }

    async fn fetch_tx_output(&self, txid: &Txid, vout: u32) -> Result<TxOut, VaultError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        self.prevouts
            .get(&(*txid, vout))
            .cloned()
            .ok_or_else(|| VaultError::Network(format!("Transaction not found: {}", txid)))
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, VaultError> {
        self.broadcasts
            .lock()
            .expect("lock")
            .push(raw_tx_hex.to_string());

        if let Some((status, body)) = &self.broadcast_failure {
            return Err(VaultError::Broadcast {
                status: *status,
                body: body.clone(),
            });
        }

        let bytes = hex::decode(raw_tx_hex).map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(&bytes)
            .map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        Ok(tx.compute_txid())
    }

    async fn fetch_tx_status(&self, txid: &Txid) -> Result<Option<u64>, VaultError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        self.tx_heights
            .get(txid)
            .copied()
            .ok_or_else(|| VaultError::Network(format!("Transaction not found: {}", txid)))
    }

    async fn fetch_tip_height(&self) -> Result<u64, VaultError> {
        Ok(self.tip_height)
    }
}
