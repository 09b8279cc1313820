//! Esplora API response types
//!
//! These types match the Esplora / mempool.space API format so clients can
//! consume them transparently.
use serde::{Deserialize, Serialize};

/// UTXO response from /address/{address}/utxo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoResponse {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatusResponse,
}

/// Confirmation status, shared by UTXO entries and /tx/{txid}/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusResponse {
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
}

/// Transaction response from /tx/{txid}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResponse {
    pub txid: String,
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    pub size: usize,
    pub weight: u64,
    pub fee: u64,
    pub status: TxStatusResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevout: Option<TxOutput>,
    pub scriptsig: String,
    pub scriptsig_asm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Vec<String>>,
    pub is_coinbase: bool,
    pub sequence: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub scriptpubkey: String,
    pub scriptpubkey_asm: String,
    pub scriptpubkey_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// Fee recommendation from /v1/fees/recommended (mempool.space extension)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecommendation {
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    pub economy_fee: f64,
    pub minimum_fee: f64,
}

impl FeeRecommendation {
    /// Recommendation whose tiers all derive from a single fastest rate
    pub fn from_fastest(fastest_fee: f64) -> Self {
        let floor = |rate: f64| rate.max(1.0).floor();
        Self {
            fastest_fee,
            half_hour_fee: floor(fastest_fee * 0.75),
            hour_fee: floor(fastest_fee * 0.5),
            economy_fee: floor(fastest_fee * 0.25),
            minimum_fee: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MineBlocksRequest {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineBlocksResponse {
    pub confirmed_txids: Vec<String>,
    pub new_height: u64,
}

#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub address: String,
    pub amount_sats: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FundResponse {
    pub txid: String,
    pub vout: u32,
}
