//! Esplora / mempool.space response shapes consumed by the client

use serde::Deserialize;

/// Entry of `GET /address/{address}/utxo`
#[derive(Debug, Clone, Deserialize)]
pub struct UtxoResponse {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatus,
}

/// Confirmation status of a UTXO entry or of `GET /tx/{txid}/status`
#[derive(Debug, Clone, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// `GET /v1/fees/recommended`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecommendation {
    #[serde(default)]
    pub fastest_fee: Option<f64>,
    #[serde(default)]
    pub half_hour_fee: Option<f64>,
    #[serde(default)]
    pub hour_fee: Option<f64>,
    #[serde(default)]
    pub economy_fee: Option<f64>,
    #[serde(default)]
    pub minimum_fee: Option<f64>,
}

/// Subset of `GET /tx/{txid}` needed to rebuild a spent output
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    pub txid: String,
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    pub scriptpubkey: String,
    pub value: u64,
}
