//! Unspent outputs as reported by the indexer

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub confirmed: bool,
}

impl UnspentOutput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// Sum of values, saturating rather than wrapping on absurd inputs
pub fn total_value(utxos: &[UnspentOutput]) -> u64 {
    utxos
        .iter()
        .fold(0u64, |acc, utxo| acc.saturating_add(utxo.value))
}
