//! In-memory chain backing the mock Esplora API
//!
//! Tracks transactions, the UTXO set and a block height. Broadcasts are
//! checked the way a relaying node would (inputs exist and are unspent,
//! outputs do not exceed inputs, the relay fee is met, P2WPKH signatures
//! verify) and rejected with bitcoind-style reasons otherwise.
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::{
    absolute, ecdsa, transaction, Address, Amount, CompressedPublicKey, Network, OutPoint,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::types::*;

/// Minimum relay fee in sats per vbyte
const MIN_RELAY_FEE_RATE: u64 = 1;
const GENESIS_TIME: u64 = 1_700_000_000;
const BLOCK_INTERVAL_SECS: u64 = 600;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MockError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Broadcast refused; `code` follows bitcoind's RPC error codes
    #[error("sendrawtransaction RPC error: {{\"code\":{code},\"message\":\"{reason}\"}}")]
    Rejected { code: i32, reason: String },
}

impl MockError {
    fn rejected(code: i32, reason: impl Into<String>) -> Self {
        MockError::Rejected {
            code,
            reason: reason.into(),
        }
    }
}

struct StoredTx {
    tx: Transaction,
    fee: u64,
    block_height: Option<u64>,
}

struct Coin {
    txout: TxOut,
    block_height: Option<u64>,
}

struct ChainState {
    height: u64,
    fees: FeeRecommendation,
    transactions: HashMap<Txid, StoredTx>,
    utxos: BTreeMap<OutPoint, Coin>,
    funding_nonce: i64,
}

pub struct MockChain {
    network: Network,
    state: RwLock<ChainState>,
}

impl MockChain {
    pub fn new(network: Network) -> Self {
        Self::with_fee_rate(network, 1.0)
    }

    pub fn with_fee_rate(network: Network, fastest_fee: f64) -> Self {
        Self {
            network,
            state: RwLock::new(ChainState {
                height: 0,
                fees: FeeRecommendation::from_fastest(fastest_fee),
                transactions: HashMap::new(),
                utxos: BTreeMap::new(),
                funding_nonce: 0,
            }),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tip_height(&self) -> u64 {
        self.read().height
    }

    pub fn fee_recommendation(&self) -> FeeRecommendation {
        self.read().fees
    }

    pub fn set_fee_rate(&self, fastest_fee: f64) {
        self.write().fees = FeeRecommendation::from_fastest(fastest_fee);
    }

    /// Mine a block containing a synthetic transaction paying `amount_sats`
    /// to `address`.
    pub fn fund(&self, address: &str, amount_sats: u64) -> Result<OutPoint, MockError> {
        if amount_sats > Amount::MAX_MONEY.to_sat() {
            return Err(MockError::BadRequest(format!(
                "Amount {} sats exceeds the 21M BTC supply",
                amount_sats
            )));
        }
        let script_pubkey = self.parse_address(address)?.script_pubkey();
        let mut state = self.write();

        let height = state
            .height
            .checked_add(1)
            .ok_or_else(|| MockError::BadRequest("Block height exhausted".to_string()))?;
        state.funding_nonce += 1;
        state.height = height;

        let tx = Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: bitcoin::script::Builder::new()
                    .push_int(state.funding_nonce)
                    .into_script(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(amount_sats),
                script_pubkey,
            }],
        };
        let txid = tx.compute_txid();
        let outpoint = OutPoint { txid, vout: 0 };

        state.utxos.insert(
            outpoint,
            Coin {
                txout: tx.output[0].clone(),
                block_height: Some(height),
            },
        );
        state.transactions.insert(
            txid,
            StoredTx {
                tx,
                fee: 0,
                block_height: Some(height),
            },
        );

        log::info!("Funded {} with {} sats in {}", address, amount_sats, txid);
        Ok(outpoint)
    }

    /// Unspent outputs locked to `address`, mempool included
    pub fn address_utxos(&self, address: &str) -> Result<Vec<UtxoResponse>, MockError> {
        let script_pubkey = self.parse_address(address)?.script_pubkey();
        let state = self.read();

        Ok(state
            .utxos
            .iter()
            .filter(|(_, coin)| coin.txout.script_pubkey == script_pubkey)
            .map(|(outpoint, coin)| UtxoResponse {
                txid: outpoint.txid.to_string(),
                vout: outpoint.vout,
                value: coin.txout.value.to_sat(),
                status: status_at(coin.block_height),
            })
            .collect())
    }

    pub fn transaction(&self, txid: &str) -> Result<TxResponse, MockError> {
        let txid = parse_txid(txid)?;
        let state = self.read();
        let stored = state
            .transactions
            .get(&txid)
            .ok_or_else(|| MockError::NotFound(format!("Transaction not found: {}", txid)))?;
        let tx = &stored.tx;

        let vin = tx
            .input
            .iter()
            .map(|input| {
                let prevout = state
                    .transactions
                    .get(&input.previous_output.txid)
                    .and_then(|parent| parent.tx.output.get(input.previous_output.vout as usize))
                    .map(|txout| self.describe_output(txout));

                TxInput {
                    txid: input.previous_output.txid.to_string(),
                    vout: input.previous_output.vout,
                    prevout,
                    scriptsig: input.script_sig.to_hex_string(),
                    scriptsig_asm: input.script_sig.to_asm_string(),
                    witness: if input.witness.is_empty() {
                        None
                    } else {
                        Some(input.witness.iter().map(hex::encode).collect())
                    },
                    is_coinbase: input.previous_output.is_null(),
                    sequence: input.sequence.to_consensus_u32(),
                }
            })
            .collect();

        let vout = tx
            .output
            .iter()
            .map(|txout| self.describe_output(txout))
            .collect();

        Ok(TxResponse {
            txid: txid.to_string(),
            version: tx.version.0,
            locktime: tx.lock_time.to_consensus_u32(),
            vin,
            vout,
            size: tx.total_size(),
            weight: tx.weight().to_wu(),
            fee: stored.fee,
            status: status_at(stored.block_height),
        })
    }

    pub fn transaction_status(&self, txid: &str) -> Result<TxStatusResponse, MockError> {
        let txid = parse_txid(txid)?;
        self.read()
            .transactions
            .get(&txid)
            .map(|stored| status_at(stored.block_height))
            .ok_or_else(|| MockError::NotFound(format!("Transaction not found: {}", txid)))
    }

    pub fn raw_transaction_hex(&self, txid: &str) -> Result<String, MockError> {
        let txid = parse_txid(txid)?;
        self.read()
            .transactions
            .get(&txid)
            .map(|stored| bitcoin::consensus::encode::serialize_hex(&stored.tx))
            .ok_or_else(|| MockError::NotFound(format!("Transaction not found: {}", txid)))
    }

    /// Validate and accept a raw transaction into the mempool
    pub fn submit(&self, tx_hex: &str) -> Result<Txid, MockError> {
        let bytes = hex::decode(tx_hex.trim())
            .map_err(|e| MockError::rejected(-22, format!("TX decode failed: {}", e)))?;
        let tx: Transaction = bitcoin::consensus::deserialize(&bytes)
            .map_err(|e| MockError::rejected(-22, format!("TX decode failed: {}", e)))?;
        let txid = tx.compute_txid();

        let mut state = self.write();

        if state.transactions.contains_key(&txid) {
            return Err(MockError::rejected(-27, "txn-already-known"));
        }

        let mut seen = HashSet::new();
        let mut prevouts = Vec::with_capacity(tx.input.len());
        for input in &tx.input {
            if !seen.insert(input.previous_output) {
                return Err(MockError::rejected(-26, "bad-txns-inputs-duplicate"));
            }
            let coin = state
                .utxos
                .get(&input.previous_output)
                .ok_or_else(|| MockError::rejected(-25, "bad-txns-inputs-missingorspent"))?;
            prevouts.push(coin.txout.clone());
        }

        let input_total = checked_total(&prevouts)
            .ok_or_else(|| MockError::rejected(-26, "bad-txns-inputvalues-outofrange"))?;
        let output_total = checked_total(&tx.output)
            .ok_or_else(|| MockError::rejected(-26, "bad-txns-txouttotal-toolarge"))?;

        if output_total > input_total {
            return Err(MockError::rejected(-26, "bad-txns-in-belowout"));
        }

        let fee = input_total - output_total;
        if fee < tx.vsize() as u64 * MIN_RELAY_FEE_RATE {
            return Err(MockError::rejected(-26, "min relay fee not met"));
        }

        verify_p2wpkh_witnesses(&tx, &prevouts)?;

        for input in &tx.input {
            state.utxos.remove(&input.previous_output);
        }
        for (vout, txout) in tx.output.iter().enumerate() {
            state.utxos.insert(
                OutPoint {
                    txid,
                    vout: vout as u32,
                },
                Coin {
                    txout: txout.clone(),
                    block_height: None,
                },
            );
        }
        state.transactions.insert(
            txid,
            StoredTx {
                tx,
                fee,
                block_height: None,
            },
        );

        log::info!("Accepted {} into mempool (fee {} sats)", txid, fee);
        Ok(txid)
    }

    /// Mine `count` blocks; the first one confirms the whole mempool
    pub fn mine(&self, count: u64) -> Result<MineBlocksResponse, MockError> {
        let mut state = self.write();
        if count == 0 {
            return Ok(MineBlocksResponse {
                confirmed_txids: Vec::new(),
                new_height: state.height,
            });
        }

        let height = state.height;
        let new_height = height.checked_add(count).ok_or_else(|| {
            MockError::BadRequest(format!("Cannot mine {} blocks past height {}", count, height))
        })?;
        let block_height = height + 1;
        let mut confirmed_txids = Vec::new();

        for (txid, stored) in state.transactions.iter_mut() {
            if stored.block_height.is_none() {
                stored.block_height = Some(block_height);
                confirmed_txids.push(txid.to_string());
            }
        }
        for coin in state.utxos.values_mut() {
            if coin.block_height.is_none() {
                coin.block_height = Some(block_height);
            }
        }

        state.height = new_height;
        confirmed_txids.sort();

        Ok(MineBlocksResponse {
            confirmed_txids,
            new_height,
        })
    }

    fn parse_address(&self, address: &str) -> Result<Address, MockError> {
        Address::from_str(address)
            .map_err(|e| MockError::BadRequest(format!("Invalid address: {}", e)))?
            .require_network(self.network)
            .map_err(|e| MockError::BadRequest(format!("Invalid address: {}", e)))
    }

    fn describe_output(&self, txout: &TxOut) -> TxOutput {
        let script = &txout.script_pubkey;
        TxOutput {
            scriptpubkey: script.to_hex_string(),
            scriptpubkey_asm: script.to_asm_string(),
            scriptpubkey_type: script_type(script).to_string(),
            scriptpubkey_address: Address::from_script(script, self.network)
                .ok()
                .map(|a| a.to_string()),
            value: txout.value.to_sat(),
        }
    }
}

/// Sum of output values, `None` on overflow
fn checked_total(outputs: &[TxOut]) -> Option<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, txout| acc.checked_add(txout.value.to_sat()))
}

fn parse_txid(txid: &str) -> Result<Txid, MockError> {
    Txid::from_str(txid).map_err(|_| MockError::BadRequest(format!("Invalid txid: {}", txid)))
}

fn status_at(block_height: Option<u64>) -> TxStatusResponse {
    match block_height {
        Some(height) => TxStatusResponse {
            confirmed: true,
            block_height: Some(height),
            block_hash: Some(sha256d::Hash::hash(&height.to_le_bytes()).to_string()),
            block_time: Some(GENESIS_TIME + height * BLOCK_INTERVAL_SECS),
        },
        None => TxStatusResponse {
            confirmed: false,
            block_height: None,
            block_hash: None,
            block_time: None,
        },
    }
}

fn script_type(script: &ScriptBuf) -> &'static str {
    if script.is_p2wpkh() {
        "v0_p2wpkh"
    } else if script.is_p2wsh() {
        "v0_p2wsh"
    } else if script.is_p2tr() {
        "v1_p2tr"
    } else if script.is_p2pkh() {
        "p2pkh"
    } else if script.is_p2sh() {
        "p2sh"
    } else if script.is_op_return() {
        "op_return"
    } else {
        "unknown"
    }
}

/// Check every input spending a P2WPKH output carries a valid signature
fn verify_p2wpkh_witnesses(tx: &Transaction, prevouts: &[TxOut]) -> Result<(), MockError> {
    let secp = Secp256k1::verification_only();
    let mut cache = bitcoin::sighash::SighashCache::new(tx);
    let fail = |reason: &str| {
        MockError::rejected(
            -26,
            format!("non-mandatory-script-verify-flag ({})", reason),
        )
    };

    for (index, (input, prevout)) in tx.input.iter().zip(prevouts).enumerate() {
        if !prevout.script_pubkey.is_p2wpkh() {
            continue;
        }
        if input.witness.len() != 2 {
            return Err(fail("Witness program was passed an empty witness"));
        }

        let signature = input
            .witness
            .nth(0)
            .and_then(|bytes| ecdsa::Signature::from_slice(bytes).ok())
            .ok_or_else(|| fail("Non-canonical DER signature"))?;
        let public_key = input
            .witness
            .nth(1)
            .and_then(|bytes| CompressedPublicKey::from_slice(bytes).ok())
            .ok_or_else(|| fail("Public key is neither compressed or uncompressed"))?;

        if ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash()) != prevout.script_pubkey {
            return Err(fail("Witness program hash mismatch"));
        }

        let sighash = cache
            .p2wpkh_signature_hash(
                index,
                &prevout.script_pubkey,
                prevout.value,
                signature.sighash_type,
            )
            .map_err(|_| fail("Signature hash failed"))?;
        let message = Message::from_digest(sighash.to_byte_array());

        secp.verify_ecdsa(&message, &signature.signature, &public_key.0)
            .map_err(|_| {
                fail("Signature must be zero for failed CHECK(MULTI)SIG operation")
            })?;
    }

    Ok(())
}
