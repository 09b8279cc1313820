use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::blockdata::transaction::{Transaction, TxIn, TxOut};
use bitcoin::blockdata::witness::Witness;
use bitcoin::psbt::{Psbt, PsbtSighashType};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::{OutPoint, Sequence};
use bitcoin::{absolute, Address, Amount, Network, Txid};
use std::str::FromStr;

use super::fee::DUST_THRESHOLD_SATS;
use super::selection::SelectionResult;
use super::signer::P2wpkhSigner;
use super::utxo::UnspentOutput;
use crate::error::VaultError;

/// Where to send how much
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    destination: Address,
    amount_sats: u64,
}

impl PaymentIntent {
    /// Parse and network-check `destination`, and reject dust-sized amounts
    pub fn new(destination: &str, amount_sats: u64, network: Network) -> Result<Self, VaultError> {
        let destination = Address::from_str(destination.trim())
            .map_err(|e| VaultError::InvalidInput(format!("Invalid address: {}", e)))?
            .require_network(network)
            .map_err(|e| VaultError::InvalidInput(format!("Address network mismatch: {}", e)))?;

        Self::to_address(destination, amount_sats)
    }

    pub fn to_address(destination: Address, amount_sats: u64) -> Result<Self, VaultError> {
        if amount_sats < DUST_THRESHOLD_SATS {
            return Err(VaultError::InvalidInput(format!(
                "Amount {} sats is below the dust threshold of {} sats",
                amount_sats, DUST_THRESHOLD_SATS
            )));
        }
        Ok(Self {
            destination,
            amount_sats,
        })
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn amount_sats(&self) -> u64 {
        self.amount_sats
    }
}

/// Collects inputs and outputs of a transaction before it is signed.
///
/// Signing consumes the builder, so nothing can be added afterwards.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<(OutPoint, TxOut)>,
    outputs: Vec<TxOut>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `outpoint`; `prevout` carries the value and locking script needed
    /// for the segwit sighash.
    pub fn add_input(&mut self, outpoint: OutPoint, prevout: TxOut) -> &mut Self {
        self.inputs.push((outpoint, prevout));
        self
    }

    pub fn add_output(&mut self, script_pubkey: ScriptBuf, value_sats: u64) -> &mut Self {
        self.outputs.push(TxOut {
            value: Amount::from_sat(value_sats),
            script_pubkey,
        });
        self
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Build the PSBT and sign every input with `signer`
    pub fn sign(self, signer: &P2wpkhSigner) -> Result<SignedTransaction, VaultError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(VaultError::InvalidInput(
                "Transaction needs at least one input and one output".to_string(),
            ));
        }

        let unsigned_tx = Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: self
                .inputs
                .iter()
                .map(|(outpoint, _)| TxIn {
                    previous_output: *outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: self.outputs,
        };

        let mut psbt =
            Psbt::from_unsigned_tx(unsigned_tx).map_err(|e| VaultError::Bitcoin(e.to_string()))?;

        for (psbt_input, (_, prevout)) in psbt.inputs.iter_mut().zip(self.inputs.iter()) {
            psbt_input.witness_utxo = Some(prevout.clone());
            psbt_input.sighash_type = Some(PsbtSighashType::from(EcdsaSighashType::All));
        }

        let public_key = signer.public_key();
        let mut signatures = Vec::with_capacity(self.inputs.len());
        {
            let mut cache = SighashCache::new(&psbt.unsigned_tx);
            for (input_index, (_, prevout)) in self.inputs.iter().enumerate() {
                signatures.push(signer.sign_input(&mut cache, input_index, prevout.value)?);
            }
        }

        for (psbt_input, signature) in psbt.inputs.iter_mut().zip(signatures) {
            psbt_input.partial_sigs.insert(public_key, signature);
        }

        log::debug!("Signed {} input(s)", psbt.inputs.len());
        Ok(SignedTransaction { psbt })
    }
}

/// A fully signed PSBT awaiting finalization
#[derive(Debug)]
pub struct SignedTransaction {
    psbt: Psbt,
}

impl SignedTransaction {
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// Move each signature into a P2WPKH witness and extract the network
    /// transaction.
    pub fn finalize(mut self) -> Result<Transaction, VaultError> {
        for (index, input) in self.psbt.inputs.iter_mut().enumerate() {
            let (public_key, signature) = input
                .partial_sigs
                .iter()
                .next()
                .map(|(pk, sig)| (*pk, *sig))
                .ok_or_else(|| VaultError::Signing(format!("Input {} is not signed", index)))?;

            let mut witness = Witness::new();
            witness.push_ecdsa_signature(&signature);
            witness.push(public_key.to_bytes());

            input.final_script_witness = Some(witness);
            input.partial_sigs.clear();
            input.sighash_type = None;
        }

        self.psbt
            .extract_tx()
            .map_err(|e| VaultError::Bitcoin(format!("Failed to extract transaction: {}", e)))
    }
}

/// A finalized transaction ready for broadcast
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx: Transaction,
    pub txid: Txid,
    pub raw_hex: String,
    pub inputs: Vec<UnspentOutput>,
    pub amount_sats: u64,
    pub fee_sats: u64,
    pub change_sats: Option<u64>,
}

impl BuiltTransaction {
    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }
}

/// Assemble, sign and finalize a payment spending `selection`.
///
/// `prevouts[i]` must be the output spent by `selection.utxos[i]` and locked
/// to the signer's own P2WPKH script.
pub fn build_payment(
    selection: &SelectionResult,
    prevouts: &[TxOut],
    intent: &PaymentIntent,
    change_address: &Address,
    signer: &P2wpkhSigner,
) -> Result<BuiltTransaction, VaultError> {
    if prevouts.len() != selection.utxos.len() {
        return Err(VaultError::Bitcoin(format!(
            "Got {} previous outputs for {} selected UTXOs",
            prevouts.len(),
            selection.utxos.len()
        )));
    }

    let plan = selection.change_plan(intent.amount_sats());
    let sender_script = signer.script_pubkey();

    let mut builder = TransactionBuilder::new();
    for (utxo, prevout) in selection.utxos.iter().zip(prevouts) {
        if prevout.script_pubkey != sender_script {
            return Err(VaultError::Signing(format!(
                "UTXO {} is not locked to the sender address {}",
                utxo.outpoint(),
                signer.address()
            )));
        }
        // The sighash commits to this value; a disagreeing indexer means a
        // signature the network will reject.
        if prevout.value.to_sat() != utxo.value {
            return Err(VaultError::Network(format!(
                "Indexer reports {} sats for UTXO {} but its transaction says {} sats",
                utxo.value,
                utxo.outpoint(),
                prevout.value.to_sat()
            )));
        }
        builder.add_input(utxo.outpoint(), prevout.clone());
    }

    builder.add_output(intent.destination().script_pubkey(), intent.amount_sats());

    match plan.change {
        Some(change) => {
            log::info!(
                "Adding change output: {} sats returning to {}",
                change,
                change_address
            );
            builder.add_output(change_address.script_pubkey(), change);
        }
        None => {
            log::info!(
                "Change {} is below dust threshold, adding to miner fee.",
                selection
                    .total_input
                    .saturating_sub(intent.amount_sats())
                    .saturating_sub(selection.estimated_fee)
            );
        }
    }

    let tx = builder.sign(signer)?.finalize()?;
    let raw_hex = bitcoin::consensus::encode::serialize_hex(&tx);
    let txid = tx.compute_txid();

    Ok(BuiltTransaction {
        tx,
        txid,
        raw_hex,
        inputs: selection.utxos.clone(),
        amount_sats: intent.amount_sats(),
        fee_sats: plan.fee,
        change_sats: plan.change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::fee::FeeRateEstimate;
    use crate::bitcoin::selection::select_coins;
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
    use bitcoin::{CompressedPublicKey, PrivateKey};

    fn signer(byte: u8) -> P2wpkhSigner {
        let key = PrivateKey::new(SecretKey::from_slice(&[byte; 32]).unwrap(), Network::Signet);
        P2wpkhSigner::from_wif(&key.to_wif(), Network::Signet).unwrap()
    }

    fn utxo(tag: u8, value: u64) -> UnspentOutput {
        UnspentOutput {
            txid: Txid::from_byte_array([tag; 32]),
            vout: 1,
            value,
            confirmed: true,
        }
    }

    fn prevouts_for(selection: &SelectionResult, signer: &P2wpkhSigner) -> Vec<TxOut> {
        selection
            .utxos
            .iter()
            .map(|u| TxOut {
                value: Amount::from_sat(u.value),
                script_pubkey: signer.script_pubkey(),
            })
            .collect()
    }

    #[test]
    fn test_payment_with_change_decodes_and_verifies() {
        let sender = signer(0x11);
        let vault = signer(0x33);
        let utxos = vec![utxo(1, 150_000), utxo(2, 80_000)];
        let selection = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap();
        let intent = PaymentIntent::to_address(vault.address().clone(), 200_000).unwrap();

        let built = build_payment(
            &selection,
            &prevouts_for(&selection, &sender),
            &intent,
            sender.address(),
            &sender,
        )
        .unwrap();

        assert_eq!(built.fee_sats, 1040);
        assert_eq!(built.change_sats, Some(28_960));

        let bytes = hex::decode(&built.raw_hex).unwrap();
        let decoded: Transaction = bitcoin::consensus::deserialize(&bytes).unwrap();
        assert_eq!(decoded.compute_txid(), built.txid);
        assert_eq!(decoded.input.len(), 2);
        assert_eq!(decoded.output.len(), 2);
        assert_eq!(decoded.output[0].value.to_sat(), 200_000);
        assert_eq!(decoded.output[0].script_pubkey, vault.script_pubkey());
        assert_eq!(decoded.output[1].value.to_sat(), 28_960);
        assert_eq!(decoded.output[1].script_pubkey, sender.script_pubkey());

        // Every witness must carry a valid signature for its input
        let secp = Secp256k1::verification_only();
        let mut cache = SighashCache::new(&decoded);
        for (index, input) in decoded.input.iter().enumerate() {
            assert_eq!(input.witness.len(), 2);
            let sig = bitcoin::ecdsa::Signature::from_slice(input.witness.nth(0).unwrap()).unwrap();
            let pk = CompressedPublicKey::from_slice(input.witness.nth(1).unwrap()).unwrap();
            assert_eq!(pk, CompressedPublicKey::try_from(sender.public_key()).unwrap());

            let value = Amount::from_sat(selection.utxos[index].value);
            let sighash = cache
                .p2wpkh_signature_hash(index, &sender.script_pubkey(), value, sig.sighash_type)
                .unwrap();
            let msg = Message::from_digest(sighash.to_byte_array());
            secp.verify_ecdsa(&msg, &sig.signature, &pk.0).unwrap();
        }
    }

    #[test]
    fn test_dust_change_gives_single_output() {
        let sender = signer(0x11);
        let vault = signer(0x33);
        let utxos = vec![utxo(1, 150_000), utxo(2, 51_540)];
        let selection = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap();
        let intent = PaymentIntent::to_address(vault.address().clone(), 200_000).unwrap();

        let built = build_payment(
            &selection,
            &prevouts_for(&selection, &sender),
            &intent,
            sender.address(),
            &sender,
        )
        .unwrap();

        assert_eq!(built.tx.output.len(), 1);
        assert_eq!(built.change_sats, None);
        assert_eq!(built.fee_sats, 1_540);
    }

    #[test]
    fn test_foreign_prevout_script_rejected() {
        let sender = signer(0x11);
        let stranger = signer(0x44);
        let selection =
            select_coins(&[utxo(1, 500_000)], 100_000, FeeRateEstimate::new(1.0)).unwrap();
        let intent = PaymentIntent::to_address(stranger.address().clone(), 100_000).unwrap();

        let err = build_payment(
            &selection,
            &prevouts_for(&selection, &stranger),
            &intent,
            sender.address(),
            &sender,
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::Signing(_)));
    }

    #[test]
    fn test_prevout_value_disagreeing_with_utxo_listing_rejected() {
        let sender = signer(0x11);
        let vault = signer(0x33);
        let selection =
            select_coins(&[utxo(1, 500_000)], 100_000, FeeRateEstimate::new(1.0)).unwrap();
        let intent = PaymentIntent::to_address(vault.address().clone(), 100_000).unwrap();

        let mut prevouts = prevouts_for(&selection, &sender);
        prevouts[0].value = Amount::from_sat(400_000);

        let err = build_payment(&selection, &prevouts, &intent, sender.address(), &sender)
            .unwrap_err();
        assert!(matches!(err, VaultError::Network(_)));
        assert!(err.to_string().contains("400000"));
    }

    #[test]
    fn test_empty_builder_cannot_sign() {
        let err = TransactionBuilder::new().sign(&signer(0x11)).unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn test_signed_psbt_holds_partial_sigs_until_finalized() {
        let sender = signer(0x11);
        let mut builder = TransactionBuilder::new();
        builder
            .add_input(
                utxo(9, 60_000).outpoint(),
                TxOut {
                    value: Amount::from_sat(60_000),
                    script_pubkey: sender.script_pubkey(),
                },
            )
            .add_output(sender.script_pubkey(), 50_000);
        assert_eq!(builder.input_count(), 1);
        assert_eq!(builder.output_count(), 1);

        let signed = builder.sign(&sender).unwrap();
        assert_eq!(signed.psbt().inputs[0].partial_sigs.len(), 1);
        assert!(signed.psbt().inputs[0].witness_utxo.is_some());

        let tx = signed.finalize().unwrap();
        assert_eq!(tx.input[0].witness.len(), 2);
    }

    #[test]
    fn test_intent_validation() {
        let vault = signer(0x33).address().to_string();
        assert!(PaymentIntent::new(&vault, 200_000, Network::Signet).is_ok());
        assert!(matches!(
            PaymentIntent::new(&vault, 100, Network::Signet),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            PaymentIntent::new(&vault, 200_000, Network::Bitcoin),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            PaymentIntent::new("tb1-nope", 200_000, Network::Signet),
            Err(VaultError::InvalidInput(_))
        ));
    }
}
