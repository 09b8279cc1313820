use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    Address, Amount, CompressedPublicKey, Network, NetworkKind, PrivateKey, PublicKey, ScriptBuf,
    Transaction,
};
use std::borrow::Borrow;
use std::fmt;

use crate::error::VaultError;

/// Single-key signer for P2WPKH (SegWit v0) inputs.
///
/// Holds a WIF-imported private key together with the address it controls.
/// Construction fails for uncompressed keys and for keys encoded for a
/// different network kind, since neither can spend the configured address.
pub struct P2wpkhSigner {
    secp: Secp256k1<All>,
    private_key: PrivateKey,
    public_key: CompressedPublicKey,
    address: Address,
}

impl P2wpkhSigner {
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, VaultError> {
        let private_key = PrivateKey::from_wif(wif.trim())
            .map_err(|e| VaultError::Signing(format!("Invalid WIF private key: {}", e)))?;

        if private_key.network != NetworkKind::from(network) {
            return Err(VaultError::Signing(format!(
                "Private key is encoded for {:?} but the configured network is {}",
                private_key.network, network
            )));
        }

        let secp = Secp256k1::new();
        let public_key = CompressedPublicKey::from_private_key(&secp, &private_key).map_err(|_| {
            VaultError::Signing("Uncompressed private keys cannot sign P2WPKH inputs".to_string())
        })?;
        let address = Address::p2wpkh(&public_key, network);

        Ok(Self {
            secp,
            private_key,
            public_key,
            address,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.public_key)
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    /// Fail unless this key controls `expected`
    pub fn ensure_controls(&self, expected: &Address) -> Result<(), VaultError> {
        if &self.address != expected {
            return Err(VaultError::Signing(format!(
                "Derived address {} does not match SENDER_ADDRESS {}. Check your SENDER_PRIVATE_KEY is correct for a P2WPKH address.",
                self.address, expected
            )));
        }
        Ok(())
    }

    /// SIGHASH_ALL signature over the BIP143 digest of one input
    pub fn sign_input<T: Borrow<Transaction>>(
        &self,
        cache: &mut SighashCache<T>,
        input_index: usize,
        value: Amount,
    ) -> Result<ecdsa::Signature, VaultError> {
        let sighash = cache
            .p2wpkh_signature_hash(
                input_index,
                &self.script_pubkey(),
                value,
                EcdsaSighashType::All,
            )
            .map_err(|e| VaultError::Bitcoin(e.to_string()))?;

        let message = Message::from_digest(sighash.to_byte_array());
        let signature = self.secp.sign_ecdsa(&message, &self.private_key.inner);

        Ok(ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        })
    }
}

impl fmt::Debug for P2wpkhSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P2wpkhSigner")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
