//! Vault payment flow: fetch → select → build → sign → broadcast,
//! plus confirmation tracking of deposits

use bitcoin::Txid;
use futures::future::try_join_all;
use serde::Serialize;

use crate::bitcoin::network::explorer_tx_url;
use crate::bitcoin::utxo::total_value;
use crate::bitcoin::{
    build_payment, select_coins, BuiltTransaction, FeeRateEstimate, P2wpkhSigner, PaymentIntent,
    UnspentOutput,
};
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::indexer::{fetch_spendable_utxos, EsploraClient, Indexer};

/// Outcome of a successful broadcast
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub txid: Txid,
    pub destination: String,
    pub amount_sats: u64,
    pub fee_sats: u64,
    pub change_sats: Option<u64>,
    pub input_count: usize,
    pub explorer_url: String,
}

/// Spendable balance of the sender and whether a payment would fit
#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub address: String,
    pub utxos: Vec<UnspentOutput>,
    pub total_sats: u64,
    pub confirmed_sats: u64,
    pub fee_rate: FeeRateEstimate,
    pub amount_sats: u64,
    /// Fee of the selection that would pay `amount_sats`, if affordable
    pub estimated_fee_sats: Option<u64>,
    /// Missing sats (amount + fee - available), if not affordable
    pub shortfall_sats: Option<u64>,
}

impl BalanceReport {
    pub fn is_sufficient(&self) -> bool {
        self.shortfall_sats.is_none()
    }
}

/// Where a transaction stands on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositStatus {
    pub txid: Txid,
    /// Confirming block, `None` while in the mempool
    pub block_height: Option<u64>,
    pub tip_height: u64,
    /// `tip - block_height + 1` once confirmed, else 0
    pub confirmations: u64,
}

impl DepositStatus {
    pub fn new(txid: Txid, block_height: Option<u64>, tip_height: u64) -> Self {
        let confirmations = block_height
            .map(|height| tip_height.saturating_sub(height) + 1)
            .unwrap_or(0);
        Self {
            txid,
            block_height,
            tip_height,
            confirmations,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }
}

/// Sends from the configured P2WPKH wallet through an [`Indexer`]
pub struct VaultSender<I> {
    config: VaultConfig,
    indexer: I,
}

impl VaultSender<EsploraClient> {
    /// Sender talking to the Esplora API named in `config`
    pub fn from_config(config: VaultConfig) -> Result<Self, VaultError> {
        let indexer = EsploraClient::new(config.esplora_url.clone(), config.request_timeout)?;
        Ok(Self::new(config, indexer))
    }
}

impl<I: Indexer> VaultSender<I> {
    pub fn new(config: VaultConfig, indexer: I) -> Self {
        Self { config, indexer }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    /// Deposit into the configured vault; `None` uses the configured default amount
    pub fn vault_intent(&self, amount_sats: Option<u64>) -> Result<PaymentIntent, VaultError> {
        PaymentIntent::to_address(
            self.config.vault_address.clone(),
            amount_sats.unwrap_or(self.config.default_amount_sats),
        )
    }

    /// Withdrawal to an arbitrary recipient on the configured network
    pub fn withdrawal_intent(
        &self,
        recipient: &str,
        amount_sats: u64,
    ) -> Result<PaymentIntent, VaultError> {
        PaymentIntent::new(recipient, amount_sats, self.config.network)
    }

    fn signer(&self) -> Result<P2wpkhSigner, VaultError> {
        let signer = P2wpkhSigner::from_wif(&self.config.sender_private_key, self.config.network)?;
        signer.ensure_controls(&self.config.sender_address)?;
        Ok(signer)
    }

    async fn fee_rate(&self) -> Result<FeeRateEstimate, VaultError> {
        match self.config.fee_rate_override {
            Some(rate) => Ok(rate),
            None => {
                log::info!("Fetching recommended fee rate...");
                self.indexer.fetch_fee_rate().await
            }
        }
    }

    /// Build, sign and finalize a payment without broadcasting it
    pub async fn prepare(&self, intent: &PaymentIntent) -> Result<BuiltTransaction, VaultError> {
        // Key check happens before any network traffic
        let signer = self.signer()?;
        let sender = &self.config.sender_address;

        log::info!("Sender: {}", sender);
        log::info!("Destination: {}", intent.destination());
        log::info!("Amount: {} sats", intent.amount_sats());

        log::info!("Fetching UTXOs...");
        let utxos =
            fetch_spendable_utxos(&self.indexer, sender, self.config.spend_unconfirmed).await?;

        let fee_rate = self.fee_rate().await?;
        log::info!("Using fee rate: {} sats/vB", fee_rate.sat_per_vbyte);

        let selection = select_coins(&utxos, intent.amount_sats(), fee_rate)?;
        log::info!(
            "Selected {} UTXO(s) totaling {} sats. Estimated fee: {} sats.",
            selection.utxos.len(),
            selection.total_input,
            selection.estimated_fee
        );

        let prevouts = try_join_all(
            selection
                .utxos
                .iter()
                .map(|utxo| self.indexer.fetch_tx_output(&utxo.txid, utxo.vout)),
        )
        .await?;

        let built = build_payment(&selection, &prevouts, intent, sender, &signer)?;
        log::info!(
            "Transaction {} signed ({} vB, fee {} sats)",
            built.txid,
            built.vsize(),
            built.fee_sats
        );

        Ok(built)
    }

    /// Build the payment and submit it to the indexer
    pub async fn send(&self, intent: &PaymentIntent) -> Result<SendReceipt, VaultError> {
        let built = self.prepare(intent).await?;

        log::info!("Broadcasting transaction...");
        let txid = self.indexer.broadcast(&built.raw_hex).await?;

        if txid != built.txid {
            log::warn!(
                "Indexer reported txid {} but the signed transaction hashes to {}",
                txid,
                built.txid
            );
        }
        log::info!("Transaction broadcast - txid: {}", txid);

        Ok(SendReceipt {
            txid,
            destination: intent.destination().to_string(),
            amount_sats: built.amount_sats,
            fee_sats: built.fee_sats,
            change_sats: built.change_sats,
            input_count: built.inputs.len(),
            explorer_url: explorer_tx_url(&self.config.explorer_url, &txid.to_string()),
        })
    }

    /// Confirmation count of `txid`
    pub async fn deposit_status(&self, txid: &Txid) -> Result<DepositStatus, VaultError> {
        let block_height = self.indexer.fetch_tx_status(txid).await?;
        let tip_height = self.indexer.fetch_tip_height().await?;

        let status = DepositStatus::new(*txid, block_height, tip_height);
        log::info!(
            "Transaction {} has {} confirmation(s) at tip {}",
            txid,
            status.confirmations,
            tip_height
        );
        Ok(status)
    }

    /// Look for a confirmed output of exactly `amount_sats` on the vault
    /// address and report its confirmations.
    pub async fn detect_deposit(
        &self,
        amount_sats: u64,
    ) -> Result<Option<DepositStatus>, VaultError> {
        let vault = &self.config.vault_address;
        log::info!("Scanning {} for a {} sat deposit...", vault, amount_sats);

        let found = self
            .indexer
            .fetch_utxos(vault)
            .await?
            .into_iter()
            .find(|utxo| utxo.confirmed && utxo.value == amount_sats);

        match found {
            Some(utxo) => self.deposit_status(&utxo.txid).await.map(Some),
            None => {
                log::info!("No confirmed {} sat deposit found", amount_sats);
                Ok(None)
            }
        }
    }

    /// Report the sender's UTXOs and whether `amount_sats` plus fees is affordable
    pub async fn balance(&self, amount_sats: u64) -> Result<BalanceReport, VaultError> {
        let address = &self.config.sender_address;
        let utxos: Vec<_> = self
            .indexer
            .fetch_utxos(address)
            .await?
            .into_iter()
            .filter(|utxo| self.config.spend_unconfirmed || utxo.confirmed)
            .collect();

        let fee_rate = self.fee_rate().await?;

        let confirmed_sats = utxos
            .iter()
            .filter(|utxo| utxo.confirmed)
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.value));

        let (estimated_fee_sats, shortfall_sats) = match select_coins(&utxos, amount_sats, fee_rate)
        {
            Ok(selection) => (Some(selection.estimated_fee), None),
            Err(VaultError::InsufficientFunds { shortfall, .. }) => (None, Some(shortfall)),
            Err(e) => return Err(e),
        };

        Ok(BalanceReport {
            address: address.to_string(),
            total_sats: total_value(&utxos),
            confirmed_sats,
            utxos,
            fee_rate,
            amount_sats,
            estimated_fee_sats,
            shortfall_sats,
        })
    }
}
