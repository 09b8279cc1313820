use async_trait::async_trait;
use bitcoin::{Address, Amount, ScriptBuf, TxOut, Txid};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;

use super::types::{FeeRecommendation, TxResponse, TxStatus, UtxoResponse};
use super::Indexer;
use crate::bitcoin::{FeeRateEstimate, UnspentOutput};
use crate::error::VaultError;

/// Esplora / mempool.space HTTP client.
///
/// Every request is bounded by the configured timeout; a timeout surfaces as
/// [`VaultError::Network`].
#[derive(Clone, Debug)]
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, failing with [`VaultError::Network`] on any non-2xx status
    async fn get(&self, path: &str) -> Result<reqwest::Response, VaultError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::Network(format!(
                "GET {} failed: {} {}",
                url,
                status,
                body.trim()
            )));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, VaultError> {
        self.get(path)
            .await?
            .json()
            .await
            .map_err(|e| VaultError::Network(format!("Invalid response from {}: {}", path, e)))
    }
}

#[async_trait]
impl Indexer for EsploraClient {
    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<UnspentOutput>, VaultError> {
        let utxos: Vec<UtxoResponse> = self
            .get_json(&format!("/address/{}/utxo", address))
            .await?;

        utxos
            .into_iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.txid).map_err(|e| {
                    VaultError::Network(format!("Invalid txid '{}' from indexer: {}", utxo.txid, e))
                })?;
                Ok(UnspentOutput {
                    txid,
                    vout: utxo.vout,
                    value: utxo.value,
                    confirmed: utxo.status.confirmed,
                })
            })
            .collect()
    }

    async fn fetch_fee_rate(&self) -> Result<FeeRateEstimate, VaultError> {
        let fees: FeeRecommendation = self.get_json("/v1/fees/recommended").await?;
        Ok(FeeRateEstimate::new(fees.fastest_fee.unwrap_or(0.0)))
    }

    async fn fetch_tx_output(&self, txid: &Txid, vout: u32) -> Result<TxOut, VaultError> {
        let tx: TxResponse = self.get_json(&format!("/tx/{}", txid)).await?;

        let output = tx.vout.get(vout as usize).ok_or_else(|| {
            VaultError::Network(format!("Transaction {} has no output {}", txid, vout))
        })?;

        let script_pubkey = ScriptBuf::from_hex(&output.scriptpubkey).map_err(|e| {
            VaultError::Network(format!("Invalid scriptpubkey for {}:{}: {}", txid, vout, e))
        })?;

        Ok(TxOut {
            value: Amount::from_sat(output.value),
            script_pubkey,
        })
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, VaultError> {
        let url = format!("{}/tx", self.base_url);
        log::debug!("Broadcasting transaction to: {}", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(VaultError::Broadcast {
                status: status.as_u16(),
                body,
            });
        }

        Txid::from_str(body.trim()).map_err(|e| {
            VaultError::Network(format!("Indexer returned an invalid txid '{}': {}", body, e))
        })
    }

    async fn fetch_tx_status(&self, txid: &Txid) -> Result<Option<u64>, VaultError> {
        let status: TxStatus = self.get_json(&format!("/tx/{}/status", txid)).await?;

        match (status.confirmed, status.block_height) {
            (true, Some(height)) => Ok(Some(height)),
            (true, None) => Err(VaultError::Network(format!(
                "Indexer reports {} confirmed without a block height",
                txid
            ))),
            (false, _) => Ok(None),
        }
    }

    async fn fetch_tip_height(&self) -> Result<u64, VaultError> {
        let body = self.get("/blocks/tip/height").await?.text().await?;
        body.trim().parse().map_err(|_| {
            VaultError::Network(format!("Indexer returned an invalid tip height '{}'", body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            EsploraClient::new("https://mempool.space/signet/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://mempool.space/signet/api");
    }

    #[tokio::test]
    async fn test_unreachable_indexer_is_network_error() {
        // Port 9 (discard) on localhost is closed on any sane test host
        let client = EsploraClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.fetch_fee_rate().await.unwrap_err();
        assert!(matches!(err, VaultError::Network(_)));
    }

    #[tokio::test]
    async fn test_silent_indexer_times_out_as_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept and hold the connection without ever answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let client = EsploraClient::new(format!("http://{}", addr), Duration::from_secs(1)).unwrap();
        let address = bitcoin::Address::from_str("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx")
            .unwrap()
            .assume_checked();

        match client.fetch_utxos(&address).await {
            Err(VaultError::Network(msg)) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("Expected a timeout, got {:?}", other),
        }

        server.abort();
    }
}
