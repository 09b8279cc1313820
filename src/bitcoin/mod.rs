//! Bitcoin payment construction
//!
//! - Fee estimation
//! - Coin selection
//! - P2WPKH signing
//! - PSBT assembly and finalization

pub mod fee;
pub mod network;
pub mod selection;
pub mod signer;
pub mod transaction;
pub mod utxo;

// Re-export main types
pub use fee::{estimate_fee, FeeRateEstimate, DUST_THRESHOLD_SATS};
pub use network::{explorer_tx_url, parse_network};
pub use selection::{select_coins, ChangePlan, SelectionResult};
pub use signer::P2wpkhSigner;
pub use transaction::{
    build_payment, BuiltTransaction, PaymentIntent, SignedTransaction, TransactionBuilder,
};
pub use utxo::UnspentOutput;
