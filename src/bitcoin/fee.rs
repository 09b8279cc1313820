//! Fee estimation for single-key P2WPKH spends
//!
//! Sizes are virtual bytes: a P2WPKH input weighs in at ~68 vB, an output
//! at ~31 vB, plus ~10 vB of version/locktime/count overhead.

use serde::{Deserialize, Serialize};

pub const INPUT_VBYTES: u64 = 68;
pub const OUTPUT_VBYTES: u64 = 31;
pub const OVERHEAD_VBYTES: u64 = 10;

/// Outputs below this value are not worth creating and are folded into the fee
pub const DUST_THRESHOLD_SATS: u64 = 546;

/// Fee rate used when the indexer offers nothing usable
pub const FALLBACK_FEE_RATE: f64 = 1.0;

/// Recommended fee rate in sats per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeRateEstimate {
    pub sat_per_vbyte: f64,
}

impl FeeRateEstimate {
    /// Wrap an indexer-provided rate, falling back to 1 sat/vB when the
    /// value is zero, negative or not a number.
    pub fn new(sat_per_vbyte: f64) -> Self {
        if sat_per_vbyte.is_finite() && sat_per_vbyte > 0.0 {
            Self { sat_per_vbyte }
        } else {
            log::warn!(
                "Unusable fee rate {} sat/vB, falling back to {} sat/vB",
                sat_per_vbyte,
                FALLBACK_FEE_RATE
            );
            Self {
                sat_per_vbyte: FALLBACK_FEE_RATE,
            }
        }
    }
}

impl Default for FeeRateEstimate {
    fn default() -> Self {
        Self {
            sat_per_vbyte: FALLBACK_FEE_RATE,
        }
    }
}

/// Estimated virtual size of a transaction with the given shape
pub fn estimate_vsize(num_inputs: usize, num_outputs: usize) -> u64 {
    OVERHEAD_VBYTES + num_inputs as u64 * INPUT_VBYTES + num_outputs as u64 * OUTPUT_VBYTES
}

/// Fee in sats, rounded up to the next whole satoshi
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, fee_rate: FeeRateEstimate) -> u64 {
    let vsize = estimate_vsize(num_inputs, num_outputs);
    (vsize as f64 * fee_rate.sat_per_vbyte).ceil() as u64
}
