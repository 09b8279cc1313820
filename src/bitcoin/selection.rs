//! Greedy largest-first coin selection
//!
//! UTXOs are taken in descending value order until their sum covers the
//! payment plus a fee estimate for the inputs taken so far. The estimate
//! always assumes two outputs (payment + change) while selecting; whether
//! change is actually produced is settled afterwards by [`ChangePlan`].

use super::fee::{estimate_fee, FeeRateEstimate, DUST_THRESHOLD_SATS};
use super::utxo::{total_value, UnspentOutput};
use crate::error::VaultError;

/// Output count assumed during selection, before change is decided
const SELECTION_OUTPUTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    /// Chosen UTXOs in the order they were picked (largest first)
    pub utxos: Vec<UnspentOutput>,
    pub total_input: u64,
    /// Fee estimate for `utxos.len()` inputs and two outputs
    pub estimated_fee: u64,
    pub fee_rate: FeeRateEstimate,
}

/// How the leftover value of a selection is distributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePlan {
    /// Change returned to the sender, `None` when it would be dust
    pub change: Option<u64>,
    /// Fee actually paid, including any absorbed dust
    pub fee: u64,
}

impl ChangePlan {
    pub fn output_count(&self) -> usize {
        if self.change.is_some() {
            2
        } else {
            1
        }
    }
}

impl SelectionResult {
    /// Split `total_input - payment` into change and fee.
    ///
    /// Change is produced only when it exceeds the dust threshold; otherwise
    /// the whole remainder is left to the miner.
    pub fn change_plan(&self, payment: u64) -> ChangePlan {
        let remainder = self.total_input.saturating_sub(payment);
        let change = remainder.saturating_sub(self.estimated_fee);

        if change > DUST_THRESHOLD_SATS {
            ChangePlan {
                change: Some(change),
                fee: self.estimated_fee,
            }
        } else {
            ChangePlan {
                change: None,
                fee: remainder,
            }
        }
    }
}

/// Select UTXOs covering `payment` plus fees at `fee_rate`.
///
/// Deterministic: the sort is stable, so equal values keep fetch order.
pub fn select_coins(
    utxos: &[UnspentOutput],
    payment: u64,
    fee_rate: FeeRateEstimate,
) -> Result<SelectionResult, VaultError> {
    let mut sorted = utxos.to_vec();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total_input = 0u64;
    let mut estimated_fee = 0u64;

    for utxo in sorted {
        total_input = total_input.saturating_add(utxo.value);
        selected.push(utxo);
        estimated_fee = estimate_fee(selected.len(), SELECTION_OUTPUTS, fee_rate);

        if total_input >= payment.saturating_add(estimated_fee) {
            log::debug!(
                "Selected {} UTXO(s) totaling {} sats, estimated fee {} sats",
                selected.len(),
                total_input,
                estimated_fee
            );
            return Ok(SelectionResult {
                utxos: selected,
                total_input,
                estimated_fee,
                fee_rate,
            });
        }
    }

    let available = total_value(utxos);
    let required = payment.saturating_add(estimated_fee);
    Err(VaultError::InsufficientFunds {
        available,
        required,
        shortfall: required.saturating_sub(available),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    fn utxo(tag: u8, value: u64) -> UnspentOutput {
        UnspentOutput {
            txid: Txid::from_byte_array([tag; 32]),
            vout: tag as u32,
            value,
            confirmed: true,
        }
    }

    #[test]
    fn test_picks_both_utxos_for_vault_scenario() {
        let utxos = vec![utxo(1, 150_000), utxo(2, 80_000)];
        let result = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap();

        assert_eq!(result.utxos.len(), 2);
        assert_eq!(result.total_input, 230_000);
        assert_eq!(result.estimated_fee, 1040);

        let plan = result.change_plan(200_000);
        assert_eq!(plan.change, Some(28_960));
        assert_eq!(plan.fee, 1040);
        assert_eq!(plan.output_count(), 2);
    }

    #[test]
    fn test_largest_first_stops_early() {
        let utxos = vec![utxo(1, 10_000), utxo(2, 500_000), utxo(3, 40_000)];
        let result = select_coins(&utxos, 100_000, FeeRateEstimate::new(2.0)).unwrap();

        assert_eq!(result.utxos.len(), 1);
        assert_eq!(result.utxos[0].value, 500_000);
    }

    #[test]
    fn test_ties_keep_fetch_order() {
        let utxos = vec![utxo(7, 50_000), utxo(3, 50_000), utxo(9, 50_000)];
        let first = select_coins(&utxos, 60_000, FeeRateEstimate::new(1.0)).unwrap();
        let second = select_coins(&utxos, 60_000, FeeRateEstimate::new(1.0)).unwrap();

        let tags: Vec<u32> = first.utxos.iter().map(|u| u.vout).collect();
        assert_eq!(tags, vec![7, 3]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_insufficient_reports_shortfall_with_fee() {
        let utxos = vec![utxo(1, 100_000)];
        let err = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap_err();

        match err {
            VaultError::InsufficientFunds {
                available,
                required,
                shortfall,
            } => {
                // (68 + 2*31 + 10) * 5 = 700
                assert_eq!(available, 100_000);
                assert_eq!(required, 200_700);
                assert_eq!(shortfall, 100_700);
                assert!(shortfall >= 200_000 - available);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_covers_payment_but_not_fee() {
        let utxos = vec![utxo(1, 100_100)];
        let err = select_coins(&utxos, 100_000, FeeRateEstimate::new(1.0)).unwrap_err();

        match err {
            VaultError::InsufficientFunds { shortfall, .. } => assert_eq!(shortfall, 40),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_set_is_insufficient() {
        let err = select_coins(&[], 1_000, FeeRateEstimate::new(1.0)).unwrap_err();
        assert!(matches!(
            err,
            VaultError::InsufficientFunds { available: 0, .. }
        ));
    }

    #[test]
    fn test_selected_prefix_is_minimal() {
        let values = [
            12_000u64, 3_500, 250_000, 98_000, 98_000, 1_200, 45_000, 7_777, 61_000, 150_000,
        ];
        let utxos: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| utxo(i as u8, *v))
            .collect();

        for rate in [1.0, 3.0, 11.0, 40.0] {
            let rate = FeeRateEstimate::new(rate);
            for payment in [1_000u64, 50_000, 120_000, 260_000, 400_000, 600_000] {
                let Ok(result) = select_coins(&utxos, payment, rate) else {
                    continue;
                };
                let n = result.utxos.len();
                assert!(result.total_input >= payment + estimate_fee(n, 2, rate));

                let without_last = result.total_input - result.utxos[n - 1].value;
                if n > 1 {
                    assert!(without_last < payment + estimate_fee(n - 1, 2, rate));
                }
            }
        }
    }

    #[test]
    fn test_dust_change_is_absorbed_into_fee() {
        // 200_000 + 1040 fee leaves exactly 500 sats, below dust
        let utxos = vec![utxo(1, 150_000), utxo(2, 51_540)];
        let result = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap();
        let plan = result.change_plan(200_000);

        assert_eq!(plan.change, None);
        assert_eq!(plan.fee, 1_540);
        assert_eq!(plan.output_count(), 1);
    }

    #[test]
    fn test_change_at_threshold_is_dust() {
        let utxos = vec![utxo(1, 200_000 + 1040 + DUST_THRESHOLD_SATS)];
        // one input: (68 + 62 + 10) * 5 = 700
        let result = select_coins(&utxos, 200_000, FeeRateEstimate::new(5.0)).unwrap();
        assert_eq!(result.estimated_fee, 700);

        let plan = result.change_plan(200_000);
        assert_eq!(plan.change, Some(1040 + DUST_THRESHOLD_SATS - 700));

        let exact = vec![utxo(2, 200_000 + 700 + DUST_THRESHOLD_SATS)];
        let plan = select_coins(&exact, 200_000, FeeRateEstimate::new(5.0))
            .unwrap()
            .change_plan(200_000);
        assert_eq!(plan.change, None);
        assert_eq!(plan.fee, 700 + DUST_THRESHOLD_SATS);
    }
}
