//! Collateral for script-executing transactions

use crate::error::BuilderError;
use crate::selection::sorted_candidates;
use keystone_codec::min_lovelace;
use keystone_common::rational_number::{RationalNumber, ceil_to_u64, scale};
use keystone_common::{Address, Credential, Lovelace, TxOutput, UTxOIdentifier, Utxo, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Collateral input plus the return output and declared total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralChoice {
    pub input: Utxo,
    pub collateral_return: Option<TxOutput>,
    pub total_collateral: Lovelace,
}

/// `ceil(fee * percent / 100)`
pub fn collateral_for_fee(fee: Lovelace, collateral_percent: u32) -> Result<Lovelace, BuilderError> {
    let share = RationalNumber::new(collateral_percent as u64, 100);
    ceil_to_u64(&scale(fee, &share)).map_err(|_| BuilderError::ArithmeticOverflow {
        what: "Collateral for the maximum fee",
    })
}

/// Pick one key-locked, ADA-only UTxO worth at least `target`.
///
/// Unused pool entries are tried first, then `fallback` (typically the
/// ADA-only inputs already selected for spending). A candidate whose excess
/// is positive but too small to fund its own return output is skipped
/// rather than producing a return output the ledger would reject.
pub fn select_collateral(
    pool: &[Utxo],
    used: &BTreeSet<UTxOIdentifier>,
    fallback: &[Utxo],
    target: Lovelace,
    return_address: Address,
    coins_per_utxo_byte: Lovelace,
) -> Result<CollateralChoice, BuilderError> {
    let unused = sorted_candidates(pool, used);
    let mut candidates: Vec<&Utxo> = unused.into_iter().rev().collect();
    candidates.extend(fallback.iter());

    let eligible = |utxo: &&Utxo| {
        utxo.is_ada_only()
            && matches!(utxo.address().payment_credential(), Some(Credential::AddrKeyHash(_)))
    };
    for utxo in candidates.into_iter().filter(eligible) {
        let coin = utxo.output.coin();
        if coin < target {
            continue;
        }
        let excess = coin - target;
        if excess == 0 {
            debug!(collateral = %utxo.input, target, "Selected exact collateral");
            return Ok(CollateralChoice {
                input: utxo.clone(),
                collateral_return: None,
                total_collateral: target,
            });
        }
        let collateral_return = TxOutput::new(return_address, Value::new(excess));
        if excess < min_lovelace(&collateral_return, coins_per_utxo_byte)? {
            continue;
        }
        debug!(collateral = %utxo.input, target, excess, "Selected collateral");
        return Ok(CollateralChoice {
            input: utxo.clone(),
            collateral_return: Some(collateral_return),
            total_collateral: target,
        });
    }
    Err(BuilderError::NoCollateral { target })
}
