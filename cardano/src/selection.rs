//! Greedy coin selection over the available UTxO pool.
//!
//! Native assets are covered first, since any UTxO holding them also brings
//! lovelace. The remaining lovelace is then taken from ADA-only UTxOs,
//! largest first, before falling back to asset-bearing ones.

use crate::error::BuilderError;
use dashu_int::IBig;
use keystone_common::{Lovelace, UTxOIdentifier, Utxo, Value};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// Pool order used by every selection step: ADA-only first, each group by
/// descending lovelace, ties by reference
pub fn sorted_candidates<'a>(
    pool: &'a [Utxo],
    used: &BTreeSet<UTxOIdentifier>,
) -> Vec<&'a Utxo> {
    let mut candidates: Vec<&Utxo> =
        pool.iter().filter(|utxo| !used.contains(&utxo.input)).collect();
    candidates.sort_by_key(|utxo| (!utxo.is_ada_only(), Reverse(utxo.output.coin()), utxo.input));
    candidates.dedup_by_key(|utxo| utxo.input);
    candidates
}

/// Pick additional UTxOs so that `committed` plus the picks covers `required`.
///
/// `used` holds references already consumed (explicit inputs, earlier
/// picks); they are never picked again. On success the picks are returned
/// in selection order.
pub fn select_coins(
    pool: &[Utxo],
    used: &BTreeSet<UTxOIdentifier>,
    required: &Value,
    committed: &Value,
) -> Result<Vec<Utxo>, BuilderError> {
    let mut remaining = required.saturating_sub(committed);
    let mut candidates = sorted_candidates(pool, used);
    let mut selected = Vec::new();

    let shortfalls: Vec<_> = remaining
        .positive_assets()
        .map(|(policy, name, quantity)| (*policy, *name, quantity.clone()))
        .collect();
    for (policy, name, _) in shortfalls {
        let missing = remaining.quantity(&policy, &name);
        if missing <= IBig::ZERO {
            continue;
        }

        // One UTxO covering the whole shortfall keeps the input count down
        let single = candidates
            .iter()
            .position(|utxo| utxo.value().quantity(&policy, &name) >= missing);
        let picks = match single {
            Some(index) => vec![index],
            None => {
                let mut picks = Vec::new();
                let mut gathered = IBig::ZERO;
                for (index, utxo) in candidates.iter().enumerate() {
                    let held = utxo.value().quantity(&policy, &name);
                    if held > IBig::ZERO {
                        gathered += held;
                        picks.push(index);
                        if gathered >= missing {
                            break;
                        }
                    }
                }
                if gathered < missing {
                    return Err(BuilderError::MissingAsset {
                        policy,
                        name,
                        missing: missing - gathered,
                    });
                }
                picks
            }
        };

        for index in picks.into_iter().rev() {
            let utxo = candidates.remove(index);
            remaining = remaining.saturating_sub(utxo.value());
            selected.push(utxo.clone());
        }
    }

    if remaining.coin > 0 {
        let mut picks = Vec::new();
        for (index, utxo) in candidates.iter().enumerate() {
            if remaining.coin == 0 {
                break;
            }
            remaining.coin = remaining.coin.saturating_sub(utxo.output.coin());
            picks.push(index);
        }
        if remaining.coin > 0 {
            let available = committed
                .coin
                .saturating_add(selected.iter().map(|u: &Utxo| u.output.coin()).sum::<Lovelace>())
                .saturating_add(candidates.iter().map(|u| u.output.coin()).sum::<Lovelace>());
            return Err(BuilderError::InsufficientFunds {
                required: required.coin,
                available,
            });
        }
        for index in picks {
            selected.push(candidates[index].clone());
        }
    }

    debug!(
        picked = selected.len(),
        required = required.coin,
        "Selected UTxOs"
    );
    Ok(selected)
}
