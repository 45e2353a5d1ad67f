//! Script integrity hash: redeemers, datums and language views

use crate::{
    error::EncodeError,
    utils::encode_to_vec,
    witness::{Redeemers, encode_datums, encode_redeemers},
};
use keystone_common::{
    CostModels, PlutusData, PlutusVersion, ScriptDataHash, crypto::keyhash_256,
};
use minicbor::data::Int;
use std::collections::BTreeSet;
use tracing::debug;

/// One `(key, value)` pair of the language view map, already encoded.
///
/// V1 keeps the historical quirks: the key is the language id serialised
/// and wrapped in a byte string, and the value is an indefinite-length list
/// serialised and wrapped in a byte string. Later versions use a plain
/// integer key and a definite list.
fn language_view(version: PlutusVersion, model: &[i64]) -> Result<(Vec<u8>, Vec<u8>), EncodeError> {
    let id = version.language_id();
    match version {
        PlutusVersion::V1 => {
            let inner_key = encode_to_vec(|e| e.u8(id).map(|_| ()))?;
            let inner_value = encode_to_vec(|e| {
                e.begin_array()?;
                for cost in model {
                    e.int(Int::from(*cost))?;
                }
                e.end()?;
                Ok(())
            })?;
            let key = encode_to_vec(|e| e.bytes(&inner_key).map(|_| ()))?;
            let value = encode_to_vec(|e| e.bytes(&inner_value).map(|_| ()))?;
            Ok((key, value))
        }
        PlutusVersion::V2 | PlutusVersion::V3 => {
            let key = encode_to_vec(|e| e.u8(id).map(|_| ()))?;
            let value = encode_to_vec(|e| {
                e.array(model.len() as u64)?;
                for cost in model {
                    e.int(Int::from(*cost))?;
                }
                Ok(())
            })?;
            Ok((key, value))
        }
    }
}

/// Encoded language views of exactly the given versions, in canonical key
/// order (shorter encoded keys first, then bytewise)
pub fn encode_language_views(
    versions: &BTreeSet<PlutusVersion>,
    cost_models: &CostModels,
) -> Result<Vec<u8>, EncodeError> {
    let mut entries = versions
        .iter()
        .map(|version| {
            let model = cost_models
                .get(version)
                .ok_or(EncodeError::MissingCostModel(*version))?;
            language_view(*version, model)
        })
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut bytes = encode_to_vec(|e| e.map(entries.len() as u64).map(|_| ()))?;
    for (key, value) in entries {
        bytes.extend_from_slice(&key);
        bytes.extend_from_slice(&value);
    }
    Ok(bytes)
}

/// The bytes hashed into the script data hash, in ledger order:
/// redeemers, then datums (omitted when there are none), then language views
pub fn script_integrity_bytes(
    redeemers: &Redeemers,
    datums: &[PlutusData],
    versions: &BTreeSet<PlutusVersion>,
    cost_models: &CostModels,
) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = encode_to_vec(|e| encode_redeemers(e, redeemers))?;
    if !datums.is_empty() {
        bytes.extend(encode_to_vec(|e| encode_datums(e, datums))?);
    }
    bytes.extend(encode_language_views(versions, cost_models)?);
    Ok(bytes)
}

/// Script data hash, or `None` when the transaction carries neither
/// redeemers nor datums
pub fn script_data_hash(
    redeemers: &Redeemers,
    datums: &[PlutusData],
    versions: &BTreeSet<PlutusVersion>,
    cost_models: &CostModels,
) -> Result<Option<ScriptDataHash>, EncodeError> {
    if redeemers.is_empty() && datums.is_empty() {
        return Ok(None);
    }
    let bytes = script_integrity_bytes(redeemers, datums, versions, cost_models)?;
    let hash = keyhash_256(&bytes);
    debug!(
        redeemers = redeemers.len(),
        datums = datums.len(),
        languages = versions.len(),
        "Computed script data hash {hash}"
    );
    Ok(Some(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_common::{ExUnits, RedeemerPointer, RedeemerTag, RedeemerValue};

    fn cost_models() -> CostModels {
        let mut models = CostModels::new();
        models.insert(PlutusVersion::V1, vec![1, 2]);
        models.insert(PlutusVersion::V2, vec![3, -4]);
        models.insert(PlutusVersion::V3, vec![5]);
        models
    }

    fn one_redeemer() -> Redeemers {
        let mut redeemers = Redeemers::new();
        redeemers.insert(
            RedeemerPointer::new(RedeemerTag::Spend, 0),
            RedeemerValue {
                data: PlutusData::unit(),
                ex_units: ExUnits::new(1000, 2000),
            },
        );
        redeemers
    }

    fn versions(list: &[PlutusVersion]) -> BTreeSet<PlutusVersion> {
        list.iter().copied().collect()
    }

    #[test]
    fn v1_view_is_double_wrapped_and_indefinite() {
        let bytes = encode_language_views(&versions(&[PlutusVersion::V1]), &cost_models()).unwrap();
        // {h'00': h'9f0102ff'}
        assert_eq!(hex::encode(bytes), "a14100449f0102ff");
    }

    #[test]
    fn later_views_use_integer_keys_and_sort_before_v1() {
        let bytes = encode_language_views(
            &versions(&[PlutusVersion::V1, PlutusVersion::V2, PlutusVersion::V3]),
            &cost_models(),
        )
        .unwrap();
        assert_eq!(hex::encode(bytes), "a3018203230281054100449f0102ff");
    }

    #[test]
    fn no_redeemers_and_no_datums_means_no_hash() {
        let hash = script_data_hash(&Redeemers::new(), &[], &BTreeSet::new(), &cost_models());
        assert_eq!(hash, Ok(None));
    }

    #[test]
    fn datums_only_uses_empty_redeemer_map() {
        let datums = vec![PlutusData::Integer(42)];
        let bytes =
            script_integrity_bytes(&Redeemers::new(), &datums, &BTreeSet::new(), &cost_models())
                .unwrap();
        assert_eq!(hex::encode(bytes), "a081182aa0");
    }

    #[test]
    fn hash_is_deterministic() {
        let used = versions(&[PlutusVersion::V2]);
        let a = script_data_hash(&one_redeemer(), &[], &used, &cost_models()).unwrap();
        let b = script_data_hash(&one_redeemer(), &[], &used, &cost_models()).unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn concatenation_order_matters() {
        let datums = vec![PlutusData::Integer(7)];
        let used = versions(&[PlutusVersion::V2]);
        let hash = script_data_hash(&one_redeemer(), &datums, &used, &cost_models())
            .unwrap()
            .unwrap();

        let mut swapped = encode_to_vec(|e| encode_datums(e, &datums)).unwrap();
        swapped.extend(encode_to_vec(|e| encode_redeemers(e, &one_redeemer())).unwrap());
        swapped.extend(encode_language_views(&used, &cost_models()).unwrap());
        assert_ne!(hash, keyhash_256(&swapped));
    }

    #[test]
    fn only_used_versions_count() {
        let used = versions(&[PlutusVersion::V2]);
        let hash = script_data_hash(&one_redeemer(), &[], &used, &cost_models()).unwrap();

        let mut fewer_models = cost_models();
        fewer_models.remove(&PlutusVersion::V1);
        fewer_models.remove(&PlutusVersion::V3);
        let without_unused = script_data_hash(&one_redeemer(), &[], &used, &fewer_models).unwrap();
        assert_eq!(hash, without_unused);

        let extra = versions(&[PlutusVersion::V2, PlutusVersion::V3]);
        let with_extra = script_data_hash(&one_redeemer(), &[], &extra, &cost_models()).unwrap();
        assert_ne!(hash, with_extra);
    }

    #[test]
    fn missing_cost_model_is_reported() {
        let used = versions(&[PlutusVersion::V3]);
        let result = script_data_hash(&one_redeemer(), &[], &used, &CostModels::new());
        assert_eq!(result, Err(EncodeError::MissingCostModel(PlutusVersion::V3)));
    }
}
