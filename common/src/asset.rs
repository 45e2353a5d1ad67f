//! Multi-asset values: coin plus policy/asset-name buckets
//!
//! Asset quantities are arbitrary precision so that sums over many inputs
//! never wrap; only the coin is a fixed-width integer, and every coin
//! operation is overflow-checked.

use std::{collections::BTreeMap, fmt, str::FromStr};

use dashu_int::IBig;
use thiserror::Error;

use crate::{hash::Hash, types::Lovelace, validation::InputError};

pub type PolicyId = Hash<28>;

/// Asset quantities grouped by policy, in canonical key order
pub type MultiAsset = BTreeMap<PolicyId, BTreeMap<AssetName, IBig>>;

/// Name of an asset within a policy, at most 32 bytes.
///
/// Ordering compares length first, then bytes, which is the canonical
/// CBOR order for byte-string map keys.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct AssetName {
    len: u8,
    bytes: [u8; 32],
}

impl AssetName {
    pub fn new(data: &[u8]) -> Option<Self> {
        if data.len() > 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            len: data.len() as u8,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_slice()))
    }
}

impl FromStr for AssetName {
    type Err = InputError;

    /// Parses a hex-encoded asset name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| InputError::invalid_hex("asset name", s))?;
        AssetName::new(&bytes).ok_or(InputError::AssetNameTooLong(bytes.len()))
    }
}

/// Arithmetic failures on values
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ValueError {
    /// **Cause:** Coin sum exceeds u64
    #[error("Coin overflow adding {0} and {1}")]
    CoinOverflow(Lovelace, Lovelace),

    /// **Cause:** Subtrahend has more coin than the minuend
    #[error("Coin underflow: have {have}, need {need}")]
    CoinUnderflow { have: Lovelace, need: Lovelace },

    /// **Cause:** An asset quantity would become negative
    #[error("Asset underflow for {policy}.{name}: have {have}, need {need}")]
    AssetUnderflow {
        policy: PolicyId,
        name: AssetName,
        have: IBig,
        need: IBig,
    },
}

/// Coin plus optional multi-asset map
#[derive(Debug, Clone, Default)]
pub struct Value {
    pub coin: Lovelace,
    pub assets: Option<MultiAsset>,
}

impl Value {
    pub fn new(coin: Lovelace) -> Self {
        Self { coin, assets: None }
    }

    pub fn with_assets(coin: Lovelace, assets: MultiAsset) -> Self {
        let mut value = Self {
            coin,
            assets: Some(assets),
        };
        value.prune();
        value
    }

    pub fn coin(&self) -> Lovelace {
        self.coin
    }

    /// True if any asset has a positive quantity
    pub fn has_assets(&self) -> bool {
        self.positive_assets().next().is_some()
    }

    /// Quantity of one asset, zero if absent
    pub fn quantity(&self, policy: &PolicyId, name: &AssetName) -> IBig {
        self.assets
            .as_ref()
            .and_then(|assets| assets.get(policy))
            .and_then(|names| names.get(name))
            .cloned()
            .unwrap_or(IBig::ZERO)
    }

    /// All (policy, name, quantity) entries with a positive quantity
    pub fn positive_assets(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, &IBig)> {
        self.assets.iter().flat_map(|assets| {
            assets.iter().flat_map(|(policy, names)| {
                names
                    .iter()
                    .filter(|(_, q)| **q > IBig::ZERO)
                    .map(move |(name, q)| (policy, name, q))
            })
        })
    }

    /// Add a (possibly negative) quantity of one asset in place
    pub fn add_asset(&mut self, policy: PolicyId, name: AssetName, quantity: IBig) {
        let assets = self.assets.get_or_insert_with(BTreeMap::new);
        let entry = assets.entry(policy).or_default().entry(name).or_insert(IBig::ZERO);
        *entry += quantity;
        self.prune();
    }

    /// Copy of this value keeping only the coin
    pub fn coin_only(&self) -> Value {
        Value::new(self.coin)
    }

    /// Copy of this value with the coin zeroed
    pub fn assets_only(&self) -> Value {
        Value {
            coin: 0,
            assets: self.assets.clone(),
        }
    }

    /// Sum of two values. Operands are cloned, never aliased.
    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        let coin = self
            .coin
            .checked_add(other.coin)
            .ok_or(ValueError::CoinOverflow(self.coin, other.coin))?;
        let mut result = Value {
            coin,
            assets: self.assets.clone(),
        };
        if let Some(other_assets) = &other.assets {
            let assets = result.assets.get_or_insert_with(BTreeMap::new);
            for (policy, names) in other_assets {
                let bucket = assets.entry(*policy).or_default();
                for (name, quantity) in names {
                    *bucket.entry(*name).or_insert(IBig::ZERO) += quantity;
                }
            }
        }
        result.prune();
        Ok(result)
    }

    /// Difference of two values, failing if the coin or any asset goes negative
    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        if other.coin > self.coin {
            return Err(ValueError::CoinUnderflow {
                have: self.coin,
                need: other.coin,
            });
        }
        let mut result = Value {
            coin: self.coin - other.coin,
            assets: self.assets.clone(),
        };
        if let Some(other_assets) = &other.assets {
            let assets = result.assets.get_or_insert_with(BTreeMap::new);
            for (policy, names) in other_assets {
                let bucket = assets.entry(*policy).or_default();
                for (name, quantity) in names {
                    let entry = bucket.entry(*name).or_insert(IBig::ZERO);
                    let remaining = &*entry - quantity;
                    if remaining < IBig::ZERO {
                        return Err(ValueError::AssetUnderflow {
                            policy: *policy,
                            name: *name,
                            have: entry.clone(),
                            need: quantity.clone(),
                        });
                    }
                    *entry = remaining;
                }
            }
        }
        result.prune();
        Ok(result)
    }

    /// Outstanding requirement after `supplied` is applied: every component
    /// clamps at zero instead of failing
    pub fn saturating_sub(&self, supplied: &Value) -> Value {
        let mut result = Value::new(self.coin.saturating_sub(supplied.coin));
        for (policy, name, quantity) in self.positive_assets() {
            let remaining = quantity - supplied.quantity(policy, name);
            if remaining > IBig::ZERO {
                result.add_asset(*policy, *name, remaining);
            }
        }
        result
    }

    /// True iff coin and every positive asset of `other` is covered by `self`.
    /// Assets present only in `self` are ignored.
    pub fn greater_or_equal(&self, other: &Value) -> bool {
        if self.coin < other.coin {
            return false;
        }
        other
            .positive_assets()
            .all(|(policy, name, quantity)| self.quantity(policy, name) >= *quantity)
    }

    /// Drop zero-quantity entries and empty buckets
    fn prune(&mut self) {
        if let Some(assets) = &mut self.assets {
            for names in assets.values_mut() {
                names.retain(|_, q| *q != IBig::ZERO);
            }
            assets.retain(|_, names| !names.is_empty());
            if assets.is_empty() {
                self.assets = None;
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let empty = MultiAsset::new();
        self.coin == other.coin
            && self.assets.as_ref().unwrap_or(&empty) == other.assets.as_ref().unwrap_or(&empty)
    }
}

impl Eq for Value {}

impl From<Lovelace> for Value {
    fn from(coin: Lovelace) -> Self {
        Value::new(coin)
    }
}

/// Sentinel policy naming the native coin
pub const LOVELACE_UNIT: &str = "lovelace";

/// A quantity of a single unit: the native coin or one native asset.
/// Policy and asset name are hex text; a negative quantity is a burn.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Unit {
    pub policy_id: String,
    pub asset_name: String,
    pub quantity: i64,
}

impl Unit {
    pub fn new(policy_id: &str, asset_name: &str, quantity: i64) -> Self {
        Self {
            policy_id: policy_id.to_string(),
            asset_name: asset_name.to_string(),
            quantity,
        }
    }

    pub fn lovelace(quantity: i64) -> Self {
        Self::new(LOVELACE_UNIT, "", quantity)
    }

    pub fn is_lovelace(&self) -> bool {
        self.policy_id.is_empty() || self.policy_id == LOVELACE_UNIT
    }

    /// Parsed (policy, name), or `None` for the native coin
    pub fn asset_id(&self) -> Result<Option<(PolicyId, AssetName)>, InputError> {
        if self.is_lovelace() {
            return Ok(None);
        }
        let policy_bytes = hex::decode(&self.policy_id)
            .map_err(|_| InputError::invalid_hex("policy id", &self.policy_id))?;
        let policy = PolicyId::try_from(policy_bytes.as_slice()).map_err(|_| {
            InputError::InvalidLength {
                field: "policy id",
                expected: 28,
                actual: policy_bytes.len(),
            }
        })?;
        let name = AssetName::from_str(&self.asset_name)?;
        Ok(Some((policy, name)))
    }

    /// Value holding exactly this unit. Coin must be non-negative; asset
    /// quantities may be negative (burns).
    pub fn to_value(&self) -> Result<Value, InputError> {
        match self.asset_id()? {
            None => {
                if self.quantity < 0 {
                    return Err(InputError::NegativeQuantity {
                        unit: LOVELACE_UNIT.to_string(),
                        quantity: self.quantity,
                    });
                }
                Ok(Value::new(self.quantity as Lovelace))
            }
            Some((policy, name)) => {
                let mut value = Value::default();
                value.add_asset(policy, name, IBig::from(self.quantity));
                Ok(value)
            }
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_lovelace() {
            write!(f, "{} {}", self.quantity, LOVELACE_UNIT)
        } else {
            write!(f, "{} {}.{}", self.quantity, self.policy_id, self.asset_name)
        }
    }
}
