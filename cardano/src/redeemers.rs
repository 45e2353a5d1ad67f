//! Redeemer bookkeeping.
//!
//! While a transaction is being assembled, redeemers are keyed by what they
//! act on (a consumed UTxO, a minting policy or a withdrawal credential).
//! The ledger instead identifies a redeemer by tag and position within the
//! sorted container, which is only known once inputs, mints and withdrawals
//! are frozen. [`RedeemerLayout`] performs that late translation in both
//! directions.

use crate::error::BuilderError;
use keystone_codec::{Redeemers, TransactionBody};
use keystone_common::{
    ExUnits, PlutusData, PolicyId, RedeemerPointer, RedeemerTag, RedeemerValue,
    StakeCredential, UTxOIdentifier,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable identity of the item a redeemer is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedeemerTarget {
    Spend(UTxOIdentifier),
    Mint(PolicyId),
    Reward(StakeCredential),
}

impl RedeemerTarget {
    pub fn tag(&self) -> RedeemerTag {
        match self {
            RedeemerTarget::Spend(_) => RedeemerTag::Spend,
            RedeemerTarget::Mint(_) => RedeemerTag::Mint,
            RedeemerTarget::Reward(_) => RedeemerTag::Reward,
        }
    }
}

impl fmt::Display for RedeemerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeemerTarget::Spend(input) => write!(f, "spend {input}"),
            RedeemerTarget::Mint(policy) => write!(f, "mint {policy}"),
            RedeemerTarget::Reward(credential) => {
                write!(f, "reward {}", hex::encode(credential.hash()))
            }
        }
    }
}

/// Redeemer data and budget before its ledger position is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRedeemer {
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

/// Identity-keyed working set
pub type PendingRedeemers = BTreeMap<RedeemerTarget, PendingRedeemer>;

/// Frozen, sorted containers of a transaction body
pub struct RedeemerLayout<'a> {
    inputs: &'a BTreeSet<UTxOIdentifier>,
    policies: Vec<PolicyId>,
    reward_credentials: Vec<StakeCredential>,
}

impl<'a> RedeemerLayout<'a> {
    pub fn new(body: &'a TransactionBody) -> Self {
        Self {
            inputs: &body.inputs,
            policies: body.mint.iter().flat_map(|mint| mint.keys().copied()).collect(),
            reward_credentials: body
                .withdrawals
                .values()
                .map(|(address, _)| address.credential)
                .collect(),
        }
    }

    /// Ledger position of the item a redeemer targets
    pub fn pointer(&self, target: &RedeemerTarget) -> Option<RedeemerPointer> {
        let index = match target {
            RedeemerTarget::Spend(input) => self.inputs.iter().position(|i| i == input),
            RedeemerTarget::Mint(policy) => self.policies.iter().position(|p| p == policy),
            RedeemerTarget::Reward(credential) => {
                self.reward_credentials.iter().position(|c| c == credential)
            }
        }?;
        Some(RedeemerPointer::new(target.tag(), index as u32))
    }

    /// Item at a ledger position, the inverse of [`RedeemerLayout::pointer`]
    pub fn target(&self, pointer: &RedeemerPointer) -> Option<RedeemerTarget> {
        let index = pointer.index as usize;
        match pointer.tag {
            RedeemerTag::Spend => self.inputs.iter().nth(index).copied().map(RedeemerTarget::Spend),
            RedeemerTag::Mint => self.policies.get(index).copied().map(RedeemerTarget::Mint),
            RedeemerTag::Reward => {
                self.reward_credentials.get(index).copied().map(RedeemerTarget::Reward)
            }
            RedeemerTag::Cert => None,
        }
    }

    /// Translate the working set into the position-keyed ledger map
    pub fn assign(&self, pending: &PendingRedeemers) -> Result<Redeemers, BuilderError> {
        pending
            .iter()
            .map(|(target, redeemer)| {
                let pointer = self
                    .pointer(target)
                    .ok_or_else(|| BuilderError::OrphanRedeemer(target.to_string()))?;
                let value = RedeemerValue {
                    data: redeemer.data.clone(),
                    ex_units: redeemer.ex_units,
                };
                Ok((pointer, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashu_int::IBig;
    use keystone_common::{AssetName, TxHash, Value};

    fn input(byte: u8, index: u32) -> UTxOIdentifier {
        UTxOIdentifier::new(TxHash::new([byte; 32]), index)
    }

    fn pending() -> PendingRedeemer {
        PendingRedeemer {
            data: PlutusData::unit(),
            ex_units: ExUnits::default(),
        }
    }

    #[test]
    fn spend_index_follows_sorted_inputs_not_attachment_order() {
        let mut body = TransactionBody::default();
        body.inputs.insert(input(9, 0));
        body.inputs.insert(input(1, 1));
        body.inputs.insert(input(1, 0));

        let mut redeemers = PendingRedeemers::new();
        redeemers.insert(RedeemerTarget::Spend(input(9, 0)), pending());
        redeemers.insert(RedeemerTarget::Spend(input(1, 1)), pending());

        let assigned = RedeemerLayout::new(&body).assign(&redeemers).unwrap();
        let pointers: Vec<_> = assigned.keys().copied().collect();
        assert_eq!(
            pointers,
            vec![
                RedeemerPointer::new(RedeemerTag::Spend, 1),
                RedeemerPointer::new(RedeemerTag::Spend, 2),
            ]
        );
    }

    #[test]
    fn mint_index_follows_sorted_policies() {
        let mut mint = Value::default();
        mint.add_asset(PolicyId::new([0xbb; 28]), AssetName::new(b"").unwrap(), IBig::from(1));
        mint.add_asset(PolicyId::new([0xaa; 28]), AssetName::new(b"").unwrap(), IBig::from(1));
        let body = TransactionBody {
            mint: mint.assets,
            ..Default::default()
        };
        let layout = RedeemerLayout::new(&body);
        assert_eq!(
            layout.pointer(&RedeemerTarget::Mint(PolicyId::new([0xbb; 28]))),
            Some(RedeemerPointer::new(RedeemerTag::Mint, 1))
        );
        assert_eq!(
            layout.target(&RedeemerPointer::new(RedeemerTag::Mint, 0)),
            Some(RedeemerTarget::Mint(PolicyId::new([0xaa; 28])))
        );
    }

    #[test]
    fn redeemer_without_item_is_an_orphan() {
        let body = TransactionBody::default();
        let mut redeemers = PendingRedeemers::new();
        redeemers.insert(RedeemerTarget::Spend(input(1, 0)), pending());
        assert!(matches!(
            RedeemerLayout::new(&body).assign(&redeemers),
            Err(BuilderError::OrphanRedeemer(_))
        ));
    }
}
