//! Core type definitions shared by the codec and the builder

use crate::hash::{Hash, TxHash};
use minicbor::Encode;
use std::fmt;
use std::ops::Add;

/// Amount of the native coin in its base unit
pub type Lovelace = u64;

/// Absolute slot number
pub type Slot = u64;

/// Ed25519 verification key
pub type VKey = Hash<32>;

/// Ed25519 signature
pub type Signature = Hash<64>;

/// Network discriminant carried in addresses and in the body network id field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum NetworkId {
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkId {
    /// Value of the low header nibble of an address and of body field 15
    pub fn to_u8(self) -> u8 {
        match self {
            NetworkId::Testnet => 0,
            NetworkId::Mainnet => 1,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => NetworkId::Mainnet,
            _ => NetworkId::Testnet,
        }
    }
}

/// Reference to a transaction output: transaction id and output index.
///
/// The derived ordering (id bytes, then index) is the order the ledger
/// uses for the input set, which redeemer indices depend on.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
pub struct UTxOIdentifier {
    pub tx_hash: TxHash,
    pub output_index: u32,
}

impl UTxOIdentifier {
    pub fn new(tx_hash: TxHash, output_index: u32) -> Self {
        Self {
            tx_hash,
            output_index,
        }
    }
}

impl fmt::Display for UTxOIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

impl<C> minicbor::Encode<C> for UTxOIdentifier {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.tx_hash.encode(e, ctx)?;
        e.u32(self.output_index)?;
        Ok(())
    }
}

/// Script execution budget
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

impl ExUnits {
    pub fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }

    /// Scale both dimensions by `(100 + percent) / 100`, rounding up
    pub fn with_margin(self, percent: u64) -> Self {
        let scale = |v: u64| {
            let scaled = (v as u128).saturating_mul(100 + percent as u128).div_ceil(100);
            u64::try_from(scaled).unwrap_or(u64::MAX)
        };
        Self {
            mem: scale(self.mem),
            steps: scale(self.steps),
        }
    }
}

impl Add for ExUnits {
    type Output = ExUnits;

    fn add(self, other: ExUnits) -> ExUnits {
        ExUnits {
            mem: self.mem.saturating_add(other.mem),
            steps: self.steps.saturating_add(other.steps),
        }
    }
}

impl<C> minicbor::Encode<C> for ExUnits {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?.u64(self.mem)?.u64(self.steps)?;
        Ok(())
    }
}

/// Verification key witness
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VKeyWitness {
    pub vkey: VKey,
    pub signature: Signature,
}

impl VKeyWitness {
    pub fn new(vkey: VKey, signature: Signature) -> Self {
        Self { vkey, signature }
    }

    /// Zero-filled witness with the exact size of a real one, used while
    /// the fee is still being estimated
    pub fn placeholder() -> Self {
        Self {
            vkey: VKey::default(),
            signature: Signature::default(),
        }
    }
}

impl<C> minicbor::Encode<C> for VKeyWitness {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.vkey.encode(e, ctx)?;
        self.signature.encode(e, ctx)?;
        Ok(())
    }
}
