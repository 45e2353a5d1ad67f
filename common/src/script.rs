use crate::{
    crypto::keyhash_224_tagged,
    hash::{AddrKeyhash, ScriptHash},
    plutus::PlutusData,
    types::{ExUnits, Slot},
};
use minicbor::data::Tag;
use minicbor::Encode;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum NativeScript {
    ScriptPubkey(AddrKeyhash),
    ScriptAll(Vec<NativeScript>),
    ScriptAny(Vec<NativeScript>),
    ScriptNOfK(u32, Vec<NativeScript>),
    InvalidBefore(Slot),
    InvalidHereafter(Slot),
}

impl<C> minicbor::encode::Encode<C> for NativeScript {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            NativeScript::ScriptPubkey(v) => {
                e.array(2)?;
                e.encode_with(0, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptAll(v) => {
                e.array(2)?;
                e.encode_with(1, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptAny(v) => {
                e.array(2)?;
                e.encode_with(2, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptNOfK(a, b) => {
                e.array(3)?;
                e.encode_with(3, ctx)?;
                e.encode_with(a, ctx)?;
                e.encode_with(b, ctx)?;
            }
            NativeScript::InvalidBefore(v) => {
                e.array(2)?;
                e.encode_with(4, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::InvalidHereafter(v) => {
                e.array(2)?;
                e.encode_with(5, ctx)?;
                e.encode_with(v, ctx)?;
            }
        }

        Ok(())
    }
}

impl NativeScript {
    pub fn pubkey(key_hash: AddrKeyhash) -> Self {
        NativeScript::ScriptPubkey(key_hash)
    }

    pub fn all(scripts: Vec<NativeScript>) -> Self {
        NativeScript::ScriptAll(scripts)
    }

    pub fn any(scripts: Vec<NativeScript>) -> Self {
        NativeScript::ScriptAny(scripts)
    }

    /// At least `required` of `scripts` must succeed
    pub fn n_of_k(required: u32, scripts: Vec<NativeScript>) -> Self {
        NativeScript::ScriptNOfK(required, scripts)
    }

    pub fn invalid_before(slot: Slot) -> Self {
        NativeScript::InvalidBefore(slot)
    }

    pub fn invalid_hereafter(slot: Slot) -> Self {
        NativeScript::InvalidHereafter(slot)
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        if self.encode(&mut minicbor::Encoder::new(&mut buffer), &mut ()).is_err() {
            buffer.clear();
        }
        buffer
    }

    pub fn compute_hash(&self) -> ScriptHash {
        keyhash_224_tagged(0, &self.to_cbor())
    }
}

/// Plutus language version
#[derive(
    Debug,
    Clone,
    Copy,
    serde::Serialize,
    serde::Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum PlutusVersion {
    V1,
    V2,
    V3,
}

impl PlutusVersion {
    /// Prefix byte hashed in front of the script bytes
    pub fn script_tag(&self) -> u8 {
        match self {
            PlutusVersion::V1 => 1,
            PlutusVersion::V2 => 2,
            PlutusVersion::V3 => 3,
        }
    }

    /// Language id used as the cost model key
    pub fn language_id(&self) -> u8 {
        match self {
            PlutusVersion::V1 => 0,
            PlutusVersion::V2 => 1,
            PlutusVersion::V3 => 2,
        }
    }
}

/// Compiled Plutus script, as the bytes carried in the witness set
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct PlutusScript {
    pub version: PlutusVersion,
    pub bytes: Vec<u8>,
}

impl PlutusScript {
    pub fn new(version: PlutusVersion, bytes: Vec<u8>) -> Self {
        Self { version, bytes }
    }

    pub fn compute_hash(&self) -> ScriptHash {
        keyhash_224_tagged(self.version.script_tag(), &self.bytes)
    }
}

/// Any script that can be attached or referenced
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum Script {
    Native(NativeScript),
    Plutus(PlutusScript),
}

impl Script {
    pub fn compute_hash(&self) -> ScriptHash {
        match self {
            Script::Native(script) => script.compute_hash(),
            Script::Plutus(script) => script.compute_hash(),
        }
    }

    pub fn plutus_version(&self) -> Option<PlutusVersion> {
        match self {
            Script::Native(_) => None,
            Script::Plutus(script) => Some(script.version),
        }
    }

    /// `[type, script]` as carried inside a reference script field
    fn tagged_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut e = minicbor::Encoder::new(&mut buffer);
        let result = match self {
            Script::Native(script) => e
                .array(2)
                .and_then(|e| e.u8(0))
                .and_then(|e| script.encode(e, &mut ())),
            Script::Plutus(script) => e
                .array(2)
                .and_then(|e| e.u8(script.version.script_tag()))
                .and_then(|e| e.bytes(&script.bytes))
                .map(|_| ()),
        };
        if result.is_err() {
            buffer.clear();
        }
        buffer
    }
}

/// Reference script field of an output: `#6.24(bytes .cbor [type, script])`
impl<C> minicbor::Encode<C> for Script {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(Tag::new(24))?.bytes(&self.tagged_bytes())?;
        Ok(())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    serde::Serialize,
    serde::Deserialize,
    minicbor::Encode,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[cbor(index_only)]
pub enum RedeemerTag {
    #[n(0)]
    Spend,
    #[n(1)]
    Mint,
    #[n(2)]
    Cert,
    #[n(3)]
    Reward,
}

/// Ledger key of a redeemer: tag plus position in the sorted container
#[derive(
    Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct RedeemerPointer {
    pub tag: RedeemerTag,
    pub index: u32,
}

impl RedeemerPointer {
    pub fn new(tag: RedeemerTag, index: u32) -> Self {
        Self { tag, index }
    }
}

impl<C> minicbor::Encode<C> for RedeemerPointer {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.tag.encode(e, ctx)?;
        e.u32(self.index)?;
        Ok(())
    }
}

/// Argument and budget of one script invocation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RedeemerValue {
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

impl<C> minicbor::Encode<C> for RedeemerValue {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.data.encode(e, ctx)?;
        self.ex_units.encode(e, ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn resolve_hash_correctly() {
        let native_script = NativeScript::ScriptPubkey(
            AddrKeyhash::from_str("976ec349c3a14f58959088e13e98f6cd5a1e8f27f6f3160b25e415ca")
                .unwrap(),
        );
        let script_hash = native_script.compute_hash();
        assert_eq!(
            script_hash,
            ScriptHash::from_str("c3a33acb8903cf42611e26b15c7731f537867c6469f5bf69c837e4a3")
                .unwrap()
        );
    }

    #[test]
    fn plutus_hash_depends_on_version() {
        let v2 = PlutusScript::new(PlutusVersion::V2, vec![0x4e, 0x4d, 0x01, 0x00]);
        let v3 = PlutusScript::new(PlutusVersion::V3, vec![0x4e, 0x4d, 0x01, 0x00]);
        assert_ne!(v2.compute_hash(), v3.compute_hash());
        assert_eq!(
            Script::Plutus(v2.clone()).compute_hash(),
            v2.compute_hash()
        );
    }

    #[test]
    fn redeemer_pointer_encodes_as_pair() {
        let bytes = minicbor::to_vec(RedeemerPointer::new(RedeemerTag::Mint, 3)).unwrap();
        assert_eq!(hex::encode(bytes), "820103");
    }

    #[test]
    fn reference_script_is_tag_24_wrapped() {
        let script = Script::Plutus(PlutusScript::new(PlutusVersion::V2, vec![0xab]));
        let bytes = minicbor::to_vec(&script).unwrap();
        assert_eq!(hex::encode(bytes), "d8184482 0241ab".replace(' ', ""));
    }

    #[test]
    fn native_scripts_nest() {
        let script = NativeScript::all(vec![
            NativeScript::pubkey(AddrKeyhash::new([1; 28])),
            NativeScript::invalid_hereafter(1000),
        ]);
        let bytes = script.to_cbor();
        assert_eq!(&bytes[..3], &[0x82, 0x01, 0x82]);
    }

    #[test]
    fn n_of_k_carries_threshold() {
        let script = NativeScript::n_of_k(1, vec![NativeScript::invalid_before(5)]);
        assert_eq!(hex::encode(script.to_cbor()), "83030181820405");
    }
}
