//! Plutus data, datums and their canonical CBOR form

use crate::{crypto::keyhash_256, hash::DatumHash};
use minicbor::data::{Int, Tag};
use minicbor::Encode;

/// Byte strings longer than this are split into chunks of this size
const BYTES_CHUNK_SIZE: usize = 64;

/// Structured data passed to scripts
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Integer(i128),
    Bytes(Vec<u8>),
}

impl PlutusData {
    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        PlutusData::Constr { tag, fields }
    }

    /// The unit value, `Constr 0 []`
    pub fn unit() -> Self {
        PlutusData::constr(0, Vec::new())
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut e = minicbor::Encoder::new(&mut buffer);
        // writes to a Vec cannot fail and the encoding raises no errors of its own
        if self.encode(&mut e, &mut ()).is_err() {
            buffer.clear();
        }
        buffer
    }

    /// Blake2b-256 of the canonical encoding
    pub fn hash(&self) -> DatumHash {
        keyhash_256(&self.to_cbor())
    }
}

fn encode_list<C, W: minicbor::encode::Write>(
    items: &[PlutusData],
    e: &mut minicbor::Encoder<W>,
    ctx: &mut C,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    if items.is_empty() {
        e.array(0)?;
        return Ok(());
    }
    e.begin_array()?;
    for item in items {
        item.encode(e, ctx)?;
    }
    e.end()?;
    Ok(())
}

fn encode_bytes<W: minicbor::encode::Write>(
    bytes: &[u8],
    e: &mut minicbor::Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    if bytes.len() <= BYTES_CHUNK_SIZE {
        e.bytes(bytes)?;
        return Ok(());
    }
    e.begin_bytes()?;
    for chunk in bytes.chunks(BYTES_CHUNK_SIZE) {
        e.bytes(chunk)?;
    }
    e.end()?;
    Ok(())
}

fn encode_big_int<W: minicbor::encode::Write>(
    value: i128,
    e: &mut minicbor::Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    if let Ok(int) = Int::try_from(value) {
        e.int(int)?;
        return Ok(());
    }
    // bignum tags: 2 for n, 3 for -1 - n
    let (tag, magnitude) = if value >= 0 {
        (2, value as u128)
    } else {
        (3, (-1 - value) as u128)
    };
    let bytes = magnitude.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    e.tag(Tag::new(tag))?;
    encode_bytes(&bytes[first..], e)
}

impl<C> minicbor::Encode<C> for PlutusData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            PlutusData::Constr { tag, fields } => match tag {
                0..=6 => {
                    e.tag(Tag::new(121 + tag))?;
                    encode_list(fields, e, ctx)?;
                }
                7..=127 => {
                    e.tag(Tag::new(1280 + tag - 7))?;
                    encode_list(fields, e, ctx)?;
                }
                _ => {
                    e.tag(Tag::new(102))?;
                    e.array(2)?;
                    e.u64(*tag)?;
                    encode_list(fields, e, ctx)?;
                }
            },
            PlutusData::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (key, value) in entries {
                    key.encode(e, ctx)?;
                    value.encode(e, ctx)?;
                }
            }
            PlutusData::List(items) => encode_list(items, e, ctx)?,
            PlutusData::Integer(value) => encode_big_int(*value, e)?,
            PlutusData::Bytes(bytes) => encode_bytes(bytes, e)?,
        }
        Ok(())
    }
}

/// Datum attached to an output
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DatumOption {
    /// Only the hash is stored; the datum itself travels in the witness set
    Hash(DatumHash),

    /// Datum stored in the output
    Inline(PlutusData),
}

impl<C> minicbor::Encode<C> for DatumOption {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        match self {
            DatumOption::Hash(hash) => {
                e.u8(0)?;
                hash.encode(e, ctx)?;
            }
            DatumOption::Inline(data) => {
                e.u8(1)?;
                e.tag(Tag::new(24))?;
                e.bytes(&data.to_cbor())?;
            }
        }
        Ok(())
    }
}
