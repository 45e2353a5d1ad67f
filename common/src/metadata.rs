use minicbor::data::Int;
use std::collections::BTreeMap;

/// Transaction metadata, keyed by label in ascending order
pub type Metadata = BTreeMap<MetadatumLabel, Metadatum>;

pub type MetadatumLabel = u64;

/// Text and byte strings in metadata are limited to this many bytes
pub const MAX_METADATUM_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Metadatum {
    Int(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Metadatum>),
    Map(Vec<(Metadatum, Metadatum)>),
}

impl Metadatum {
    /// True if every string in the tree fits the ledger limit
    pub fn is_within_limits(&self) -> bool {
        match self {
            Metadatum::Int(n) => Int::try_from(*n).is_ok(),
            Metadatum::Bytes(bytes) => bytes.len() <= MAX_METADATUM_LENGTH,
            Metadatum::Text(text) => text.len() <= MAX_METADATUM_LENGTH,
            Metadatum::Array(items) => items.iter().all(Metadatum::is_within_limits),
            Metadatum::Map(entries) => {
                entries.iter().all(|(k, v)| k.is_within_limits() && v.is_within_limits())
            }
        }
    }
}

impl From<&str> for Metadatum {
    fn from(value: &str) -> Self {
        Metadatum::Text(value.to_string())
    }
}

impl From<i64> for Metadatum {
    fn from(value: i64) -> Self {
        Metadatum::Int(value as i128)
    }
}

impl<C> minicbor::Encode<C> for Metadatum {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Metadatum::Int(n) => {
                let int = Int::try_from(*n)
                    .map_err(|_| minicbor::encode::Error::message("metadatum integer out of range"))?;
                e.int(int)?;
            }
            Metadatum::Bytes(bytes) => {
                e.bytes(bytes)?;
            }
            Metadatum::Text(text) => {
                e.str(text)?;
            }
            Metadatum::Array(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    item.encode(e, ctx)?;
                }
            }
            Metadatum::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (key, value) in entries {
                    key.encode(e, ctx)?;
                    value.encode(e, ctx)?;
                }
            }
        }
        Ok(())
    }
}
