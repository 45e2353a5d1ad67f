//! Conway transaction body, full transaction and their hashes

use crate::{
    certs::encode_certificate,
    error::EncodeError,
    output::encode_output,
    utils::{encode_inputs, encode_to_vec, to_cbor},
    value::encode_mint,
    witness::WitnessSet,
};
use keystone_common::{
    AddrKeyhash, AuxiliaryDataHash, Certificate, Lovelace, Metadata, MultiAsset, NetworkId,
    ScriptDataHash, Slot, StakeAddress, TxHash, TxOutput, UTxOIdentifier, crypto::keyhash_256,
};
use minicbor::{
    Encode, Encoder,
    encode::{Error, Write},
};
use std::collections::{BTreeMap, BTreeSet};

/// Withdrawals keyed by the raw reward address bytes, which is their ledger order
pub type Withdrawals = BTreeMap<Vec<u8>, (StakeAddress, Lovelace)>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBody {
    pub inputs: BTreeSet<UTxOIdentifier>,
    pub outputs: Vec<TxOutput>,
    pub fee: Lovelace,
    pub ttl: Option<Slot>,
    pub certificates: Vec<Certificate>,

    /// Deposit stated by Conway registration certificates
    pub key_deposit: Lovelace,
    pub withdrawals: Withdrawals,
    pub auxiliary_data_hash: Option<AuxiliaryDataHash>,
    pub validity_start: Option<Slot>,
    pub mint: Option<MultiAsset>,
    pub script_data_hash: Option<ScriptDataHash>,
    pub collateral: BTreeSet<UTxOIdentifier>,
    pub required_signers: BTreeSet<AddrKeyhash>,
    pub network_id: Option<NetworkId>,
    pub collateral_return: Option<TxOutput>,
    pub total_collateral: Option<Lovelace>,
    pub reference_inputs: BTreeSet<UTxOIdentifier>,
}

impl TransactionBody {
    fn field_count(&self) -> u64 {
        3 + [
            self.ttl.is_some(),
            !self.certificates.is_empty(),
            !self.withdrawals.is_empty(),
            self.auxiliary_data_hash.is_some(),
            self.validity_start.is_some(),
            self.mint.is_some(),
            self.script_data_hash.is_some(),
            !self.collateral.is_empty(),
            !self.required_signers.is_empty(),
            self.network_id.is_some(),
            self.collateral_return.is_some(),
            self.total_collateral.is_some(),
            !self.reference_inputs.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as u64
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, EncodeError> {
        to_cbor(self)
    }

    /// Transaction id: Blake2b-256 of the encoded body
    pub fn hash(&self) -> Result<TxHash, EncodeError> {
        Ok(keyhash_256(&self.to_cbor()?))
    }
}

impl<C> minicbor::Encode<C> for TransactionBody {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> Result<(), Error<W::Error>> {
        e.map(self.field_count())?;

        e.u8(0)?;
        encode_inputs(e, self.inputs.iter())?;

        e.u8(1)?;
        e.array(self.outputs.len() as u64)?;
        for output in &self.outputs {
            encode_output(e, output)?;
        }

        e.u8(2)?.u64(self.fee)?;

        if let Some(ttl) = self.ttl {
            e.u8(3)?.u64(ttl)?;
        }
        if !self.certificates.is_empty() {
            e.u8(4)?;
            e.array(self.certificates.len() as u64)?;
            for cert in &self.certificates {
                encode_certificate(e, cert, self.key_deposit)?;
            }
        }
        if !self.withdrawals.is_empty() {
            e.u8(5)?;
            e.map(self.withdrawals.len() as u64)?;
            for (address, amount) in self.withdrawals.values() {
                address.encode(e, ctx)?;
                e.u64(*amount)?;
            }
        }
        if let Some(hash) = &self.auxiliary_data_hash {
            e.u8(7)?;
            hash.encode(e, ctx)?;
        }
        if let Some(start) = self.validity_start {
            e.u8(8)?.u64(start)?;
        }
        if let Some(mint) = &self.mint {
            e.u8(9)?;
            encode_mint(e, mint)?;
        }
        if let Some(hash) = &self.script_data_hash {
            e.u8(11)?;
            hash.encode(e, ctx)?;
        }
        if !self.collateral.is_empty() {
            e.u8(13)?;
            encode_inputs(e, self.collateral.iter())?;
        }
        if !self.required_signers.is_empty() {
            e.u8(14)?;
            e.array(self.required_signers.len() as u64)?;
            for signer in &self.required_signers {
                signer.encode(e, ctx)?;
            }
        }
        if let Some(network) = self.network_id {
            e.u8(15)?.u8(network.to_u8())?;
        }
        if let Some(output) = &self.collateral_return {
            e.u8(16)?;
            encode_output(e, output)?;
        }
        if let Some(total) = self.total_collateral {
            e.u8(17)?.u64(total)?;
        }
        if !self.reference_inputs.is_empty() {
            e.u8(18)?;
            encode_inputs(e, self.reference_inputs.iter())?;
        }
        Ok(())
    }
}

/// Shelley-form auxiliary data: the bare metadata map
pub fn encode_auxiliary_data<W: Write>(
    e: &mut Encoder<W>,
    metadata: &Metadata,
) -> Result<(), Error<W::Error>> {
    e.map(metadata.len() as u64)?;
    for (label, datum) in metadata {
        e.u64(*label)?;
        datum.encode(e, &mut ())?;
    }
    Ok(())
}

pub fn auxiliary_data_hash(metadata: &Metadata) -> Result<AuxiliaryDataHash, EncodeError> {
    Ok(keyhash_256(&encode_to_vec(|e| encode_auxiliary_data(e, metadata))?))
}

/// `[body, witness_set, is_valid, auxiliary_data / null]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub is_valid: bool,
    pub metadata: Option<Metadata>,
}

impl Transaction {
    pub fn new(body: TransactionBody, witness_set: WitnessSet, metadata: Option<Metadata>) -> Self {
        Self {
            body,
            witness_set,
            is_valid: true,
            metadata,
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, EncodeError> {
        to_cbor(self)
    }

    pub fn size(&self) -> Result<usize, EncodeError> {
        Ok(self.to_cbor()?.len())
    }

    pub fn hash(&self) -> Result<TxHash, EncodeError> {
        self.body.hash()
    }
}

impl<C> minicbor::Encode<C> for Transaction {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> Result<(), Error<W::Error>> {
        e.array(4)?;
        self.body.encode(e, ctx)?;
        self.witness_set.encode(e, ctx)?;
        e.bool(self.is_valid)?;
        match &self.metadata {
            Some(metadata) => encode_auxiliary_data(e, metadata)?,
            None => {
                e.null()?;
            }
        }
        Ok(())
    }
}
