use keystone_common::{
    NativeScript, PlutusData, PlutusScript, PlutusVersion, RedeemerPointer, RedeemerValue,
    VKeyWitness,
};
use minicbor::{
    Encode, Encoder,
    encode::{Error, Write},
};
use std::collections::BTreeMap;

/// Redeemers keyed by their ledger position
pub type Redeemers = BTreeMap<RedeemerPointer, RedeemerValue>;

/// Conway map form `{ [tag, index] => [data, ex_units] }`
pub fn encode_redeemers<W: Write>(
    e: &mut Encoder<W>,
    redeemers: &Redeemers,
) -> Result<(), Error<W::Error>> {
    e.map(redeemers.len() as u64)?;
    for (pointer, value) in redeemers {
        pointer.encode(e, &mut ())?;
        value.encode(e, &mut ())?;
    }
    Ok(())
}

pub fn encode_datums<W: Write>(
    e: &mut Encoder<W>,
    datums: &[PlutusData],
) -> Result<(), Error<W::Error>> {
    e.array(datums.len() as u64)?;
    for datum in datums {
        datum.encode(e, &mut ())?;
    }
    Ok(())
}

/// Transaction witness set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessSet {
    pub vkey_witnesses: Vec<VKeyWitness>,
    pub native_scripts: Vec<NativeScript>,
    pub plutus_scripts: Vec<PlutusScript>,
    pub plutus_data: Vec<PlutusData>,
    pub redeemers: Redeemers,
}

impl WitnessSet {
    fn plutus_scripts_of(&self, version: PlutusVersion) -> Vec<&PlutusScript> {
        self.plutus_scripts.iter().filter(|script| script.version == version).collect()
    }
}

impl<C> minicbor::Encode<C> for WitnessSet {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> Result<(), Error<W::Error>> {
        let v1 = self.plutus_scripts_of(PlutusVersion::V1);
        let v2 = self.plutus_scripts_of(PlutusVersion::V2);
        let v3 = self.plutus_scripts_of(PlutusVersion::V3);

        let len = [
            !self.vkey_witnesses.is_empty(),
            !self.native_scripts.is_empty(),
            !v1.is_empty(),
            !self.plutus_data.is_empty(),
            !self.redeemers.is_empty(),
            !v2.is_empty(),
            !v3.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        e.map(len as u64)?;

        if !self.vkey_witnesses.is_empty() {
            e.u8(0)?;
            e.array(self.vkey_witnesses.len() as u64)?;
            for witness in &self.vkey_witnesses {
                witness.encode(e, ctx)?;
            }
        }
        if !self.native_scripts.is_empty() {
            e.u8(1)?;
            e.array(self.native_scripts.len() as u64)?;
            for script in &self.native_scripts {
                script.encode(e, ctx)?;
            }
        }
        if !v1.is_empty() {
            e.u8(3)?;
            encode_script_bytes(e, &v1)?;
        }
        if !self.plutus_data.is_empty() {
            e.u8(4)?;
            encode_datums(e, &self.plutus_data)?;
        }
        if !self.redeemers.is_empty() {
            e.u8(5)?;
            encode_redeemers(e, &self.redeemers)?;
        }
        if !v2.is_empty() {
            e.u8(6)?;
            encode_script_bytes(e, &v2)?;
        }
        if !v3.is_empty() {
            e.u8(7)?;
            encode_script_bytes(e, &v3)?;
        }
        Ok(())
    }
}

fn encode_script_bytes<W: Write>(
    e: &mut Encoder<W>,
    scripts: &[&PlutusScript],
) -> Result<(), Error<W::Error>> {
    e.array(scripts.len() as u64)?;
    for script in scripts {
        e.bytes(&script.bytes)?;
    }
    Ok(())
}
