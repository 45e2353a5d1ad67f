//! Coin, multi-asset and mint encodings

use dashu_int::IBig;
use keystone_common::{MultiAsset, Value};
use minicbor::{
    Encoder,
    data::Int,
    encode::{Error, Write},
};

fn to_u64(quantity: &IBig) -> Option<u64> {
    u64::try_from(quantity).ok()
}

fn to_int(quantity: &IBig) -> Option<Int> {
    i64::try_from(quantity).ok().map(Int::from)
}

/// Output value: a bare coin, or `[coin, { policy => { name => quantity } }]`.
/// Only positive quantities are written.
pub fn encode_value<W: Write>(e: &mut Encoder<W>, value: &Value) -> Result<(), Error<W::Error>> {
    if !value.has_assets() {
        e.u64(value.coin)?;
        return Ok(());
    }
    e.array(2)?;
    e.u64(value.coin)?;
    encode_positive_assets(e, value.assets.as_ref())
}

fn encode_positive_assets<W: Write>(
    e: &mut Encoder<W>,
    assets: Option<&MultiAsset>,
) -> Result<(), Error<W::Error>> {
    let policies: Vec<_> = assets
        .into_iter()
        .flatten()
        .map(|(policy, names)| {
            let names: Vec<_> = names.iter().filter(|(_, q)| **q > IBig::ZERO).collect();
            (policy, names)
        })
        .filter(|(_, names)| !names.is_empty())
        .collect();

    e.map(policies.len() as u64)?;
    for (policy, names) in policies {
        e.bytes(policy.as_ref())?;
        e.map(names.len() as u64)?;
        for (name, quantity) in names {
            let quantity =
                to_u64(quantity).ok_or_else(|| Error::message("asset quantity exceeds u64"))?;
            e.bytes(name.as_slice())?;
            e.u64(quantity)?;
        }
    }
    Ok(())
}

/// Mint field: `{ policy => { name => nonzero int64 } }`, burns negative
pub fn encode_mint<W: Write>(e: &mut Encoder<W>, mint: &MultiAsset) -> Result<(), Error<W::Error>> {
    let policies: Vec<_> = mint
        .iter()
        .map(|(policy, names)| {
            let names: Vec<_> = names.iter().filter(|(_, q)| **q != IBig::ZERO).collect();
            (policy, names)
        })
        .filter(|(_, names)| !names.is_empty())
        .collect();

    e.map(policies.len() as u64)?;
    for (policy, names) in policies {
        e.bytes(policy.as_ref())?;
        e.map(names.len() as u64)?;
        for (name, quantity) in names {
            let quantity =
                to_int(quantity).ok_or_else(|| Error::message("mint quantity exceeds int64"))?;
            e.bytes(name.as_slice())?;
            e.int(quantity)?;
        }
    }
    Ok(())
}
