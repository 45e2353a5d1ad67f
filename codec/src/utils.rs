use crate::error::EncodeError;
use keystone_common::UTxOIdentifier;
use minicbor::{
    Encode, Encoder,
    encode::{Error, Write},
};
use std::convert::Infallible;

/// Encode a value that implements `minicbor::Encode` into a fresh buffer
pub fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, EncodeError> {
    Ok(minicbor::to_vec(value)?)
}

/// Run an encoding closure against a fresh buffer
pub fn encode_to_vec(
    f: impl FnOnce(&mut Encoder<Vec<u8>>) -> Result<(), Error<Infallible>>,
) -> Result<Vec<u8>, EncodeError> {
    let mut e = Encoder::new(Vec::new());
    f(&mut e)?;
    Ok(e.into_writer())
}

/// Inputs in ledger order: sorted by transaction id, then output index
pub fn encode_inputs<'a, W: Write>(
    e: &mut Encoder<W>,
    inputs: impl ExactSizeIterator<Item = &'a UTxOIdentifier>,
) -> Result<(), Error<W::Error>> {
    e.array(inputs.len() as u64)?;
    for input in inputs {
        input.encode(e, &mut ())?;
    }
    Ok(())
}
