//! Post-Alonzo output encoding and the minimum-UTxO size oracle

use crate::{error::EncodeError, utils::encode_to_vec, value::encode_value};
use keystone_common::{Lovelace, TxOutput};
use minicbor::{
    Encode, Encoder,
    encode::{Error, Write},
};
use tracing::debug;

/// Bytes of ledger bookkeeping charged on top of the encoded output
pub const OUTPUT_OVERHEAD: u64 = 160;

/// Upper bound on raise-and-re-encode rounds in [`ensure_min_utxo`]
pub const MIN_UTXO_ITERATIONS: usize = 3;

/// Map-form output `{0: address, 1: value, ?2: datum_option, ?3: script_ref}`
pub fn encode_output<W: Write>(e: &mut Encoder<W>, output: &TxOutput) -> Result<(), Error<W::Error>> {
    let len = 2 + output.datum.is_some() as u64 + output.script_ref.is_some() as u64;
    e.map(len)?;
    e.u8(0)?;
    output.address.encode(e, &mut ())?;
    e.u8(1)?;
    encode_value(e, &output.value)?;
    if let Some(datum) = &output.datum {
        e.u8(2)?;
        datum.encode(e, &mut ())?;
    }
    if let Some(script) = &output.script_ref {
        e.u8(3)?;
        script.encode(e, &mut ())?;
    }
    Ok(())
}

pub fn output_to_cbor(output: &TxOutput) -> Result<Vec<u8>, EncodeError> {
    encode_to_vec(|e| encode_output(e, output))
}

pub fn output_size(output: &TxOutput) -> Result<usize, EncodeError> {
    Ok(output_to_cbor(output)?.len())
}

/// `coins_per_utxo_byte * (encoded size + 160)`
pub fn min_lovelace(output: &TxOutput, coins_per_utxo_byte: Lovelace) -> Result<Lovelace, EncodeError> {
    let size = output_size(output)? as u64;
    Ok(coins_per_utxo_byte.saturating_mul(size + OUTPUT_OVERHEAD))
}

/// Raise the coin of `output` until it covers its own minimum.
///
/// A larger coin can widen its own integer encoding, so the threshold is
/// recomputed after every raise.
pub fn ensure_min_utxo(
    output: TxOutput,
    coins_per_utxo_byte: Lovelace,
) -> Result<TxOutput, EncodeError> {
    raise_to_min_utxo(output, coins_per_utxo_byte, MIN_UTXO_ITERATIONS)
}

/// [`ensure_min_utxo`] with at most `rounds` raises
pub fn raise_to_min_utxo(
    mut output: TxOutput,
    coins_per_utxo_byte: Lovelace,
    rounds: usize,
) -> Result<TxOutput, EncodeError> {
    for _ in 0..rounds {
        let required = min_lovelace(&output, coins_per_utxo_byte)?;
        if output.value.coin >= required {
            return Ok(output);
        }
        debug!(coin = output.value.coin, required, "Raising output to minimum UTxO");
        output.value.coin = required;
    }

    let required = min_lovelace(&output, coins_per_utxo_byte)?;
    if output.value.coin >= required {
        return Ok(output);
    }
    Err(EncodeError::MinUtxoNotConverged {
        iterations: rounds,
        coin: output.value.coin,
        required,
    })
}
