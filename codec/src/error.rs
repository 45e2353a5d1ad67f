use keystone_common::{Lovelace, PlutusVersion};
use thiserror::Error;

/// Failures while producing the canonical binary form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// **Cause:** The CBOR writer rejected a value, e.g. an out of range quantity
    #[error("CBOR encoding failed: {0}")]
    Cbor(String),

    /// **Cause:** A script of this language is used but the protocol
    /// parameters carry no cost model for it
    #[error("No cost model for {0:?}")]
    MissingCostModel(PlutusVersion),

    /// **Cause:** Raising the coin of an output kept growing its own
    /// minimum past the iteration bound
    #[error("Minimum UTxO did not converge after {iterations} iterations (coin {coin}, required {required})")]
    MinUtxoNotConverged {
        iterations: usize,
        coin: Lovelace,
        required: Lovelace,
    },
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for EncodeError {
    fn from(error: minicbor::encode::Error<E>) -> Self {
        EncodeError::Cbor(error.to_string())
    }
}
