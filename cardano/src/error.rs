use dashu_int::IBig;
use keystone_codec::EncodeError;
use keystone_common::{AssetName, InputError, Lovelace, PolicyId, ValueError};
use thiserror::Error;

/// Everything that can go wrong while building a transaction
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Encode(EncodeError),

    /// **Cause:** The UTxO pool cannot cover the required lovelace
    #[error("Insufficient funds: required {required} lovelace, {available} available")]
    InsufficientFunds {
        required: Lovelace,
        available: Lovelace,
    },

    /// **Cause:** No combination of unused UTxOs holds enough of an asset
    #[error("Missing asset {policy}.{name}: short by {missing}")]
    MissingAsset {
        policy: PolicyId,
        name: AssetName,
        missing: IBig,
    },

    /// **Cause:** Scripts run but no ADA-only UTxO covers the collateral target
    #[error("No UTxO eligible as collateral for {target} lovelace")]
    NoCollateral { target: Lovelace },

    /// **Cause:** Change carrying assets is short of its minimum and the pool is empty
    #[error("No UTxOs left to fund change: short by {shortfall} lovelace")]
    NoUtxosForChange { shortfall: Lovelace },

    /// **Cause:** The fee kept growing past the iteration bound
    #[error("Fee did not converge after {iterations} iterations (last fee {fee})")]
    FeeNotConverged { iterations: usize, fee: Lovelace },

    /// **Cause:** An output's minimum kept growing past the iteration bound
    #[error("Minimum UTxO did not converge (coin {coin}, required {required})")]
    MinUtxoNotConverged { coin: Lovelace, required: Lovelace },

    /// **Cause:** A fee or collateral amount computed from protocol prices
    /// does not fit in a lovelace quantity
    #[error("{what} overflows a lovelace quantity")]
    ArithmeticOverflow { what: &'static str },

    /// **Cause:** The transaction is larger than the protocol allows
    #[error("Transaction of {size} bytes exceeds the maximum of {max}")]
    TxTooLarge { size: usize, max: u32 },

    /// **Cause:** `finalize` was called on a builder that already holds a transaction
    #[error("Transaction already finalized")]
    AlreadyFinalized,

    /// **Cause:** `finalize` was called again after an earlier attempt failed
    #[error("A previous finalize attempt failed; build a new transaction")]
    FinalizeFailed,

    /// **Cause:** The finished transaction was requested before `finalize`
    #[error("Transaction not finalized")]
    NotFinalized,

    /// **Cause:** A redeemer targets an input, policy or withdrawal that is
    /// not part of the transaction
    #[error("Redeemer for {0} has no matching item in the transaction")]
    OrphanRedeemer(String),

    /// **Cause:** Neither a change address nor a wallet was given
    #[error("No change address: set one or attach a wallet")]
    NoChangeAddress,

    /// **Cause:** The chain context or wallet reported an error
    #[error("Backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<EncodeError> for BuilderError {
    fn from(error: EncodeError) -> Self {
        match error {
            EncodeError::MinUtxoNotConverged { coin, required, .. } => {
                BuilderError::MinUtxoNotConverged { coin, required }
            }
            other => BuilderError::Encode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_utxo_failure_keeps_its_amounts() {
        let error = BuilderError::from(EncodeError::MinUtxoNotConverged {
            iterations: 1,
            coin: 840_450,
            required: 857_690,
        });
        assert!(matches!(
            error,
            BuilderError::MinUtxoNotConverged { coin: 840_450, required: 857_690 }
        ));
    }

    #[test]
    fn other_encode_failures_pass_through() {
        let error = BuilderError::from(EncodeError::Cbor("bad".to_string()));
        assert!(matches!(error, BuilderError::Encode(EncodeError::Cbor(_))));
    }
}
