//! Interfaces to the outside world consumed by the transaction builder.
//!
//! Every call is blocking; timeouts and retries are the implementor's concern.

use crate::{
    address::Address,
    hash::{AddrKeyhash, TxHash},
    protocol_params::ProtocolParams,
    script::RedeemerPointer,
    types::{ExUnits, Lovelace, NetworkId, Slot, UTxOIdentifier, VKeyWitness},
    utxo::Utxo,
};
use anyhow::Result;
use std::collections::BTreeMap;

/// Execution budgets reported by an evaluator, keyed by redeemer pointer
pub type EvaluationResult = BTreeMap<RedeemerPointer, ExUnits>;

/// Chain backend: parameters, UTXO lookup, evaluation and submission
pub trait ChainContext: Send + Sync {
    fn protocol_params(&self) -> Result<ProtocolParams>;

    fn network(&self) -> NetworkId;

    fn tip(&self) -> Result<Slot>;

    /// All unspent outputs sitting at an address
    fn utxos(&self, address: &Address) -> Result<Vec<Utxo>>;

    fn utxo_by_ref(&self, input: &UTxOIdentifier) -> Result<Option<Utxo>>;

    /// Submit a signed transaction, returning its id
    fn submit_tx(&self, tx_cbor: &[u8]) -> Result<TxHash>;

    /// Run the scripts of a transaction and report their budgets
    fn evaluate_tx(&self, tx_cbor: &[u8]) -> Result<EvaluationResult>;

    /// Worst-case fee used for the preliminary selection target
    fn max_tx_fee(&self) -> Result<Lovelace> {
        Ok(self.protocol_params()?.max_tx_fee())
    }
}

/// Key holder that owns the funds and signs the transaction
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;

    fn payment_key_hash(&self) -> Option<AddrKeyhash>;

    fn stake_key_hash(&self) -> Option<AddrKeyhash>;

    /// Sign the hash of a transaction body
    fn sign_tx_body(&self, body_hash: &TxHash) -> Result<VKeyWitness>;
}
