//! Fixtures shared by the builder integration tests
#![allow(dead_code)]

use keystone_cardano::{ExternalWallet, FixedChainContext, TxBuilder};
use keystone_common::{
    AddrKeyhash, Address, Credential, NetworkId, PlutusScript, PlutusVersion, ProtocolParams,
    ScriptHash, TxHash, TxOutput, UTxOIdentifier, Utxo, Value,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Base address whose payment key hash is `[byte; 28]` and stake key hash
/// `[byte + 1; 28]`
pub fn key_address(byte: u8) -> Address {
    Address::base(
        NetworkId::Testnet,
        Credential::AddrKeyHash(AddrKeyhash::new([byte; 28])),
        Credential::AddrKeyHash(AddrKeyhash::new([byte + 1; 28])),
    )
}

pub fn always_succeeds() -> PlutusScript {
    PlutusScript::new(PlutusVersion::V2, hex::decode("4e4d01000033222220051200120011").unwrap())
}

pub fn script_address(script: &PlutusScript) -> Address {
    Address::enterprise(NetworkId::Testnet, Credential::ScriptHash(script.compute_hash()))
}

pub fn utxo_at(address: Address, id: u8, value: Value) -> Utxo {
    Utxo::new(
        UTxOIdentifier::new(TxHash::new([id; 32]), 0),
        TxOutput::new(address, value),
    )
}

pub fn policy(byte: u8) -> ScriptHash {
    ScriptHash::new([byte; 28])
}

/// Default parameters plus a small V2 cost model
pub fn params() -> ProtocolParams {
    let mut params = ProtocolParams::default();
    params.cost_models.insert(PlutusVersion::V2, vec![205_665, 812, 1, 1, 1000, 571]);
    params
}

pub fn context_with(utxos: &[Utxo]) -> FixedChainContext {
    utxos
        .iter()
        .cloned()
        .fold(FixedChainContext::new(params(), NetworkId::Testnet), |context, utxo| {
            context.with_utxo(utxo)
        })
}

/// Builder funded from the UTxOs at `key_address(1)`
pub fn builder(context: FixedChainContext) -> TxBuilder {
    TxBuilder::new(Arc::new(context)).with_wallet(Arc::new(ExternalWallet::new(key_address(1))))
}

pub fn total_output(outputs: &[TxOutput]) -> u64 {
    outputs.iter().map(|output| output.coin()).sum()
}
