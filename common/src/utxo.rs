use crate::{
    address::Address,
    asset::Value,
    plutus::DatumOption,
    script::Script,
    types::{Lovelace, UTxOIdentifier},
};

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Address data
    pub address: Address,

    /// Output value (Lovelace + native assets)
    pub value: Value,

    /// Datum (Inline or Hash)
    pub datum: Option<DatumOption>,

    /// Reference script
    pub script_ref: Option<Script>,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script_ref: None,
        }
    }

    pub fn coin(&self) -> Lovelace {
        self.value.coin
    }
}

/// An unspent output together with the reference that consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub input: UTxOIdentifier,
    pub output: TxOutput,
}

impl Utxo {
    pub fn new(input: UTxOIdentifier, output: TxOutput) -> Self {
        Self { input, output }
    }

    pub fn value(&self) -> &Value {
        &self.output.value
    }

    pub fn address(&self) -> &Address {
        &self.output.address
    }

    /// Carries no native assets, so it can serve as collateral
    pub fn is_ada_only(&self) -> bool {
        !self.output.value.has_assets()
    }
}
