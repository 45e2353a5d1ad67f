use crate::{
    rational_number::RationalNumber,
    script::PlutusVersion,
    types::{ExUnits, Lovelace},
};
use std::collections::BTreeMap;

/// Cost model parameter vectors, per Plutus language version
pub type CostModels = BTreeMap<PlutusVersion, Vec<i64>>;

/// The subset of Conway protocol parameters a transaction builder needs
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProtocolParams {
    /// Fee per byte of transaction (AKA minFeeA)
    pub min_fee_a: u64,

    /// Constant fee per transaction (AKA minFeeB)
    pub min_fee_b: u64,

    pub max_tx_size: u32,

    /// Upper bound on the encoded size of a single output value
    pub max_value_size: u32,

    /// Stake key registration deposit
    pub key_deposit: Lovelace,

    /// Pool registration deposit
    pub pool_deposit: Lovelace,

    pub coins_per_utxo_byte: Lovelace,

    /// Collateral required, as a percentage of the fee
    pub collateral_percent: u32,

    pub max_collateral_inputs: u32,

    /// Price of one unit of script memory
    pub price_mem: RationalNumber,

    /// Price of one script CPU step
    pub price_step: RationalNumber,

    pub max_tx_ex_units: ExUnits,

    #[serde(default)]
    pub cost_models: CostModels,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            max_tx_size: 16_384,
            max_value_size: 5_000,
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            coins_per_utxo_byte: 4_310,
            collateral_percent: 150,
            max_collateral_inputs: 3,
            price_mem: RationalNumber::new(577, 10_000),
            price_step: RationalNumber::new(721, 10_000_000),
            max_tx_ex_units: ExUnits::new(14_000_000, 10_000_000_000),
            cost_models: CostModels::new(),
        }
    }
}

impl ProtocolParams {
    /// Fee of a transaction of the maximum size, without script costs
    pub fn max_tx_fee(&self) -> Lovelace {
        (self.max_tx_size as u64).saturating_mul(self.min_fee_a).saturating_add(self.min_fee_b)
    }

    /// Fee for `size` bytes, ignoring script execution
    pub fn size_fee(&self, size: usize) -> Lovelace {
        (size as u64).saturating_mul(self.min_fee_a).saturating_add(self.min_fee_b)
    }

    pub fn cost_model(&self, version: PlutusVersion) -> Option<&Vec<i64>> {
        self.cost_models.get(&version)
    }

    pub fn with_cost_model(mut self, version: PlutusVersion, model: Vec<i64>) -> Self {
        self.cost_models.insert(version, model);
        self
    }
}
