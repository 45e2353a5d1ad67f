use config::Config;
use serde::Deserialize;

use crate::types::Lovelace;

pub const CONFIG_KEY_EX_UNITS_MARGIN: &str = "builder.ex-units-margin-percent";
pub const CONFIG_KEY_ESTIMATE_EX_UNITS: &str = "builder.estimate-ex-units";
pub const CONFIG_KEY_COLLATERAL_FALLBACK: &str = "builder.collateral-fallback";
pub const CONFIG_KEY_FEE_PADDING: &str = "builder.fee-padding";
pub const CONFIG_KEY_MAX_FEE_ITERATIONS: &str = "builder.max-fee-iterations";

const DEFAULT_EX_UNITS_MARGIN: u64 = 20;
const DEFAULT_COLLATERAL_FALLBACK: Lovelace = 5_000_000;
const DEFAULT_MAX_FEE_ITERATIONS: usize = 3;

/// Policy knobs of the transaction builder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuilderConfig {
    /// Safety margin added to evaluator budgets, in percent
    pub ex_units_margin_percent: u64,

    /// Ask the chain context to evaluate script budgets before balancing
    pub estimate_ex_units: bool,

    /// Collateral target when no other source is available
    pub collateral_fallback: Lovelace,

    /// Added to every fee estimate
    pub fee_padding: Lovelace,

    pub max_fee_iterations: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            ex_units_margin_percent: DEFAULT_EX_UNITS_MARGIN,
            estimate_ex_units: true,
            collateral_fallback: DEFAULT_COLLATERAL_FALLBACK,
            fee_padding: 0,
            max_fee_iterations: DEFAULT_MAX_FEE_ITERATIONS,
        }
    }
}

impl BuilderConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ex_units_margin_percent: config
                .get::<u64>(CONFIG_KEY_EX_UNITS_MARGIN)
                .unwrap_or(DEFAULT_EX_UNITS_MARGIN),
            estimate_ex_units: config.get::<bool>(CONFIG_KEY_ESTIMATE_EX_UNITS).unwrap_or(true),
            collateral_fallback: config
                .get::<Lovelace>(CONFIG_KEY_COLLATERAL_FALLBACK)
                .unwrap_or(DEFAULT_COLLATERAL_FALLBACK),
            fee_padding: config.get::<Lovelace>(CONFIG_KEY_FEE_PADDING).unwrap_or(0),
            max_fee_iterations: config
                .get::<usize>(CONFIG_KEY_MAX_FEE_ITERATIONS)
                .unwrap_or(DEFAULT_MAX_FEE_ITERATIONS)
                .max(1),
        }
    }
}
