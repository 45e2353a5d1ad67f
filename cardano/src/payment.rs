use crate::error::BuilderError;
use keystone_codec::ensure_min_utxo;
use keystone_common::{
    Address, DatumOption, InputError, Lovelace, PlutusData, Script, TxOutput, Unit, Value,
};

/// A pending output: receiver, amount, optional datum and reference script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub address: Address,
    pub lovelace: Lovelace,
    pub units: Vec<Unit>,
    pub datum: Option<DatumOption>,
    pub script_ref: Option<Script>,
}

impl Payment {
    pub fn new(address: Address, lovelace: Lovelace, units: Vec<Unit>) -> Self {
        Self {
            address,
            lovelace,
            units,
            datum: None,
            script_ref: None,
        }
    }

    /// Payment carrying exactly `value`
    pub fn from_value(address: Address, value: &Value) -> Result<Self, BuilderError> {
        let units = value
            .positive_assets()
            .map(|(policy, name, quantity)| {
                let quantity = i64::try_from(quantity).map_err(|_| InputError::QuantityOutOfRange {
                    asset: format!("{policy}.{name}"),
                    quantity: quantity.to_string(),
                })?;
                Ok(Unit::new(&policy.to_string(), &name.to_string(), quantity))
            })
            .collect::<Result<Vec<_>, InputError>>()?;
        Ok(Self::new(address, value.coin, units))
    }

    pub fn with_inline_datum(mut self, datum: PlutusData) -> Self {
        self.datum = Some(DatumOption::Inline(datum));
        self
    }

    pub fn with_datum_hash(mut self, datum: &PlutusData) -> Self {
        self.datum = Some(DatumOption::Hash(datum.hash()));
        self
    }

    pub fn with_reference_script(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }

    /// Lovelace plus units. Units must be positive: burns belong to minting.
    pub fn value(&self) -> Result<Value, BuilderError> {
        let mut value = Value::new(self.lovelace);
        for unit in &self.units {
            if unit.quantity < 0 {
                return Err(InputError::NegativeQuantity {
                    unit: unit.to_string(),
                    quantity: unit.quantity,
                }
                .into());
            }
            value = value.checked_add(&unit.to_value()?)?;
        }
        Ok(value)
    }

    /// The concrete output, with its coin raised to the minimum UTxO
    pub fn to_output(&self, coins_per_utxo_byte: Lovelace) -> Result<TxOutput, BuilderError> {
        let output = TxOutput {
            address: self.address,
            value: self.value()?,
            datum: self.datum.clone(),
            script_ref: self.script_ref.clone(),
        };
        Ok(ensure_min_utxo(output, coins_per_utxo_byte)?)
    }
}
