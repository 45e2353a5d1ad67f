//! Fee and change convergence.
//!
//! The fee depends on the encoded size, the size depends on the change
//! output and the change depends on the fee. [`Balancer::balance`] runs a
//! bounded fixed-point iteration over that cycle, pulling extra UTxOs from
//! the pool whenever the inputs stop covering outputs plus fee.

use crate::error::BuilderError;
use crate::redeemers::{PendingRedeemers, RedeemerLayout};
use crate::selection::{select_coins, sorted_candidates};
use keystone_codec::{
    Transaction, TransactionBody, WitnessSet, encode_to_vec, encode_value, ensure_min_utxo,
    min_lovelace, script_data_hash,
};
use keystone_common::configuration::BuilderConfig;
use keystone_common::rational_number::{ceil_to_u64, scale};
use keystone_common::{
    Address, CostModels, ExUnits, Lovelace, Metadata, MultiAsset, PlutusVersion, ProtocolParams,
    TxOutput, UTxOIdentifier, Utxo, VKeyWitness, Value, total_deposit, total_refund,
};
use dashu_int::IBig;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Everything of a transaction except its spending inputs, change and fee
#[derive(Debug, Clone, Default)]
pub struct Draft {
    /// Template body: payment outputs, certificates, mint, collateral and
    /// the other fixed fields. Inputs and fee are filled in per round.
    pub body: TransactionBody,

    /// Scripts and datums; redeemers are placed per round
    pub witness_set: WitnessSet,

    pub redeemers: PendingRedeemers,
    pub metadata: Option<Metadata>,

    /// Plutus versions whose cost models enter the script data hash
    pub plutus_versions: BTreeSet<PlutusVersion>,

    /// Stake keys that must sign for withdrawals and certificates
    pub stake_witnesses: usize,
}

impl Draft {
    /// Concrete transaction for one choice of inputs, change and fee
    pub fn assemble(
        &self,
        inputs: &[Utxo],
        change: &[TxOutput],
        fee: Lovelace,
        cost_models: &CostModels,
    ) -> Result<Transaction, BuilderError> {
        let mut body = self.body.clone();
        body.inputs.extend(inputs.iter().map(|utxo| utxo.input));
        body.outputs.extend(change.iter().cloned());
        body.fee = fee;

        let redeemers = RedeemerLayout::new(&body).assign(&self.redeemers)?;
        body.script_data_hash = script_data_hash(
            &redeemers,
            &self.witness_set.plutus_data,
            &self.plutus_versions,
            cost_models,
        )?;

        let mut witness_set = self.witness_set.clone();
        witness_set.redeemers = redeemers;
        Ok(Transaction::new(body, witness_set, self.metadata.clone()))
    }

    /// Sum of the execution budgets of every pending redeemer
    pub fn total_ex_units(&self) -> ExUnits {
        self.redeemers
            .values()
            .fold(ExUnits::default(), |total, redeemer| total + redeemer.ex_units)
    }

    /// Value entering the transaction besides inputs: positive mints,
    /// withdrawals and deposit refunds
    pub fn extra_supply(&self, params: &ProtocolParams) -> Result<Value, BuilderError> {
        let (minted, _) = split_mint(self.body.mint.as_ref());
        let withdrawn: Lovelace = self.body.withdrawals.values().map(|(_, amount)| *amount).sum();
        let refunds = total_refund(&self.body.certificates, params);
        Ok(minted
            .checked_add(&Value::new(withdrawn))?
            .checked_add(&Value::new(refunds))?)
    }

    /// Value leaving the transaction besides the fee: payment outputs,
    /// burns and deposits
    pub fn base_demand(&self, params: &ProtocolParams) -> Result<Value, BuilderError> {
        let (_, burned) = split_mint(self.body.mint.as_ref());
        let deposits = total_deposit(&self.body.certificates, params);
        let mut demand = burned.checked_add(&Value::new(deposits))?;
        for output in &self.body.outputs {
            demand = demand.checked_add(&output.value)?;
        }
        Ok(demand)
    }
}

/// Positive mint quantities and burnt quantities, both as positive values
pub fn split_mint(mint: Option<&MultiAsset>) -> (Value, Value) {
    let mut minted = Value::default();
    let mut burned = Value::default();
    for (policy, names) in mint.into_iter().flatten() {
        for (name, quantity) in names {
            if *quantity > IBig::ZERO {
                minted.add_asset(*policy, *name, quantity.clone());
            } else if *quantity < IBig::ZERO {
                burned.add_asset(*policy, *name, -quantity.clone());
            }
        }
    }
    (minted, burned)
}

/// Execution cost, `ceil(mem * price_mem + steps * price_step)`
pub fn script_fee(units: ExUnits, params: &ProtocolParams) -> Result<Lovelace, BuilderError> {
    let cost = scale(units.mem, &params.price_mem) + scale(units.steps, &params.price_step);
    ceil_to_u64(&cost).map_err(|_| BuilderError::ArithmeticOverflow {
        what: "Script execution fee",
    })
}

/// Change outputs for one round, plus lovelace too small to pay out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
    pub outputs: Vec<TxOutput>,
    pub dust: Lovelace,
}

/// A balanced transaction and the spending inputs it ended up with
#[derive(Debug, Clone)]
pub struct Balanced {
    pub tx: Transaction,
    pub inputs: Vec<Utxo>,
}

pub struct Balancer<'a> {
    pub params: &'a ProtocolParams,
    pub config: &'a BuilderConfig,

    /// UTxOs that may be pulled in when the inputs fall short
    pub pool: &'a [Utxo],
    pub change_address: Address,

    /// Explicit fee; estimation is skipped
    pub fixed_fee: Option<Lovelace>,
    pub fee_padding: Lovelace,
}

impl Balancer<'_> {
    /// Iterate fee, change and inputs until the fee stops growing
    pub fn balance(&self, draft: &Draft, mut inputs: Vec<Utxo>) -> Result<Balanced, BuilderError> {
        let mut used: BTreeSet<UTxOIdentifier> = inputs.iter().map(|utxo| utxo.input).collect();
        let scripts = script_fee(draft.total_ex_units(), self.params)?;
        let extra_supply = draft.extra_supply(self.params)?;
        let base_demand = draft.base_demand(self.params)?;

        let mut fee = match self.fixed_fee {
            Some(fee) => fee,
            None => {
                let tx = draft.assemble(&inputs, &[], 0, &self.params.cost_models)?;
                self.estimate(&tx, scripts, draft.stake_witnesses)?.0
            }
        };

        for iteration in 1..=self.config.max_fee_iterations {
            let change = self.fund_change(
                &mut inputs,
                &mut used,
                &extra_supply,
                &base_demand.checked_add(&Value::new(fee))?,
            )?;
            let tx = draft.assemble(
                &inputs,
                &change.outputs,
                fee.saturating_add(change.dust),
                &self.params.cost_models,
            )?;
            let (estimated, size) = self.estimate(&tx, scripts, draft.stake_witnesses)?;
            debug!(
                iteration,
                fee,
                estimated,
                size,
                inputs = inputs.len(),
                change_outputs = change.outputs.len(),
                dust = change.dust,
                "Fee iteration"
            );

            if self.fixed_fee.is_some() || estimated <= fee {
                if size > self.params.max_tx_size as usize {
                    return Err(BuilderError::TxTooLarge {
                        size,
                        max: self.params.max_tx_size,
                    });
                }
                info!(fee = tx.body.fee, size, iterations = iteration, "Balanced transaction");
                return Ok(Balanced { tx, inputs });
            }
            fee = estimated;
        }

        Err(BuilderError::FeeNotConverged {
            iterations: self.config.max_fee_iterations,
            fee,
        })
    }

    /// Fee of `tx` once signed, and the signed size. Every required signer,
    /// every stake key and the primary signer contribute one placeholder
    /// witness.
    fn estimate(
        &self,
        tx: &Transaction,
        scripts: Lovelace,
        stake_witnesses: usize,
    ) -> Result<(Lovelace, usize), BuilderError> {
        let mut dummy = tx.clone();
        let witnesses = 1 + tx.body.required_signers.len() + stake_witnesses;
        dummy.witness_set.vkey_witnesses = vec![VKeyWitness::placeholder(); witnesses];
        let size = dummy.size()?;
        let fee = self
            .params
            .size_fee(size)
            .saturating_add(scripts)
            .saturating_add(self.fee_padding);
        Ok((fee, size))
    }

    /// Change for the current inputs, pulling more UTxOs until the inputs
    /// cover `demand` and any asset-bearing change meets its minimum
    fn fund_change(
        &self,
        inputs: &mut Vec<Utxo>,
        used: &mut BTreeSet<UTxOIdentifier>,
        extra_supply: &Value,
        demand: &Value,
    ) -> Result<Change, BuilderError> {
        loop {
            let mut supply = extra_supply.clone();
            for utxo in inputs.iter() {
                supply = supply.checked_add(utxo.value())?;
            }

            // The ledger rejects a transaction without spending inputs
            if inputs.is_empty() {
                let first = sorted_candidates(self.pool, used).first().map(|utxo| (*utxo).clone());
                match first {
                    Some(utxo) => {
                        self.take(inputs, used, vec![utxo]);
                        continue;
                    }
                    None => {
                        return Err(BuilderError::InsufficientFunds {
                            required: demand.coin,
                            available: supply.coin,
                        });
                    }
                }
            }

            if !supply.greater_or_equal(demand) {
                let picks = select_coins(self.pool, used, demand, &supply)?;
                if picks.is_empty() {
                    return Err(BuilderError::InsufficientFunds {
                        required: demand.coin,
                        available: supply.coin,
                    });
                }
                self.take(inputs, used, picks);
                continue;
            }

            let change = supply.checked_sub(demand)?;
            match self.plan_change(change)? {
                Ok(change) if change.dust > 0 => {
                    let picks = self.top_up_dust(used, change.dust)?;
                    if picks.is_empty() {
                        debug!(dust = change.dust, "No UTxO left to lift change, adding it to the fee");
                        return Ok(change);
                    }
                    self.take(inputs, used, picks);
                }
                Ok(change) => return Ok(change),
                Err(shortfall) => {
                    debug!(shortfall, "Change short of its minimum, pulling another UTxO");
                    let picks =
                        select_coins(self.pool, used, &Value::new(shortfall), &Value::default())
                            .map_err(|error| match error {
                                BuilderError::InsufficientFunds { .. } => {
                                    BuilderError::NoUtxosForChange { shortfall }
                                }
                                other => other,
                            })?;
                    self.take(inputs, used, picks);
                }
            }
        }
    }

    /// Unused ADA-only UTxOs that lift `dust` to a payable change output,
    /// or none when the pool cannot
    fn top_up_dust(
        &self,
        used: &BTreeSet<UTxOIdentifier>,
        dust: Lovelace,
    ) -> Result<Vec<Utxo>, BuilderError> {
        let output = TxOutput::new(self.change_address, Value::new(dust));
        let shortfall =
            min_lovelace(&output, self.params.coins_per_utxo_byte)?.saturating_sub(dust);
        let ada_only: Vec<Utxo> =
            self.pool.iter().filter(|utxo| utxo.is_ada_only()).cloned().collect();
        match select_coins(&ada_only, used, &Value::new(shortfall), &Value::default()) {
            Ok(picks) => Ok(picks),
            Err(BuilderError::InsufficientFunds { .. }) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    fn take(&self, inputs: &mut Vec<Utxo>, used: &mut BTreeSet<UTxOIdentifier>, picks: Vec<Utxo>) {
        for utxo in picks {
            debug!(input = %utxo.input, coin = utxo.output.coin(), "Adding input");
            used.insert(utxo.input);
            inputs.push(utxo);
        }
    }

    /// Turn a change value into outputs. `Err(shortfall)` means the change
    /// carries assets but too little lovelace for its outputs.
    fn plan_change(&self, change: Value) -> Result<Result<Change, Lovelace>, BuilderError> {
        let cpb = self.params.coins_per_utxo_byte;

        if !change.has_assets() {
            if change.coin == 0 {
                return Ok(Ok(Change::default()));
            }
            let output = TxOutput::new(self.change_address, change.coin_only());
            let required = min_lovelace(&output, cpb)?;
            if output.coin() < required {
                debug!(dust = output.coin(), required, "Change below minimum");
                return Ok(Ok(Change {
                    outputs: Vec::new(),
                    dust: output.coin(),
                }));
            }
            return Ok(Ok(Change {
                outputs: vec![output],
                dust: 0,
            }));
        }

        let bundles = self.split_assets(&change)?;
        let mut outputs = Vec::with_capacity(bundles.len());
        let mut remaining = change.coin;
        let mut shortfall: Lovelace = 0;
        let last = bundles.len() - 1;
        for (index, bundle) in bundles.into_iter().enumerate() {
            let mut output = TxOutput::new(self.change_address, bundle);
            if index < last {
                output = ensure_min_utxo(output, cpb)?;
                if output.coin() > remaining {
                    shortfall = shortfall.saturating_add(output.coin() - remaining);
                    remaining = 0;
                } else {
                    remaining -= output.coin();
                }
            } else {
                output.value.coin = remaining;
                let required = min_lovelace(&output, cpb)?;
                if remaining < required {
                    shortfall = shortfall.saturating_add(required - remaining);
                }
            }
            outputs.push(output);
        }

        if shortfall > 0 {
            return Ok(Err(shortfall));
        }
        if outputs.len() > 1 {
            debug!(outputs = outputs.len(), "Split change across outputs");
        }
        Ok(Ok(Change { outputs, dust: 0 }))
    }

    /// Group the change assets so that no group's encoded value exceeds
    /// the protocol's maximum value size
    fn split_assets(&self, change: &Value) -> Result<Vec<Value>, BuilderError> {
        let limit = self.params.max_value_size as usize;
        let value_size = |value: &Value| -> Result<usize, BuilderError> {
            Ok(encode_to_vec(|e| encode_value(e, value))?.len())
        };

        let mut bundles = Vec::new();
        let mut current = Value::new(change.coin);
        for (policy, name, quantity) in change.positive_assets() {
            let mut candidate = current.clone();
            candidate.add_asset(*policy, *name, quantity.clone());
            if current.has_assets() && value_size(&candidate)? > limit {
                bundles.push(current);
                current = Value::new(change.coin);
                current.add_asset(*policy, *name, quantity.clone());
            } else {
                current = candidate;
            }
        }
        bundles.push(current);

        for bundle in bundles.iter_mut() {
            bundle.coin = 0;
        }
        Ok(bundles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_common::rational_number::RationalNumber;
    use keystone_common::{
        AddrKeyhash, AssetName, Credential, NetworkId, PolicyId, TxHash,
    };

    fn address() -> Address {
        Address::enterprise(
            NetworkId::Testnet,
            Credential::AddrKeyHash(AddrKeyhash::new([6; 28])),
        )
    }

    fn utxo(id: u8, value: Value) -> Utxo {
        Utxo::new(
            UTxOIdentifier::new(TxHash::new([id; 32]), 0),
            TxOutput::new(address(), value),
        )
    }

    fn draft_paying(coin: Lovelace) -> Draft {
        let mut draft = Draft::default();
        draft.body.outputs.push(TxOutput::new(address(), Value::new(coin)));
        draft.body.network_id = Some(NetworkId::Testnet);
        draft
    }

    fn balancer<'a>(
        params: &'a ProtocolParams,
        config: &'a BuilderConfig,
        pool: &'a [Utxo],
    ) -> Balancer<'a> {
        Balancer {
            params,
            config,
            pool,
            change_address: address(),
            fixed_fee: None,
            fee_padding: 0,
        }
    }

    fn assets(count: u8) -> Value {
        let mut value = Value::default();
        for i in 0..count {
            value.add_asset(
                PolicyId::new([i; 28]),
                AssetName::new(&[i; 32]).unwrap(),
                IBig::from(1_000_000),
            );
        }
        value
    }

    #[test]
    fn script_fee_rounds_up_once() {
        let params = ProtocolParams::default();
        // 0.0577 * 1000 + 0.0000721 * 1000 = 57.7721
        assert_eq!(script_fee(ExUnits::new(1000, 1000), &params).unwrap(), 58);
        assert_eq!(script_fee(ExUnits::default(), &params).unwrap(), 0);
    }

    #[test]
    fn split_mint_separates_burns() {
        let mut mint = Value::default();
        mint.add_asset(PolicyId::new([1; 28]), AssetName::new(b"a").unwrap(), IBig::from(5));
        mint.add_asset(PolicyId::new([2; 28]), AssetName::new(b"b").unwrap(), IBig::from(-3));
        let (minted, burned) = split_mint(mint.assets.as_ref());
        assert_eq!(
            minted.quantity(&PolicyId::new([1; 28]), &AssetName::new(b"a").unwrap()),
            IBig::from(5)
        );
        assert_eq!(
            burned.quantity(&PolicyId::new([2; 28]), &AssetName::new(b"b").unwrap()),
            IBig::from(3)
        );
    }

    #[test]
    fn simple_payment_balances_exactly() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![utxo(1, Value::new(10_000_000))];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), pool.clone())
            .unwrap();

        let body = &balanced.tx.body;
        assert_eq!(body.outputs.len(), 2);
        let out: Lovelace = body.outputs.iter().map(|o| o.coin()).sum();
        assert_eq!(out + body.fee, 10_000_000);
        assert!(body.fee >= params.min_fee_b);
    }

    #[test]
    fn fee_covers_the_signed_size() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![utxo(1, Value::new(10_000_000))];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), pool.clone())
            .unwrap();
        let mut signed = balanced.tx.clone();
        signed.witness_set.vkey_witnesses = vec![VKeyWitness::placeholder()];
        let size = signed.size().unwrap();
        assert!(balanced.tx.body.fee >= params.size_fee(size));
    }

    #[test]
    fn dust_change_goes_to_fee() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        // leaves roughly 100k of change, far below the minimum
        let pool = vec![utxo(1, Value::new(2_270_000))];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), pool.clone())
            .unwrap();
        let body = &balanced.tx.body;
        assert_eq!(body.outputs.len(), 1);
        assert_eq!(body.fee, 270_000);
    }

    #[test]
    fn dust_change_is_lifted_by_an_unused_utxo() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![
            utxo(1, Value::new(2_270_000)),
            utxo(2, Value::new(5_000_000)),
        ];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), vec![pool[0].clone()])
            .unwrap();
        let body = &balanced.tx.body;
        assert_eq!(balanced.inputs.len(), 2);
        assert_eq!(body.outputs.len(), 2);
        assert!(body.fee < 270_000);
        assert!(body.outputs[1].coin() >= min_lovelace(&body.outputs[1], params.coins_per_utxo_byte).unwrap());
        let out: Lovelace = body.outputs.iter().map(|o| o.coin()).sum();
        assert_eq!(out + body.fee, 7_270_000);
    }

    #[test]
    fn dust_stays_in_the_fee_when_only_asset_utxos_remain() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![
            utxo(1, Value::new(2_270_000)),
            utxo(2, Value::new(5_000_000).checked_add(&assets(1)).unwrap()),
        ];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), vec![pool[0].clone()])
            .unwrap();
        assert_eq!(balanced.inputs.len(), 1);
        assert_eq!(balanced.tx.body.outputs.len(), 1);
        assert_eq!(balanced.tx.body.fee, 270_000);
    }

    #[test]
    fn fee_that_keeps_growing_is_reported() {
        let params = ProtocolParams::default();
        let config = BuilderConfig {
            max_fee_iterations: 1,
            ..Default::default()
        };
        let pool = vec![utxo(1, Value::new(10_000_000))];
        // the first estimate has no change output, so one round cannot settle
        let result = balancer(&params, &config, &pool).balance(&draft_paying(2_000_000), pool.clone());
        assert!(matches!(result, Err(BuilderError::FeeNotConverged { iterations: 1, .. })));
    }

    #[test]
    fn script_fee_overflow_is_typed() {
        let params = ProtocolParams {
            price_mem: RationalNumber::new(2, 1),
            ..Default::default()
        };
        assert!(matches!(
            script_fee(ExUnits::new(u64::MAX, 0), &params),
            Err(BuilderError::ArithmeticOverflow { .. })
        ));
    }

    #[test]
    fn inputs_are_pulled_when_short() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![
            utxo(1, Value::new(2_000_000)),
            utxo(2, Value::new(3_000_000)),
        ];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), vec![pool[0].clone()])
            .unwrap();
        assert_eq!(balanced.inputs.len(), 2);
        assert_eq!(balanced.tx.body.inputs.len(), 2);
    }

    #[test]
    fn asset_change_short_of_minimum_without_pool_fails() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let only = utxo(1, Value::new(2_300_000).checked_add(&assets(1)).unwrap());
        let pool = vec![only.clone()];
        let result = balancer(&params, &config, &pool).balance(&draft_paying(2_000_000), pool.clone());
        assert!(matches!(result, Err(BuilderError::NoUtxosForChange { .. })));
    }

    #[test]
    fn explicit_fee_is_kept() {
        let params = ProtocolParams::default();
        let config = BuilderConfig::default();
        let pool = vec![utxo(1, Value::new(10_000_000))];
        let mut balancer = balancer(&params, &config, &pool);
        balancer.fixed_fee = Some(300_000);
        let balanced = balancer.balance(&draft_paying(2_000_000), pool.clone()).unwrap();
        assert_eq!(balanced.tx.body.fee, 300_000);
        assert_eq!(balanced.tx.body.outputs[1].coin(), 7_700_000);
    }

    #[test]
    fn large_asset_change_is_split() {
        let params = ProtocolParams {
            max_value_size: 400,
            ..Default::default()
        };
        let config = BuilderConfig::default();
        let pool = vec![utxo(1, Value::new(50_000_000).checked_add(&assets(12)).unwrap())];
        let balanced = balancer(&params, &config, &pool)
            .balance(&draft_paying(2_000_000), pool.clone())
            .unwrap();

        let change = &balanced.tx.body.outputs[1..];
        assert!(change.len() > 1);
        for output in change {
            let size = encode_to_vec(|e| encode_value(e, &output.value)).unwrap().len();
            assert!(size <= 400);
            assert!(output.coin() >= min_lovelace(output, params.coins_per_utxo_byte).unwrap());
        }
        let mut total = Value::default();
        for output in &balanced.tx.body.outputs {
            total = total.checked_add(&output.value).unwrap();
        }
        total.coin += balanced.tx.body.fee;
        assert_eq!(total, pool[0].output.value);
    }

    #[test]
    fn oversized_transaction_is_rejected() {
        let params = ProtocolParams {
            max_tx_size: 100,
            ..Default::default()
        };
        let config = BuilderConfig::default();
        let pool = vec![utxo(1, Value::new(10_000_000))];
        let result = balancer(&params, &config, &pool).balance(&draft_paying(2_000_000), pool.clone());
        assert!(matches!(result, Err(BuilderError::TxTooLarge { max: 100, .. })));
    }
}
