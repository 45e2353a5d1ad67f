//! Script-executing transactions: redeemer placement, collateral and
//! execution budget evaluation

mod common;

use anyhow::anyhow;
use common::*;
use keystone_cardano::{BuilderError, FixedChainContext};
use keystone_common::{
    EvaluationResult, ExUnits, PlutusData, RedeemerPointer, RedeemerTag, Script, Unit, Utxo,
    Value,
};
use pallas_traverse::MultiEraTx;

fn spend(index: u32) -> RedeemerPointer {
    RedeemerPointer::new(RedeemerTag::Spend, index)
}

fn funded(extra: &[Utxo]) -> Vec<Utxo> {
    let mut utxos = vec![
        utxo_at(key_address(1), 1, Value::new(10_000_000)),
        utxo_at(key_address(1), 2, Value::new(5_000_000)),
    ];
    utxos.extend_from_slice(extra);
    utxos
}

// =============================================================================
// Redeemer placement
// =============================================================================

#[test]
fn spend_redeemers_follow_input_order() {
    init_tracing();
    let script = always_succeeds();
    let first = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let second = utxo_at(script_address(&script), 20, Value::new(5_000_000));
    let mut builder = builder(context_with(&funded(&[])));
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(script))
        // attached in reverse ledger order
        .collect_from(second.clone(), PlutusData::Integer(2), ExUnits::new(1000, 1000))
        .collect_from(first.clone(), PlutusData::Integer(1), ExUnits::new(1000, 1000))
        .pay_to_address(key_address(3), 2_000_000, vec![])
        .unwrap();
    let tx = builder.finalize().unwrap();

    assert_eq!(tx.body.inputs.iter().copied().collect::<Vec<_>>(), vec![first.input, second.input]);
    let redeemers = &tx.witness_set.redeemers;
    assert_eq!(redeemers[&spend(0)].data, PlutusData::Integer(1));
    assert_eq!(redeemers[&spend(1)].data, PlutusData::Integer(2));
    assert!(tx.body.script_data_hash.is_some());
}

#[test]
fn mint_redeemers_follow_policy_order() {
    let mut builder = builder(context_with(&funded(&[])));
    let (low, high) = (policy(0xaa).to_string(), policy(0xbb).to_string());
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(always_succeeds()))
        .mint_assets_with_redeemer(
            Unit::new(&high, "6869", 5),
            PlutusData::Integer(2),
            ExUnits::new(500, 500),
        )
        .unwrap()
        .mint_assets_with_redeemer(
            Unit::new(&low, "6c6f", 5),
            PlutusData::Integer(1),
            ExUnits::new(500, 500),
        )
        .unwrap();
    let tx = builder.finalize().unwrap();

    let redeemers = &tx.witness_set.redeemers;
    assert_eq!(
        redeemers[&RedeemerPointer::new(RedeemerTag::Mint, 0)].data,
        PlutusData::Integer(1)
    );
    assert_eq!(
        redeemers[&RedeemerPointer::new(RedeemerTag::Mint, 1)].data,
        PlutusData::Integer(2)
    );
}

// =============================================================================
// Collateral
// =============================================================================

#[test]
fn collateral_is_the_smallest_sufficient_unused_utxo() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let mut builder = builder(context_with(&funded(&[])));
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(script))
        .collect_from(locked.clone(), PlutusData::unit(), ExUnits::new(1000, 1000))
        .pay_to_address(key_address(3), 2_000_000, vec![])
        .unwrap();
    let tx = builder.finalize().unwrap().clone();

    let collateral: Vec<_> = tx.body.collateral.iter().collect();
    assert_eq!(collateral.len(), 1);
    assert_eq!(collateral[0].tx_hash[0], 2);
    assert!(!tx.body.inputs.contains(collateral[0]));

    // 150% of the worst-case fee, rounded up
    let target = (params().max_tx_fee() * 150).div_ceil(100);
    assert_eq!(tx.body.total_collateral, Some(target));
    assert_eq!(tx.body.collateral_return.as_ref().map(|o| o.coin()), Some(5_000_000 - target));

    let cbor = builder.tx_cbor().unwrap();
    let decoded = MultiEraTx::decode(&cbor).unwrap();
    assert_eq!(decoded.collateral().len(), 1);
}

#[test]
fn explicit_collateral_amount_and_input_are_honoured() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let chosen = utxo_at(key_address(1), 3, Value::new(3_000_000));
    let mut builder = builder(context_with(&funded(&[chosen.clone()])));
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(script))
        .collect_from(locked, PlutusData::unit(), ExUnits::new(1000, 1000))
        .add_collateral(chosen.clone());
    let tx = builder.finalize().unwrap();
    assert_eq!(tx.body.collateral.iter().copied().collect::<Vec<_>>(), vec![chosen.input]);
    assert_eq!(tx.body.collateral_return, None);
}

#[test]
fn collateral_amount_overrides_the_percentage() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let mut builder = builder(context_with(&funded(&[])));
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(script))
        .collect_from(locked, PlutusData::unit(), ExUnits::new(1000, 1000))
        .set_collateral_amount(5_000_000);
    let tx = builder.finalize().unwrap();
    // the 5 ADA UTxO matches exactly, so nothing comes back
    assert_eq!(tx.body.total_collateral, Some(5_000_000));
    assert_eq!(tx.body.collateral_return, None);
}

#[test]
fn datum_hash_payment_carries_the_datum() {
    let script = always_succeeds();
    let mut builder = builder(context_with(&funded(&[])));
    builder
        .pay_to_contract_with_datum_hash(
            script_address(&script),
            PlutusData::constr(0, vec![PlutusData::Bytes(vec![1, 2, 3])]),
            2_000_000,
            vec![],
        )
        .unwrap();
    let tx = builder.finalize().unwrap();
    assert_eq!(tx.witness_set.plutus_data.len(), 1);
    assert!(tx.body.script_data_hash.is_some());
    assert!(tx.body.collateral.is_empty());
}

// =============================================================================
// Execution budgets
// =============================================================================

fn evaluating_context(
    evaluator: impl Fn(&[u8]) -> anyhow::Result<EvaluationResult> + Send + Sync + 'static,
) -> FixedChainContext {
    context_with(&funded(&[])).with_evaluator(evaluator)
}

#[test]
fn evaluated_budgets_get_the_margin() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let context = evaluating_context(|_| {
        let mut result = EvaluationResult::new();
        result.insert(spend(0), ExUnits::new(1000, 2000));
        // not part of the transaction, ignored
        result.insert(RedeemerPointer::new(RedeemerTag::Mint, 5), ExUnits::new(1, 1));
        Ok(result)
    });
    let mut builder = builder(context);
    builder
        .attach_script(Script::Plutus(script))
        .collect_from(locked, PlutusData::unit(), ExUnits::default());
    let tx = builder.finalize().unwrap();
    assert_eq!(tx.witness_set.redeemers[&spend(0)].ex_units, ExUnits::new(1200, 2400));
}

#[test]
fn caller_budgets_survive_when_estimation_is_off() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let context = evaluating_context(|_| Err(anyhow!("evaluator must not run")));
    let mut builder = builder(context);
    builder
        .disable_ex_units_estimation()
        .attach_script(Script::Plutus(script))
        .collect_from(locked, PlutusData::unit(), ExUnits::new(7, 9));
    let tx = builder.finalize().unwrap();
    assert_eq!(tx.witness_set.redeemers[&spend(0)].ex_units, ExUnits::new(7, 9));
}

#[test]
fn evaluator_failure_fails_finalize() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let context = evaluating_context(|_| Err(anyhow!("script failed")));
    let mut builder = builder(context);
    builder
        .attach_script(Script::Plutus(script))
        .collect_from(locked, PlutusData::unit(), ExUnits::default());
    assert!(matches!(builder.finalize(), Err(BuilderError::Backend(_))));
}

#[test]
fn script_costs_raise_the_fee() {
    let script = always_succeeds();
    let locked = utxo_at(script_address(&script), 10, Value::new(5_000_000));
    let build = |units: ExUnits| {
        let mut builder = builder(context_with(&funded(&[])));
        builder
            .disable_ex_units_estimation()
            .attach_script(Script::Plutus(script.clone()))
            .collect_from(locked.clone(), PlutusData::unit(), units);
        builder.finalize().map(|tx| tx.body.fee)
    };
    let cheap = build(ExUnits::new(0, 0)).unwrap();
    let costly = build(ExUnits::new(1_000_000, 1_000_000_000)).unwrap();
    // 0.0577 * 1e6 + 0.0000721 * 1e9 = 57_700 + 72_100
    assert!(costly >= cheap + 129_800);
}
