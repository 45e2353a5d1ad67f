//! The finalize pipeline: load the pool, settle script budgets, select
//! inputs and collateral, then balance.

use crate::balance::{Balanced, Balancer, Draft};
use crate::builder::{Stage, TxBuilder};
use crate::collateral::{collateral_for_fee, select_collateral};
use crate::error::BuilderError;
use crate::redeemers::{PendingRedeemers, RedeemerLayout};
use crate::selection::select_coins;
use anyhow::Context;
use keystone_codec::{TransactionBody, WitnessSet, auxiliary_data_hash};
use keystone_common::{
    Credential, Lovelace, NativeScript, PlutusScript, PlutusVersion, ProtocolParams, Script,
    UTxOIdentifier, Utxo, Value,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl TxBuilder {
    pub(crate) fn build(&self) -> Result<Balanced, BuilderError> {
        let params = self.context.protocol_params().context("Fetching protocol parameters")?;
        let change_address = self.change_address()?;
        let pool = self.load_pool()?;

        let redeemers = if self.config.estimate_ex_units && !self.redeemers.is_empty() {
            self.estimate_ex_units()?
        } else {
            self.redeemers.clone()
        };
        let mut draft = self.draft(&params, redeemers)?;

        let max_fee = self.context.max_tx_fee().context("Fetching maximum fee")?;
        let mut used: BTreeSet<UTxOIdentifier> =
            self.preselected.iter().map(|utxo| utxo.input).collect();
        let mut committed = draft.extra_supply(&params)?;
        for utxo in &self.preselected {
            committed = committed.checked_add(utxo.value())?;
        }
        let required = draft.base_demand(&params)?.checked_add(&Value::new(max_fee))?;
        let picks = select_coins(&pool, &used, &required, &committed)?;
        debug!(
            preselected = self.preselected.len(),
            picked = picks.len(),
            pool = pool.len(),
            "Selected inputs"
        );

        let mut inputs = self.preselected.clone();
        used.extend(picks.iter().map(|utxo| utxo.input));
        inputs.extend(picks);

        let mut balance_pool = pool;
        if self.runs_scripts() {
            self.set_collateral(&mut draft.body, &params, max_fee, &balance_pool, &used, &inputs)?;
            balance_pool.retain(|utxo| !draft.body.collateral.contains(&utxo.input));
        }

        let balancer = Balancer {
            params: &params,
            config: &self.config,
            pool: &balance_pool,
            change_address,
            fixed_fee: self.fee,
            fee_padding: self.fee_padding.unwrap_or(self.config.fee_padding),
        };
        balancer.balance(&draft, inputs)
    }

    /// Selectable UTxOs: loaded ones plus those at the input addresses, or
    /// the wallet's when neither was given. Reference inputs never spend.
    fn load_pool(&self) -> Result<Vec<Utxo>, BuilderError> {
        let mut pool = self.loaded_utxos.clone();
        let mut addresses = self.input_addresses.clone();
        if pool.is_empty() && addresses.is_empty() {
            addresses.extend(self.wallet.as_ref().map(|wallet| wallet.address()));
        }
        for address in &addresses {
            let utxos = self
                .context
                .utxos(address)
                .with_context(|| format!("Fetching UTxOs at {address}"))?;
            pool.extend(utxos);
        }

        let mut seen = BTreeSet::new();
        pool.retain(|utxo| {
            !self.reference_inputs.iter().any(|r| r.input == utxo.input) && seen.insert(utxo.input)
        });
        debug!(utxos = pool.len(), addresses = addresses.len(), "Loaded UTxO pool");
        Ok(pool)
    }

    fn runs_scripts(&self) -> bool {
        !self.redeemers.is_empty()
            || self.scripts.iter().any(|script| matches!(script, Script::Plutus(_)))
    }

    /// Replace the caller's budgets with evaluated ones.
    ///
    /// A copy of the builder, with estimation off, is finalized and handed
    /// to the evaluator; the reported pointers are mapped back to their
    /// targets through the trial build's layout and padded by the margin.
    fn estimate_ex_units(&self) -> Result<PendingRedeemers, BuilderError> {
        let mut trial = self.clone();
        trial.config.estimate_ex_units = false;
        trial.stage = Stage::Open;
        let tx = trial.build()?.tx;

        let result = self
            .context
            .evaluate_tx(&tx.to_cbor()?)
            .context("Evaluating execution units")?;
        let layout = RedeemerLayout::new(&tx.body);
        let margin = self.config.ex_units_margin_percent;

        let mut redeemers = self.redeemers.clone();
        for (pointer, ex_units) in result {
            let Some(target) = layout.target(&pointer) else {
                warn!(?pointer, "Evaluator reported a redeemer the transaction does not have");
                continue;
            };
            if let Some(redeemer) = redeemers.get_mut(&target) {
                redeemer.ex_units = ex_units.with_margin(margin);
                debug!(%target, mem = redeemer.ex_units.mem, steps = redeemer.ex_units.steps, "Evaluated");
            }
        }
        Ok(redeemers)
    }

    /// Everything but spending inputs, change and fee
    fn draft(
        &self,
        params: &ProtocolParams,
        redeemers: PendingRedeemers,
    ) -> Result<Draft, BuilderError> {
        let outputs = self
            .payments
            .iter()
            .map(|payment| payment.to_output(params.coins_per_utxo_byte))
            .collect::<Result<Vec<_>, _>>()?;

        let auxiliary_data_hash = match &self.metadata {
            Some(metadata) => Some(auxiliary_data_hash(metadata)?),
            None => None,
        };

        let body = TransactionBody {
            outputs,
            ttl: self.ttl,
            certificates: self.certificates.clone(),
            key_deposit: params.key_deposit,
            withdrawals: self.withdrawals.clone(),
            auxiliary_data_hash,
            validity_start: self.validity_start,
            mint: self.mint.assets.clone(),
            required_signers: self.required_signers.clone(),
            network_id: Some(self.context.network()),
            reference_inputs: self.reference_inputs.iter().map(|utxo| utxo.input).collect(),
            ..Default::default()
        };

        let mut native_scripts: Vec<NativeScript> = Vec::new();
        let mut plutus_scripts: Vec<PlutusScript> = Vec::new();
        for script in &self.scripts {
            match script {
                Script::Native(script) => native_scripts.push(script.clone()),
                Script::Plutus(script) => plutus_scripts.push(script.clone()),
            }
        }
        let witness_set = WitnessSet {
            native_scripts,
            plutus_scripts,
            plutus_data: self.datums.clone(),
            ..Default::default()
        };

        let plutus_versions: BTreeSet<PlutusVersion> = self
            .scripts
            .iter()
            .chain(self.reference_inputs.iter().filter_map(|utxo| utxo.output.script_ref.as_ref()))
            .filter_map(Script::plutus_version)
            .collect();

        Ok(Draft {
            stake_witnesses: self.stake_witnesses(),
            body,
            witness_set,
            redeemers,
            metadata: self.metadata.clone(),
            plutus_versions,
        })
    }

    /// Distinct stake keys that must sign, beyond the required signers
    fn stake_witnesses(&self) -> usize {
        let withdrawn = self.withdrawals.values().map(|(address, _)| address.credential);
        let certified = self
            .certificates
            .iter()
            .filter(|cert| !matches!(cert.kind(), 0 | 3 | 4))
            .filter_map(|cert| cert.stake_credential().copied());
        withdrawn
            .chain(certified)
            .filter_map(|credential| match credential {
                Credential::AddrKeyHash(hash) => Some(hash),
                Credential::ScriptHash(_) => None,
            })
            .filter(|hash| !self.required_signers.contains(hash))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Collateral inputs for a script-executing transaction. Inputs added
    /// with `add_collateral` are used as they are.
    fn set_collateral(
        &self,
        body: &mut TransactionBody,
        params: &ProtocolParams,
        max_fee: Lovelace,
        pool: &[Utxo],
        used: &BTreeSet<UTxOIdentifier>,
        inputs: &[Utxo],
    ) -> Result<(), BuilderError> {
        if !self.collateral.is_empty() {
            body.collateral = self.collateral.iter().map(|utxo| utxo.input).collect();
            return Ok(());
        }

        let target = match self.collateral_amount {
            Some(amount) => amount,
            None if params.collateral_percent > 0 => {
                collateral_for_fee(max_fee, params.collateral_percent)?
            }
            None => self.config.collateral_fallback,
        };
        let fallback: Vec<Utxo> = inputs.iter().filter(|utxo| utxo.is_ada_only()).cloned().collect();
        let choice = select_collateral(
            pool,
            used,
            &fallback,
            target,
            self.change_address()?,
            params.coins_per_utxo_byte,
        )?;
        info!(
            collateral = %choice.input.input,
            total = choice.total_collateral,
            with_return = choice.collateral_return.is_some(),
            "Selected collateral"
        );
        body.collateral = BTreeSet::from([choice.input.input]);
        body.collateral_return = choice.collateral_return;
        body.total_collateral = Some(choice.total_collateral);
        Ok(())
    }
}
