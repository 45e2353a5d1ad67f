//! Transaction builder facade.
//!
//! Every operation here only records intent and validates its arguments;
//! a rejected call leaves the builder untouched. The work of selecting
//! inputs, placing redeemers and balancing happens once, in
//! [`TxBuilder::finalize`].

use crate::balance::split_mint;
use crate::error::BuilderError;
use crate::payment::Payment;
use crate::redeemers::{PendingRedeemer, PendingRedeemers, RedeemerTarget};
use crate::wallet::witness_from_seed;
use anyhow::{Context, anyhow};
use dashu_int::IBig;
use keystone_codec::{Transaction, Withdrawals};
use keystone_common::configuration::BuilderConfig;
use keystone_common::{
    AddrKeyhash, Address, Certificate, ChainContext, Credential, DRep, ExUnits, InputError,
    Lovelace, Metadata, MetadatumLabel, Metadatum, PlutusData, PoolId, PoolParams, Script, Slot,
    StakeCredential, TxHash, UTxOIdentifier, Unit, Utxo, VKeyWitness, Value, Wallet,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Where a builder is in its single-use lifecycle
#[derive(Debug, Clone)]
pub(crate) enum Stage {
    Open,
    Finalized {
        tx: Box<Transaction>,
        inputs: Vec<Utxo>,
    },
    Failed,
}

/// Accumulates the parts of a transaction and balances them on `finalize`.
///
/// Cloning yields a fully independent builder; the collaborators are
/// shared behind `Arc`.
#[derive(Clone)]
pub struct TxBuilder {
    pub(crate) context: Arc<dyn ChainContext>,
    pub(crate) wallet: Option<Arc<dyn Wallet>>,
    pub(crate) config: BuilderConfig,

    pub(crate) input_addresses: Vec<Address>,
    pub(crate) loaded_utxos: Vec<Utxo>,
    pub(crate) preselected: Vec<Utxo>,
    pub(crate) payments: Vec<Payment>,
    pub(crate) change_address: Option<Address>,

    /// Net mint; negative quantities are burns
    pub(crate) mint: Value,
    pub(crate) redeemers: PendingRedeemers,
    pub(crate) withdrawals: Withdrawals,
    pub(crate) datums: Vec<PlutusData>,
    pub(crate) scripts: Vec<Script>,
    pub(crate) reference_inputs: Vec<Utxo>,
    pub(crate) required_signers: BTreeSet<AddrKeyhash>,
    pub(crate) certificates: Vec<Certificate>,

    pub(crate) ttl: Option<Slot>,
    pub(crate) validity_start: Option<Slot>,
    pub(crate) fee: Option<Lovelace>,
    pub(crate) fee_padding: Option<Lovelace>,
    pub(crate) collateral_amount: Option<Lovelace>,
    pub(crate) collateral: Vec<Utxo>,
    pub(crate) metadata: Option<Metadata>,

    pub(crate) stage: Stage,
}

impl TxBuilder {
    pub fn new(context: Arc<dyn ChainContext>) -> Self {
        Self {
            context,
            wallet: None,
            config: BuilderConfig::default(),
            input_addresses: Vec::new(),
            loaded_utxos: Vec::new(),
            preselected: Vec::new(),
            payments: Vec::new(),
            change_address: None,
            mint: Value::default(),
            redeemers: PendingRedeemers::new(),
            withdrawals: Withdrawals::new(),
            datums: Vec::new(),
            scripts: Vec::new(),
            reference_inputs: Vec::new(),
            required_signers: BTreeSet::new(),
            certificates: Vec::new(),
            ttl: None,
            validity_start: None,
            fee: None,
            fee_padding: None,
            collateral_amount: None,
            collateral: Vec::new(),
            metadata: None,
            stage: Stage::Open,
        }
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_wallet(&mut self, wallet: Arc<dyn Wallet>) -> &mut Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    // -- funding --------------------------------------------------------

    /// Fetch the UTxOs at `address` at finalize time and select from them
    pub fn add_input_address(&mut self, address: Address) -> &mut Self {
        if !self.input_addresses.contains(&address) {
            self.input_addresses.push(address);
        }
        self
    }

    pub fn add_input_address_bech32(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        let address = Address::from_bech32(address)?;
        Ok(self.add_input_address(address))
    }

    /// Supply selectable UTxOs directly
    pub fn add_loaded_utxos(&mut self, utxos: impl IntoIterator<Item = Utxo>) -> &mut Self {
        self.loaded_utxos.extend(utxos);
        self
    }

    /// Spend `utxo` regardless of what selection would pick
    pub fn add_input(&mut self, utxo: Utxo) -> &mut Self {
        if !self.preselected.iter().any(|u| u.input == utxo.input) {
            self.preselected.push(utxo);
        }
        self
    }

    /// Spend `utxo`, make `payments` out of it and return whatever is left
    /// to the change address
    pub fn consume_utxo(
        &mut self,
        utxo: Utxo,
        payments: Vec<Payment>,
    ) -> Result<&mut Self, BuilderError> {
        let mut paid = Value::default();
        for payment in &payments {
            paid = paid.checked_add(&payment.value()?)?;
        }
        let remainder = utxo.value().checked_sub(&paid)?;
        let remainder_payment = if remainder.coin > 0 || remainder.has_assets() {
            Some(Payment::from_value(self.change_address()?, &remainder)?)
        } else {
            None
        };

        self.add_input(utxo);
        self.payments.extend(payments);
        self.payments.extend(remainder_payment);
        Ok(self)
    }

    pub fn set_change_address(&mut self, address: Address) -> &mut Self {
        self.change_address = Some(address);
        self
    }

    pub fn set_change_address_bech32(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        let address = Address::from_bech32(address)?;
        Ok(self.set_change_address(address))
    }

    /// Explicit change address, else the wallet's
    pub fn change_address(&self) -> Result<Address, BuilderError> {
        self.change_address
            .or_else(|| self.wallet.as_ref().map(|wallet| wallet.address()))
            .ok_or(BuilderError::NoChangeAddress)
    }

    // -- payments -------------------------------------------------------

    pub fn add_payment(&mut self, payment: Payment) -> Result<&mut Self, BuilderError> {
        payment.value()?;
        self.payments.push(payment);
        Ok(self)
    }

    pub fn pay_to_address(
        &mut self,
        address: Address,
        lovelace: Lovelace,
        units: Vec<Unit>,
    ) -> Result<&mut Self, BuilderError> {
        self.add_payment(Payment::new(address, lovelace, units))
    }

    pub fn pay_to_address_bech32(
        &mut self,
        address: &str,
        lovelace: Lovelace,
        units: Vec<Unit>,
    ) -> Result<&mut Self, BuilderError> {
        let address = Address::from_bech32(address)?;
        self.pay_to_address(address, lovelace, units)
    }

    /// Pay to a script address with the datum inlined in the output
    pub fn pay_to_contract(
        &mut self,
        address: Address,
        datum: PlutusData,
        lovelace: Lovelace,
        units: Vec<Unit>,
    ) -> Result<&mut Self, BuilderError> {
        self.add_payment(Payment::new(address, lovelace, units).with_inline_datum(datum))
    }

    /// Pay to a script address with only the datum hash in the output; the
    /// datum itself travels in the witness set
    pub fn pay_to_contract_with_datum_hash(
        &mut self,
        address: Address,
        datum: PlutusData,
        lovelace: Lovelace,
        units: Vec<Unit>,
    ) -> Result<&mut Self, BuilderError> {
        self.add_payment(Payment::new(address, lovelace, units).with_datum_hash(&datum))?;
        Ok(self.attach_datum(datum))
    }

    /// Pay to an address, storing `script` in the output for later reference
    pub fn pay_with_reference_script(
        &mut self,
        address: Address,
        lovelace: Lovelace,
        script: Script,
        units: Vec<Unit>,
    ) -> Result<&mut Self, BuilderError> {
        self.add_payment(Payment::new(address, lovelace, units).with_reference_script(script))
    }

    // -- scripts --------------------------------------------------------

    /// Spend a script-locked UTxO with the given redeemer
    pub fn collect_from(
        &mut self,
        utxo: Utxo,
        redeemer: PlutusData,
        ex_units: ExUnits,
    ) -> &mut Self {
        self.redeemers.insert(
            RedeemerTarget::Spend(utxo.input),
            PendingRedeemer {
                data: redeemer,
                ex_units,
            },
        );
        self.add_input(utxo)
    }

    /// Redeemers attached so far, keyed by what they unlock
    pub fn redeemers(&self) -> &PendingRedeemers {
        &self.redeemers
    }

    /// Replace data and budgets of already attached redeemers. Every
    /// target must exist; otherwise nothing changes.
    pub fn update_redeemers(
        &mut self,
        updates: PendingRedeemers,
    ) -> Result<&mut Self, BuilderError> {
        if let Some(target) = updates.keys().find(|target| !self.redeemers.contains_key(target)) {
            return Err(BuilderError::OrphanRedeemer(target.to_string()));
        }
        self.redeemers.extend(updates);
        Ok(self)
    }

    /// Mint (positive quantity) or burn (negative quantity) a native asset
    pub fn mint_assets(&mut self, unit: Unit) -> Result<&mut Self, BuilderError> {
        let (policy, name) = unit
            .asset_id()?
            .ok_or_else(|| InputError::NotAnAsset(unit.to_string()))?;
        self.mint.add_asset(policy, name, IBig::from(unit.quantity));
        Ok(self)
    }

    /// Mint or burn under a Plutus minting policy
    pub fn mint_assets_with_redeemer(
        &mut self,
        unit: Unit,
        redeemer: PlutusData,
        ex_units: ExUnits,
    ) -> Result<&mut Self, BuilderError> {
        let (policy, _) = unit
            .asset_id()?
            .ok_or_else(|| InputError::NotAnAsset(unit.to_string()))?;
        self.mint_assets(unit)?;
        self.redeemers.insert(
            RedeemerTarget::Mint(policy),
            PendingRedeemer {
                data: redeemer,
                ex_units,
            },
        );
        Ok(self)
    }

    /// Withdraw rewards from the stake part of `address`, optionally through
    /// a Plutus staking script
    pub fn add_withdrawal(
        &mut self,
        address: Address,
        amount: Lovelace,
        redeemer: Option<(PlutusData, ExUnits)>,
    ) -> Result<&mut Self, BuilderError> {
        let stake_address = address.stake_address()?;
        self.withdrawals.insert(stake_address.to_binary(), (stake_address, amount));
        if let Some((data, ex_units)) = redeemer {
            self.redeemers.insert(
                RedeemerTarget::Reward(stake_address.credential),
                PendingRedeemer { data, ex_units },
            );
        }
        Ok(self)
    }

    pub fn attach_datum(&mut self, datum: PlutusData) -> &mut Self {
        if !self.datums.contains(&datum) {
            self.datums.push(datum);
        }
        self
    }

    /// Add a script to the witness set; a script with the same hash is
    /// only carried once
    pub fn attach_script(&mut self, script: Script) -> &mut Self {
        let hash = script.compute_hash();
        if !self.scripts.iter().any(|s| s.compute_hash() == hash) {
            self.scripts.push(script);
        }
        self
    }

    // -- references and signers -----------------------------------------

    pub fn add_reference_input(&mut self, utxo: Utxo) -> &mut Self {
        if !self.reference_inputs.iter().any(|u| u.input == utxo.input) {
            self.reference_inputs.push(utxo);
        }
        self
    }

    /// Resolve a reference input through the chain context
    pub fn add_reference_input_by_ref(
        &mut self,
        tx_hash: TxHash,
        index: u32,
    ) -> Result<&mut Self, BuilderError> {
        let utxo = self.utxo_from_ref(&UTxOIdentifier::new(tx_hash, index))?;
        Ok(self.add_reference_input(utxo))
    }

    pub fn utxo_from_ref(&self, input: &UTxOIdentifier) -> Result<Utxo, BuilderError> {
        let utxo = self
            .context
            .utxo_by_ref(input)
            .with_context(|| format!("Looking up UTxO {input}"))?
            .ok_or_else(|| anyhow!("UTxO {input} not found"))?;
        Ok(utxo)
    }

    pub fn add_required_signer(&mut self, key_hash: AddrKeyhash) -> &mut Self {
        self.required_signers.insert(key_hash);
        self
    }

    /// Require the payment key of `address` to sign
    pub fn add_required_signer_from_address(
        &mut self,
        address: &Address,
    ) -> Result<&mut Self, BuilderError> {
        match address.payment_credential() {
            Some(Credential::AddrKeyHash(hash)) => Ok(self.add_required_signer(hash)),
            _ => Err(InputError::NoPaymentKeyHash(address.to_string()).into()),
        }
    }

    /// Require the stake key of `address` to sign
    pub fn add_required_signer_stake_key(
        &mut self,
        address: &Address,
    ) -> Result<&mut Self, BuilderError> {
        match address.stake_credential() {
            Some(Credential::AddrKeyHash(hash)) => Ok(self.add_required_signer(hash)),
            _ => Err(InputError::NoStakeCredential(address.to_string()).into()),
        }
    }

    // -- knobs ----------------------------------------------------------

    pub fn set_ttl(&mut self, slot: Slot) -> &mut Self {
        self.ttl = Some(slot);
        self
    }

    pub fn set_validity_start(&mut self, slot: Slot) -> &mut Self {
        self.validity_start = Some(slot);
        self
    }

    /// Use exactly this fee instead of estimating one
    pub fn set_fee(&mut self, fee: Lovelace) -> &mut Self {
        self.fee = Some(fee);
        self
    }

    /// Added on top of every fee estimate, replacing the configured padding
    pub fn set_fee_padding(&mut self, padding: Lovelace) -> &mut Self {
        self.fee_padding = Some(padding);
        self
    }

    pub fn set_collateral_amount(&mut self, amount: Lovelace) -> &mut Self {
        self.collateral_amount = Some(amount);
        self
    }

    /// Use `utxo` as collateral; automatic collateral selection is skipped
    pub fn add_collateral(&mut self, utxo: Utxo) -> &mut Self {
        if !self.collateral.iter().any(|u| u.input == utxo.input) {
            self.collateral.push(utxo);
        }
        self
    }

    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<&mut Self, BuilderError> {
        if let Some((label, _)) = metadata.iter().find(|(_, datum)| !datum.is_within_limits()) {
            return Err(InputError::MetadatumOutOfLimits(*label).into());
        }
        self.metadata = Some(metadata);
        Ok(self)
    }

    pub fn add_metadata(
        &mut self,
        label: MetadatumLabel,
        datum: Metadatum,
    ) -> Result<&mut Self, BuilderError> {
        if !datum.is_within_limits() {
            return Err(InputError::MetadatumOutOfLimits(label).into());
        }
        self.metadata.get_or_insert_with(Metadata::new).insert(label, datum);
        Ok(self)
    }

    /// Keep the caller-supplied execution budgets
    pub fn disable_ex_units_estimation(&mut self) -> &mut Self {
        self.config.estimate_ex_units = false;
        self
    }

    // -- certificates ---------------------------------------------------

    pub fn add_certificate(&mut self, certificate: Certificate) -> &mut Self {
        self.certificates.push(certificate);
        self
    }

    /// The given credential, else the stake credential of the wallet
    fn stake_credential_or_wallet(
        &self,
        credential: Option<StakeCredential>,
    ) -> Result<StakeCredential, BuilderError> {
        if let Some(credential) = credential {
            return Ok(credential);
        }
        let address = self
            .wallet
            .as_ref()
            .map(|wallet| wallet.address())
            .ok_or_else(|| InputError::NoStakeCredential("no wallet attached".to_string()))?;
        Ok(address.stake_address()?.credential)
    }

    pub fn register_stake(
        &mut self,
        credential: Option<StakeCredential>,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeRegistration(credential)))
    }

    pub fn deregister_stake(
        &mut self,
        credential: Option<StakeCredential>,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeDeregistration(credential)))
    }

    pub fn delegate_stake(
        &mut self,
        credential: Option<StakeCredential>,
        pool: PoolId,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeDelegation { credential, pool }))
    }

    pub fn delegate_vote(
        &mut self,
        credential: Option<StakeCredential>,
        drep: DRep,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::VoteDelegation { credential, drep }))
    }

    pub fn delegate_stake_and_vote(
        &mut self,
        credential: Option<StakeCredential>,
        pool: PoolId,
        drep: DRep,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeVoteDelegation {
            credential,
            pool,
            drep,
        }))
    }

    pub fn register_and_delegate_stake(
        &mut self,
        credential: Option<StakeCredential>,
        pool: PoolId,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeRegistrationDelegation { credential, pool }))
    }

    pub fn register_and_delegate_vote(
        &mut self,
        credential: Option<StakeCredential>,
        drep: DRep,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::VoteRegistrationDelegation { credential, drep }))
    }

    pub fn register_and_delegate_stake_and_vote(
        &mut self,
        credential: Option<StakeCredential>,
        pool: PoolId,
        drep: DRep,
    ) -> Result<&mut Self, BuilderError> {
        let credential = self.stake_credential_or_wallet(credential)?;
        Ok(self.add_certificate(Certificate::StakeVoteRegistrationDelegation {
            credential,
            pool,
            drep,
        }))
    }

    pub fn register_pool(&mut self, params: PoolParams) -> &mut Self {
        self.add_certificate(Certificate::PoolRegistration(Box::new(params)))
    }

    pub fn retire_pool(&mut self, pool: PoolId, epoch: u64) -> &mut Self {
        self.add_certificate(Certificate::PoolRetirement { pool, epoch })
    }

    // -- inspection -----------------------------------------------------

    /// Assets minted so far, as a positive value
    pub fn mints(&self) -> Value {
        split_mint(self.mint.assets.as_ref()).0
    }

    /// Assets burnt so far, as a positive value
    pub fn burns(&self) -> Value {
        split_mint(self.mint.assets.as_ref()).1
    }

    // -- lifecycle ------------------------------------------------------

    /// Select inputs, balance and assemble the transaction. Runs at most
    /// once; after a failure the builder keeps its pending data but cannot
    /// be finalized again.
    pub fn finalize(&mut self) -> Result<&Transaction, BuilderError> {
        match self.stage {
            Stage::Open => {}
            Stage::Finalized { .. } => return Err(BuilderError::AlreadyFinalized),
            Stage::Failed => return Err(BuilderError::FinalizeFailed),
        }
        match self.build() {
            Ok(balanced) => {
                self.stage = Stage::Finalized {
                    tx: Box::new(balanced.tx),
                    inputs: balanced.inputs,
                };
                self.tx()
            }
            Err(error) => {
                warn!("Finalize failed: {error}");
                self.stage = Stage::Failed;
                Err(error)
            }
        }
    }

    pub fn tx(&self) -> Result<&Transaction, BuilderError> {
        match &self.stage {
            Stage::Finalized { tx, .. } => Ok(tx),
            _ => Err(BuilderError::NotFinalized),
        }
    }

    fn tx_mut(&mut self) -> Result<&mut Transaction, BuilderError> {
        match &mut self.stage {
            Stage::Finalized { tx, .. } => Ok(tx),
            _ => Err(BuilderError::NotFinalized),
        }
    }

    pub fn tx_cbor(&self) -> Result<Vec<u8>, BuilderError> {
        Ok(self.tx()?.to_cbor()?)
    }

    pub fn tx_hash(&self) -> Result<TxHash, BuilderError> {
        Ok(self.tx()?.hash()?)
    }

    /// Spending inputs of the finished transaction in ledger order, the
    /// order spend redeemer indices refer to
    pub fn sorted_inputs(&self) -> Result<Vec<Utxo>, BuilderError> {
        match &self.stage {
            Stage::Finalized { inputs, .. } => {
                let mut inputs = inputs.clone();
                inputs.sort_by_key(|utxo| utxo.input);
                Ok(inputs)
            }
            _ => Err(BuilderError::NotFinalized),
        }
    }

    /// Inputs and collateral of the finished transaction
    pub fn used_utxos(&self) -> Result<Vec<UTxOIdentifier>, BuilderError> {
        let body = &self.tx()?.body;
        Ok(body.inputs.iter().chain(body.collateral.iter()).copied().collect())
    }

    /// Append a witness; a second witness for the same key is ignored
    pub fn add_verification_key_witness(
        &mut self,
        witness: VKeyWitness,
    ) -> Result<&mut Self, BuilderError> {
        let witnesses = &mut self.tx_mut()?.witness_set.vkey_witnesses;
        if !witnesses.iter().any(|w| w.vkey == witness.vkey) {
            witnesses.push(witness);
        }
        Ok(self)
    }

    /// Have the wallet sign the body hash
    pub fn sign(&mut self) -> Result<&mut Self, BuilderError> {
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| anyhow!("No wallet attached to sign with"))?;
        let hash = self.tx_hash()?;
        let witness = wallet
            .sign_tx_body(&hash)
            .context("Wallet failed to sign the transaction body")?;
        self.add_verification_key_witness(witness)
    }

    /// Sign the body hash with an ed25519 key given by its 32-byte seed
    pub fn sign_with_key(&mut self, seed: &[u8; 32]) -> Result<&mut Self, BuilderError> {
        let hash = self.tx_hash()?;
        self.add_verification_key_witness(witness_from_seed(seed, &hash))
    }

    pub fn submit(&self) -> Result<TxHash, BuilderError> {
        let cbor = self.tx_cbor()?;
        let hash = self.context.submit_tx(&cbor).context("Submitting transaction")?;
        info!("Submitted transaction {hash}");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_context::FixedChainContext;
    use crate::wallet::ExternalWallet;
    use keystone_common::{NetworkId, ProtocolParams, TxOutput};

    const POLICY: &str = "c3a33acb8903cf42611e26b15c7731f537867c6469f5bf69c837e4a3";

    fn address(byte: u8) -> Address {
        Address::base(
            NetworkId::Testnet,
            Credential::AddrKeyHash(AddrKeyhash::new([byte; 28])),
            Credential::AddrKeyHash(AddrKeyhash::new([byte + 1; 28])),
        )
    }

    fn utxo(id: u8, coin: Lovelace) -> Utxo {
        Utxo::new(
            UTxOIdentifier::new(TxHash::new([id; 32]), 0),
            TxOutput::new(address(1), Value::new(coin)),
        )
    }

    fn builder() -> TxBuilder {
        let context = FixedChainContext::new(ProtocolParams::default(), NetworkId::Testnet);
        TxBuilder::new(Arc::new(context)).with_wallet(Arc::new(ExternalWallet::new(address(1))))
    }

    #[test]
    fn rejected_payment_leaves_state_untouched() {
        let mut builder = builder();
        let result = builder.pay_to_address(address(3), 1_000_000, vec![Unit::new("zz", "", 1)]);
        assert!(matches!(result, Err(BuilderError::Input(InputError::InvalidHex { .. }))));
        assert!(builder.payments.is_empty());
    }

    #[test]
    fn consume_utxo_returns_remainder_to_change() {
        let mut builder = builder();
        let payment = Payment::new(address(3), 3_000_000, vec![]);
        builder.consume_utxo(utxo(1, 10_000_000), vec![payment]).unwrap();
        assert_eq!(builder.preselected.len(), 1);
        assert_eq!(builder.payments.len(), 2);
        assert_eq!(builder.payments[1].address, address(1));
        assert_eq!(builder.payments[1].lovelace, 7_000_000);
    }

    #[test]
    fn consume_utxo_rejects_overspending() {
        let mut builder = builder();
        let payment = Payment::new(address(3), 30_000_000, vec![]);
        let result = builder.consume_utxo(utxo(1, 10_000_000), vec![payment]);
        assert!(matches!(result, Err(BuilderError::Value(_))));
        assert!(builder.preselected.is_empty());
        assert!(builder.payments.is_empty());
    }

    #[test]
    fn bech32_addresses_feed_inputs_and_change() {
        let mut builder = builder();
        let funding = address(7).to_bech32().unwrap();
        let change = address(9).to_bech32().unwrap();
        builder
            .add_input_address_bech32(&funding)
            .unwrap()
            .set_change_address_bech32(&change)
            .unwrap();
        assert_eq!(builder.input_addresses, vec![address(7)]);
        assert_eq!(builder.change_address().unwrap(), address(9));
    }

    #[test]
    fn malformed_bech32_addresses_are_rejected() {
        let mut builder = builder();
        assert!(matches!(
            builder.add_input_address_bech32("addr_test1xyz"),
            Err(BuilderError::Input(InputError::MalformedAddress { .. }))
        ));
        assert!(builder.input_addresses.is_empty());
        assert!(builder.set_change_address_bech32("not an address").is_err());
        assert!(builder.change_address.is_none());
    }

    #[test]
    fn redeemers_can_be_read_and_updated() {
        let mut builder = builder();
        let locked = utxo(7, 5_000_000);
        builder.collect_from(locked.clone(), PlutusData::Integer(1), ExUnits::new(10, 10));
        let target = RedeemerTarget::Spend(locked.input);
        assert_eq!(builder.redeemers()[&target].ex_units, ExUnits::new(10, 10));

        let mut updates = PendingRedeemers::new();
        updates.insert(
            target,
            PendingRedeemer {
                data: PlutusData::Integer(2),
                ex_units: ExUnits::new(500, 900),
            },
        );
        builder.update_redeemers(updates).unwrap();
        assert_eq!(builder.redeemers().len(), 1);
        assert_eq!(builder.redeemers()[&target].data, PlutusData::Integer(2));
        assert_eq!(builder.redeemers()[&target].ex_units, ExUnits::new(500, 900));
    }

    #[test]
    fn updating_an_unattached_redeemer_changes_nothing() {
        let mut builder = builder();
        let locked = utxo(7, 5_000_000);
        builder.collect_from(locked.clone(), PlutusData::Integer(1), ExUnits::new(10, 10));
        let target = RedeemerTarget::Spend(locked.input);

        let replacement = PendingRedeemer {
            data: PlutusData::Integer(2),
            ex_units: ExUnits::new(500, 900),
        };
        let mut updates = PendingRedeemers::new();
        updates.insert(target, replacement.clone());
        updates.insert(
            RedeemerTarget::Mint(keystone_common::PolicyId::new([3; 28])),
            replacement,
        );
        assert!(matches!(
            builder.update_redeemers(updates),
            Err(BuilderError::OrphanRedeemer(_))
        ));
        assert_eq!(builder.redeemers()[&target].data, PlutusData::Integer(1));
    }

    #[test]
    fn sorted_inputs_need_a_finished_transaction() {
        assert!(matches!(builder().sorted_inputs(), Err(BuilderError::NotFinalized)));
    }

    #[test]
    fn mint_and_burn_accumulate() {
        let mut builder = builder();
        builder.mint_assets(Unit::new(POLICY, "6161", 10)).unwrap();
        builder.mint_assets(Unit::new(POLICY, "6262", -4)).unwrap();
        assert!(builder.mints().has_assets());
        assert!(builder.burns().has_assets());
        assert!(matches!(
            builder.mint_assets(Unit::lovelace(5)),
            Err(BuilderError::Input(InputError::NotAnAsset(_)))
        ));
    }

    #[test]
    fn scripts_are_deduplicated_by_hash() {
        let mut builder = builder();
        let script = Script::Native(keystone_common::NativeScript::invalid_before(3));
        builder.attach_script(script.clone()).attach_script(script);
        assert_eq!(builder.scripts.len(), 1);
    }

    #[test]
    fn datum_hash_payment_attaches_the_datum() {
        let mut builder = builder();
        builder
            .pay_to_contract_with_datum_hash(address(5), PlutusData::Integer(1), 2_000_000, vec![])
            .unwrap();
        assert_eq!(builder.datums, vec![PlutusData::Integer(1)]);
    }

    #[test]
    fn stake_operations_default_to_the_wallet_credential() {
        let mut builder = builder();
        builder.register_stake(None).unwrap();
        assert_eq!(
            builder.certificates,
            vec![Certificate::StakeRegistration(Credential::AddrKeyHash(AddrKeyhash::new(
                [2; 28]
            )))]
        );
    }

    #[test]
    fn withdrawal_needs_a_stake_part() {
        let mut builder = builder();
        let enterprise = Address::enterprise(
            NetworkId::Testnet,
            Credential::AddrKeyHash(AddrKeyhash::new([1; 28])),
        );
        assert!(matches!(
            builder.add_withdrawal(enterprise, 5, None),
            Err(BuilderError::Input(InputError::NoStakeCredential(_)))
        ));
        builder.add_withdrawal(address(1), 5, None).unwrap();
        assert_eq!(builder.withdrawals.len(), 1);
    }

    #[test]
    fn oversized_metadata_is_rejected() {
        let mut builder = builder();
        let text = "x".repeat(65);
        assert!(matches!(
            builder.add_metadata(674, Metadatum::Text(text)),
            Err(BuilderError::Input(InputError::MetadatumOutOfLimits(674)))
        ));
        assert!(builder.metadata.is_none());
    }

    #[test]
    fn transaction_is_unavailable_before_finalize() {
        let builder = builder();
        assert!(matches!(builder.tx(), Err(BuilderError::NotFinalized)));
        assert!(matches!(builder.tx_cbor(), Err(BuilderError::NotFinalized)));
    }
}
