//! In-memory chain context with preset parameters and UTxOs

use anyhow::{Result, anyhow};
use keystone_common::crypto::keyhash_256;
use keystone_common::{
    Address, ChainContext, EvaluationResult, NetworkId, ProtocolParams, Slot, TxHash,
    UTxOIdentifier, Utxo,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

pub type Evaluator = Arc<dyn Fn(&[u8]) -> Result<EvaluationResult> + Send + Sync>;

/// Chain context backed by fixed data. Submitted transactions are recorded,
/// not applied; evaluation is delegated to a pluggable closure.
#[derive(Clone)]
pub struct FixedChainContext {
    params: ProtocolParams,
    network: NetworkId,
    tip: Slot,
    utxos: HashMap<Address, Vec<Utxo>>,
    evaluator: Option<Evaluator>,
    submitted: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FixedChainContext {
    pub fn new(params: ProtocolParams, network: NetworkId) -> Self {
        Self {
            params,
            network,
            tip: 0,
            utxos: HashMap::new(),
            evaluator: None,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tip(mut self, tip: Slot) -> Self {
        self.tip = tip;
        self
    }

    pub fn with_utxo(mut self, utxo: Utxo) -> Self {
        self.utxos.entry(utxo.output.address).or_default().push(utxo);
        self
    }

    pub fn with_evaluator(
        mut self,
        evaluator: impl Fn(&[u8]) -> Result<EvaluationResult> + Send + Sync + 'static,
    ) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Transactions handed to `submit_tx`, oldest first
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().map(|list| list.clone()).unwrap_or_default()
    }
}

impl ChainContext for FixedChainContext {
    fn protocol_params(&self) -> Result<ProtocolParams> {
        Ok(self.params.clone())
    }

    fn network(&self) -> NetworkId {
        self.network
    }

    fn tip(&self) -> Result<Slot> {
        Ok(self.tip)
    }

    fn utxos(&self, address: &Address) -> Result<Vec<Utxo>> {
        Ok(self.utxos.get(address).cloned().unwrap_or_default())
    }

    fn utxo_by_ref(&self, input: &UTxOIdentifier) -> Result<Option<Utxo>> {
        Ok(self.utxos.values().flatten().find(|utxo| utxo.input == *input).cloned())
    }

    fn submit_tx(&self, tx_cbor: &[u8]) -> Result<TxHash> {
        // The id is the hash of the body, the first element of the outer array
        let mut decoder = minicbor::Decoder::new(tx_cbor);
        decoder.array()?;
        let start = decoder.position();
        decoder.skip()?;
        let body = &tx_cbor[start..decoder.position()];
        let hash = keyhash_256(body);

        self.submitted
            .lock()
            .map_err(|_| anyhow!("Submission log poisoned"))?
            .push(tx_cbor.to_vec());
        info!("Recorded submission of {hash}");
        Ok(hash)
    }

    fn evaluate_tx(&self, tx_cbor: &[u8]) -> Result<EvaluationResult> {
        match &self.evaluator {
            Some(evaluator) => evaluator(tx_cbor),
            None => Ok(EvaluationResult::new()),
        }
    }
}
