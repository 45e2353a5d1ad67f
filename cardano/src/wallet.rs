//! Wallet implementations

use anyhow::{Result, bail};
use cryptoxide::ed25519;
use keystone_common::crypto::keyhash_224;
use keystone_common::{
    AddrKeyhash, Address, Credential, NetworkId, Signature, TxHash, VKey, VKeyWitness, Wallet,
};

/// Ed25519 witness over a body hash, from a 32-byte secret seed
pub fn witness_from_seed(seed: &[u8; 32], body_hash: &TxHash) -> VKeyWitness {
    let (keypair, public) = ed25519::keypair(seed);
    let signature = ed25519::signature(body_hash.as_ref(), &keypair);
    VKeyWitness::new(VKey::new(public), Signature::new(signature))
}

/// A wallet known only by its address. It funds and receives change but
/// cannot sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalWallet {
    address: Address,
}

impl ExternalWallet {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Wallet for ExternalWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn payment_key_hash(&self) -> Option<AddrKeyhash> {
        match self.address.payment_credential()? {
            Credential::AddrKeyHash(hash) => Some(hash),
            Credential::ScriptHash(_) => None,
        }
    }

    fn stake_key_hash(&self) -> Option<AddrKeyhash> {
        match self.address.stake_credential()? {
            Credential::AddrKeyHash(hash) => Some(hash),
            Credential::ScriptHash(_) => None,
        }
    }

    fn sign_tx_body(&self, _body_hash: &TxHash) -> Result<VKeyWitness> {
        bail!("External wallet {} holds no signing key", self.address)
    }
}

/// A wallet holding an ed25519 payment key, optionally with a stake key
pub struct KeyPairWallet {
    network: NetworkId,
    seed: [u8; 32],
    payment_key_hash: AddrKeyhash,
    stake_key_hash: Option<AddrKeyhash>,
}

impl KeyPairWallet {
    pub fn from_seed(seed: [u8; 32], network: NetworkId) -> Self {
        let (_, public) = ed25519::keypair(&seed);
        Self {
            network,
            seed,
            payment_key_hash: keyhash_224(&public),
            stake_key_hash: None,
        }
    }

    /// Add a stake key, turning the address into a base address
    pub fn with_stake_seed(mut self, stake_seed: [u8; 32]) -> Self {
        let (_, public) = ed25519::keypair(&stake_seed);
        self.stake_key_hash = Some(keyhash_224(&public));
        self
    }

    pub fn verification_key(&self) -> VKey {
        VKey::new(ed25519::keypair(&self.seed).1)
    }
}

impl Wallet for KeyPairWallet {
    fn address(&self) -> Address {
        let payment = Credential::AddrKeyHash(self.payment_key_hash);
        match self.stake_key_hash {
            Some(stake) => Address::base(self.network, payment, Credential::AddrKeyHash(stake)),
            None => Address::enterprise(self.network, payment),
        }
    }

    fn payment_key_hash(&self) -> Option<AddrKeyhash> {
        Some(self.payment_key_hash)
    }

    fn stake_key_hash(&self) -> Option<AddrKeyhash> {
        self.stake_key_hash
    }

    fn sign_tx_body(&self, body_hash: &TxHash) -> Result<VKeyWitness> {
        Ok(witness_from_seed(&self.seed, body_hash))
    }
}
