//! Certificate type definitions

use crate::address::{StakeAddress, StakeCredential};
use crate::hash::{AddrKeyhash, Hash, ScriptHash};
use crate::protocol_params::ProtocolParams;
use crate::rational_number::RationalNumber;
use crate::types::Lovelace;
use serde_with::{hex::Hex, serde_as};

pub type PoolId = Hash<28>;
pub type VrfKeyHash = Hash<32>;

/// Delegated representative a stake credential votes through
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DRep {
    /// Address key
    Key(AddrKeyhash),

    /// Script key
    Script(ScriptHash),

    /// Abstain
    Abstain,

    /// No confidence
    NoConfidence,
}

impl<C> minicbor::Encode<C> for DRep {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            DRep::Key(hash) => {
                e.array(2)?.u8(0)?;
                hash.encode(e, ctx)?;
            }
            DRep::Script(hash) => {
                e.array(2)?.u8(1)?;
                hash.encode(e, ctx)?;
            }
            DRep::Abstain => {
                e.array(1)?.u8(2)?;
            }
            DRep::NoConfidence => {
                e.array(1)?.u8(3)?;
            }
        }
        Ok(())
    }
}

/// Pool relay
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Relay {
    SingleHostAddr {
        port: Option<u16>,
        ipv4: Option<[u8; 4]>,
        ipv6: Option<[u8; 16]>,
    },
    SingleHostName {
        port: Option<u16>,
        dns_name: String,
    },
    MultiHostName {
        dns_name: String,
    },
}

impl<C> minicbor::Encode<C> for Relay {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Relay::SingleHostAddr { port, ipv4, ipv6 } => {
                e.array(4)?.u8(0)?;
                match port {
                    Some(port) => e.u16(*port)?,
                    None => e.null()?,
                };
                match ipv4 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
                match ipv6 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
            }
            Relay::SingleHostName { port, dns_name } => {
                e.array(3)?.u8(1)?;
                match port {
                    Some(port) => e.u16(*port)?,
                    None => e.null()?,
                };
                e.str(dns_name)?;
            }
            Relay::MultiHostName { dns_name } => {
                e.array(2)?.u8(2)?.str(dns_name)?;
            }
        }
        Ok(())
    }
}

/// Off-chain pool metadata reference
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolMetadata {
    pub url: String,

    #[serde_as(as = "Hex")]
    pub hash: Vec<u8>,
}

/// Pool registration data
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolParams {
    /// Operator pool key hash - used as ID
    pub operator: PoolId,

    /// VRF key hash
    pub vrf_key_hash: VrfKeyHash,

    /// Pledged Ada
    pub pledge: Lovelace,

    /// Fixed cost
    pub cost: Lovelace,

    /// Marginal cost (fraction)
    pub margin: RationalNumber,

    /// Reward account
    pub reward_account: StakeAddress,

    /// Pool owners by their key hash
    pub pool_owners: Vec<AddrKeyhash>,

    pub relays: Vec<Relay>,

    pub pool_metadata: Option<PoolMetadata>,
}

/// Certificate carried in a transaction body.
///
/// Deposits are not stored here; the encoder and the balancer derive them from
/// [`ProtocolParams`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Certificate {
    /// Legacy Shelley stake key registration
    StakeRegistration(StakeCredential),

    /// Legacy Shelley stake key deregistration
    StakeDeregistration(StakeCredential),

    StakeDelegation {
        credential: StakeCredential,
        pool: PoolId,
    },

    PoolRegistration(Box<PoolParams>),

    PoolRetirement {
        pool: PoolId,
        epoch: u64,
    },

    /// Conway registration with explicit deposit
    Registration(StakeCredential),

    /// Conway deregistration with explicit refund
    Deregistration(StakeCredential),

    VoteDelegation {
        credential: StakeCredential,
        drep: DRep,
    },

    StakeVoteDelegation {
        credential: StakeCredential,
        pool: PoolId,
        drep: DRep,
    },

    StakeRegistrationDelegation {
        credential: StakeCredential,
        pool: PoolId,
    },

    VoteRegistrationDelegation {
        credential: StakeCredential,
        drep: DRep,
    },

    StakeVoteRegistrationDelegation {
        credential: StakeCredential,
        pool: PoolId,
        drep: DRep,
    },
}

impl Certificate {
    /// Ledger type tag, the first element of the encoded certificate
    pub fn kind(&self) -> u8 {
        match self {
            Certificate::StakeRegistration(_) => 0,
            Certificate::StakeDeregistration(_) => 1,
            Certificate::StakeDelegation { .. } => 2,
            Certificate::PoolRegistration(_) => 3,
            Certificate::PoolRetirement { .. } => 4,
            Certificate::Registration(_) => 7,
            Certificate::Deregistration(_) => 8,
            Certificate::VoteDelegation { .. } => 9,
            Certificate::StakeVoteDelegation { .. } => 10,
            Certificate::StakeRegistrationDelegation { .. } => 11,
            Certificate::VoteRegistrationDelegation { .. } => 12,
            Certificate::StakeVoteRegistrationDelegation { .. } => 13,
        }
    }

    /// Stake credential the certificate acts on, if any
    pub fn stake_credential(&self) -> Option<&StakeCredential> {
        match self {
            Certificate::StakeRegistration(credential)
            | Certificate::StakeDeregistration(credential)
            | Certificate::Registration(credential)
            | Certificate::Deregistration(credential)
            | Certificate::StakeDelegation { credential, .. }
            | Certificate::VoteDelegation { credential, .. }
            | Certificate::StakeVoteDelegation { credential, .. }
            | Certificate::StakeRegistrationDelegation { credential, .. }
            | Certificate::VoteRegistrationDelegation { credential, .. }
            | Certificate::StakeVoteRegistrationDelegation { credential, .. } => Some(credential),
            Certificate::PoolRegistration(_) | Certificate::PoolRetirement { .. } => None,
        }
    }

    /// Deposit locked by this certificate
    pub fn deposit(&self, params: &ProtocolParams) -> Lovelace {
        match self {
            Certificate::StakeRegistration(_)
            | Certificate::Registration(_)
            | Certificate::StakeRegistrationDelegation { .. }
            | Certificate::VoteRegistrationDelegation { .. }
            | Certificate::StakeVoteRegistrationDelegation { .. } => params.key_deposit,
            Certificate::PoolRegistration(_) => params.pool_deposit,
            _ => 0,
        }
    }

    /// Deposit returned to the transaction by this certificate
    pub fn refund(&self, params: &ProtocolParams) -> Lovelace {
        match self {
            Certificate::StakeDeregistration(_) | Certificate::Deregistration(_) => {
                params.key_deposit
            }
            _ => 0,
        }
    }
}

/// Total deposits required by a list of certificates
pub fn total_deposit(certificates: &[Certificate], params: &ProtocolParams) -> Lovelace {
    certificates.iter().map(|cert| cert.deposit(params)).sum()
}

/// Total refunds released by a list of certificates
pub fn total_refund(certificates: &[Certificate], params: &ProtocolParams) -> Lovelace {
    certificates.iter().map(|cert| cert.refund(params)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Credential;

    fn credential() -> StakeCredential {
        Credential::AddrKeyHash(AddrKeyhash::new([7; 28]))
    }

    #[test]
    fn registrations_lock_the_key_deposit() {
        let params = ProtocolParams::default();
        let certs = vec![
            Certificate::Registration(credential()),
            Certificate::StakeRegistrationDelegation {
                credential: credential(),
                pool: PoolId::new([1; 28]),
            },
            Certificate::StakeDelegation {
                credential: credential(),
                pool: PoolId::new([1; 28]),
            },
        ];
        assert_eq!(total_deposit(&certs, &params), 2 * params.key_deposit);
        assert_eq!(total_refund(&certs, &params), 0);
    }

    #[test]
    fn deregistration_returns_the_key_deposit() {
        let params = ProtocolParams::default();
        let certs = vec![
            Certificate::StakeDeregistration(credential()),
            Certificate::Deregistration(credential()),
        ];
        assert_eq!(total_refund(&certs, &params), 2 * params.key_deposit);
        assert_eq!(total_deposit(&certs, &params), 0);
    }

    #[test]
    fn pool_retirement_has_no_deposit_movement() {
        let params = ProtocolParams::default();
        let cert = Certificate::PoolRetirement {
            pool: PoolId::new([2; 28]),
            epoch: 300,
        };
        assert_eq!(cert.deposit(&params), 0);
        assert_eq!(cert.refund(&params), 0);
        assert!(cert.stake_credential().is_none());
        assert_eq!(cert.kind(), 4);
    }

    #[test]
    fn drep_encoding() {
        assert_eq!(hex::encode(minicbor::to_vec(DRep::Abstain).unwrap()), "8102");
        assert_eq!(
            hex::encode(minicbor::to_vec(DRep::Key(AddrKeyhash::new([0; 28]))).unwrap()),
            format!("8200581c{}", "00".repeat(28))
        );
    }
}
