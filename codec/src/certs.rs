use keystone_common::{Certificate, Lovelace, PoolParams};
use minicbor::{
    Encode, Encoder,
    data::Tag,
    encode::{Error, Write},
};

const UNIT_INTERVAL_TAG: u64 = 30;

fn encode_pool_params<W: Write>(
    e: &mut Encoder<W>,
    params: &PoolParams,
) -> Result<(), Error<W::Error>> {
    params.operator.encode(e, &mut ())?;
    params.vrf_key_hash.encode(e, &mut ())?;
    e.u64(params.pledge)?;
    e.u64(params.cost)?;
    e.tag(Tag::new(UNIT_INTERVAL_TAG))?;
    e.array(2)?.u64(*params.margin.numer())?.u64(*params.margin.denom())?;
    params.reward_account.encode(e, &mut ())?;
    e.array(params.pool_owners.len() as u64)?;
    for owner in &params.pool_owners {
        owner.encode(e, &mut ())?;
    }
    e.array(params.relays.len() as u64)?;
    for relay in &params.relays {
        relay.encode(e, &mut ())?;
    }
    match &params.pool_metadata {
        Some(metadata) => {
            e.array(2)?.str(&metadata.url)?.bytes(&metadata.hash)?;
        }
        None => {
            e.null()?;
        }
    }
    Ok(())
}

/// Encode one certificate. Conway registration certificates state the
/// deposit explicitly, so the current key deposit is passed in.
pub fn encode_certificate<W: Write>(
    e: &mut Encoder<W>,
    cert: &Certificate,
    key_deposit: Lovelace,
) -> Result<(), Error<W::Error>> {
    let kind = cert.kind();
    match cert {
        Certificate::StakeRegistration(credential)
        | Certificate::StakeDeregistration(credential) => {
            e.array(2)?.u8(kind)?;
            credential.encode(e, &mut ())?;
        }
        Certificate::StakeDelegation { credential, pool } => {
            e.array(3)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            pool.encode(e, &mut ())?;
        }
        Certificate::PoolRegistration(params) => {
            e.array(10)?.u8(kind)?;
            encode_pool_params(e, params)?;
        }
        Certificate::PoolRetirement { pool, epoch } => {
            e.array(3)?.u8(kind)?;
            pool.encode(e, &mut ())?;
            e.u64(*epoch)?;
        }
        Certificate::Registration(credential) | Certificate::Deregistration(credential) => {
            e.array(3)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            e.u64(key_deposit)?;
        }
        Certificate::VoteDelegation { credential, drep } => {
            e.array(3)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            drep.encode(e, &mut ())?;
        }
        Certificate::StakeVoteDelegation {
            credential,
            pool,
            drep,
        } => {
            e.array(4)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            pool.encode(e, &mut ())?;
            drep.encode(e, &mut ())?;
        }
        Certificate::StakeRegistrationDelegation { credential, pool } => {
            e.array(4)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            pool.encode(e, &mut ())?;
            e.u64(key_deposit)?;
        }
        Certificate::VoteRegistrationDelegation { credential, drep } => {
            e.array(4)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            drep.encode(e, &mut ())?;
            e.u64(key_deposit)?;
        }
        Certificate::StakeVoteRegistrationDelegation {
            credential,
            pool,
            drep,
        } => {
            e.array(5)?.u8(kind)?;
            credential.encode(e, &mut ())?;
            pool.encode(e, &mut ())?;
            drep.encode(e, &mut ())?;
            e.u64(key_deposit)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encode_to_vec;
    use keystone_common::{AddrKeyhash, Credential, DRep, PoolId};

    fn credential() -> Credential {
        Credential::AddrKeyHash(AddrKeyhash::new([0x11; 28]))
    }

    #[test]
    fn legacy_registration_has_no_deposit() {
        let bytes = encode_to_vec(|e| {
            encode_certificate(e, &Certificate::StakeRegistration(credential()), 2_000_000)
        })
        .unwrap();
        assert_eq!(hex::encode(bytes), format!("82008200581c{}", "11".repeat(28)));
    }

    #[test]
    fn conway_registration_states_deposit() {
        let bytes = encode_to_vec(|e| {
            encode_certificate(e, &Certificate::Registration(credential()), 2_000_000)
        })
        .unwrap();
        assert_eq!(
            hex::encode(bytes),
            format!("83078200581c{}1a001e8480", "11".repeat(28))
        );
    }

    #[test]
    fn stake_vote_registration_delegation_layout() {
        let cert = Certificate::StakeVoteRegistrationDelegation {
            credential: credential(),
            pool: PoolId::new([0x22; 28]),
            drep: DRep::NoConfidence,
        };
        let bytes = encode_to_vec(|e| encode_certificate(e, &cert, 2_000_000)).unwrap();
        assert_eq!(&bytes[..2], &[0x85, 0x0d]);
        assert!(hex::encode(&bytes).contains("8103"));
        assert!(hex::encode(&bytes).ends_with("1a001e8480"));
    }
}
