//! Shelley-era addresses (CIP-19): base, pointer, enterprise and reward

use crate::{
    hash::{AddrKeyhash, ScriptHash},
    types::NetworkId,
    validation::InputError,
};
use bech32::{Bech32, Hrp};
use minicbor::Encode;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Payment or stake credential
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Credential {
    /// Key hash
    AddrKeyHash(AddrKeyhash),

    /// Script hash
    ScriptHash(ScriptHash),
}

pub type StakeCredential = Credential;

impl Credential {
    pub fn hash(&self) -> &[u8; 28] {
        match self {
            Credential::AddrKeyHash(hash) => hash,
            Credential::ScriptHash(hash) => hash,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::ScriptHash(_))
    }

    fn header_bit(&self) -> u8 {
        match self {
            Credential::AddrKeyHash(_) => 0,
            Credential::ScriptHash(_) => 1,
        }
    }

    fn from_header_bit(bit: u8, bytes: &[u8]) -> Result<Self, String> {
        let hash = AddrKeyhash::try_from(bytes).map_err(|_| "bad credential length".to_string())?;
        Ok(match bit {
            0 => Credential::AddrKeyHash(hash),
            _ => Credential::ScriptHash(hash),
        })
    }
}

impl<C> minicbor::Encode<C> for Credential {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        match self {
            Credential::AddrKeyHash(hash) => {
                e.u8(0)?;
                hash.encode(e, ctx)?;
            }
            Credential::ScriptHash(hash) => {
                e.u8(1)?;
                hash.encode(e, ctx)?;
            }
        }
        Ok(())
    }
}

/// Delegation pointer
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShelleyAddressPointer {
    pub slot: u64,
    pub tx_index: u64,
    pub cert_index: u64,
}

/// A Shelley-era address - delegation part
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShelleyAddressDelegationPart {
    /// No delegation (enterprise addresses)
    #[default]
    None,

    /// Delegation to a stake credential
    Credential(StakeCredential),

    /// Delegation to pointer
    Pointer(ShelleyAddressPointer),
}

/// A payment address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShelleyAddress {
    pub network: NetworkId,
    pub payment: Credential,
    pub delegation: ShelleyAddressDelegationPart,
}

/// A reward (stake) address
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct StakeAddress {
    pub network: NetworkId,
    pub credential: StakeCredential,
}

impl StakeAddress {
    pub fn new(credential: StakeCredential, network: NetworkId) -> Self {
        Self {
            network,
            credential,
        }
    }

    /// Header byte plus credential hash (29 bytes). Withdrawal maps are
    /// keyed and ordered by these bytes.
    pub fn to_binary(&self) -> Vec<u8> {
        let header = 0b1110_0000 | (self.credential.header_bit() << 4) | self.network.to_u8();
        let mut data = vec![header];
        data.extend_from_slice(self.credential.hash());
        data
    }
}

/// A Cardano address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Address {
    Shelley(ShelleyAddress),
    Stake(StakeAddress),
}

fn push_varint(data: &mut Vec<u8>, num: u64) {
    let mut len = 7;
    while len != 70 && (num >> len) != 0 {
        len += 7;
    }
    while len > 7 {
        len -= 7;
        data.push((num >> len) as u8 | 0x80);
    }
    data.push((num & 0x7f) as u8);
}

fn read_varint(data: &[u8], position: &mut usize) -> Result<u64, String> {
    let mut value: u64 = 0;
    while *position < data.len() {
        let byte = data[*position];
        *position += 1;
        value = (value << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err("pointer ran out of data".to_string())
}

impl Address {
    /// Enterprise address for a payment credential
    pub fn enterprise(network: NetworkId, payment: Credential) -> Self {
        Address::Shelley(ShelleyAddress {
            network,
            payment,
            delegation: ShelleyAddressDelegationPart::None,
        })
    }

    /// Base address for a payment and stake credential
    pub fn base(network: NetworkId, payment: Credential, stake: StakeCredential) -> Self {
        Address::Shelley(ShelleyAddress {
            network,
            payment,
            delegation: ShelleyAddressDelegationPart::Credential(stake),
        })
    }

    pub fn network(&self) -> NetworkId {
        match self {
            Address::Shelley(shelley) => shelley.network,
            Address::Stake(stake) => stake.network,
        }
    }

    pub fn payment_credential(&self) -> Option<Credential> {
        match self {
            Address::Shelley(shelley) => Some(shelley.payment),
            Address::Stake(_) => None,
        }
    }

    pub fn stake_credential(&self) -> Option<StakeCredential> {
        match self {
            Address::Shelley(ShelleyAddress {
                delegation: ShelleyAddressDelegationPart::Credential(credential),
                ..
            }) => Some(*credential),
            Address::Stake(stake) => Some(stake.credential),
            _ => None,
        }
    }

    /// Reward address carrying this address's stake credential
    pub fn stake_address(&self) -> Result<StakeAddress, InputError> {
        let credential = self
            .stake_credential()
            .ok_or_else(|| InputError::NoStakeCredential(self.to_string()))?;
        Ok(StakeAddress::new(credential, self.network()))
    }

    /// Raw address bytes as they appear in outputs
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Address::Stake(stake) => stake.to_binary(),
            Address::Shelley(shelley) => {
                let (delegation_bits, tail) = match &shelley.delegation {
                    ShelleyAddressDelegationPart::Credential(credential) => {
                        (credential.header_bit(), credential.hash().to_vec())
                    }
                    ShelleyAddressDelegationPart::Pointer(pointer) => {
                        let mut data = Vec::new();
                        push_varint(&mut data, pointer.slot);
                        push_varint(&mut data, pointer.tx_index);
                        push_varint(&mut data, pointer.cert_index);
                        (2, data)
                    }
                    ShelleyAddressDelegationPart::None => (3, Vec::new()),
                };
                let header = shelley.network.to_u8()
                    | (shelley.payment.header_bit() << 4)
                    | (delegation_bits << 5);
                let mut data = vec![header];
                data.extend_from_slice(shelley.payment.hash());
                data.extend(tail);
                data
            }
        }
    }

    /// Parse raw address bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, InputError> {
        let malformed = |reason: String| InputError::malformed_address(&hex::encode(data), reason);
        let header = *data.first().ok_or_else(|| malformed("empty address".to_string()))?;
        let network = NetworkId::from_u8(header & 0x0f);
        let kind = header >> 4;
        match kind {
            0b1110 | 0b1111 => {
                if data.len() != 29 {
                    return Err(malformed(format!("bad stake address length {}", data.len())));
                }
                let credential = Credential::from_header_bit(kind & 1, &data[1..]).map_err(malformed)?;
                Ok(Address::Stake(StakeAddress::new(credential, network)))
            }
            0..=7 => {
                if data.len() < 29 {
                    return Err(malformed(format!("bad address length {}", data.len())));
                }
                let payment = Credential::from_header_bit(kind & 1, &data[1..29]).map_err(malformed)?;
                let delegation = match kind >> 1 {
                    0 | 1 => {
                        if data.len() != 57 {
                            return Err(malformed(format!("bad base address length {}", data.len())));
                        }
                        ShelleyAddressDelegationPart::Credential(
                            Credential::from_header_bit(kind >> 1, &data[29..57]).map_err(malformed)?,
                        )
                    }
                    2 => {
                        let mut position = 29;
                        let slot = read_varint(data, &mut position).map_err(malformed)?;
                        let tx_index = read_varint(data, &mut position).map_err(malformed)?;
                        let cert_index = read_varint(data, &mut position).map_err(malformed)?;
                        ShelleyAddressDelegationPart::Pointer(ShelleyAddressPointer {
                            slot,
                            tx_index,
                            cert_index,
                        })
                    }
                    _ => ShelleyAddressDelegationPart::None,
                };
                Ok(Address::Shelley(ShelleyAddress {
                    network,
                    payment,
                    delegation,
                }))
            }
            _ => Err(malformed(format!("unsupported address header {header:#04x}"))),
        }
    }

    /// Read from bech32 text ("addr1...", "addr_test1...", "stake1...")
    pub fn from_bech32(text: &str) -> Result<Self, InputError> {
        let (_, data) =
            bech32::decode(text).map_err(|e| InputError::malformed_address(text, e))?;
        Self::from_bytes(&data).map_err(|_| InputError::malformed_address(text, "bad payload"))
    }

    /// Convert to bech32 text
    pub fn to_bech32(&self) -> Result<String, InputError> {
        let prefix = match (self, self.network()) {
            (Address::Shelley(_), NetworkId::Mainnet) => "addr",
            (Address::Shelley(_), NetworkId::Testnet) => "addr_test",
            (Address::Stake(_), NetworkId::Mainnet) => "stake",
            (Address::Stake(_), NetworkId::Testnet) => "stake_test",
        };
        let bytes = self.to_bytes();
        let hrp = Hrp::parse(prefix)
            .map_err(|e| InputError::malformed_address(&hex::encode(&bytes), e))?;
        bech32::encode::<Bech32>(hrp, &bytes)
            .map_err(|e| InputError::malformed_address(&hex::encode(&bytes), e))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str(&hex::encode(self.to_bytes())),
        }
    }
}

impl FromStr for Address {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_bech32(s)
    }
}

impl<C> minicbor::Encode<C> for Address {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.to_bytes())?;
        Ok(())
    }
}

impl<C> minicbor::Encode<C> for StakeAddress {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.to_binary())?;
        Ok(())
    }
}
