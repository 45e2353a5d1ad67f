//! Input validation errors
//!
//! Raised before any builder state is touched, so a rejected call leaves
//! the builder exactly as it was.

use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    /// **Cause:** A hex-encoded field could not be decoded
    #[error("Invalid hex in {field}: {value:?}")]
    InvalidHex { field: &'static str, value: String },

    /// **Cause:** A hash or key has the wrong number of bytes
    #[error("Invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// **Cause:** A quantity that must be non-negative is negative
    #[error("Negative quantity {quantity} for {unit}")]
    NegativeQuantity { unit: String, quantity: i64 },

    /// **Cause:** Asset names are limited to 32 bytes
    #[error("Asset name too long: {0} bytes")]
    AssetNameTooLong(usize),

    /// **Cause:** Address text or bytes could not be parsed
    #[error("Malformed address {address}: {reason}")]
    MalformedAddress { address: String, reason: String },

    /// **Cause:** The operation needs a stake credential and the address has none
    #[error("Address {0} has no stake credential")]
    NoStakeCredential(String),

    /// **Cause:** The operation needs a key-hash payment credential
    #[error("Address {0} has no payment key hash")]
    NoPaymentKeyHash(String),

    /// **Cause:** An asset quantity does not fit a signed 64-bit integer
    #[error("Quantity {quantity} of {asset} does not fit in 64 bits")]
    QuantityOutOfRange { asset: String, quantity: String },

    /// **Cause:** Minting was asked for the native coin
    #[error("{0} is not a native asset")]
    NotAnAsset(String),

    /// **Cause:** A metadata string is longer than 64 bytes or an integer
    /// does not fit the wire range
    #[error("Metadatum under label {0} is outside the ledger limits")]
    MetadatumOutOfLimits(u64),
}

impl InputError {
    pub fn invalid_hex(field: &'static str, value: &str) -> Self {
        Self::InvalidHex {
            field,
            value: value.to_string(),
        }
    }

    pub fn malformed_address(address: &str, reason: impl ToString) -> Self {
        Self::MalformedAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}
