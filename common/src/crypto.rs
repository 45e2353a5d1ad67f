//! Blake2b helpers used for key, script, datum and body hashing

use crate::hash::Hash;
use blake2::{
    digest::consts::{U28, U32},
    Blake2b, Digest,
};

/// Blake2b-224 of arbitrary bytes (key hashes, script hashes, policy ids)
pub fn keyhash_224(data: &[u8]) -> Hash<28> {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(data);
    Hash::new(hasher.finalize().into())
}

/// Blake2b-224 of `tag ++ data`, the form used for script hashes
pub fn keyhash_224_tagged(tag: u8, data: &[u8]) -> Hash<28> {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update([tag]);
    hasher.update(data);
    Hash::new(hasher.finalize().into())
}

/// Blake2b-256 of arbitrary bytes (tx ids, datum hashes, integrity hashes)
pub fn keyhash_256(data: &[u8]) -> Hash<32> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    Hash::new(hasher.finalize().into())
}
