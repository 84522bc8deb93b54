//! Cryptographic verification of SSK blocks is a non-goal; this trait
//! is the abstract seam the collision-resolution path calls through
//! when it reconstructs the block from remote `COLLISION_DATA`.

use crate::block::{Key, PublicKey};

pub trait BlockVerifier: Send + Sync {
    /// Returns whether `data`/`headers` verify against `key`/`public_key`.
    fn verify(&self, data: &[u8], headers: &[u8], key: &Key, public_key: &PublicKey) -> bool;
}

/// Accepts anything. Useful where the embedding node has already proven
/// authenticity out of band (e.g. test fakes), never for production use.
pub struct AlwaysVerify;

impl BlockVerifier for AlwaysVerify {
    fn verify(&self, _data: &[u8], _headers: &[u8], _key: &Key, _public_key: &PublicKey) -> bool {
        true
    }
}
