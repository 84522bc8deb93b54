//! SSK block type and routing key derivation.
//!
//! An SSK (Signed Subspace Key) block is immutable once constructed; the
//! insert job replaces its whole `SskBlock` rather than mutating fields in
//! place when a collision forces adoption of the remote payload (see
//! [`crate::job::InsertJob::adopt_collision_block`]).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum size of an SSK data payload (1 KiB).
pub const MAX_SSK_DATA_LEN: usize = 1024;

/// A DSA public key whose SHA-256 hash forms the routing identity of an
/// SSK. Verification of the key and of signatures made with it is a
/// non-goal of this crate; the bytes are opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn hash(&self) -> PublicKeyHash {
        let digest = Sha256::digest(&self.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        PublicKeyHash(out)
    }
}

/// SHA-256 hash of a [`PublicKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyHash(pub [u8; 32]);

impl std::fmt::Display for PublicKeyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Routing key identifying an SSK slot. Two blocks with the same `Key` but
/// different `headers`/`data` are a collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Normalized routing coordinate in `[0, 1)` derived from this key.
    ///
    /// The peer-selection scoring function itself is a non-goal; this is
    /// only the stable coordinate the `RoutingController` hands to it.
    pub fn routing_target(&self) -> f64 {
        let digest = Sha256::digest(&self.0);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[..8]);
        let as_u64 = u64::from_be_bytes(buf);
        (as_u64 as f64) / (u64::MAX as f64 + 1.0)
    }
}

/// An immutable SSK block: `{key, headers, data, publicKey}`.
///
/// `data` must be no larger than [`MAX_SSK_DATA_LEN`]; construction with a
/// null/empty public key is rejected (mirrors the `InsertJob` constructor
/// contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SskBlock {
    key: Key,
    headers: Vec<u8>,
    data: Vec<u8>,
    public_key: PublicKey,
}

/// Errors from constructing or reconstructing an [`SskBlock`]. Manual
/// `Display`/`Error` impls, matching `lib-network`'s `HandshakeIoError`
/// convention rather than pulling in `thiserror`.
#[derive(Debug)]
pub enum BlockError {
    DataTooLarge { len: usize },
    MissingPublicKey,
    VerifyFailed,
}

impl std::fmt::Display for BlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockError::DataTooLarge { len } => {
                write!(f, "SSK data too large: {len} bytes (max {MAX_SSK_DATA_LEN})")
            }
            BlockError::MissingPublicKey => write!(f, "SSK block has no public key"),
            BlockError::VerifyFailed => write!(f, "SSK block failed verification on reconstruct"),
        }
    }
}

impl std::error::Error for BlockError {}

impl SskBlock {
    /// Construct a new block, rejecting an empty `publicKey` and
    /// oversized `data`.
    pub fn new(
        key: Key,
        headers: Vec<u8>,
        data: Vec<u8>,
        public_key: PublicKey,
    ) -> Result<Self, BlockError> {
        if public_key.0.is_empty() {
            return Err(BlockError::MissingPublicKey);
        }
        if data.len() > MAX_SSK_DATA_LEN {
            return Err(BlockError::DataTooLarge { len: data.len() });
        }
        Ok(Self {
            key,
            headers,
            data,
            public_key,
        })
    }

    /// Reconstruct a block from collision-resolution data, optionally
    /// skipping verification. Verification itself (a non-goal) is modeled
    /// by the caller-supplied `verify_on_construct` flag and the
    /// `verified` argument: callers that do not wish to perform real
    /// cryptographic verification pass `verified = true` along with
    /// `verify_on_construct = false`.
    pub fn reconstruct(
        data: Vec<u8>,
        headers: Vec<u8>,
        key: Key,
        public_key: PublicKey,
        verify_on_construct: bool,
        verified: bool,
    ) -> Result<Self, BlockError> {
        if verify_on_construct && !verified {
            return Err(BlockError::VerifyFailed);
        }
        Self::new(key, headers, data, public_key)
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn set_headers(&mut self, headers: Vec<u8>) {
        self.headers = headers;
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }
}
