//! Node-environment traits: peer selection, HTL policy, the insert
//! registry, and byte-accounting sinks.

use async_trait::async_trait;
use std::sync::Arc;

use crate::block::Key;
use crate::peer::{Peer, PeerId};

/// Peer selection itself (scoring, tie breaks, admission policy) is a
/// non-goal; this trait is only the query surface the
/// `RoutingController` drives.
#[async_trait]
pub trait PeerTable: Send + Sync {
    /// Returns the connected, non-excluded peer whose routing location
    /// minimizes distance to `target`, or `None` if the candidate set is
    /// exhausted.
    async fn closer_peer(
        &self,
        source: Option<PeerId>,
        exclusion: &[PeerId],
        target: f64,
        htl: u8,
        for_insert: bool,
    ) -> Option<Arc<dyn Peer>>;
}

/// The per-hop HTL decrement may probabilistically decline to decrement
/// near boundary values. The policy's internal randomness is a
/// non-goal; only the signature is specified here.
pub trait HtlPolicy: Send + Sync {
    fn decrement_htl(&self, requestor: Option<PeerId>, htl: u8) -> u8;
}

/// The node-wide registry of in-flight inserts keyed on
/// `(key, origHTL)`, used by peers to detect loops.
pub trait InsertRegistry: Send + Sync {
    fn register(&self, key: &Key, orig_htl: u8, uid: u64);
    fn deregister(&self, key: &Key, orig_htl: u8, uid: u64);
}

/// The node-level statistics sink, which must tolerate concurrent
/// updates from many jobs running at once.
pub trait NodeStats: Send + Sync {
    fn insert_sent_bytes(&self, is_ssk: bool, delta: u64);
    fn insert_received_bytes(&self, is_ssk: bool, delta: u64);
    fn sent_payload(&self, bytes: u64);
}
