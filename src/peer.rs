//! The `Peer` abstraction, consumed from the embedding node environment.
//!
//! Scoring, connection management and the wire transport itself are out
//! of scope here; this trait is the narrow seam the protocol driver
//! needs, grounded on `lib-network`'s `BlockchainProvider`
//! application-layer trait pattern (`blockchain_sync/blockchain_provider.rs`):
//! an `async_trait` interface implemented by the embedding node, with a
//! null/fake implementation living in `testing` for tests.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::messages::{
    AcceptancePhaseMessage, CollisionData, FinalReplyMessage, InsertData, InsertHeaders,
    InsertRequest, PubKeyMsg, PubKeyPhaseMessage,
};

/// Stable identifier for a peer, used for the routed-set exclusion and
/// for reputation callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{:016x}", self.0)
    }
}

/// Transient, per-peer send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    NotConnected,
    Other(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotConnected => write!(f, "peer not connected"),
            SendError::Other(msg) => write!(f, "send failed: {msg}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Failure classes specific to the throttled data push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSendError {
    NotConnected,
    WaitedTooLong,
    PeerRestarted,
}

/// One routing-table entry, contacted for exactly one hop of one insert.
///
/// Every `next_*` method represents one filtered wait on messages from
/// this peer: it returns `None` on disconnect and otherwise resolves to
/// the next message matching the filter, regardless of what else has
/// arrived from this peer for this `uid` — reorder tolerance is the
/// caller's responsibility (the `HopDriver`'s phase loops), not this
/// trait's.
#[async_trait]
pub trait Peer: Send + Sync {
    fn id(&self) -> PeerId;

    async fn is_connected(&self) -> bool;

    async fn send_insert_request(&self, msg: InsertRequest) -> Result<(), SendError>;

    /// Waits for the next message relevant to phase 1 (acceptance).
    /// Callers apply their own timeout; a `None` here means the peer
    /// disconnected mid-wait, not a timeout.
    async fn next_acceptance_message(&self, uid: u64) -> Option<AcceptancePhaseMessage>;

    async fn send_insert_headers(&self, msg: InsertHeaders) -> Result<(), SendError>;

    /// `timeout` bounds the whole throttled send, including any internal
    /// rate-limiting wait; a real implementation is expected to return
    /// `DataSendError::WaitedTooLong` if it cannot clear its send queue
    /// within that bound.
    async fn send_insert_data_throttled(
        &self,
        msg: InsertData,
        timeout: Duration,
    ) -> Result<(), DataSendError>;

    async fn send_pub_key(&self, msg: PubKeyMsg) -> Result<(), SendError>;

    async fn next_pub_key_message(&self, uid: u64) -> Option<PubKeyPhaseMessage>;

    /// Waits for the next message relevant to phase 3 (final reply).
    async fn next_final_reply_message(&self, uid: u64) -> Option<FinalReplyMessage>;

    /// Waits for the `COLLISION_DATA` body following `COLLISION_HEADERS`.
    async fn next_collision_data(&self, uid: u64) -> Option<CollisionData>;

    /// Reputation callback: this peer locally rejected with overload, or
    /// a wait on it timed out (`label` identifies which wait, matching
    /// `lib-network`'s string-labeled reputation events).
    fn local_rejected_overload(&self, label: &str);

    /// Reputation callback: the peer responded but declined to accept
    /// this insert (loop, route-not-found, data-insert-rejected) — a
    /// real response, just not an overload and not success.
    fn success_not_overload(&self);

    /// Reputation callback: the peer completed the insert successfully.
    fn on_success(&self, local: bool, insert: bool);
}
