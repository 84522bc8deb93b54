//! Per-hop protocol message types. Wire-byte layout is out of scope;
//! these are the logical message shapes the
//! [`crate::protocol::HopDriver`] exchanges with one peer.

use crate::block::Key;

/// Outbound announcement opening a hop attempt.
#[derive(Debug, Clone)]
pub struct InsertRequest {
    pub uid: u64,
    pub htl: u8,
    pub key: Key,
}

/// Positive reply to `InsertRequest`.
#[derive(Debug, Clone, Copy)]
pub struct Accepted {
    pub uid: u64,
    pub need_pub_key: bool,
}

/// The peer already services this uid (loop / duplicate).
#[derive(Debug, Clone, Copy)]
pub struct RejectedLoop {
    pub uid: u64,
}

/// The peer is overloaded. `is_local == false` means a downstream peer's
/// overload is being relayed through this one.
#[derive(Debug, Clone, Copy)]
pub struct RejectedOverload {
    pub uid: u64,
    pub is_local: bool,
}

/// Payload push: headers half (unreliable-ordered is acceptable; paired
/// by `uid` on the receiving side).
#[derive(Debug, Clone)]
pub struct InsertHeaders {
    pub uid: u64,
    pub headers: Vec<u8>,
}

/// Payload push: data half (throttled send, longer timeout).
#[derive(Debug, Clone)]
pub struct InsertData {
    pub uid: u64,
    pub data: Vec<u8>,
}

/// Optional public-key push when `Accepted.need_pub_key` was set.
#[derive(Debug, Clone)]
pub struct PubKeyMsg {
    pub uid: u64,
    pub pub_key: crate::block::PublicKey,
}

#[derive(Debug, Clone, Copy)]
pub struct PubKeyAccepted {
    pub uid: u64,
}

/// Successful completion at the contacted peer.
#[derive(Debug, Clone, Copy)]
pub struct InsertReply {
    pub uid: u64,
}

/// The peer exhausted its own HTL; may advertise a reduced value, which
/// the job may only clamp *downward*.
#[derive(Debug, Clone, Copy)]
pub struct RouteNotFoundMsg {
    pub uid: u64,
    pub htl: u8,
}

/// Reason a peer rejected the pushed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    VerifyFailed,
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct DataInsertRejected {
    pub uid: u64,
    pub reason: RejectReason,
}

/// The peer already stores a different block under this key.
#[derive(Debug, Clone)]
pub struct CollisionHeaders {
    pub uid: u64,
    pub headers: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CollisionData {
    pub uid: u64,
    pub data: Vec<u8>,
}

/// The union of messages the Phase-1 wait loop accepts.
#[derive(Debug, Clone)]
pub enum AcceptancePhaseMessage {
    Accepted(Accepted),
    RejectedLoop(RejectedLoop),
    RejectedOverload(RejectedOverload),
}

/// The union of messages the Phase-3 (final reply) wait loop accepts.
#[derive(Debug, Clone)]
pub enum FinalReplyMessage {
    InsertReply(InsertReply),
    RouteNotFound(RouteNotFoundMsg),
    RejectedOverload(RejectedOverload),
    DataInsertRejected(DataInsertRejected),
    CollisionHeaders(CollisionHeaders),
}

/// Pubkey-exchange phase reply.
#[derive(Debug, Clone, Copy)]
pub enum PubKeyPhaseMessage {
    PubKeyAccepted(PubKeyAccepted),
}
