//! In-memory fakes for the node-environment traits, grounded on
//! `lib-network`'s `NullBlockchainProvider` pattern
//! (`blockchain_sync/blockchain_provider.rs`): a trivial implementation
//! of an application-layer trait that exists purely so the network layer
//! can be exercised without a real node attached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::block::Key;
use crate::messages::{
    AcceptancePhaseMessage, CollisionData, FinalReplyMessage, InsertData, InsertHeaders,
    InsertRequest, PubKeyMsg, PubKeyPhaseMessage,
};
use crate::node::{HtlPolicy, InsertRegistry, NodeStats, PeerTable};
use crate::peer::{DataSendError, Peer, PeerId, SendError};

/// Scripted peer: tests push messages onto its channels (optionally from
/// a spawned task with a delay, to simulate reordering) and read back
/// what reputation callbacks fired.
pub struct FakePeer {
    id: PeerId,
    connected: AtomicBool,
    acceptance_tx: tokio::sync::mpsc::UnboundedSender<AcceptancePhaseMessage>,
    acceptance_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<AcceptancePhaseMessage>>,
    pub_key_tx: tokio::sync::mpsc::UnboundedSender<PubKeyPhaseMessage>,
    pub_key_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<PubKeyPhaseMessage>>,
    final_reply_tx: tokio::sync::mpsc::UnboundedSender<FinalReplyMessage>,
    final_reply_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<FinalReplyMessage>>,
    collision_data_tx: tokio::sync::mpsc::UnboundedSender<CollisionData>,
    collision_data_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<CollisionData>>,
    pub events: parking_lot::Mutex<Vec<String>>,
    pub requests_received: AtomicU64,
}

impl FakePeer {
    pub fn new(id: u64) -> Arc<Self> {
        let (acceptance_tx, acceptance_rx) = tokio::sync::mpsc::unbounded_channel();
        let (pub_key_tx, pub_key_rx) = tokio::sync::mpsc::unbounded_channel();
        let (final_reply_tx, final_reply_rx) = tokio::sync::mpsc::unbounded_channel();
        let (collision_data_tx, collision_data_rx) = tokio::sync::mpsc::unbounded_channel();
        Arc::new(Self {
            id: PeerId(id),
            connected: AtomicBool::new(true),
            acceptance_tx,
            acceptance_rx: Mutex::new(acceptance_rx),
            pub_key_tx,
            pub_key_rx: Mutex::new(pub_key_rx),
            final_reply_tx,
            final_reply_rx: Mutex::new(final_reply_rx),
            collision_data_tx,
            collision_data_rx: Mutex::new(collision_data_rx),
            events: parking_lot::Mutex::new(Vec::new()),
            requests_received: AtomicU64::new(0),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn push_acceptance(&self, message: AcceptancePhaseMessage) {
        let _ = self.acceptance_tx.send(message);
    }

    pub fn push_pub_key(&self, message: PubKeyPhaseMessage) {
        let _ = self.pub_key_tx.send(message);
    }

    pub fn push_final_reply(&self, message: FinalReplyMessage) {
        let _ = self.final_reply_tx.send(message);
    }

    pub fn push_collision_data(&self, message: CollisionData) {
        let _ = self.collision_data_tx.send(message);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Peer for FakePeer {
    fn id(&self) -> PeerId {
        self.id
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send_insert_request(&self, _msg: InsertRequest) -> Result<(), SendError> {
        if !self.is_connected().await {
            return Err(SendError::NotConnected);
        }
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn next_acceptance_message(&self, _uid: u64) -> Option<AcceptancePhaseMessage> {
        self.acceptance_rx.lock().await.recv().await
    }

    async fn send_insert_headers(&self, _msg: InsertHeaders) -> Result<(), SendError> {
        if !self.is_connected().await {
            return Err(SendError::NotConnected);
        }
        Ok(())
    }

    async fn send_insert_data_throttled(
        &self,
        _msg: InsertData,
        _timeout: std::time::Duration,
    ) -> Result<(), DataSendError> {
        if !self.is_connected().await {
            return Err(DataSendError::NotConnected);
        }
        Ok(())
    }

    async fn send_pub_key(&self, _msg: PubKeyMsg) -> Result<(), SendError> {
        if !self.is_connected().await {
            return Err(SendError::NotConnected);
        }
        Ok(())
    }

    async fn next_pub_key_message(&self, _uid: u64) -> Option<PubKeyPhaseMessage> {
        self.pub_key_rx.lock().await.recv().await
    }

    async fn next_final_reply_message(&self, _uid: u64) -> Option<FinalReplyMessage> {
        self.final_reply_rx.lock().await.recv().await
    }

    async fn next_collision_data(&self, _uid: u64) -> Option<CollisionData> {
        self.collision_data_rx.lock().await.recv().await
    }

    fn local_rejected_overload(&self, label: &str) {
        self.events
            .lock()
            .push(format!("local_rejected_overload:{label}"));
    }

    fn success_not_overload(&self) {
        self.events.lock().push("success_not_overload".to_string());
    }

    fn on_success(&self, local: bool, insert: bool) {
        self.events
            .lock()
            .push(format!("on_success:local={local},insert={insert}"));
    }
}

/// Hands out peers from a fixed pool in order, honoring the caller's
/// exclusion list and connectivity.
pub struct FakePeerTable {
    peers: Mutex<VecDeque<Arc<FakePeer>>>,
}

impl FakePeerTable {
    pub fn empty() -> Self {
        Self {
            peers: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_peers(ids: Vec<u64>) -> Self {
        Self {
            peers: Mutex::new(ids.into_iter().map(FakePeer::new).collect()),
        }
    }

    pub fn from_fakes(peers: Vec<Arc<FakePeer>>) -> Self {
        Self {
            peers: Mutex::new(peers.into()),
        }
    }
}

#[async_trait]
impl PeerTable for FakePeerTable {
    async fn closer_peer(
        &self,
        _source: Option<PeerId>,
        exclusion: &[PeerId],
        _target: f64,
        _htl: u8,
        _for_insert: bool,
    ) -> Option<Arc<dyn Peer>> {
        let peers = self.peers.lock().await;
        peers
            .iter()
            .find(|peer| !exclusion.contains(&peer.id()))
            .map(|peer| peer.clone() as Arc<dyn Peer>)
    }
}

/// Always decrements HTL by exactly one (no boundary probabilism), for
/// deterministic test scenarios.
pub struct FixedDecrementPolicy;

impl HtlPolicy for FixedDecrementPolicy {
    fn decrement_htl(&self, _requestor: Option<PeerId>, htl: u8) -> u8 {
        htl.saturating_sub(1)
    }
}

#[derive(Default)]
pub struct NullInsertRegistry;

impl InsertRegistry for NullInsertRegistry {
    fn register(&self, _key: &Key, _orig_htl: u8, _uid: u64) {}
    fn deregister(&self, _key: &Key, _orig_htl: u8, _uid: u64) {}
}

#[derive(Default)]
pub struct CountingNodeStats {
    pub sent: AtomicU64,
    pub received: AtomicU64,
    pub payload: AtomicU64,
}

impl NodeStats for CountingNodeStats {
    fn insert_sent_bytes(&self, _is_ssk: bool, delta: u64) {
        self.sent.fetch_add(delta, Ordering::Relaxed);
    }

    fn insert_received_bytes(&self, _is_ssk: bool, delta: u64) {
        self.received.fetch_add(delta, Ordering::Relaxed);
    }

    fn sent_payload(&self, bytes: u64) {
        self.payload.fetch_add(bytes, Ordering::Relaxed);
    }
}
