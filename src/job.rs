//! `InsertJob`: the Insert Sender's own per-request state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::block::{PublicKeyHash, SskBlock};
use crate::bytes::ByteCounters;
use crate::peer::PeerId;
use crate::status::{FinishCode, StatusRegister};

/// Mutable state guarded by a single lock: the current block (replaced
/// wholesale on collision) and the HTL counter, which may only be
/// clamped downward.
struct MutableState {
    block: SskBlock,
    htl: u8,
}

/// Per-request state created at construction and destroyed on
/// termination. Owned by its executing task; peers never hold a
/// reference into it.
pub struct InsertJob {
    pub uid: u64,
    state: parking_lot::RwLock<MutableState>,
    pub_key_hash: PublicKeyHash,
    target: f64,
    pub source: Option<PeerId>,
    pub from_store: bool,
    pub can_write_client_cache: bool,
    pub can_write_datastore: bool,
    sent_request: AtomicBool,
    pub status: StatusRegister,
    has_collided: AtomicBool,
    /// Edge-trigger bit: true after a collision, cleared by one
    /// consumer read. A `Mutex<bool>` rather than an `AtomicBool`
    /// because the consuming read is a compound check-and-clear that
    /// must be atomic as a whole, not just the individual load/store.
    has_recently_collided: parking_lot::Mutex<bool>,
    has_forwarded_rejected_overload: AtomicBool,
    pub bytes: ByteCounters,
    pub start_time: Instant,
    collision_notify: tokio::sync::Notify,
}

impl InsertJob {
    /// `htl` above `max_htl` is clamped down at construction, keeping the
    /// counter within its documented domain from the very first read.
    pub fn new(
        uid: u64,
        block: SskBlock,
        htl: u8,
        max_htl: u8,
        source: Option<PeerId>,
        from_store: bool,
        can_write_client_cache: bool,
        can_write_datastore: bool,
    ) -> Arc<Self> {
        let pub_key_hash = block.public_key().hash();
        let target = block.key().routing_target();
        let htl = htl.min(max_htl);
        Arc::new(Self {
            uid,
            state: parking_lot::RwLock::new(MutableState { block, htl }),
            pub_key_hash,
            target,
            source,
            from_store,
            can_write_client_cache,
            can_write_datastore,
            sent_request: AtomicBool::new(false),
            status: StatusRegister::new(),
            has_collided: AtomicBool::new(false),
            has_recently_collided: parking_lot::Mutex::new(false),
            has_forwarded_rejected_overload: AtomicBool::new(false),
            bytes: ByteCounters::new(),
            start_time: Instant::now(),
            collision_notify: tokio::sync::Notify::new(),
        })
    }

    pub fn htl(&self) -> u8 {
        self.state.read().htl
    }

    /// Clamp HTL downward only, never raise it. `new_htl`
    /// larger than the current value is a no-op.
    pub fn clamp_htl(&self, new_htl: u8) {
        let mut state = self.state.write();
        if new_htl < state.htl {
            state.htl = new_htl;
        }
    }

    pub fn set_htl(&self, htl: u8) {
        self.state.write().htl = htl;
    }

    pub fn block(&self) -> SskBlock {
        self.state.read().block.clone()
    }

    pub fn headers(&self) -> Vec<u8> {
        self.state.read().block.headers().to_vec()
    }

    pub fn data(&self) -> Vec<u8> {
        self.state.read().block.data().to_vec()
    }

    pub fn key(&self) -> crate::block::Key {
        self.state.read().block.key().clone()
    }

    pub fn pub_key_hash(&self) -> PublicKeyHash {
        self.pub_key_hash
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn sent_request(&self) -> bool {
        self.sent_request.load(Ordering::Acquire)
    }

    /// Becomes true after the first successful transmission to any peer;
    /// never reverts.
    pub fn mark_sent_request(&self) {
        self.sent_request.store(true, Ordering::Release);
    }

    pub fn has_collided(&self) -> bool {
        self.has_collided.load(Ordering::Acquire)
    }

    /// Consuming read of the collision edge bit: returns `true` at most
    /// once per collision event.
    pub fn has_recently_collided(&self) -> bool {
        let mut bit = self.has_recently_collided.lock();
        std::mem::take(&mut *bit)
    }

    /// Overwrite `headers` from a collision-resolution reply, ahead of
    /// the remote data body that follows it.
    pub fn overwrite_collision_headers(&self, headers: Vec<u8>) {
        self.state.write().block.set_headers(headers);
    }

    /// Replace the block wholesale with the reconstructed remote
    /// payload and flip the collision bits.
    pub fn adopt_collision_block(&self, block: SskBlock) {
        self.state.write().block = block;
        self.has_collided.store(true, Ordering::Release);
        *self.has_recently_collided.lock() = true;
        self.collision_notify.notify_waiters();
    }

    /// Resolves once per collision event, for observers that want to
    /// react immediately rather than poll `has_recently_collided`.
    pub async fn collided(&self) {
        self.collision_notify.notified().await;
    }

    /// Idempotent: the first call sets the sticky bit and reports
    /// `true`; later calls are no-ops and report `false`.
    pub fn forward_rejected_overload(&self) -> bool {
        self.has_forwarded_rejected_overload
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn received_rejected_overload(&self) -> bool {
        self.has_forwarded_rejected_overload.load(Ordering::Acquire)
    }

    pub fn status(&self) -> FinishCode {
        self.status.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Key, PublicKey, SskBlock};

    fn sample_job(htl: u8) -> Arc<InsertJob> {
        let block = SskBlock::new(
            Key(b"k".to_vec()),
            b"h".to_vec(),
            b"d".to_vec(),
            PublicKey(b"pk".to_vec()),
        )
        .unwrap();
        InsertJob::new(1, block, htl, 18, None, false, true, true)
    }

    #[test]
    fn construction_clamps_htl_to_max() {
        let block = SskBlock::new(
            Key(b"k".to_vec()),
            b"h".to_vec(),
            b"d".to_vec(),
            PublicKey(b"pk".to_vec()),
        )
        .unwrap();
        let job = InsertJob::new(1, block, 30, 18, None, false, true, true);
        assert_eq!(job.htl(), 18);
    }

    #[test]
    fn htl_clamps_downward_only() {
        let job = sample_job(10);
        job.clamp_htl(5);
        assert_eq!(job.htl(), 5);
        job.clamp_htl(8);
        assert_eq!(job.htl(), 5);
    }

    #[test]
    fn recently_collided_is_consumed_once() {
        let job = sample_job(5);
        assert!(!job.has_recently_collided());
        let block = SskBlock::new(
            Key(b"k".to_vec()),
            b"h2".to_vec(),
            b"remote".to_vec(),
            PublicKey(b"pk".to_vec()),
        )
        .unwrap();
        job.adopt_collision_block(block);
        assert!(job.has_collided());
        assert!(job.has_recently_collided());
        assert!(!job.has_recently_collided());
        assert!(job.has_collided());
    }

    #[test]
    fn forward_overload_is_idempotent() {
        let job = sample_job(5);
        assert!(job.forward_rejected_overload());
        assert!(!job.forward_rejected_overload());
        assert!(job.received_rejected_overload());
    }
}
