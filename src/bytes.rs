//! Byte accounting: pure additive state tracking bytes sent and received
//! on behalf of a single insert, guarded by its own monitor so observers
//! never contend with the job's status/HTL lock.

/// Accumulated send/receive totals for one insert job.
#[derive(Debug, Default)]
pub struct ByteCounters {
    inner: parking_lot::Mutex<Totals>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    sent: u64,
    received: u64,
}

impl ByteCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sent(&self, delta: u64) {
        self.inner.lock().sent += delta;
    }

    pub fn add_received(&self, delta: u64) {
        self.inner.lock().received += delta;
    }

    pub fn sent(&self) -> u64 {
        self.inner.lock().sent
    }

    pub fn received(&self) -> u64 {
        self.inner.lock().received
    }
}
