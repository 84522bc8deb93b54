//! Routing Controller: maintains the already-routed set for one job and
//! asks the node's peer table for the next best hop.

use std::sync::Arc;

use crate::node::PeerTable;
use crate::peer::{Peer, PeerId};

/// Per-job routing state. Accessed only by the job's own worker task, so
/// it needs no synchronization of its own.
pub struct RoutingController {
    peer_table: Arc<dyn PeerTable>,
    routed: Vec<PeerId>,
}

impl RoutingController {
    pub fn new(peer_table: Arc<dyn PeerTable>) -> Self {
        Self {
            peer_table,
            routed: Vec::new(),
        }
    }

    /// The peers already attempted for this job, oldest first.
    pub fn routed_peers(&self) -> &[PeerId] {
        &self.routed
    }

    /// Consult the peer table for the closest peer to `target` excluding
    /// everything already routed, and record it if found. An excluded
    /// peer is never re-selected for this job.
    pub async fn pick_next(
        &mut self,
        source: Option<PeerId>,
        target: f64,
        htl: u8,
    ) -> Option<Arc<dyn Peer>> {
        let peer = self
            .peer_table
            .closer_peer(source, &self.routed, target, htl, true)
            .await?;
        self.routed.push(peer.id());
        Some(peer)
    }
}
