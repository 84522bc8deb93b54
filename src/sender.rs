//! Insert Sender: the top-level loop that decrements HTL, drives
//! routing and the per-hop protocol, and finalizes the job.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, instrument, warn};

use crate::block::SskBlock;
use crate::config::SenderConfig;
use crate::job::InsertJob;
use crate::node::{HtlPolicy, InsertRegistry, NodeStats, PeerTable};
use crate::peer::PeerId;
use crate::protocol::{HopDriver, HopOutcome};
use crate::routing::RoutingController;
use crate::status::FinishCode;
use crate::verify::BlockVerifier;

/// Owns everything one insert needs from the node environment, bundled
/// so `InsertSender::new` takes one handle (grounded on `lib-network`'s
/// `MeshMessageHandler`, which is likewise constructed from a cluster of
/// `Arc`-shared collaborators rather than many loose parameters).
pub struct InsertSenderDeps {
    pub peer_table: Arc<dyn PeerTable>,
    pub htl_policy: Arc<dyn HtlPolicy>,
    pub registry: Arc<dyn InsertRegistry>,
    pub stats: Arc<dyn NodeStats>,
    pub verifier: Arc<dyn BlockVerifier>,
}

/// Drives a single [`InsertJob`] to completion.
pub struct InsertSender {
    job: Arc<InsertJob>,
    deps: InsertSenderDeps,
    config: SenderConfig,
    orig_htl: u8,
}

impl InsertSender {
    pub fn new(
        uid: u64,
        block: SskBlock,
        htl: u8,
        source: Option<PeerId>,
        from_store: bool,
        can_write_client_cache: bool,
        can_write_datastore: bool,
        deps: InsertSenderDeps,
        config: SenderConfig,
    ) -> Arc<Self> {
        let job = InsertJob::new(
            uid,
            block,
            htl,
            config.max_htl,
            source,
            from_store,
            can_write_client_cache,
            can_write_datastore,
        );
        let orig_htl = job.htl();
        Arc::new(Self {
            orig_htl,
            job,
            deps,
            config,
        })
    }

    pub fn job(&self) -> &Arc<InsertJob> {
        &self.job
    }

    /// Schedules the job on a background task at high priority. Realized
    /// here as `tokio::spawn` — `lib-network` likewise hands its
    /// long-lived per-connection work to `tokio::spawn` rather than a
    /// custom executor abstraction.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    /// Runs the loop synchronously to completion; `start()` is a thin
    /// `tokio::spawn` wrapper around this for callers that already have
    /// their own task.
    #[instrument(skip(self), fields(uid = self.job.uid))]
    pub async fn run(self: &Arc<Self>) {
        self.deps
            .registry
            .register(&self.job.key(), self.orig_htl, self.job.uid);

        info!("insert sender starting, htl={}", self.job.htl());
        let result = self.drive().await;
        if let Err(fault) = result {
            error!("insert sender faulted: {fault:#}");
            let _ = self
                .job
                .status
                .finish(FinishCode::InternalError, self.job.sent_request());
        }

        self.deps
            .registry
            .deregister(&self.job.key(), self.orig_htl, self.job.uid);
        info!(status = %self.job.status(), "insert sender finished");
    }

    /// The per-iteration algorithm. Returns `Err` only for
    /// programming-error surfaces (double-finalize); protocol outcomes
    /// are handled in place.
    async fn drive(self: &Arc<Self>) -> Result<()> {
        let mut routing = RoutingController::new(self.deps.peer_table.clone());
        let mut last_peer: Option<Arc<dyn crate::peer::Peer>> = None;
        let mut requests_sent = 0u32;

        loop {
            if let Some(max) = self.config.max_iterations {
                if requests_sent >= max {
                    self.finish(FinishCode::RouteNotFound, None)?;
                    return Ok(());
                }
            }

            // Step 1: HTL decrement. The requestor is the previously
            // chosen peer once a request has been sent, else the
            // original source.
            let requestor = if self.job.sent_request() {
                last_peer.as_ref().map(|peer| peer.id())
            } else {
                self.job.source
            };
            let decremented = self.deps.htl_policy.decrement_htl(requestor, self.job.htl());
            self.job.set_htl(decremented);

            // Step 2: boundary check.
            if self.job.htl() == 0 {
                info!("htl reached zero, insert has propagated far enough");
                self.finish(FinishCode::Success, last_peer.as_ref())?;
                return Ok(());
            }

            // Step 3: peer selection.
            let peer = match routing
                .pick_next(self.job.source, self.job.target(), self.job.htl())
                .await
            {
                Some(peer) => peer,
                None => {
                    warn!("route exhausted, no peer available");
                    self.finish(FinishCode::RouteNotFound, None)?;
                    return Ok(());
                }
            };

            // Step 4: hop protocol.
            let driver = HopDriver::new(
                &self.job,
                &peer,
                &self.config,
                self.deps.verifier.as_ref(),
                self.deps.stats.as_ref(),
            );
            requests_sent += 1;
            match driver.run().await {
                HopOutcome::Terminate(code) => {
                    self.finish(code, Some(&peer))?;
                    return Ok(());
                }
                HopOutcome::RetryAnotherPeer => {
                    last_peer = Some(peer);
                    continue;
                }
                HopOutcome::AdjustHtlAndRetry(new_htl) => {
                    self.job.clamp_htl(new_htl);
                    last_peer = Some(peer);
                    continue;
                }
            }
        }
    }

    /// Rewrites `ROUTE_NOT_FOUND` when no request was ever sent, stores
    /// the finish code, wakes waiters, and — on `SUCCESS` with a known
    /// peer — credits that peer outside the critical section (the peer
    /// callback itself has no lock of its own here, so the ordering is
    /// cosmetic, not load-bearing for correctness).
    fn finish(&self, code: FinishCode, last_peer: Option<&Arc<dyn crate::peer::Peer>>) -> Result<()> {
        let sent_request = self.job.sent_request();
        let stored = self.job.status.finish(code, sent_request)?;
        if stored == FinishCode::Success {
            if let Some(peer) = last_peer {
                peer.on_success(true, true);
            }
        }
        Ok(())
    }
}
