//! Per-Hop Protocol Driver: the state machine run against one chosen
//! peer for one iteration of the outer loop.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SenderConfig;
use crate::job::InsertJob;
use crate::messages::{
    AcceptancePhaseMessage, DataInsertRejected, FinalReplyMessage, InsertData, InsertHeaders,
    InsertRequest, PubKeyMsg, PubKeyPhaseMessage, RejectReason,
};
use crate::node::NodeStats;
use crate::peer::{DataSendError, Peer};
use crate::status::FinishCode;
use crate::verify::BlockVerifier;

/// What the outer loop should do once a hop attempt concludes.
pub enum HopOutcome {
    /// Finalize the job with this code and stop.
    Terminate(FinishCode),
    /// Move to the next peer in this same iteration's HTL.
    RetryAnotherPeer,
    /// A peer advertised a lower HTL; clamp then retry another peer.
    AdjustHtlAndRetry(u8),
}

/// Runs the three-(or four-)phase protocol against a single peer,
/// mutating `job` in place (HTL clamps, collision adoption, sent_request,
/// byte counters) and returning the outcome the outer loop acts on.
pub struct HopDriver<'a> {
    job: &'a Arc<InsertJob>,
    peer: &'a Arc<dyn Peer>,
    config: &'a SenderConfig,
    verifier: &'a dyn BlockVerifier,
    stats: &'a dyn NodeStats,
    /// Set once this hop has already run collision resolution once. A
    /// second `CollisionHeaders` from the same peer within the same hop
    /// is a protocol violation, not a second legitimate collision.
    collided_this_hop: std::sync::atomic::AtomicBool,
}

impl<'a> HopDriver<'a> {
    pub fn new(
        job: &'a Arc<InsertJob>,
        peer: &'a Arc<dyn Peer>,
        config: &'a SenderConfig,
        verifier: &'a dyn BlockVerifier,
        stats: &'a dyn NodeStats,
    ) -> Self {
        Self {
            job,
            peer,
            config,
            verifier,
            stats,
            collided_this_hop: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub async fn run(&self) -> HopOutcome {
        if !self.peer.is_connected().await {
            debug!(peer = %self.peer.id(), "peer not connected before request, trying another");
            return HopOutcome::RetryAnotherPeer;
        }

        let need_pub_key = match self.phase1_acceptance().await {
            Ok(need_pub_key) => need_pub_key,
            Err(outcome) => return outcome,
        };

        if let Err(outcome) = self.phase2_payload_push(need_pub_key).await {
            return outcome;
        }

        self.phase3_final_reply().await
    }

    /// Phase 1 — Acceptance. Sends `INSERT_REQUEST` and loops on
    /// `ACCEPT_TIMEOUT` until a terminal-for-this-peer message arrives,
    /// tolerating a non-local `REJECTED_OVERLOAD` in between (it is
    /// forwarded upstream but does not end the wait).
    async fn phase1_acceptance(&self) -> Result<bool, HopOutcome> {
        let uid = self.job.uid;
        let request = InsertRequest {
            uid,
            htl: self.job.htl(),
            key: self.job.key(),
        };

        match self.peer.send_insert_request(request).await {
            Ok(()) => {}
            Err(_not_connected) => {
                debug!(peer = %self.peer.id(), "peer not connected sending INSERT_REQUEST");
                return Err(HopOutcome::RetryAnotherPeer);
            }
        }
        self.job.mark_sent_request();

        loop {
            let waited =
                tokio::time::timeout(self.config.accept_timeout, self.peer.next_acceptance_message(uid))
                    .await;

            let message = match waited {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(peer = %self.peer.id(), "disconnected awaiting acceptance");
                    return Err(HopOutcome::RetryAnotherPeer);
                }
                Err(_elapsed) => {
                    warn!(peer = %self.peer.id(), "ACCEPT_TIMEOUT awaiting acceptance");
                    self.peer.local_rejected_overload("AcceptTimeout");
                    self.job.forward_rejected_overload();
                    return Err(HopOutcome::RetryAnotherPeer);
                }
            };

            match message {
                AcceptancePhaseMessage::Accepted(accepted) => {
                    return Ok(accepted.need_pub_key);
                }
                AcceptancePhaseMessage::RejectedLoop(_) => {
                    self.peer.success_not_overload();
                    return Err(HopOutcome::RetryAnotherPeer);
                }
                AcceptancePhaseMessage::RejectedOverload(overload) => {
                    if overload.is_local {
                        self.peer.local_rejected_overload("RejectedOverloadLocal");
                        return Err(HopOutcome::RetryAnotherPeer);
                    }
                    debug!(peer = %self.peer.id(), "forwarding non-local overload, continuing to wait");
                    self.job.forward_rejected_overload();
                    continue;
                }
            }
        }
    }

    /// Phase 2 — Payload push. Sends headers, then the throttled
    /// data body, then optionally exchanges a pubkey.
    async fn phase2_payload_push(&self, need_pub_key: bool) -> Result<(), HopOutcome> {
        let uid = self.job.uid;

        let headers = InsertHeaders {
            uid,
            headers: self.job.headers(),
        };
        let headers_len = headers.headers.len() as u64;
        match self.peer.send_insert_headers(headers).await {
            Ok(()) => {
                self.job.bytes.add_sent(headers_len);
                self.stats.insert_sent_bytes(true, headers_len);
            }
            Err(_not_connected) => return Err(HopOutcome::RetryAnotherPeer),
        }

        let data = InsertData {
            uid,
            data: self.job.data(),
        };
        let data_len = data.data.len() as u64;
        match self
            .peer
            .send_insert_data_throttled(data, self.config.data_insert_timeout)
            .await
        {
            Ok(()) => {
                self.job.bytes.add_sent(data_len);
                self.stats.insert_sent_bytes(true, data_len);
                self.stats.sent_payload(data_len);
            }
            Err(DataSendError::NotConnected)
            | Err(DataSendError::WaitedTooLong)
            | Err(DataSendError::PeerRestarted) => {
                debug!(peer = %self.peer.id(), "data push failed, trying another peer");
                return Err(HopOutcome::RetryAnotherPeer);
            }
        }

        if need_pub_key {
            let msg = PubKeyMsg {
                uid,
                pub_key: self.job.block().public_key().clone(),
            };
            if self.peer.send_pub_key(msg).await.is_err() {
                return Err(HopOutcome::RetryAnotherPeer);
            }

            let waited = tokio::time::timeout(
                self.config.accept_timeout,
                self.peer.next_pub_key_message(uid),
            )
            .await;

            match waited {
                Ok(Some(PubKeyPhaseMessage::PubKeyAccepted(_))) => {}
                Ok(None) => {
                    self.job.forward_rejected_overload();
                    return Err(HopOutcome::RetryAnotherPeer);
                }
                Err(_elapsed) => {
                    self.peer.local_rejected_overload("PubKeyAcceptTimeout");
                    self.job.forward_rejected_overload();
                    return Err(HopOutcome::RetryAnotherPeer);
                }
            }
        }

        Ok(())
    }

    /// Phase 3 — Final reply, looping under `SEARCH_TIMEOUT` with
    /// the same non-local-overload reorder tolerance as phase 1, and
    /// entering phase 4 when the remote reports a collision.
    async fn phase3_final_reply(&self) -> HopOutcome {
        let uid = self.job.uid;

        loop {
            let waited = tokio::time::timeout(
                self.config.search_timeout,
                self.peer.next_final_reply_message(uid),
            )
            .await;

            let message = match waited {
                Ok(Some(message)) => message,
                Ok(None) => return HopOutcome::RetryAnotherPeer,
                Err(_elapsed) => {
                    self.peer
                        .local_rejected_overload("AfterInsertAcceptedTimeout");
                    return HopOutcome::Terminate(FinishCode::TimedOut);
                }
            };

            match message {
                FinalReplyMessage::InsertReply(_) => {
                    // `peer.on_success` is invoked by the sender's
                    // `finish()` once the job is actually finalized, not
                    // here, so a finalize race can't credit a peer for a
                    // job that ends up erroring instead.
                    return HopOutcome::Terminate(FinishCode::Success);
                }
                FinalReplyMessage::RouteNotFound(route_not_found) => {
                    self.peer.success_not_overload();
                    return HopOutcome::AdjustHtlAndRetry(route_not_found.htl);
                }
                FinalReplyMessage::DataInsertRejected(DataInsertRejected { reason, .. }) => {
                    self.peer.success_not_overload();
                    if reason == RejectReason::VerifyFailed && self.job.from_store {
                        tracing::error!(
                            peer = %self.peer.id(),
                            "data loaded from our own store failed verification downstream"
                        );
                    }
                    return HopOutcome::RetryAnotherPeer;
                }
                FinalReplyMessage::RejectedOverload(overload) => {
                    if overload.is_local {
                        self.peer.local_rejected_overload("RejectedOverloadLocal");
                        return HopOutcome::RetryAnotherPeer;
                    }
                    self.job.forward_rejected_overload();
                    continue;
                }
                FinalReplyMessage::CollisionHeaders(collision_headers) => {
                    if self
                        .collided_this_hop
                        .swap(true, std::sync::atomic::Ordering::AcqRel)
                    {
                        warn!(
                            peer = %self.peer.id(),
                            "duplicate CollisionHeaders from the same hop, treating as a protocol error"
                        );
                        return HopOutcome::Terminate(FinishCode::InternalError);
                    }
                    match self.phase4_collision(collision_headers.headers).await {
                        Ok(()) => continue,
                        Err(outcome) => return outcome,
                    }
                }
            }
        }
    }

    /// Phase 4 — Collision resolution. The remote's preexisting block
    /// wins; we adopt it and keep propagating it.
    ///
    /// Design Note: the collision headers overwrite happens here
    /// *before* the data body arrives, but the block is then
    /// reconstructed with the *original* headers, not these
    /// freshly-written ones. That is a verbatim transcription of
    /// observed upstream behavior, not a bug this crate "fixes" — see
    /// `DESIGN.md`.
    async fn phase4_collision(&self, collision_headers: Vec<u8>) -> Result<(), HopOutcome> {
        let uid = self.job.uid;
        let original_headers = self.job.headers();
        self.job.overwrite_collision_headers(collision_headers);

        let waited = tokio::time::timeout(
            self.config.fetch_timeout,
            self.peer.next_collision_data(uid),
        )
        .await;

        let collision_data = match waited {
            Ok(Some(collision_data)) => collision_data,
            Ok(None) | Err(_) => {
                debug!(peer = %self.peer.id(), "collision data wait failed, trying another peer");
                return Err(HopOutcome::RetryAnotherPeer);
            }
        };

        let received_len = collision_data.data.len() as u64;
        self.job.bytes.add_received(received_len);
        self.stats.insert_received_bytes(true, received_len);

        let key = self.job.key();
        let public_key = self.job.block().public_key().clone();
        let verified = self
            .verifier
            .verify(&collision_data.data, &original_headers, &key, &public_key);

        let reconstructed = crate::block::SskBlock::reconstruct(
            collision_data.data,
            original_headers,
            key,
            public_key,
            false,
            verified,
        );

        match reconstructed {
            Ok(block) => {
                self.job.adopt_collision_block(block);
                Ok(())
            }
            Err(_verify_failed) => Err(HopOutcome::Terminate(FinishCode::InternalError)),
        }
    }
}
