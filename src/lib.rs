//! SSK Insert Sender.
//!
//! The per-request state machine that drives the insertion of a single
//! Signed Subspace Key (SSK) block through a structured peer-to-peer
//! overlay: distance-directed routing with backtracking, a multi-stage
//! timeout-driven message protocol tolerant of reordering, HTL
//! management, and SSK collision resolution. See `SPEC_FULL.md` at the
//! repository root for the full specification this crate implements.

pub mod block;
pub mod bytes;
pub mod config;
pub mod job;
pub mod messages;
pub mod node;
pub mod peer;
pub mod protocol;
pub mod routing;
pub mod sender;
pub mod status;
pub mod verify;

pub mod testing;

pub use block::{Key, PublicKey, PublicKeyHash, SskBlock};
pub use config::SenderConfig;
pub use job::InsertJob;
pub use sender::{InsertSender, InsertSenderDeps};
pub use status::FinishCode;
