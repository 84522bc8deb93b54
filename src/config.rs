//! Tunables for the sender, grounded on `lib-network`'s
//! `RoutingConfiguration`/`RegistryConfig` pattern of a plain struct with
//! a `Default` impl rather than environment-variable lookups inside the
//! crate (see `DESIGN.md`).

use std::time::Duration;

/// Maximum HTL accepted at job construction; every HTL clamp operation
/// needs an upper bound to validate against.
pub const DEFAULT_MAX_HTL: u8 = 18;

/// Accept/reject handshake and pubkey-exchange timeout.
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Final-reply phase timeout.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport-supplied default for the throttled data push; overridable
/// per [`SenderConfig`].
pub const DEFAULT_DATA_INSERT_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport-supplied default for the collision data-body wait.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for one [`crate::sender::InsertSender`] (or a node-wide
/// default shared across many).
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub max_htl: u8,
    pub accept_timeout: Duration,
    pub search_timeout: Duration,
    pub data_insert_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Design Note: the outer drive loop is unbounded by default.
    /// Decided in `DESIGN.md` as an optional, node-settable cap
    /// defaulting to `None` (unbounded, matching upstream behavior).
    pub max_iterations: Option<u32>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_htl: DEFAULT_MAX_HTL,
            accept_timeout: ACCEPT_TIMEOUT,
            search_timeout: SEARCH_TIMEOUT,
            data_insert_timeout: DEFAULT_DATA_INSERT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_iterations: None,
        }
    }
}
