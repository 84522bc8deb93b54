//! Terminal status codes and the one-shot status register.

use std::fmt;

/// Terminal (and running) states of an insert job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishCode {
    Running,
    Success,
    RouteNotFound,
    RouteReallyNotFound,
    InternalError,
    TimedOut,
    GeneratedRejectedOverload,
}

impl FinishCode {
    /// Canonical external label; unknown numeric codes are not
    /// representable by this enum, so the `UNKNOWN STATUS CODE: <n>`
    /// fallback lives only in [`status_label_for_code`], which accepts a
    /// raw integer for callers bridging a wire protocol.
    pub fn label(&self) -> &'static str {
        match self {
            FinishCode::Running => "NOT FINISHED",
            FinishCode::Success => "SUCCESS",
            FinishCode::RouteNotFound => "ROUTE NOT FOUND",
            FinishCode::RouteReallyNotFound => "ROUTE REALLY NOT FOUND",
            FinishCode::InternalError => "INTERNAL ERROR",
            FinishCode::TimedOut => "TIMED OUT",
            FinishCode::GeneratedRejectedOverload => "GENERATED REJECTED OVERLOAD",
        }
    }

    fn code(&self) -> u8 {
        match self {
            FinishCode::Running => 0,
            FinishCode::Success => 1,
            FinishCode::RouteNotFound => 2,
            FinishCode::RouteReallyNotFound => 3,
            FinishCode::InternalError => 4,
            FinishCode::TimedOut => 5,
            FinishCode::GeneratedRejectedOverload => 6,
        }
    }
}

impl fmt::Display for FinishCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// External vocabulary fallback for an arbitrary wire status code,
/// rendering the `"UNKNOWN STATUS CODE: <n>"` form for anything this
/// enum can't represent.
pub fn status_label_for_code(code: u8) -> String {
    for known in [
        FinishCode::Success,
        FinishCode::RouteNotFound,
        FinishCode::RouteReallyNotFound,
        FinishCode::Running,
        FinishCode::InternalError,
        FinishCode::TimedOut,
        FinishCode::GeneratedRejectedOverload,
    ] {
        if known.code() == code {
            return known.label().to_string();
        }
    }
    format!("UNKNOWN STATUS CODE: {code}")
}

/// Error raised when `finish()` is invoked on a job that has already
/// finalized. This is a programming-error surface: it is never produced
/// by normal protocol flow and must be surfaced to the caller, not
/// silently absorbed.
#[derive(Debug)]
pub struct AlreadyFinished(pub FinishCode);

impl fmt::Display for AlreadyFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insert job finalized twice; already {}",
            self.0.label()
        )
    }
}

impl std::error::Error for AlreadyFinished {}

/// One-shot terminal-state cell, guarded by the same monitor as the job's
/// HTL and collision bits.
pub struct StatusRegister {
    status: parking_lot::RwLock<FinishCode>,
    notify: tokio::sync::Notify,
}

impl StatusRegister {
    pub fn new() -> Self {
        Self {
            status: parking_lot::RwLock::new(FinishCode::Running),
            notify: tokio::sync::Notify::new(),
        }
    }

    pub fn get(&self) -> FinishCode {
        *self.status.read()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.get(), FinishCode::Running)
    }

    /// Finalize the job. Rewrites `RouteNotFound -> RouteReallyNotFound`
    /// when `sent_request` is false, asserts the one-shot invariant, and
    /// wakes every waiter.
    pub fn finish(&self, mut code: FinishCode, sent_request: bool) -> Result<FinishCode, AlreadyFinished> {
        let mut guard = self.status.write();
        if !matches!(*guard, FinishCode::Running) {
            return Err(AlreadyFinished(*guard));
        }
        if code == FinishCode::RouteNotFound && !sent_request {
            code = FinishCode::RouteReallyNotFound;
        }
        *guard = code;
        drop(guard);
        self.notify.notify_waiters();
        Ok(code)
    }

    /// Wait until the status transitions away from `Running`. Used by
    /// external observers, not the job's own driving loop.
    pub async fn wait_for_finish(&self) -> FinishCode {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return self.get();
            }
            notified.await;
        }
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(status_label_for_code(200), "UNKNOWN STATUS CODE: 200");
    }

    #[test]
    fn known_code_maps() {
        assert_eq!(status_label_for_code(1), "SUCCESS");
    }

    #[test]
    fn route_not_found_rewritten_when_never_sent() {
        let reg = StatusRegister::new();
        let code = reg.finish(FinishCode::RouteNotFound, false).unwrap();
        assert_eq!(code, FinishCode::RouteReallyNotFound);
    }

    #[test]
    fn route_not_found_kept_when_sent() {
        let reg = StatusRegister::new();
        let code = reg.finish(FinishCode::RouteNotFound, true).unwrap();
        assert_eq!(code, FinishCode::RouteNotFound);
    }

    #[test]
    fn double_finish_is_an_error() {
        let reg = StatusRegister::new();
        reg.finish(FinishCode::Success, true).unwrap();
        let err = reg.finish(FinishCode::TimedOut, true).unwrap_err();
        assert_eq!(err.0, FinishCode::Success);
    }

    #[tokio::test]
    async fn wait_for_finish_resolves() {
        let reg = std::sync::Arc::new(StatusRegister::new());
        let reg2 = reg.clone();
        let handle = tokio::spawn(async move { reg2.wait_for_finish().await });
        tokio::task::yield_now().await;
        reg.finish(FinishCode::Success, true).unwrap();
        let code = handle.await.unwrap();
        assert_eq!(code, FinishCode::Success);
    }
}
