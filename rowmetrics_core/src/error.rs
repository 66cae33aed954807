//! Errors that can cross a component boundary.
//!
//! Transient sensor rejections (out-of-range Δt, rejected `k_meas`, stale HR)
//! are *not* represented here: they never escape their component, so
//! they are handled locally with a `tracing` log and a rejected-sample
//! counter, never a `Result::Err`. `RowError` only covers what legitimately
//! crosses into a caller: bad session ids, exhausted resources, protocol
//! back-pressure, and init-time failures.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Invalid session id, malformed request shape. Surfaced by a caller as 4xx.
    #[error("contract violation: {0}")]
    Contract(String),
    /// Ring full, client list full, storage write failure. Logged, non-fatal.
    #[error("resource exhausted: {0}")]
    Resource(String),
    /// BLE notify queue full. Dropped this tick, retried next interval.
    #[error("protocol back-pressure: {0}")]
    Protocol(String),
    /// Mutex/event-group creation failure at init. Unrecoverable.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        assert_eq!(
            RowError::Contract("bad id".into()).to_string(),
            "contract violation: bad id"
        );
        assert_eq!(
            RowError::Resource("ring full".into()).to_string(),
            "resource exhausted: ring full"
        );
        assert_eq!(
            RowError::Protocol("queue full".into()).to_string(),
            "protocol back-pressure: queue full"
        );
        assert_eq!(RowError::Fatal("init".into()).to_string(), "fatal: init");
    }
}
