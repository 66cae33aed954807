//! Hardware-adapter errors: GPIO faults and persistence I/O faults.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("pulse channel closed")]
    ChannelClosed,
    #[error("timed out waiting for an edge")]
    Timeout,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
