#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Named interfaces sitting between `rowmetrics_core` and the collaborators
//! that are out of scope for this crate: the GPIO driver, the BLE host
//! stack, the HTTP/WS/SSE server, and the NVS key-value store.
//!
//! Mirrors the shape of a `Scale`/`Motor` boundary: the core dataflow is
//! written once against these traits, real and simulated implementations
//! live in `rowmetrics_hardware`, and nothing in this crate depends on any
//! hardware or networking library.

pub mod clock;

use std::error::Error;
use std::time::Duration;

pub use clock::{Clock, MonotonicClock};

/// Which debounced GPIO line a [`PulseEvent`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseChannel {
    Flywheel,
    Seat,
}

/// A single debounced active edge, timestamped on a monotonic microsecond clock.
///
/// Produced on each accepted edge; consumed exactly once. See #[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEvent {
    pub channel: PulseChannel,
    pub t_us: u64,
}

/// A blocking source of debounced pulse events, one per GPIO-backed channel pair.
///
/// Implementations must apply the per-channel debounce window themselves
/// (10 ms flywheel / 50 ms seat by default) before yielding an event; the
/// consumer only checks that `t_us` is strictly increasing per channel.
pub trait PulseSource {
    /// Block for up to `timeout` for the next debounced edge on either channel.
    ///
    /// Returns `Err` on a hardware fault (e.g. GPIO line unavailable); a
    /// plain timeout with no edge is represented by the caller's usual
    /// channel-recv-timeout error, not by this trait.
    fn next_pulse(
        &mut self,
        timeout: Duration,
    ) -> Result<PulseEvent, Box<dyn Error + Send + Sync>>;
}

impl<T: ?Sized + PulseSource> PulseSource for Box<T> {
    fn next_pulse(
        &mut self,
        timeout: Duration,
    ) -> Result<PulseEvent, Box<dyn Error + Send + Sync>> {
        (**self).next_pulse(timeout)
    }
}

/// The single capability every broadcast transport (BLE notify, WebSocket, SSE) is
/// unified behind. : "the fan-out layer is written once against this
/// capability… no runtime class hierarchy."
pub trait BroadcastSink: Send {
    fn is_connected(&self) -> bool;

    /// Best-effort send of one already-encoded frame. An `Err` marks the
    /// client dead; the fan-out layer reaps it on the next tick.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T: ?Sized + BroadcastSink> BroadcastSink for Box<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        (**self).send(bytes)
    }
}

/// Named interface standing in for the on-device NVS key-value store.
/// Operates on opaque, already-serialized blobs: the `rowing/` namespace
/// (config) is the caller's concern, this trait only covers the
/// `sessions/` namespace (`count`, `s{slot}`, `d{slot}`).
pub trait SessionStore: Send + Sync {
    /// Errors are transport/storage failures; a missing slot is `Ok(None)`, not an error.
    type Error: Error + Send + Sync + 'static;

    /// Allocate the next monotone session id (`prev + 1`).
    fn next_id(&self) -> Result<u32, Self::Error>;

    fn save_record(&self, slot: u32, bytes: &[u8]) -> Result<(), Self::Error>;
    fn load_record(&self, slot: u32) -> Result<Option<Vec<u8>>, Self::Error>;
    fn save_samples(&self, slot: u32, bytes: &[u8]) -> Result<(), Self::Error>;
    fn load_samples(&self, slot: u32) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Erase both the record and the sample blob for `slot`.
    fn delete(&self, slot: u32) -> Result<(), Self::Error>;
}
