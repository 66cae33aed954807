#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Rowing-metrics dataflow: pulse ingestion through the canonical metrics
//! snapshot, session lifecycle, and the two external serialization
//! surfaces (BLE FTMS, web JSON). No I/O — concrete GPIO, BLE, HTTP, and
//! storage adapters live in `rowmetrics_hardware` and whatever server
//! binary wires this crate up.
//!
//! Dataflow: `ingest::Core` (C1 consumer → C2 → C3/C4 → C5 → C6) feeds
//! `snapshot::SharedSnapshot`, which `session::SessionController` (C7) and
//! `broadcast::Fanout` (C8) read independently. `hr::HrState` (C9) and
//! `inertia::InertiaCalibration` (C10) are separate producers wired in by
//! the caller.

pub mod broadcast;
pub mod distance;
pub mod drag;
pub mod energy;
pub mod error;
pub mod ftms;
pub mod hr;
pub mod ingest;
pub mod inertia;
pub mod kinematics;
pub mod session;
pub mod snapshot;
pub mod stroke;
pub mod webjson;

#[cfg(test)]
mod test_support;

pub use error::RowError;
pub use ingest::Core;
pub use snapshot::{MetricsSnapshot, SharedSnapshot};
pub use stroke::Phase;
