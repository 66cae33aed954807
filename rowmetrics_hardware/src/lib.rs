#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Concrete adapters for the named interfaces in `rowmetrics_traits`: a
//! debounced GPIO (or simulated) pulse source and a JSON-file-backed
//! session store standing in for the on-device NVS driver. Nothing in `rowmetrics_core` depends on this crate; it is wired
//! in by a binary such as `rowmetrics_cli`.

pub mod error;
pub mod pulse;
pub mod store;

pub use error::HwError;
pub use pulse::{Debounced, PulseThread, RawEdgeSource, SimulatedPulseSource};
pub use store::{FileSessionStore, InMemorySessionStore};
