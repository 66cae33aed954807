//! Heart-rate ingest port. The BLE HR *client* that actually
//! talks to a chest strap is out of scope; this module only validates
//! and stages bpm values handed to it by that opaque producer.

use rowmetrics_traits::Clock;
use std::sync::Arc;
use std::time::Instant;

pub const MIN_BPM: u8 = 30;
pub const MAX_BPM: u8 = 220;
/// A reading older than this is considered stale; `current()` returns 0.
pub const STALE_AFTER_MS: u64 = 5_000;
/// HR trace cap while a session is `Running`.
pub const HR_TRACE_CAP: usize = 7_200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrSample {
    pub t_ms: u64,
    pub bpm: u8,
}

pub struct HrState {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    last_bpm: u8,
    last_update_us: u64,
    trace: Vec<HrSample>,
    recording: bool,
}

impl HrState {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            last_bpm: 0,
            last_update_us: 0,
            trace: Vec::new(),
            recording: false,
        }
    }

    /// Enable/disable appending to the session HR trace.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
        if !recording {
            self.trace.clear();
        }
    }

    /// Accept a bpm reading if it falls in `[30, 220]`; out-of-range values
    /// are silently rejected as a transient sensor error.
    pub fn observe(&mut self, bpm: u8) -> bool {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            tracing::debug!(bpm, "hr: rejected out-of-range reading");
            return false;
        }
        let now_us = self.clock.us_since(self.epoch);
        self.last_bpm = bpm;
        self.last_update_us = now_us;
        if self.recording && self.trace.len() < HR_TRACE_CAP {
            self.trace.push(HrSample {
                t_ms: now_us / 1000,
                bpm,
            });
        }
        true
    }

    /// `0` if the last update is older than [`STALE_AFTER_MS`] or none has
    /// ever arrived.
    pub fn current(&self) -> u8 {
        if self.last_update_us == 0 {
            return 0;
        }
        let now_us = self.clock.us_since(self.epoch);
        let age_ms = now_us.saturating_sub(self.last_update_us) / 1000;
        if age_ms > STALE_AFTER_MS { 0 } else { self.last_bpm }
    }

    pub fn trace(&self) -> &[HrSample] {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestClock;
    use std::time::Duration;

    #[test]
    fn rejects_out_of_range_bpm() {
        let clock = Arc::new(TestClock::new());
        let mut hr = HrState::new(clock);
        assert!(!hr.observe(0));
        assert!(!hr.observe(250));
        assert_eq!(hr.current(), 0);
    }

    #[test]
    fn accepted_reading_is_current_until_stale() {
        let clock = Arc::new(TestClock::new());
        let mut hr = HrState::new(clock.clone());
        assert!(hr.observe(140));
        assert_eq!(hr.current(), 140);
        clock.advance(Duration::from_secs(6));
        assert_eq!(hr.current(), 0, "reading older than 5s must report stale");
    }

    #[test]
    fn trace_only_appends_while_recording() {
        let clock = Arc::new(TestClock::new());
        let mut hr = HrState::new(clock);
        hr.observe(120);
        assert!(hr.trace().is_empty());
        hr.set_recording(true);
        hr.observe(121);
        assert_eq!(hr.trace().len(), 1);
        hr.set_recording(false);
        assert!(hr.trace().is_empty());
    }

    #[test]
    fn trace_caps_at_7200_samples() {
        let clock = Arc::new(TestClock::new());
        let mut hr = HrState::new(clock.clone());
        hr.set_recording(true);
        for _ in 0..(HR_TRACE_CAP + 10) {
            hr.observe(100);
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(hr.trace().len(), HR_TRACE_CAP);
    }
}
