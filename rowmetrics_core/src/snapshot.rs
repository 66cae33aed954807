//! Canonical metrics aggregate.
//!
//! A single struct behind a short-held mutex. Every producing component
//! (C1-C5, C9, C10) updates it under the lock; every consumer (C7, C8) reads
//! a full copy under the lock. No field tearing is observable across the
//! lock boundary.

use crate::stroke::Phase;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    // Timing
    pub elapsed_ms: u64,
    pub session_started: bool,
    pub is_paused: bool,
    pub pause_start_us: u64,
    pub total_paused_ms: u64,
    pub last_resume_us: u64,

    // Kinematics
    pub omega: f32,
    pub alpha: f32,

    // Drag
    pub k: f32,
    pub drag_factor: f32,
    pub calibrated: bool,

    // Stroke
    pub phase: Phase,
    pub stroke_count: u32,
    pub stroke_rate_spm: f32,
    pub avg_stroke_rate_spm: f32,

    // Power/Energy
    pub power_inst_w: f32,
    pub power_display_w: f32,
    pub power_peak_w: f32,
    pub power_avg_w: f32,
    pub total_work_j: f32,
    pub calories_kcal: f32,
    pub calories_per_hour: f32,

    // Distance/Pace
    pub distance_m: f32,
    pub pace_inst_s500: Option<f32>,
    pub pace_avg_s500: Option<f32>,
    pub pace_best_s500: Option<f32>,
    pub dist_per_stroke_m: f32,

    // Flags
    pub is_active: bool,
    pub valid_data: bool,

    // Heart rate (C9)
    pub heart_rate_bpm: u8,
    pub avg_heart_rate_bpm: u8,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            elapsed_ms: 0,
            session_started: false,
            is_paused: false,
            pause_start_us: 0,
            total_paused_ms: 0,
            last_resume_us: 0,
            omega: 0.0,
            alpha: 0.0,
            k: 0.0,
            drag_factor: 0.0,
            calibrated: false,
            phase: Phase::Idle,
            stroke_count: 0,
            stroke_rate_spm: 0.0,
            avg_stroke_rate_spm: 0.0,
            power_inst_w: 0.0,
            power_display_w: 0.0,
            power_peak_w: 0.0,
            power_avg_w: 0.0,
            total_work_j: 0.0,
            calories_kcal: 0.0,
            calories_per_hour: 0.0,
            distance_m: 0.0,
            pace_inst_s500: None,
            pace_avg_s500: None,
            pace_best_s500: None,
            dist_per_stroke_m: 0.0,
            is_active: false,
            valid_data: false,
            heart_rate_bpm: 0,
            avg_heart_rate_bpm: 0,
        }
    }
}

impl MetricsSnapshot {
    /// `metrics.reset()`:
    /// clears session-scoped fields, preserves drag calibration state since
    /// it is a property of the flywheel, not the session.
    pub fn reset_preserving_calibration(&mut self) {
        let k = self.k;
        let drag_factor = self.drag_factor;
        let calibrated = self.calibrated;
        *self = Self::default();
        self.k = k;
        self.drag_factor = drag_factor;
        self.calibrated = calibrated;
    }
}

/// Mutex-protected single writable instance. Readers
/// copy the whole struct under the lock; writers hold the lock only for the
/// duration of the field updates, never across a suspension point.
#[derive(Debug, Default)]
pub struct SharedSnapshot {
    inner: Mutex<MetricsSnapshot>,
}

impl SharedSnapshot {
    pub fn new(initial: MetricsSnapshot) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    /// Full copy under a short-held lock.
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.lock()
    }

    /// Scoped write-lease. The
    /// closure must not suspend.
    pub fn update<R>(&self, f: impl FnOnce(&mut MetricsSnapshot) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::error!("metrics snapshot mutex poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_preserves_calibration_fields_only() {
        let mut snap = MetricsSnapshot {
            k: 1.2e-4,
            drag_factor: 120.0,
            calibrated: true,
            distance_m: 500.0,
            stroke_count: 42,
            ..Default::default()
        };
        snap.reset_preserving_calibration();
        assert_eq!(snap.k, 1.2e-4);
        assert_eq!(snap.drag_factor, 120.0);
        assert!(snap.calibrated);
        assert_eq!(snap.distance_m, 0.0);
        assert_eq!(snap.stroke_count, 0);
    }

    #[test]
    fn shared_snapshot_update_is_visible_to_next_read() {
        let shared = SharedSnapshot::new(MetricsSnapshot::default());
        shared.update(|s| s.stroke_count = 7);
        assert_eq!(shared.snapshot().stroke_count, 7);
    }
}
