//! Inertia calibration. On-demand spin-up/spin-down
//! estimate of the flywheel's moment of inertia `I`. Exclusive: while
//! active, the caller must not route pulses to `crate::ingest::Core` and
//! must suppress `crate::session::SessionController` auto-activity — both
//! checked against the same `Arc<AtomicBool>` `crate::ingest::Core` exposes
//! via `calibration_flag()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Assumed drag coefficient used to back out `I` from the spin-down decay.
const K_ASSUMED: f32 = 1.0e-4;
/// Spin-down stops being sampled once ω falls below this (rad/s).
const SPINDOWN_STOP_OMEGA: f32 = 1.0;
/// Rejects a spin-down fit whose relative scatter in per-sample `I` estimates
/// exceeds this fraction of the mean.
const MAX_FIT_RELATIVE_SCATTER: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationPhase {
    Idle,
    Waiting,
    Spinup,
    Spindown,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStatus {
    pub phase: CalibrationPhase,
    pub peak_omega: f32,
    pub calculated_inertia: Option<f32>,
    pub failure_reason: Option<&'static str>,
}

pub struct InertiaCalibration {
    phase: CalibrationPhase,
    active_flag: Arc<AtomicBool>,
    timeout_ms: u64,
    phase_entered_us: u64,
    peak_omega: f32,
    spindown_samples: Vec<(f32, f32)>, // (omega, alpha)
    calculated_inertia: Option<f32>,
    failure_reason: Option<&'static str>,
}

impl InertiaCalibration {
    pub fn new(active_flag: Arc<AtomicBool>, timeout_ms: u64) -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            active_flag,
            timeout_ms,
            phase_entered_us: 0,
            peak_omega: 0.0,
            spindown_samples: Vec::new(),
            calculated_inertia: None,
            failure_reason: None,
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            phase: self.phase,
            peak_omega: self.peak_omega,
            calculated_inertia: self.calculated_inertia,
            failure_reason: self.failure_reason,
        }
    }

    /// Start a calibration run; no-op if one is already in progress.
    pub fn start(&mut self, now_us: u64) {
        if self.phase != CalibrationPhase::Idle
            && self.phase != CalibrationPhase::Complete
            && self.phase != CalibrationPhase::Failed
        {
            return;
        }
        self.phase = CalibrationPhase::Waiting;
        self.phase_entered_us = now_us;
        self.peak_omega = 0.0;
        self.spindown_samples.clear();
        self.calculated_inertia = None;
        self.failure_reason = None;
        self.active_flag.store(true, Ordering::SeqCst);
        tracing::info!("inertia calibration: waiting for spin");
    }

    pub fn cancel(&mut self) {
        self.phase = CalibrationPhase::Idle;
        self.active_flag.store(false, Ordering::SeqCst);
        tracing::info!("inertia calibration: cancelled");
    }

    /// Feed one flywheel kinematics update while calibration owns the
    /// flywheel.
    pub fn on_pulse(&mut self, omega: f32, alpha: f32, now_us: u64) {
        match self.phase {
            CalibrationPhase::Waiting => {
                self.peak_omega = omega;
                self.phase = CalibrationPhase::Spinup;
                self.phase_entered_us = now_us;
                tracing::info!(omega, "inertia calibration: spin detected");
            }
            CalibrationPhase::Spinup => {
                if omega > self.peak_omega {
                    self.peak_omega = omega;
                }
                if omega < 0.9 * self.peak_omega {
                    self.phase = CalibrationPhase::Spindown;
                    self.phase_entered_us = now_us;
                    self.spindown_samples.clear();
                    tracing::info!(peak_omega = self.peak_omega, "inertia calibration: spindown started");
                }
            }
            CalibrationPhase::Spindown => {
                if omega >= SPINDOWN_STOP_OMEGA {
                    self.spindown_samples.push((omega, alpha));
                } else {
                    self.finish_spindown();
                }
            }
            CalibrationPhase::Idle | CalibrationPhase::Complete | CalibrationPhase::Failed => {}
        }
    }

    /// Called at ~10 Hz while active.
    pub fn tick(&mut self, now_us: u64) {
        let in_timed_phase = matches!(
            self.phase,
            CalibrationPhase::Waiting | CalibrationPhase::Spinup | CalibrationPhase::Spindown
        );
        if in_timed_phase && now_us.saturating_sub(self.phase_entered_us) / 1000 > self.timeout_ms {
            self.phase = CalibrationPhase::Failed;
            self.failure_reason = Some("timeout");
            self.active_flag.store(false, Ordering::SeqCst);
            tracing::warn!("inertia calibration: timed out");
        }
    }

    fn finish_spindown(&mut self) {
        if self.spindown_samples.len() < 3 {
            self.phase = CalibrationPhase::Failed;
            self.failure_reason = Some("insufficient spindown samples");
            self.active_flag.store(false, Ordering::SeqCst);
            return;
        }

        let estimates: Vec<f32> = self
            .spindown_samples
            .iter()
            .filter(|(_, alpha)| *alpha < 0.0)
            .map(|(omega, alpha)| -K_ASSUMED * omega * omega / alpha)
            .collect();

        if estimates.is_empty() {
            self.phase = CalibrationPhase::Failed;
            self.failure_reason = Some("no decelerating samples");
            self.active_flag.store(false, Ordering::SeqCst);
            return;
        }

        let mean = estimates.iter().sum::<f32>() / estimates.len() as f32;
        let variance =
            estimates.iter().map(|e| (e - mean).powi(2)).sum::<f32>() / estimates.len() as f32;
        let scatter = variance.sqrt() / mean.abs().max(1e-9);

        if scatter > MAX_FIT_RELATIVE_SCATTER || mean <= 0.0 {
            self.phase = CalibrationPhase::Failed;
            self.failure_reason = Some("poor fit");
            self.active_flag.store(false, Ordering::SeqCst);
            tracing::warn!(scatter, "inertia calibration: fit rejected");
            return;
        }

        self.calculated_inertia = Some(mean);
        self.phase = CalibrationPhase::Complete;
        self.active_flag.store(false, Ordering::SeqCst);
        tracing::info!(inertia = mean, "inertia calibration: complete");
    }
}
