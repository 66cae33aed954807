//! Stroke-phase state machine.
//!
//! Tracks Idle → Drive → Recovery transitions, stroke counting, and the
//! smoothed stroke-rate estimate. Distance and power integration are the
//! caller's concern (`crate::ingest::Core` wires this to `crate::energy`);
//! this module only decides *when* a stroke starts, ends, and completes.

use rowmetrics_config::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Drive,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeState {
    pub phase: Phase,
    pub stroke_count: u32,
    pub drive_started_us: u64,
    pub drive_ended_us: u64,
    pub drive_ms_last: u64,
    pub recovery_ms_last: u64,
    pub stroke_rate_spm: f32,
}

impl Default for StrokeState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            stroke_count: 0,
            drive_started_us: 0,
            drive_ended_us: 0,
            drive_ms_last: 0,
            recovery_ms_last: 0,
            stroke_rate_spm: 0.0,
        }
    }
}

/// What the caller must do in response to a transition. `crate::ingest::Core`
/// matches on this to reset the kinematics peak tracker and the energy
/// accumulators, and to drive `crate::energy`'s per-stroke distance step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Idle/Recovery → Drive. Caller resets `drive_work_j`, `power_display_w`,
    /// and the kinematics peak tracker to the triggering `omega`.
    DriveStarted,
    /// Drive → Recovery. If `stroke_completed`, the caller increments
    /// `stroke_count` (already done here), updates the rate EMA (already
    /// done here), and must finalize the per-stroke distance/energy step.
    EnteredRecovery { stroke_completed: bool },
    /// Recovery → Idle.
    BackToIdle,
}

impl StrokeState {
    /// Feed one kinematics update. `now_us` is the pulse timestamp.
    pub fn on_pulse(
        &mut self,
        omega: f32,
        alpha: f32,
        peak_omega_in_stroke: f32,
        now_us: u64,
        thresholds: &Detection,
    ) -> Option<Transition> {
        match self.phase {
            Phase::Idle => {
                if omega > thresholds.drive_start_omega && alpha > thresholds.drive_accel_alpha {
                    self.start_drive(now_us);
                    Some(Transition::DriveStarted)
                } else {
                    None
                }
            }
            Phase::Drive => {
                if alpha < 0.0 && omega < 0.9 * peak_omega_in_stroke {
                    Some(self.end_drive(now_us, thresholds))
                } else {
                    None
                }
            }
            Phase::Recovery => {
                if omega < thresholds.recovery_omega {
                    self.recovery_ms_last = now_us.saturating_sub(self.drive_ended_us) / 1000;
                    self.phase = Phase::Idle;
                    Some(Transition::BackToIdle)
                } else if alpha > thresholds.drive_accel_alpha {
                    self.recovery_ms_last = now_us.saturating_sub(self.drive_ended_us) / 1000;
                    self.start_drive(now_us);
                    Some(Transition::DriveStarted)
                } else {
                    None
                }
            }
        }
    }

    /// Seat-sensor confirmation of drive start. Only acts outside Drive, and only when `omega` already
    /// supports a drive interpretation.
    pub fn on_seat_trigger(&mut self, omega: f32, now_us: u64, thresholds: &Detection) -> Option<Transition> {
        if self.phase != Phase::Drive && omega > thresholds.recovery_omega {
            self.start_drive(now_us);
            Some(Transition::DriveStarted)
        } else {
            None
        }
    }

    fn start_drive(&mut self, now_us: u64) {
        self.drive_started_us = now_us;
        self.phase = Phase::Drive;
    }

    fn end_drive(&mut self, now_us: u64, thresholds: &Detection) -> Transition {
        self.drive_ended_us = now_us;
        self.drive_ms_last = now_us.saturating_sub(self.drive_started_us) / 1000;
        self.phase = Phase::Recovery;

        let completed = self.drive_ms_last >= thresholds.min_stroke_ms;
        if completed {
            self.stroke_count += 1;
            self.update_stroke_rate();
        }
        Transition::EnteredRecovery {
            stroke_completed: completed,
        }
    }

    fn update_stroke_rate(&mut self) {
        let cycle_ms = self.drive_ms_last + self.recovery_ms_last;
        if cycle_ms == 0 {
            return;
        }
        let inst = (60_000.0 / cycle_ms as f32).clamp(10.0, 60.0);
        self.stroke_rate_spm = if self.stroke_rate_spm == 0.0 {
            inst
        } else {
            0.7 * self.stroke_rate_spm + 0.3 * inst
        };
    }

    /// Average stroke rate for the session.
    pub fn avg_stroke_rate_spm(&self, elapsed_ms: u64) -> f32 {
        let elapsed_min = elapsed_ms as f32 / 60_000.0;
        if elapsed_min < 0.1 {
            0.0
        } else {
            self.stroke_count as f32 / elapsed_min
        }
    }
}
