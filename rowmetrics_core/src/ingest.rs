//! Pulse ingestion and the C2→C6 dataflow. `Core` is the one-directional pipeline: it owns every
//! per-pulse estimator and holds the single write-lease into
//! [`SharedSnapshot`] the rest of the system reads from.
//!
//! The pulse source itself (debounce, GPIO, the ISR trampoline) is out of
//! this crate's scope (`rowmetrics_hardware`); `Core::on_pulse` consumes
//! already-debounced [`PulseEvent`]s in arrival order per channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rowmetrics_config::Config;
use rowmetrics_traits::{Clock, PulseChannel, PulseEvent};

use crate::distance::DistanceState;
use crate::drag::DragState;
use crate::energy::EnergyState;
use crate::kinematics::{self, KinematicsSample};
use crate::snapshot::SharedSnapshot;
use crate::stroke::{Phase, StrokeState, Transition};

pub struct Core {
    config: Config,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    snapshot: Arc<SharedSnapshot>,
    kinematics: KinematicsSample,
    drag: DragState,
    stroke: StrokeState,
    energy: EnergyState,
    distance: DistanceState,
    last_drive_start_us: u64,
    /// Set by the inertia-calibration FSM (C10) while it owns the flywheel;
    /// suppresses drag calibration and stroke detection.
    calibration_active: Arc<AtomicBool>,
}

impl Core {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock + Send + Sync>,
        snapshot: Arc<SharedSnapshot>,
    ) -> Self {
        let epoch = clock.now();
        let drag = DragState::new(config.physics.initial_k);
        Self {
            config,
            clock,
            epoch,
            snapshot,
            kinematics: KinematicsSample::default(),
            drag,
            stroke: StrokeState::default(),
            energy: EnergyState::default(),
            distance: DistanceState::default(),
            last_drive_start_us: 0,
            calibration_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn snapshot_handle(&self) -> Arc<SharedSnapshot> {
        self.snapshot.clone()
    }

    pub fn calibration_flag(&self) -> Arc<AtomicBool> {
        self.calibration_active.clone()
    }

    pub fn last_drive_start_us(&self) -> u64 {
        self.last_drive_start_us
    }

    pub fn stroke_count(&self) -> u32 {
        self.stroke.stroke_count
    }

    pub fn now_us(&self) -> u64 {
        self.clock.us_since(self.epoch)
    }

    /// Clear per-session state (kinematics, stroke, energy, distance) while
    /// preserving drag calibration.
    pub fn reset_session(&mut self) {
        self.kinematics = KinematicsSample::default();
        self.stroke = StrokeState::default();
        self.energy = EnergyState::default();
        self.distance.reset();
        self.last_drive_start_us = 0;
    }

    /// Process one debounced pulse. While inertia
    /// calibration (C10) owns the flywheel, pulses are routed there instead
    /// (the caller is expected to check `calibration_flag()` first); this
    /// method assumes normal session dataflow.
    pub fn on_pulse(&mut self, ev: PulseEvent) {
        match ev.channel {
            PulseChannel::Flywheel => self.on_flywheel_pulse(ev.t_us),
            PulseChannel::Seat => self.on_seat_pulse(ev.t_us),
        }
        self.write_snapshot();
    }

    fn on_flywheel_pulse(&mut self, t_us: u64) {
        let outcome = self
            .kinematics
            .on_pulse(t_us, self.config.physics.magnets_per_rev);
        if outcome != kinematics::Update::Accepted {
            return;
        }

        let omega = self.kinematics.omega;
        let alpha = self.kinematics.alpha;
        let peak = self.kinematics.peak_omega_in_stroke;
        let phase_before = self.stroke.phase;

        if phase_before == Phase::Recovery && alpha < 0.0 {
            self.drag
                .observe(self.config.physics.moment_of_inertia, omega, alpha);
        }
        self.energy.on_kinematics(
            phase_before,
            self.config.physics.moment_of_inertia,
            self.drag.k,
            omega,
            alpha,
        );

        let transition = self
            .stroke
            .on_pulse(omega, alpha, peak, t_us, &self.config.detection);
        self.apply_transition(transition, omega, t_us);
    }

    fn on_seat_pulse(&mut self, t_us: u64) {
        let omega = self.kinematics.omega;
        let transition = self
            .stroke
            .on_seat_trigger(omega, t_us, &self.config.detection);
        if transition.is_some() {
            self.energy.reset_drive_work();
        }
        self.apply_transition(transition, omega, t_us);
    }

    fn apply_transition(&mut self, transition: Option<Transition>, omega: f32, now_us: u64) {
        match transition {
            Some(Transition::DriveStarted) => {
                self.kinematics.reset_peak(omega);
                self.energy.on_drive_started();
                self.last_drive_start_us = now_us;
            }
            Some(Transition::EnteredRecovery { stroke_completed }) => {
                if stroke_completed {
                    let work = self.energy.take_drive_work_j();
                    let cycle_s =
                        (self.stroke.drive_ms_last + self.stroke.recovery_ms_last) as f32 / 1000.0;
                    self.distance.finalize_stroke(work, cycle_s);
                }
            }
            Some(Transition::BackToIdle) | None => {}
        }
    }

    /// Recompute elapsed-time-dependent derived quantities and publish the
    /// full component-owned subset of the snapshot. Called from the 10 Hz
    /// metrics tick with the session controller's current `elapsed_ms`.
    pub fn tick(&mut self, elapsed_ms: u64) {
        self.distance.update_avg_pace(elapsed_ms);
        self.energy.update_display_power(self.distance.pace_avg_s500);
        let avg_stroke_rate = self.stroke.avg_stroke_rate_spm(elapsed_ms);
        let (calories_kcal, calories_per_hour) = self.energy.calories(elapsed_ms);

        self.snapshot.update(|s| {
            s.omega = self.kinematics.omega;
            s.alpha = self.kinematics.alpha;
            s.k = self.drag.k;
            s.drag_factor = self.drag.drag_factor();
            s.calibrated = self.drag.k_complete;
            s.phase = self.stroke.phase;
            s.stroke_count = self.stroke.stroke_count;
            s.stroke_rate_spm = self.stroke.stroke_rate_spm;
            s.avg_stroke_rate_spm = avg_stroke_rate;
            s.power_inst_w = self.energy.power_inst_w;
            s.power_display_w = self.energy.power_display_w;
            s.power_peak_w = self.energy.power_peak_w;
            s.power_avg_w = self.energy.power_avg_w;
            s.total_work_j = self.energy.total_work_j;
            s.calories_kcal = calories_kcal;
            s.calories_per_hour = calories_per_hour;
            s.distance_m = self.distance.distance_m;
            s.pace_inst_s500 = self.distance.pace_inst_s500;
            s.pace_avg_s500 = self.distance.pace_avg_s500;
            s.pace_best_s500 = self.distance.pace_best_s500;
            s.dist_per_stroke_m = self.distance.dist_per_stroke_m;
            s.valid_data = self.kinematics.valid_data();
        });
    }

    fn write_snapshot(&mut self) {
        self.snapshot.update(|s| {
            s.omega = self.kinematics.omega;
            s.alpha = self.kinematics.alpha;
            s.k = self.drag.k;
            s.drag_factor = self.drag.drag_factor();
            s.calibrated = self.drag.k_complete;
            s.phase = self.stroke.phase;
            s.stroke_count = self.stroke.stroke_count;
            s.stroke_rate_spm = self.stroke.stroke_rate_spm;
            s.power_inst_w = self.energy.power_inst_w;
            s.power_peak_w = self.energy.power_peak_w;
            s.total_work_j = self.energy.total_work_j;
            s.distance_m = self.distance.distance_m;
            s.pace_inst_s500 = self.distance.pace_inst_s500;
            s.pace_best_s500 = self.distance.pace_best_s500;
            s.dist_per_stroke_m = self.distance.dist_per_stroke_m;
            s.valid_data = self.kinematics.valid_data();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestClock;

    fn core_with_defaults() -> (Core, Arc<SharedSnapshot>) {
        let snapshot = Arc::new(SharedSnapshot::default());
        let clock = Arc::new(TestClock::new());
        let core = Core::new(Config::default(), clock, snapshot.clone());
        (core, snapshot)
    }

    fn pulse(channel: PulseChannel, t_us: u64) -> PulseEvent {
        PulseEvent { channel, t_us }
    }

    #[test]
    fn idle_boot_produces_zeroed_snapshot() {
        let (_core, snapshot) = core_with_defaults();
        let s = snapshot.snapshot();
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.distance_m, 0.0);
        assert_eq!(s.stroke_count, 0);
    }

    #[test]
    fn single_stroke_completes_and_advances_distance() {
        let (mut core, snapshot) = core_with_defaults();
        // Accelerating drive: short, shrinking intervals over ~0.8s.
        let mut t = 0u64;
        for dt_us in [60_000u64, 50_000, 40_000, 30_000, 25_000, 22_000, 20_000] {
            t += dt_us;
            core.on_pulse(pulse(PulseChannel::Flywheel, t));
        }
        // Decelerating recovery: growing intervals over ~1.6s.
        for dt_us in [30_000u64, 50_000, 80_000, 120_000, 180_000, 260_000, 350_000, 450_000] {
            t += dt_us;
            core.on_pulse(pulse(PulseChannel::Flywheel, t));
        }
        core.tick(t / 1000);
        let s = snapshot.snapshot();
        assert_eq!(s.stroke_count, 1, "one completed stroke expected");
        assert!(s.distance_m >= 2.0 && s.distance_m <= 20.0);
    }

    #[test]
    fn reset_session_preserves_drag_calibration() {
        let (mut core, _snapshot) = core_with_defaults();
        core.drag.observe(0.101, -10.0, -1.0);
        let k_before = core.drag.k;
        core.reset_session();
        assert_eq!(core.drag.k, k_before);
        assert_eq!(core.stroke.stroke_count, 0);
    }
}
