//! Instantaneous power, display-smoothed power, work accumulation, and
//! calorie estimation.

use crate::stroke::Phase;

/// Clamp applied to every instantaneous power sample.
pub const POWER_INST_MAX_W: f32 = 2000.0;
/// Clamp applied to the display-smoothed power once a valid pace exists.
pub const POWER_DISPLAY_MAX_W: f32 = 1000.0;
/// Nominal integration step used while in Drive; the
/// stroke-rate-scale error this introduces self-corrects across many pulses
/// because per-stroke distance is derived from the integrated work, not from
/// this nominal `dt` directly.
pub const NOMINAL_DT_S: f32 = 0.05;

const KCAL_PER_WATT_MINUTE: f32 = 0.01433;
/// Baseline metabolic contribution, kcal/min, added on top of mechanical work.
const BASELINE_KCAL_PER_MINUTE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyState {
    pub drive_work_j: f32,
    pub total_work_j: f32,
    pub power_inst_w: f32,
    pub power_display_w: f32,
    pub power_peak_w: f32,
    pub power_avg_w: f32,
}

impl Default for EnergyState {
    fn default() -> Self {
        Self {
            drive_work_j: 0.0,
            total_work_j: 0.0,
            power_inst_w: 0.0,
            power_display_w: 0.0,
            power_peak_w: 0.0,
            power_avg_w: 0.0,
        }
    }
}

impl EnergyState {
    /// Reset accumulators that restart at the top of each new drive.
    pub fn on_drive_started(&mut self) {
        self.drive_work_j = 0.0;
        self.power_display_w = 0.0;
    }

    /// Zero the within-drive work accumulator after a stroke's distance has
    /// been derived from it.
    pub fn take_drive_work_j(&mut self) -> f32 {
        std::mem::replace(&mut self.drive_work_j, 0.0)
    }

    /// Seat-sensor drive confirmation only resets the work accumulator, not
    /// the display power.
    pub fn reset_drive_work(&mut self) {
        self.drive_work_j = 0.0;
    }

    /// `P = I·α·ω + k·ω³`, clamped to `[0, 2000]` W. Integrates into
    /// `drive_work_j`/`total_work_j` while in Drive using the nominal `dt`.
    pub fn on_kinematics(&mut self, phase: Phase, moment_of_inertia: f32, k: f32, omega: f32, alpha: f32) {
        let accel_power = moment_of_inertia * alpha * omega;
        let drag_power = k * omega.powi(3);
        let p = (accel_power + drag_power).clamp(0.0, POWER_INST_MAX_W);
        self.power_inst_w = p;
        if p > self.power_peak_w {
            self.power_peak_w = p;
        }
        if phase == Phase::Drive {
            self.drive_work_j += p * NOMINAL_DT_S;
            self.total_work_j += p * NOMINAL_DT_S;
        }
    }

    /// Display-stable power derived from average pace: when
    /// `pace_avg_s500 ∈ (60, 9999)`, `P_c2 = 2.80/v³` with `v = pace/500`
    /// s/m, EMA-smoothed into `power_display_w`; `power_avg_w` mirrors it.
    pub fn update_display_power(&mut self, pace_avg_s500: Option<f32>) {
        let Some(pace) = pace_avg_s500 else { return };
        if !(60.0..9999.0).contains(&pace) {
            return;
        }
        let v = pace / 500.0;
        let p_c2 = (2.80 / v.powi(3)).clamp(0.0, POWER_DISPLAY_MAX_W);
        self.power_display_w = if self.power_display_w == 0.0 {
            p_c2
        } else {
            0.7 * self.power_display_w + 0.3 * p_c2
        };
        self.power_avg_w = self.power_display_w;
    }

    /// `(kcal, kcal_per_hour)` from `power_avg_w` and elapsed session time.
    pub fn calories(&self, elapsed_ms: u64) -> (f32, f32) {
        let elapsed_min = elapsed_ms as f32 / 60_000.0;
        if elapsed_min <= 0.0 {
            return (0.0, 0.0);
        }
        let kcal = KCAL_PER_WATT_MINUTE * self.power_avg_w * elapsed_min + BASELINE_KCAL_PER_MINUTE * elapsed_min;
        let kcal_per_hour = kcal * 60.0 / elapsed_min;
        (kcal, kcal_per_hour)
    }
}

/// Formats a /500m split as `MM:SS.s`, with `"--:--.-"` for invalid or
/// out-of-range paces.
pub fn format_pace_s500(pace_seconds: Option<f32>) -> String {
    let Some(pace_seconds) = pace_seconds else {
        return "--:--.-".to_string();
    };
    if !(0.0..=9999.0).contains(&pace_seconds) {
        return "--:--.-".to_string();
    }
    let total_seconds = pace_seconds as u32;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let tenths = ((pace_seconds - total_seconds as f32) * 10.0) as u32;
    format!("{minutes:02}:{seconds:02}.{tenths:01}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_is_clamped_to_non_negative_and_max() {
        let mut e = EnergyState::default();
        e.on_kinematics(Phase::Drive, 0.101, 1.0e-4, 30.0, -5.0); // would be negative
        assert_eq!(e.power_inst_w, 0.0);

        let mut e2 = EnergyState::default();
        e2.on_kinematics(Phase::Drive, 50.0, 1.0, 50.0, 50.0); // absurdly large
        assert_eq!(e2.power_inst_w, POWER_INST_MAX_W);
    }

    #[test]
    fn work_only_accumulates_in_drive() {
        let mut e = EnergyState::default();
        e.on_kinematics(Phase::Recovery, 0.101, 1.0e-4, 20.0, 1.0);
        assert_eq!(e.drive_work_j, 0.0);
        e.on_kinematics(Phase::Drive, 0.101, 1.0e-4, 20.0, 1.0);
        assert!(e.drive_work_j > 0.0);
        assert_eq!(e.total_work_j, e.drive_work_j);
    }

    #[test]
    fn take_drive_work_resets_accumulator() {
        let mut e = EnergyState::default();
        e.on_kinematics(Phase::Drive, 0.101, 1.0e-4, 20.0, 1.0);
        let taken = e.take_drive_work_j();
        assert!(taken > 0.0);
        assert_eq!(e.drive_work_j, 0.0);
    }

    #[test]
    fn display_power_ignores_invalid_pace() {
        let mut e = EnergyState::default();
        e.update_display_power(None);
        assert_eq!(e.power_display_w, 0.0);
        e.update_display_power(Some(50.0)); // below 60s floor
        assert_eq!(e.power_display_w, 0.0);
        e.update_display_power(Some(10_000.0)); // above 9999 ceiling
        assert_eq!(e.power_display_w, 0.0);
    }

    #[test]
    fn display_power_initializes_then_smooths() {
        let mut e = EnergyState::default();
        e.update_display_power(Some(120.0));
        let first = e.power_display_w;
        assert!(first > 0.0);
        e.update_display_power(Some(120.0));
        assert!((e.power_display_w - first).abs() < 1e-3, "stable input should stay stable");
    }

    #[test]
    fn calories_scale_with_elapsed_time() {
        let mut e = EnergyState::default();
        e.power_avg_w = 150.0;
        let (kcal_1min, rate_1min) = e.calories(60_000);
        let (kcal_2min, _) = e.calories(120_000);
        assert!(kcal_2min > kcal_1min);
        assert!(rate_1min > 0.0);
    }

    #[test]
    fn pace_formatting_matches_reference_sentinel_and_format() {
        assert_eq!(format_pace_s500(None), "--:--.-");
        assert_eq!(format_pace_s500(Some(10_000.0)), "--:--.-");
        assert_eq!(format_pace_s500(Some(-1.0)), "--:--.-");
        assert_eq!(format_pace_s500(Some(125.5)), "02:05.5");
        assert_eq!(format_pace_s500(Some(59.0)), "00:59.0");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// §8: instantaneous power is always clamped to [0, POWER_INST_MAX_W]
        /// regardless of how extreme the kinematics inputs are.
        #[test]
        fn instantaneous_power_always_in_clamp_range(
            inertia in 0.0f32..100.0,
            k in 0.0f32..0.01,
            omega in -200.0f32..200.0,
            alpha in -500.0f32..500.0,
        ) {
            let mut e = EnergyState::default();
            e.on_kinematics(Phase::Drive, inertia, k, omega, alpha);
            prop_assert!(e.power_inst_w >= 0.0 && e.power_inst_w <= POWER_INST_MAX_W);
        }

        /// §8: display power, once seeded by a valid pace, stays within its clamp.
        #[test]
        fn display_power_always_in_clamp_range(pace in 60.1f32..9998.9) {
            let mut e = EnergyState::default();
            e.update_display_power(Some(pace));
            prop_assert!(e.power_display_w >= 0.0 && e.power_display_w <= POWER_DISPLAY_MAX_W);
        }

        /// Pace formatting never panics and always produces either the
        /// sentinel or a `MM:SS.t` string for any f32 input.
        #[test]
        fn pace_formatting_never_panics(pace in any::<f32>()) {
            let s = format_pace_s500(Some(pace));
            prop_assert!(s == "--:--.-" || s.len() == 7);
        }
    }
}
