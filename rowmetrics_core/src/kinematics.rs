//! Angular-kinematics estimator.
//!
//! Derives angular velocity and acceleration from successive flywheel pulse
//! timestamps. Owns no lock; the caller (`crate::ingest::Core`) holds the
//! single write-lease into the metrics snapshot.

/// Minimum accepted inter-pulse interval, seconds. Below this the edge is
/// treated as a bounce despite already passing hardware debounce.
pub const MIN_DT_S: f32 = 0.001;
/// Maximum accepted inter-pulse interval, seconds. Above this the flywheel is
/// considered stopped and the interval is a missed-edge artifact, not data.
pub const MAX_DT_S: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsSample {
    pub omega_prev: f32,
    pub omega: f32,
    pub alpha: f32,
    pub peak_omega_in_stroke: f32,
    pub pulses_seen: u32,
    last_t_us: Option<u64>,
}

impl Default for KinematicsSample {
    fn default() -> Self {
        Self {
            omega_prev: 0.0,
            omega: 0.0,
            alpha: 0.0,
            peak_omega_in_stroke: 0.0,
            pulses_seen: 0,
            last_t_us: None,
        }
    }
}

/// Outcome of feeding one flywheel pulse to the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    /// `Δt` was out of `(MIN_DT_S, MAX_DT_S)`; ω/α retained from before, diagnostic logged.
    Rejected,
    /// First pulse ever seen; no interval available yet.
    FirstPulse,
    /// A valid interval produced a fresh ω/α.
    Accepted,
}

impl KinematicsSample {
    pub fn valid_data(&self) -> bool {
        self.pulses_seen >= 2
    }

    /// Feed one flywheel pulse timestamp (monotonic microseconds).
    ///
    /// Invariant: for any `Δt ∈ (0.001, 10)` s, the published
    /// `omega` satisfies `|omega - 2π/(magnets_per_rev·Δt)| < 1e-6`.
    pub fn on_pulse(&mut self, t_us: u64, magnets_per_rev: u8) -> Update {
        self.pulses_seen = self.pulses_seen.saturating_add(1);
        let Some(prev_us) = self.last_t_us else {
            self.last_t_us = Some(t_us);
            return Update::FirstPulse;
        };
        self.last_t_us = Some(t_us);

        let dt_s = (t_us.saturating_sub(prev_us)) as f32 / 1_000_000.0;
        if !(MIN_DT_S..=MAX_DT_S).contains(&dt_s) || dt_s <= 0.0 {
            tracing::warn!(dt_s, "kinematics: rejected out-of-range pulse interval");
            return Update::Rejected;
        }

        let step_rad = std::f32::consts::TAU / f32::from(magnets_per_rev.max(1));
        let omega_new = step_rad / dt_s;
        let alpha_new = if self.pulses_seen >= 3 {
            (omega_new - self.omega) / dt_s
        } else {
            0.0
        };

        self.omega_prev = self.omega;
        self.omega = omega_new;
        self.alpha = alpha_new;
        if omega_new > self.peak_omega_in_stroke {
            self.peak_omega_in_stroke = omega_new;
        }
        Update::Accepted
    }

    /// Reset the peak tracker at the start of a new stroke.
    pub fn reset_peak(&mut self, start_at: f32) {
        self.peak_omega_in_stroke = start_at;
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// §8: for any Δt in the accepted range, published omega matches the
        /// closed form within 1e-6 (scaled by float magnitude slack for f32).
        #[test]
        fn omega_matches_closed_form_for_any_valid_dt(
            dt_ms in 1u64..9_999_u64,
            magnets in 1u8..8,
        ) {
            let mut k = KinematicsSample::default();
            k.on_pulse(0, magnets);
            let outcome = k.on_pulse(dt_ms * 1000, magnets);
            prop_assert_eq!(outcome, Update::Accepted);
            let dt_s = dt_ms as f32 / 1000.0;
            let expected = std::f32::consts::TAU / f32::from(magnets) / dt_s;
            let tolerance = (expected.abs() * 1e-5).max(1e-6);
            prop_assert!(
                (k.omega - expected).abs() < tolerance,
                "omega={} expected={}",
                k.omega,
                expected
            );
        }

        /// §8: out-of-range Δt never perturbs the retained omega/alpha.
        #[test]
        fn rejected_interval_never_changes_retained_state(
            dt_us_bad in prop_oneof![0u64..999, 10_000_001u64..20_000_000],
            magnets in 1u8..8,
        ) {
            let mut k = KinematicsSample::default();
            k.on_pulse(0, magnets);
            k.on_pulse(50_000, magnets);
            let omega_before = k.omega;
            let alpha_before = k.alpha;
            let outcome = k.on_pulse(50_000 + dt_us_bad, magnets);
            prop_assert_eq!(outcome, Update::Rejected);
            prop_assert_eq!(k.omega, omega_before);
            prop_assert_eq!(k.alpha, alpha_before);
        }
    }
}
