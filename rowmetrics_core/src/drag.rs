//! Online drag-coefficient calibration.
//!
//! In recovery, applied torque is ≈ 0, so `I·α = −k·ω²`; solving for `k` and
//! averaging with a small-gain EMA keeps single-pulse noise from
//! destabilizing power estimates that scale with `k·ω³`.

/// `k_meas` must fall in this range to be accepted as a calibration sample.
pub const K_MEAS_MIN: f32 = 0.0;
pub const K_MEAS_MAX: f32 = 0.01;
/// EMA gain applied to each accepted sample.
const EMA_GAIN: f32 = 0.05;
/// Sample count at which `k_complete` latches.
pub const CALIBRATION_SAMPLES_REQUIRED: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub k: f32,
    pub samples: u32,
    pub k_complete: bool,
}

impl DragState {
    pub fn new(initial_k: f32) -> Self {
        Self {
            k: initial_k,
            samples: 0,
            k_complete: false,
        }
    }

    pub fn drag_factor(&self) -> f32 {
        self.k * 1.0e6
    }

    /// Feed one candidate calibration sample. Only call this when the caller
    /// has already confirmed the enclosing phase is Recovery and `alpha < 0`
    ///; this function re-checks the numeric guards only.
    pub fn observe(&mut self, moment_of_inertia: f32, omega: f32, alpha: f32) {
        if omega.abs() < 1.0 {
            return;
        }
        let k_meas = -moment_of_inertia * alpha / (omega * omega);
        if !(K_MEAS_MIN..=K_MEAS_MAX).contains(&k_meas) {
            tracing::debug!(k_meas, "drag: rejected out-of-range calibration sample");
            return;
        }

        self.k = if self.samples == 0 {
            k_meas
        } else {
            (1.0 - EMA_GAIN) * self.k + EMA_GAIN * k_meas
        };
        self.samples += 1;
        if self.samples >= CALIBRATION_SAMPLES_REQUIRED {
            if !self.k_complete {
                tracing::info!(k = self.k, "drag calibration complete");
            }
            self.k_complete = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_k_directly() {
        let mut d = DragState::new(1.0e-4);
        d.observe(0.101, -10.0, -1.0); // k_meas = 0.101*1.0/100 = 1.01e-3
        assert!((d.k - 1.01e-3).abs() < 1e-6);
        assert_eq!(d.samples, 1);
    }

    #[test]
    fn rejects_negative_or_too_large_k_meas() {
        let mut d = DragState::new(1.0e-4);
        // alpha > 0 would give a negative k_meas
        d.observe(0.101, -10.0, 5.0);
        assert_eq!(d.samples, 0);
        // a huge alpha magnitude produces k_meas above 0.01
        d.observe(0.101, -10.0, -100.0);
        assert_eq!(d.samples, 0);
    }

    #[test]
    fn rejects_low_omega() {
        let mut d = DragState::new(1.0e-4);
        d.observe(0.101, 0.5, -1.0);
        assert_eq!(d.samples, 0);
    }

    #[test]
    fn converges_to_stable_k_within_five_percent() {
        let mut d = DragState::new(1.0e-4);
        let true_k = 1.2e-4;
        let i = 0.101;
        // 60 recovery samples with k_meas wobbling ±10% around true_k
        for n in 0..60u32 {
            let wobble = if n % 2 == 0 { 1.1 } else { 0.9 };
            let k_meas = true_k * wobble;
            let omega = 10.0f32;
            let alpha = -(k_meas * omega * omega) / i;
            d.observe(i, omega, alpha);
        }
        assert!(d.k_complete);
        let rel_err = (d.k - true_k).abs() / true_k;
        assert!(rel_err < 0.05, "k={} rel_err={}", d.k, rel_err);
    }

    #[test]
    fn k_complete_latches_and_stays_true() {
        let mut d = DragState::new(1.0e-4);
        for _ in 0..CALIBRATION_SAMPLES_REQUIRED {
            d.observe(0.101, -10.0, -1.0);
        }
        assert!(d.k_complete);
        d.observe(0.101, -10.0, -1.0);
        assert!(d.k_complete);
    }
}
