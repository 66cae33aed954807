//! Per-stroke distance derivation and pace tracking.
//!
//! Grouped with the stroke detector, in its own file because the distance
//! and pace bookkeeping is large enough to read poorly interleaved with the
//! phase FSM in `crate::stroke`.

/// Concept2's `P = 2.80·v³` boat-drag relation, rearranged to `v = ∛(W/2.80)`.
const DISTANCE_DRAG_CONST: f32 = 2.80;
const DIST_PER_STROKE_MIN_M: f32 = 2.0;
const DIST_PER_STROKE_MAX_M: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceState {
    pub distance_m: f32,
    pub dist_per_stroke_m: f32,
    pub pace_inst_s500: Option<f32>,
    pub pace_avg_s500: Option<f32>,
    pub pace_best_s500: Option<f32>,
}

impl Default for DistanceState {
    fn default() -> Self {
        Self {
            distance_m: 0.0,
            dist_per_stroke_m: 0.0,
            pace_inst_s500: None,
            pace_avg_s500: None,
            pace_best_s500: None,
        }
    }
}

impl DistanceState {
    /// `d_stroke = ∛(W_drive / 2.80)`, clamped to `[2, 20]` m.
    ///
    /// `stroke_cycle_s` is the completed drive+recovery duration, used to
    /// derive `pace_inst_s500` from this stroke's own segment velocity
    /// (distance/time) rather than aliasing it to the session average.
    // TODO: smooth pace_inst_s500 over a short rolling window instead of
    // one stroke at a time; single-stroke segments are noisy on an erg.
    pub fn finalize_stroke(&mut self, drive_work_j: f32, stroke_cycle_s: f32) -> f32 {
        let raw = (drive_work_j / DISTANCE_DRAG_CONST).cbrt();
        let d_stroke = raw.clamp(DIST_PER_STROKE_MIN_M, DIST_PER_STROKE_MAX_M);
        self.distance_m += d_stroke;
        self.dist_per_stroke_m = d_stroke;

        if stroke_cycle_s > 0.0 {
            let v = d_stroke / stroke_cycle_s;
            if v > 0.0 {
                let pace = 500.0 / v;
                self.pace_inst_s500 = Some(pace);
                if pace > 60.0 && self.pace_best_s500.is_none_or(|best| pace < best) {
                    self.pace_best_s500 = Some(pace);
                }
            }
        }
        d_stroke
    }

    /// Session-average pace: `(elapsed_s / distance_m) * 500`, undefined below 1 m.
    pub fn update_avg_pace(&mut self, elapsed_ms: u64) {
        if self.distance_m < 1.0 {
            self.pace_avg_s500 = None;
            return;
        }
        let elapsed_s = elapsed_ms as f32 / 1000.0;
        self.pace_avg_s500 = Some((elapsed_s / self.distance_m) * 500.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_clamped_to_reference_range() {
        let mut d = DistanceState::default();
        // Tiny work -> floor
        let d0 = d.finalize_stroke(0.001, 1.0);
        assert_eq!(d0, DIST_PER_STROKE_MIN_M);
        // Enormous work -> ceiling
        let mut d2 = DistanceState::default();
        let d1 = d2.finalize_stroke(1.0e9, 1.0);
        assert_eq!(d1, DIST_PER_STROKE_MAX_M);
    }

    #[test]
    fn distance_is_monotone_non_decreasing() {
        let mut d = DistanceState::default();
        let before = d.distance_m;
        d.finalize_stroke(300.0, 1.0);
        assert!(d.distance_m >= before);
        let before2 = d.distance_m;
        d.finalize_stroke(300.0, 1.0);
        assert!(d.distance_m >= before2);
    }

    #[test]
    fn avg_pace_undefined_below_one_meter() {
        let mut d = DistanceState::default();
        d.update_avg_pace(5_000);
        assert_eq!(d.pace_avg_s500, None);
    }

    #[test]
    fn avg_pace_defined_once_distance_accrues() {
        let mut d = DistanceState::default();
        d.finalize_stroke(300.0, 1.0);
        d.update_avg_pace(10_000);
        assert!(d.pace_avg_s500.is_some());
    }

    #[test]
    fn best_pace_only_updates_above_sixty_seconds() {
        let mut d = DistanceState::default();
        // A very short cycle time yields a very fast (low) pace below the 60s floor.
        d.finalize_stroke(300.0, 0.01);
        assert_eq!(d.pace_best_s500, None);
        d.finalize_stroke(300.0, 10.0);
        assert!(d.pace_best_s500.is_some());
    }

    #[test]
    fn reset_clears_all_state() {
        let mut d = DistanceState::default();
        d.finalize_stroke(300.0, 1.0);
        d.update_avg_pace(10_000);
        d.reset();
        assert_eq!(d, DistanceState::default());
    }
}
