#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the rowing-metrics core.
//!
//! `Config` is deserialized from TOML and validated once at startup; it is
//! immutable for the lifetime of a session, reloaded only at session boundaries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Physics {
    /// Moment of inertia of the flywheel, kg·m².
    pub moment_of_inertia: f32,
    /// Starting drag coefficient before any calibration sample lands.
    pub initial_k: f32,
    /// Magnet triggers per full flywheel revolution; each pulse covers `2π / magnets_per_rev` rad.
    pub magnets_per_rev: u8,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            moment_of_inertia: 0.101,
            initial_k: 1.0e-4,
            magnets_per_rev: 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Detection {
    /// rad/s threshold to leave Idle into Drive.
    pub drive_start_omega: f32,
    /// rad/s² threshold to leave Idle into Drive.
    pub drive_accel_alpha: f32,
    /// rad/s threshold to leave Recovery into Idle.
    pub recovery_omega: f32,
    pub min_stroke_ms: u64,
    pub idle_timeout_ms: u64,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            drive_start_omega: 12.0,
            drive_accel_alpha: 2.0,
            recovery_omega: 8.0,
            min_stroke_ms: 600,
            idle_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct User {
    pub weight_kg: f32,
    pub max_hr: u8,
}

impl Default for User {
    fn default() -> Self {
        Self {
            weight_kg: 80.0,
            max_hr: 190,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Behavior {
    /// Auto-pause after this many idle seconds; 0 disables.
    pub auto_pause_s: u32,
}

impl Default for Behavior {
    fn default() -> Self {
        Self { auto_pause_s: 5 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Broadcast {
    pub ble_interval_ms: u32,
    pub web_interval_ms: u32,
}

impl Default for Broadcast {
    fn default() -> Self {
        Self {
            ble_interval_ms: 500,
            web_interval_ms: 200,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    /// "error" | "warn" | "info" | "debug" | "trace"
    pub level: Option<String>,
    pub json: bool,
    /// Optional path to a rotated JSON-lines log file.
    pub file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Calibration {
    /// Per-state timeout for the inertia-calibration FSM; chosen value is
    /// recorded in DESIGN.md.
    pub timeout_ms: u64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub physics: Physics,
    #[serde(default)]
    pub detection: Detection,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub broadcast: Broadcast,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub calibration: Calibration,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// One row of an operator-measured physics calibration CSV.
///
/// A flywheel's moment of inertia and starting drag coefficient are not
/// fit from a curve across many samples; they are a single bench
/// measurement, so this format carries exactly one data row.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct PhysicsCalibrationRow {
    pub moment_of_inertia: f32,
    pub initial_k: f32,
}

/// Load a single-row `moment_of_inertia,initial_k` CSV produced by an
/// operator's bench calibration and fold it into a [`Physics`] value,
/// keeping `magnets_per_rev` at its default (the CSV does not carry a
/// physical magnet count).
pub fn load_physics_csv(path: &std::path::Path) -> eyre::Result<Physics> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open physics calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["moment_of_inertia", "initial_k"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "physics calibration CSV must have headers 'moment_of_inertia,initial_k', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<PhysicsCalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    let row = match rows.as_slice() {
        [row] => *row,
        [] => eyre::bail!("physics calibration CSV has no data rows"),
        _ => eyre::bail!(
            "physics calibration CSV must have exactly one data row, got {}",
            rows.len()
        ),
    };

    let physics = Physics {
        moment_of_inertia: row.moment_of_inertia,
        initial_k: row.initial_k,
        ..Physics::default()
    };
    if physics.moment_of_inertia <= 0.0 {
        eyre::bail!("moment_of_inertia must be > 0, got {}", physics.moment_of_inertia);
    }
    if !(0.0..=0.01).contains(&physics.initial_k) {
        eyre::bail!("initial_k must be in [0.0, 0.01], got {}", physics.initial_k);
    }
    Ok(physics)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.physics.moment_of_inertia <= 0.0 {
            eyre::bail!("physics.moment_of_inertia must be > 0");
        }
        if self.physics.initial_k < 0.0 || self.physics.initial_k > 0.01 {
            eyre::bail!("physics.initial_k must be in [0.0, 0.01]");
        }
        if self.physics.magnets_per_rev == 0 {
            eyre::bail!("physics.magnets_per_rev must be >= 1");
        }

        if self.detection.drive_start_omega <= 0.0 {
            eyre::bail!("detection.drive_start_omega must be > 0");
        }
        if self.detection.drive_accel_alpha <= 0.0 {
            eyre::bail!("detection.drive_accel_alpha must be > 0");
        }
        if self.detection.recovery_omega <= 0.0 {
            eyre::bail!("detection.recovery_omega must be > 0");
        }
        if self.detection.recovery_omega >= self.detection.drive_start_omega {
            eyre::bail!(
                "detection.recovery_omega must be < detection.drive_start_omega, got {} >= {}",
                self.detection.recovery_omega,
                self.detection.drive_start_omega
            );
        }
        if self.detection.min_stroke_ms == 0 {
            eyre::bail!("detection.min_stroke_ms must be >= 1");
        }
        if self.detection.idle_timeout_ms == 0 {
            eyre::bail!("detection.idle_timeout_ms must be >= 1");
        }

        if self.user.weight_kg <= 0.0 {
            eyre::bail!("user.weight_kg must be > 0");
        }
        if self.user.max_hr == 0 || self.user.max_hr > 250 {
            eyre::bail!("user.max_hr must be in (0, 250]");
        }

        if self.broadcast.ble_interval_ms == 0 {
            eyre::bail!("broadcast.ble_interval_ms must be >= 1");
        }
        if self.broadcast.web_interval_ms == 0 {
            eyre::bail!("broadcast.web_interval_ms must be >= 1");
        }

        if self.calibration.timeout_ms == 0 {
            eyre::bail!("calibration.timeout_ms must be >= 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let cfg = load_toml("").expect("empty toml parses to all defaults");
        assert_eq!(cfg.detection.min_stroke_ms, 600);
        assert_eq!(cfg.physics.magnets_per_rev, 4);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let cfg = load_toml("[detection]\nmin_stroke_ms = 700\n").unwrap();
        assert_eq!(cfg.detection.min_stroke_ms, 700);
        assert_eq!(cfg.detection.drive_start_omega, 12.0);
    }

    #[rstest]
    #[case("[physics]\nmoment_of_inertia = 0.0")]
    #[case("[detection]\nrecovery_omega = 20.0\ndrive_start_omega = 12.0")]
    #[case("[user]\nmax_hr = 0")]
    #[case("[broadcast]\nble_interval_ms = 0")]
    fn rejects_invalid_config(#[case] toml_src: &str) {
        let cfg = load_toml(toml_src).unwrap();
        assert!(cfg.validate().is_err());
    }
}
