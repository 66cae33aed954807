//! The `calibrate` subcommand: spin-up/spin-down inertia calibration
//! (`rowmetrics_core::inertia`), optionally persisting the fitted moment
//! of inertia back into the config TOML.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rowmetrics_config::Config;
use rowmetrics_core::inertia::{CalibrationPhase, InertiaCalibration};
use rowmetrics_core::kinematics::KinematicsSample;
use rowmetrics_hardware::PulseThread;
use rowmetrics_traits::clock::MonotonicClock;
use rowmetrics_traits::PulseChannel;

const TICK_MS: u64 = 100;

pub fn run(
    cfg: &Config,
    config_path: &std::path::Path,
    apply: bool,
    flywheel_pin: Option<u8>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let pulses = spawn_pulse_thread(cfg, flywheel_pin)?;

    let active_flag = Arc::new(AtomicBool::new(false));
    let mut calibration = InertiaCalibration::new(active_flag, cfg.calibration.timeout_ms);
    let mut kinematics = KinematicsSample::default();
    let epoch = Instant::now();

    println!("Spin the flywheel up, then let it coast to a stop.");
    calibration.start(0);

    let poll = Duration::from_millis(TICK_MS);
    let mut next_tick = std::time::Instant::now() + poll;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            calibration.cancel();
            println!("calibration cancelled");
            return Ok(());
        }

        let remaining = next_tick.saturating_duration_since(std::time::Instant::now());
        if let Some(ev) = pulses.recv_timeout(remaining) {
            if ev.channel == PulseChannel::Flywheel {
                let t_us = epoch.elapsed().as_micros() as u64;
                if kinematics.on_pulse(t_us, cfg.physics.magnets_per_rev)
                    == rowmetrics_core::kinematics::Update::Accepted
                {
                    calibration.on_pulse(kinematics.omega, kinematics.alpha, t_us);
                }
            }
        }

        if std::time::Instant::now() >= next_tick {
            next_tick += poll;
            let t_us = epoch.elapsed().as_micros() as u64;
            calibration.tick(t_us);
        }

        match calibration.status().phase {
            CalibrationPhase::Complete => {
                let fitted = calibration
                    .status()
                    .calculated_inertia
                    .expect("Complete implies a fit");
                println!("moment_of_inertia = {fitted:.5} kg*m^2");
                if apply {
                    apply_inertia(config_path, fitted)?;
                    println!("written to {config_path:?}");
                }
                return Ok(());
            }
            CalibrationPhase::Failed => {
                let reason = calibration.status().failure_reason.unwrap_or("unknown");
                return Err(eyre::eyre!("calibration failed: {reason}"));
            }
            _ => {}
        }
    }
}

/// Round-trips the whole config through `toml::from_str`/`toml::to_string`;
/// this drops comments and formatting in the source file, which is
/// acceptable for an operator-invoked `--apply` flag.
fn apply_inertia(config_path: &std::path::Path, moment_of_inertia: f32) -> eyre::Result<()> {
    let text = std::fs::read_to_string(config_path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", config_path, e))?;
    let mut cfg: Config = rowmetrics_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {:?}: {}", config_path, e))?;
    cfg.physics.moment_of_inertia = moment_of_inertia;
    let rewritten =
        toml::to_string_pretty(&cfg).map_err(|e| eyre::eyre!("serialize config: {}", e))?;
    std::fs::write(config_path, rewritten)
        .map_err(|e| eyre::eyre!("write config {:?}: {}", config_path, e))?;
    Ok(())
}

fn spawn_pulse_thread(cfg: &Config, flywheel_pin: Option<u8>) -> eyre::Result<PulseThread> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use rowmetrics_hardware::Debounced;
        let flywheel = flywheel_pin
            .ok_or_else(|| eyre::eyre!("--flywheel-pin required with the hardware feature"))?;
        let epoch = std::time::Instant::now();
        // The seat channel is unused during calibration; wire it to the same
        // pin as flywheel is not meaningful, so this path requires a real
        // GPIO build to supply a harmless seat pin too.
        let source = rowmetrics_hardware::pulse::gpio::GpioEdgeSource::new(flywheel, flywheel, epoch)
            .map_err(|e| eyre::eyre!("open GPIO pulse source: {}", e))?;
        let debounced = Debounced::new(source);
        return Ok(PulseThread::spawn(debounced, Duration::from_millis(50)));
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        use rowmetrics_hardware::SimulatedPulseSource;
        let _ = flywheel_pin;
        let clock: Arc<dyn rowmetrics_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let source = SimulatedPulseSource::new(clock, cfg.physics.magnets_per_rev);
        Ok(PulseThread::spawn(source, Duration::from_millis(50)))
    }
}
