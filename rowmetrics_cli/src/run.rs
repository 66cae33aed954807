//! The `run` subcommand: pulse ingestion → metrics → session lifecycle,
//! driven off a dedicated pulse-ingestion thread and a 10 Hz metrics tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rowmetrics_config::Config;
use rowmetrics_core::session::{SessionController, UnsyncedWallClock};
use rowmetrics_core::snapshot::SharedSnapshot;
use rowmetrics_core::{hr::HrState, ingest::Core};
use rowmetrics_hardware::{FileSessionStore, PulseThread};
use rowmetrics_traits::clock::MonotonicClock;

use crate::cli::RtLock;
use crate::rt::setup_rt_once;

const TICK_MS: u64 = 100;

#[allow(clippy::too_many_arguments)]
pub fn run(
    cfg: &Config,
    data_dir: &std::path::Path,
    duration_s: Option<u64>,
    flywheel_pin: Option<u8>,
    seat_pin: Option<u8>,
    quiet: bool,
    rt: bool,
    rt_prio: Option<i32>,
    rt_lock: Option<RtLock>,
    rt_cpu: Option<usize>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    #[cfg(target_os = "linux")]
    {
        let mode = rt_lock.unwrap_or(RtLock::os_default());
        setup_rt_once(rt, rt_prio, mode, rt_cpu);
    }
    #[cfg(target_os = "macos")]
    {
        let mode = rt_lock.unwrap_or(RtLock::os_default());
        let _ = rt_prio;
        let _ = rt_cpu;
        setup_rt_once(rt, mode);
    }

    let clock: Arc<dyn rowmetrics_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let snapshot = Arc::new(SharedSnapshot::default());
    let mut core = Core::new(cfg.clone(), clock.clone(), snapshot.clone());
    let mut hr = HrState::new(clock.clone());

    let store = FileSessionStore::new(data_dir)
        .map_err(|e| eyre::eyre!("open session store {:?}: {}", data_dir, e))?;
    let mut session = SessionController::new(store, clock.clone(), Arc::new(UnsyncedWallClock), cfg);

    let pulses = spawn_pulse_thread(cfg, flywheel_pin, seat_pin)?;

    let start = std::time::Instant::now();
    let poll = Duration::from_millis(TICK_MS);
    let mut next_tick = std::time::Instant::now() + poll;

    tracing::info!("run loop started");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if let Some(limit) = duration_s {
            if start.elapsed() >= Duration::from_secs(limit) {
                tracing::info!(limit, "duration elapsed");
                break;
            }
        }

        let now = std::time::Instant::now();
        let remaining = next_tick.saturating_duration_since(now);
        if let Some(ev) = pulses.recv_timeout(remaining) {
            core.on_pulse(ev);
        }

        if std::time::Instant::now() >= next_tick {
            next_tick += poll;
            let now_us = core.now_us();
            core.tick(session.elapsed_ms(now_us));
            session.auto_activity_tick(&mut core, &mut hr, now_us);
            let hr_bpm = hr.current();
            session.sample_tick(&snapshot.snapshot(), hr_bpm, now_us);
            snapshot.update(|s| {
                session.write_snapshot_fields(s, now_us);
                s.heart_rate_bpm = hr_bpm;
                s.avg_heart_rate_bpm = hr_bpm;
            });

            if !quiet {
                let s = snapshot.snapshot();
                println!(
                    "phase={:?} stroke={} power={:.0}W dist={:.1}m cal/h={:.0} hr={}",
                    s.phase, s.stroke_count, s.power_display_w, s.distance_m, s.calories_per_hour, s.heart_rate_bpm
                );
            }
        }
    }

    let final_snapshot = snapshot.snapshot();
    let now_us = core.now_us();
    if let Some(record) = session.stop(&final_snapshot, &mut hr, now_us)? {
        tracing::info!(id = record.id, distance_m = record.distance_m, "session committed");
        if !quiet {
            println!(
                "session {} committed: {:.1}m, {} strokes, {:.0} kcal",
                record.id, record.distance_m, record.stroke_count, record.calories_kcal
            );
        }
    }
    drop(pulses);
    Ok(())
}

fn spawn_pulse_thread(
    cfg: &Config,
    flywheel_pin: Option<u8>,
    seat_pin: Option<u8>,
) -> eyre::Result<PulseThread> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use rowmetrics_hardware::Debounced;
        let flywheel = flywheel_pin.ok_or_else(|| eyre::eyre!("--flywheel-pin required with the hardware feature"))?;
        let seat = seat_pin.ok_or_else(|| eyre::eyre!("--seat-pin required with the hardware feature"))?;
        let epoch = std::time::Instant::now();
        let source = rowmetrics_hardware::pulse::gpio::GpioEdgeSource::new(flywheel, seat, epoch)
            .map_err(|e| eyre::eyre!("open GPIO pulse source: {}", e))?;
        let debounced = Debounced::new(source);
        return Ok(PulseThread::spawn(debounced, Duration::from_millis(50)));
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        use rowmetrics_hardware::SimulatedPulseSource;
        let _ = flywheel_pin;
        let _ = seat_pin;
        let clock: Arc<dyn rowmetrics_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let source = SimulatedPulseSource::new(clock, cfg.physics.magnets_per_rev);
        Ok(PulseThread::spawn(source, Duration::from_millis(50)))
    }
}
