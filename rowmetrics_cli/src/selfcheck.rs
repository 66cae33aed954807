//! The `self-check` subcommand: sample the flywheel pulse source for one
//! second and report an estimated pulse rate plus debounce rejections.

use std::time::{Duration, Instant};

use rowmetrics_config::Config;
use rowmetrics_traits::PulseSource;

pub fn run(cfg: &Config, flywheel_pin: Option<u8>, seat_pin: Option<u8>) -> eyre::Result<()> {
    println!("self-check: sampling pulse source for 1s...");

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use rowmetrics_hardware::Debounced;
        let flywheel = flywheel_pin
            .ok_or_else(|| eyre::eyre!("--flywheel-pin required with the hardware feature"))?;
        let seat = seat_pin
            .ok_or_else(|| eyre::eyre!("--seat-pin required with the hardware feature"))?;
        let epoch = Instant::now();
        let source = rowmetrics_hardware::pulse::gpio::GpioEdgeSource::new(flywheel, seat, epoch)
            .map_err(|e| eyre::eyre!("open GPIO pulse source: {}", e))?;
        let mut debounced = Debounced::new(source);
        let count = sample_for_one_second(&mut debounced)?;
        println!("pulses accepted: {count}/s");
        println!("debounce rejections: {}", debounced.rejected_count());
        return Ok(());
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        use rowmetrics_hardware::SimulatedPulseSource;
        use rowmetrics_traits::clock::MonotonicClock;
        use std::sync::Arc;
        let _ = flywheel_pin;
        let _ = seat_pin;
        let clock: Arc<dyn rowmetrics_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let mut source = SimulatedPulseSource::new(clock, cfg.physics.magnets_per_rev);
        let count = sample_for_one_second(&mut source)?;
        println!("pulses accepted: {count}/s");
        println!("debounce rejections: n/a (simulated source pre-debounced)");
        Ok(())
    }
}

fn sample_for_one_second(source: &mut impl PulseSource) -> eyre::Result<u32> {
    let deadline = Instant::now() + Duration::from_secs(1);
    let mut count = 0u32;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if source.next_pulse(remaining).is_ok() {
            count += 1;
        }
    }
    if count == 0 {
        return Err(eyre::eyre!("no pulses observed in 1s; check wiring/simulation"));
    }
    Ok(count)
}
