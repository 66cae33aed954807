//! Pulse sources: the concrete GPIO-backed edge ingestion and a deterministic waveform generator used where no real
//! flywheel is attached (CLI demo mode, tests).
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rowmetrics_traits::{Clock, PulseChannel, PulseEvent, PulseSource};

use crate::error::HwError;

/// A raw, undebounced edge source. Implementations must be leaf-only: a
/// timestamp read and nothing else — no locks, no allocation on the hot path.
pub trait RawEdgeSource {
    fn wait_edge(&mut self, timeout: Duration) -> Result<PulseEvent, HwError>;
}

/// Default debounce windows.
pub const DEFAULT_FLYWHEEL_DEBOUNCE_US: u64 = 10_000;
pub const DEFAULT_SEAT_DEBOUNCE_US: u64 = 50_000;

/// Applies a per-channel debounce rule on top of any [`RawEdgeSource`]:
/// reject an edge if `t_us - last_accepted_us < debounce_us` for its channel.
pub struct Debounced<S> {
    inner: S,
    last_flywheel_us: Option<u64>,
    last_seat_us: Option<u64>,
    flywheel_debounce_us: u64,
    seat_debounce_us: u64,
    rejected: u64,
}

impl<S: RawEdgeSource> Debounced<S> {
    pub fn new(inner: S) -> Self {
        Self::with_debounce(
            inner,
            DEFAULT_FLYWHEEL_DEBOUNCE_US,
            DEFAULT_SEAT_DEBOUNCE_US,
        )
    }

    pub fn with_debounce(inner: S, flywheel_debounce_us: u64, seat_debounce_us: u64) -> Self {
        Self {
            inner,
            last_flywheel_us: None,
            last_seat_us: None,
            flywheel_debounce_us,
            seat_debounce_us,
            rejected: 0,
        }
    }

    /// Edges dropped for arriving inside the debounce window since construction.
    /// Used by `rowmetrics_cli`'s `selfcheck` diagnostic.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    fn accept(&mut self, ev: PulseEvent) -> bool {
        let (last, window) = match ev.channel {
            PulseChannel::Flywheel => (&mut self.last_flywheel_us, self.flywheel_debounce_us),
            PulseChannel::Seat => (&mut self.last_seat_us, self.seat_debounce_us),
        };
        if let Some(last_us) = *last
            && ev.t_us.saturating_sub(last_us) < window
        {
            self.rejected += 1;
            return false;
        }
        *last = Some(ev.t_us);
        true
    }
}

impl<S: RawEdgeSource> PulseSource for Debounced<S> {
    fn next_pulse(
        &mut self,
        timeout: Duration,
    ) -> Result<PulseEvent, Box<dyn Error + Send + Sync>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Box::new(HwError::Timeout));
            }
            let ev = self.inner.wait_edge(remaining).map_err(|e| {
                let boxed: Box<dyn Error + Send + Sync> = Box::new(e);
                boxed
            })?;
            if self.accept(ev) {
                return Ok(ev);
            }
            // Spurious closer-than-debounce edge: silently dropped, keep waiting.
        }
    }
}

/// Deterministic stroke-cycle waveform generator: alternates a drive ramp-up
/// and a recovery ramp-down in angular velocity, emitting flywheel pulses at
/// the spacing that velocity implies. Stands in for a real flywheel in CLI
/// demo mode and in integration tests that need a full pulse stream rather
/// than hand-fed timestamps.
pub struct SimulatedPulseSource {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    cycle_pos_us: u64,
    drive_us: u64,
    recovery_us: u64,
    omega_min: f32,
    omega_max: f32,
    angle_step_rad: f32,
}

impl SimulatedPulseSource {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, magnets_per_rev: u8) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            cycle_pos_us: 0,
            drive_us: 800_000,
            recovery_us: 1_600_000,
            omega_min: 5.0,
            omega_max: 35.0,
            angle_step_rad: std::f32::consts::TAU / f32::from(magnets_per_rev.max(1)),
        }
    }

    fn omega_at(&self, pos_us: u64) -> f32 {
        let cycle_us = self.drive_us + self.recovery_us;
        let pos = pos_us % cycle_us.max(1);
        if pos < self.drive_us {
            let t = pos as f32 / self.drive_us as f32;
            self.omega_min + (self.omega_max - self.omega_min) * t
        } else {
            let t = (pos - self.drive_us) as f32 / self.recovery_us as f32;
            self.omega_max - (self.omega_max - self.omega_min) * t
        }
    }
}

impl PulseSource for SimulatedPulseSource {
    fn next_pulse(
        &mut self,
        _timeout: Duration,
    ) -> Result<PulseEvent, Box<dyn Error + Send + Sync>> {
        let omega = self.omega_at(self.cycle_pos_us).max(0.5);
        let dt_s = self.angle_step_rad / omega;
        let dt_us = ((dt_s * 1_000_000.0) as u64).max(1);
        self.clock.sleep(Duration::from_micros(dt_us));
        self.cycle_pos_us = self.cycle_pos_us.wrapping_add(dt_us);
        Ok(PulseEvent {
            channel: PulseChannel::Flywheel,
            t_us: self.clock.us_since(self.epoch),
        })
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio {
    use super::{Instant, RawEdgeSource};
    use crate::error::HwError;
    use rowmetrics_traits::{PulseChannel, PulseEvent};
    use rppal::gpio::{Gpio, Trigger};
    use std::time::Duration;

    /// Two active-low inputs with internal pull-ups, falling-edge interrupts.
    /// The interrupt callbacks are leaf-only: a timestamp read and a
    /// non-blocking channel send.
    pub struct GpioEdgeSource {
        rx: crossbeam_channel::Receiver<PulseEvent>,
        _flywheel_pin: rppal::gpio::InputPin,
        _seat_pin: rppal::gpio::InputPin,
    }

    impl GpioEdgeSource {
        pub fn new(flywheel_bcm: u8, seat_bcm: u8, epoch: Instant) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let mut flywheel_pin = gpio
                .get(flywheel_bcm)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input_pullup();
            let mut seat_pin = gpio
                .get(seat_bcm)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input_pullup();

            let (tx, rx) = crossbeam_channel::bounded(256);
            let tx_flywheel = tx.clone();
            flywheel_pin
                .set_async_interrupt(Trigger::FallingEdge, move |_level| {
                    let t_us = epoch.elapsed().as_micros() as u64;
                    let _ = tx_flywheel.try_send(PulseEvent {
                        channel: PulseChannel::Flywheel,
                        t_us,
                    });
                })
                .map_err(|e| HwError::Gpio(e.to_string()))?;
            seat_pin
                .set_async_interrupt(Trigger::FallingEdge, move |_level| {
                    let t_us = epoch.elapsed().as_micros() as u64;
                    let _ = tx.try_send(PulseEvent {
                        channel: PulseChannel::Seat,
                        t_us,
                    });
                })
                .map_err(|e| HwError::Gpio(e.to_string()))?;

            Ok(Self {
                rx,
                _flywheel_pin: flywheel_pin,
                _seat_pin: seat_pin,
            })
        }
    }

    impl RawEdgeSource for GpioEdgeSource {
        fn wait_edge(&mut self, timeout: Duration) -> Result<PulseEvent, HwError> {
            self.rx.recv_timeout(timeout).map_err(|_| HwError::Timeout)
        }
    }
}

/// Dedicated pulse-ingestion thread.
/// Owns a [`PulseSource`] (already-debounced), forwards events over a
/// bounded channel, and shuts itself down cleanly on drop: an atomic flag
/// checked before and after every blocking wait, joined in `Drop`.
pub struct PulseThread {
    rx: crossbeam_channel::Receiver<PulseEvent>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl PulseThread {
    /// Spawn the thread. `poll_timeout` bounds how long each `next_pulse`
    /// call blocks before the shutdown flag is rechecked.
    pub fn spawn<S>(mut source: S, poll_timeout: Duration) -> Self
    where
        S: PulseSource + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(256);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("pulse thread received shutdown signal");
                    break;
                }
                match source.next_pulse(poll_timeout) {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            tracing::debug!("pulse thread consumer disconnected, exiting");
                            break;
                        }
                    }
                    Err(e) => {
                        if e.downcast_ref::<HwError>().is_some_and(|e| matches!(e, HwError::Timeout))
                        {
                            // Plain timeout with no edge; loop back to the shutdown check.
                        } else {
                            tracing::warn!(%e, "pulse source reported a fault");
                        }
                    }
                }
            }
            tracing::trace!("pulse thread exiting cleanly");
        });

        Self {
            rx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Drain every pulse accepted since the last call, oldest first.
    pub fn drain(&self) -> Vec<PulseEvent> {
        self.rx.try_iter().collect()
    }

    /// Block up to `timeout` for the next pulse; `None` on a plain timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PulseEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Drop for PulseThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("pulse thread joined successfully"),
                Err(e) => tracing::warn!(?e, "pulse thread panicked during shutdown"),
            }
        }
    }
}
