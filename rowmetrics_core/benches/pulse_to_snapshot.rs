use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rowmetrics_config::Config;
use rowmetrics_core::ingest::Core;
use rowmetrics_core::snapshot::SharedSnapshot;
use rowmetrics_traits::{Clock, PulseChannel, PulseEvent};

#[derive(Debug, Default, Clone, Copy)]
struct RealtimeClock;

impl Clock for RealtimeClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
    fn sleep(&self, _d: Duration) {}
}

// One full accelerate/decelerate stroke cycle, as a fixed sequence of
// flywheel inter-pulse deltas (µs). Replayed repeatedly to synthesize a
// long pulse trace without branching on wall time.
fn stroke_cycle_deltas() -> Vec<u64> {
    vec![
        60_000, 50_000, 40_000, 30_000, 25_000, 22_000, 20_000, // drive
        30_000, 50_000, 80_000, 120_000, 180_000, 260_000, 350_000, 450_000, // recovery
    ]
}

pub fn bench_pulse_to_snapshot(c: &mut Criterion) {
    let mut g = c.benchmark_group("pulse_to_snapshot");
    g.sample_size(30);

    let deltas = stroke_cycle_deltas();
    let strokes = 200usize;

    g.bench_function("core_on_pulse_strokes", |b| {
        b.iter_batched(
            || {
                let snapshot = Arc::new(SharedSnapshot::default());
                let clock = Arc::new(RealtimeClock);
                Core::new(Config::default(), clock, snapshot)
            },
            |mut core| {
                let mut t = 0u64;
                for _ in 0..strokes {
                    for dt in &deltas {
                        t += dt;
                        core.on_pulse(black_box(PulseEvent {
                            channel: PulseChannel::Flywheel,
                            t_us: t,
                        }));
                    }
                }
                black_box(core.stroke_count());
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

criterion_group!(pulse_to_snapshot, bench_pulse_to_snapshot);
criterion_main!(pulse_to_snapshot);
