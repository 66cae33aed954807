//! Session controller.
//!
//! Owns the `None`/`Running`/`Paused` lifecycle, the per-second sample ring,
//! auto-pause-on-inactivity, and persistence through [`SessionStore`]. Reads
//! [`MetricsSnapshot`] copies from `crate::ingest::Core`; never holds the C6
//! mutex across a store call.

use std::sync::Arc;

use rowmetrics_config::Config;
use rowmetrics_traits::{Clock, SessionStore};
use serde::{Deserialize, Serialize};

use crate::hr::HrState;
use crate::ingest::Core;
use crate::snapshot::MetricsSnapshot;

/// Number of persisted record slots.
pub const PERSIST_SLOTS: u32 = 20;
/// Ring capacity: one row per second for up to two hours.
pub const MAX_SAMPLES: usize = 7_200;
/// A completed session below this duration/distance is not committed.
const MIN_COMMIT_STROKES: u32 = 5;
const MIN_COMMIT_DISTANCE_M: f32 = 10.0;

/// Wall-clock capability, deliberately narrower than [`Clock`]: returns
/// `None` until SNTP (out of scope here) has synced. Persisted
/// records get `start_unix_ms = 0` rather than a fabricated value.
pub trait WallClock: Send + Sync {
    fn now_unix_ms(&self) -> Option<u64>;
}

/// Default implementation for a device that has never synced wall time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsyncedWallClock;

impl WallClock for UnsyncedWallClock {
    fn now_unix_ms(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u32,
    pub start_unix_ms: u64,
    pub duration_s: u64,
    pub distance_m: f32,
    pub stroke_count: u32,
    pub calories_kcal: f32,
    pub power_avg_w: f32,
    pub pace_avg_s500: f32,
    pub drag_factor: f32,
    pub avg_hr: u8,
    pub max_hr: u8,
    pub avg_stroke_rate: f32,
    pub sample_count: u32,
    pub synced: bool,
}

/// Fixed 8-byte per-second sample row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRow {
    pub power_w: u16,
    pub velocity_cm_s: u16,
    pub hr_bpm: u8,
    pub reserved: u8,
    pub distance_dm_delta: u16,
}

impl SampleRow {
    pub const LEN: usize = 8;

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..2].copy_from_slice(&self.power_w.to_le_bytes());
        buf[2..4].copy_from_slice(&self.velocity_cm_s.to_le_bytes());
        buf[4] = self.hr_bpm;
        buf[5] = self.reserved;
        buf[6..8].copy_from_slice(&self.distance_dm_delta.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self {
            power_w: u16::from_le_bytes([buf[0], buf[1]]),
            velocity_cm_s: u16::from_le_bytes([buf[2], buf[3]]),
            hr_bpm: buf[4],
            reserved: buf[5],
            distance_dm_delta: u16::from_le_bytes([buf[6], buf[7]]),
        }
    }

    pub fn encode_all(rows: &[SampleRow]) -> Vec<u8> {
        let mut out = Vec::with_capacity(rows.len() * Self::LEN);
        for row in rows {
            out.extend_from_slice(&row.to_bytes());
        }
        out
    }

    pub fn decode_all(bytes: &[u8]) -> Vec<SampleRow> {
        bytes
            .chunks_exact(Self::LEN)
            .map(|chunk| Self::from_bytes(chunk.try_into().expect("chunks_exact(8)")))
            .collect()
    }
}

#[derive(Default)]
struct Accumulators {
    hr_sum: u64,
    hr_count: u32,
    hr_max: u8,
    stroke_rate_sum: f32,
    stroke_rate_count: u32,
}

impl Accumulators {
    fn observe(&mut self, hr_bpm: u8, stroke_rate_spm: f32) {
        if hr_bpm > 0 {
            self.hr_sum += u64::from(hr_bpm);
            self.hr_count += 1;
            self.hr_max = self.hr_max.max(hr_bpm);
        }
        if stroke_rate_spm > 0.0 {
            self.stroke_rate_sum += stroke_rate_spm;
            self.stroke_rate_count += 1;
        }
    }

    fn avg_hr(&self) -> u8 {
        if self.hr_count == 0 {
            0
        } else {
            (self.hr_sum / u64::from(self.hr_count)) as u8
        }
    }

    fn avg_stroke_rate(&self) -> f32 {
        if self.stroke_rate_count == 0 {
            0.0
        } else {
            self.stroke_rate_sum / self.stroke_rate_count as f32
        }
    }
}

pub struct SessionController<S: SessionStore> {
    store: S,
    clock: Arc<dyn Clock + Send + Sync>,
    wall: Arc<dyn WallClock>,
    auto_pause_s: u32,

    state: SessionState,
    current_id: Option<u32>,
    start_unix_ms: u64,
    session_started_us: u64,
    pause_start_us: u64,
    total_paused_ms: u64,
    last_resume_us: u64,
    stroke_count_at_resume: u32,

    ring: Vec<SampleRow>,
    last_sample_second: u64,
    last_distance_dm: u32,
    acc: Accumulators,
}

impl<S: SessionStore> SessionController<S> {
    pub fn new(
        store: S,
        clock: Arc<dyn Clock + Send + Sync>,
        wall: Arc<dyn WallClock>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            clock,
            wall,
            auto_pause_s: config.behavior.auto_pause_s,
            state: SessionState::None,
            current_id: None,
            start_unix_ms: 0,
            session_started_us: 0,
            pause_start_us: 0,
            total_paused_ms: 0,
            last_resume_us: 0,
            stroke_count_at_resume: 0,
            ring: Vec::new(),
            last_sample_second: 0,
            last_distance_dm: 0,
            acc: Accumulators::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_id(&self) -> Option<u32> {
        self.current_id
    }

    pub fn total_paused_ms(&self) -> u64 {
        self.total_paused_ms
    }

    /// `elapsed_ms`: frozen while paused, never decreasing while running.
    pub fn elapsed_ms(&self, now_us: u64) -> u64 {
        if self.session_started_us == 0 {
            return 0;
        }
        // While paused, freeze the clock at the moment the pause began —
        // otherwise the in-progress pause span (not yet folded into
        // total_paused_ms, which only advances on resume) keeps leaking in.
        let clock_us = if self.state == SessionState::Paused {
            self.pause_start_us
        } else {
            now_us
        };
        let raw_ms = clock_us.saturating_sub(self.session_started_us) / 1000;
        raw_ms.saturating_sub(self.total_paused_ms)
    }

    /// `start`. Idempotent from `Running`; resumes from `Paused`.
    pub fn start(&mut self, core: &mut Core, hr: &mut HrState, now_us: u64) -> eyre::Result<()> {
        match self.state {
            SessionState::Running => Ok(()),
            SessionState::Paused => {
                self.resume(core, now_us);
                Ok(())
            }
            SessionState::None => {
                let id = self.store.next_id().map_err(|e| eyre::eyre!("{e}"))?;
                self.current_id = Some(id);
                self.start_unix_ms = self.wall.now_unix_ms().unwrap_or(0);
                self.session_started_us = now_us;
                self.total_paused_ms = 0;
                self.last_resume_us = now_us;
                self.ring.clear();
                self.last_sample_second = 0;
                self.last_distance_dm = 0;
                self.acc = Accumulators::default();
                self.stroke_count_at_resume = core.stroke_count();
                core.reset_session();
                hr.set_recording(true);
                self.state = SessionState::Running;
                tracing::info!(id, "session started");
                Ok(())
            }
        }
    }

    /// `pause`. No-op outside `Running`.
    pub fn pause(&mut self, now_us: u64) {
        if self.state == SessionState::Running {
            self.pause_start_us = now_us;
            self.state = SessionState::Paused;
            tracing::info!("session paused");
        }
    }

    /// `resume`. No-op outside `Paused`.
    pub fn resume(&mut self, core: &Core, now_us: u64) {
        if self.state == SessionState::Paused {
            self.total_paused_ms += now_us.saturating_sub(self.pause_start_us) / 1000;
            self.last_resume_us = now_us;
            self.stroke_count_at_resume = core.stroke_count();
            self.state = SessionState::Running;
            tracing::info!("session resumed");
        }
    }

    /// `stop`. Commits a [`SessionRecord`] if the session
    /// cleared the minimum stroke/distance bar; always returns to `None`.
    pub fn stop(
        &mut self,
        snapshot: &MetricsSnapshot,
        hr: &mut HrState,
        now_us: u64,
    ) -> eyre::Result<Option<SessionRecord>> {
        if self.state == SessionState::None {
            return Ok(None);
        }
        let elapsed_ms = self.elapsed_ms(now_us);
        let committed = snapshot.stroke_count >= MIN_COMMIT_STROKES
            && snapshot.distance_m >= MIN_COMMIT_DISTANCE_M;

        let result = if committed {
            let id = self.current_id.unwrap_or(0);
            let record = SessionRecord {
                id,
                start_unix_ms: self.start_unix_ms,
                duration_s: elapsed_ms / 1000,
                distance_m: snapshot.distance_m,
                stroke_count: snapshot.stroke_count,
                calories_kcal: snapshot.calories_kcal,
                power_avg_w: snapshot.power_avg_w,
                pace_avg_s500: snapshot.pace_avg_s500.unwrap_or(0.0),
                drag_factor: snapshot.drag_factor,
                avg_hr: self.acc.avg_hr(),
                max_hr: self.acc.hr_max,
                avg_stroke_rate: self.acc.avg_stroke_rate(),
                sample_count: self.ring.len() as u32,
                synced: false,
            };
            let slot = id % PERSIST_SLOTS;
            let record_bytes = serde_json::to_vec(&record)
                .map_err(|e| eyre::eyre!("serialize session record: {e}"))?;
            self.store
                .save_record(slot, &record_bytes)
                .map_err(|e| eyre::eyre!("{e}"))?;
            self.store
                .save_samples(slot, &SampleRow::encode_all(&self.ring))
                .map_err(|e| eyre::eyre!("{e}"))?;
            Some(record)
        } else {
            tracing::info!(
                stroke_count = snapshot.stroke_count,
                distance_m = snapshot.distance_m,
                "session discarded: below minimum stroke/distance bar"
            );
            None
        };

        hr.set_recording(false);
        self.state = SessionState::None;
        self.current_id = None;
        self.session_started_us = 0;
        Ok(result)
    }

    /// Per-second sampler. Call once per tick; it is a no-op except at the
    /// boundary of a new elapsed second.
    pub fn sample_tick(&mut self, snapshot: &MetricsSnapshot, hr_bpm: u8, now_us: u64) {
        if self.state != SessionState::Running {
            return;
        }
        let elapsed_s = self.elapsed_ms(now_us) / 1000;
        if elapsed_s == self.last_sample_second {
            return;
        }
        self.last_sample_second = elapsed_s;

        if self.ring.len() >= MAX_SAMPLES {
            return; // ring full: stop appending, keep session running
        }

        let velocity_cm_s = match snapshot.pace_inst_s500 {
            Some(pace) if pace > 0.0 => (50_000.0 / pace).clamp(0.0, u16::MAX as f32) as u16,
            _ => 0,
        };
        let distance_dm = (snapshot.distance_m * 10.0) as u32;
        let delta_dm = distance_dm.saturating_sub(self.last_distance_dm);
        self.last_distance_dm = distance_dm;

        self.ring.push(SampleRow {
            power_w: snapshot.power_inst_w.clamp(0.0, u16::MAX as f32) as u16,
            velocity_cm_s,
            hr_bpm,
            reserved: 0,
            distance_dm_delta: delta_dm.min(u32::from(u16::MAX)) as u16,
        });
        self.acc.observe(hr_bpm, snapshot.stroke_rate_spm);
    }

    /// Auto-activity, skipped while C10 (inertia calibration) owns the
    /// flywheel — callers check that flag themselves before invoking this.
    pub fn auto_activity_tick(&mut self, core: &mut Core, hr: &mut HrState, now_us: u64) {
        if self.auto_pause_s == 0 {
            return;
        }
        let last_drive_us = core.last_drive_start_us();
        let recent_activity = last_drive_us > 0
            && now_us.saturating_sub(last_drive_us) < u64::from(self.auto_pause_s) * 1_000_000;
        let stroke_count = core.stroke_count();
        let completed_stroke = stroke_count > 0;

        match self.state {
            SessionState::None if recent_activity && completed_stroke => {
                let _ = self.start(core, hr, now_us);
            }
            SessionState::Paused if recent_activity && completed_stroke => {
                self.resume(core, now_us);
            }
            SessionState::Running if !recent_activity => {
                self.pause(now_us);
            }
            _ => {}
        }
    }

    /// Write the session-lifecycle subset of fields into the snapshot
    /// (`crate::ingest::Core::tick` writes the rest).
    pub fn write_snapshot_fields(&self, snapshot: &mut MetricsSnapshot, now_us: u64) {
        snapshot.elapsed_ms = self.elapsed_ms(now_us);
        snapshot.session_started = self.state != SessionState::None;
        snapshot.is_paused = self.state == SessionState::Paused;
        snapshot.pause_start_us = self.pause_start_us;
        snapshot.total_paused_ms = self.total_paused_ms;
        snapshot.last_resume_us = self.last_resume_us;
        snapshot.is_active = self.state == SessionState::Running;
    }

    /// Read a persisted record, matching 's slot-overwrite rule:
    /// returns `Ok(None)` if the stored `id` doesn't match the requested one
    /// (the slot has since been overwritten by a newer session).
    pub fn load_record(&self, id: u32) -> eyre::Result<Option<SessionRecord>> {
        let slot = id % PERSIST_SLOTS;
        let Some(bytes) = self.store.load_record(slot).map_err(|e| eyre::eyre!("{e}"))? else {
            return Ok(None);
        };
        let record: SessionRecord =
            serde_json::from_slice(&bytes).map_err(|e| eyre::eyre!("corrupt session record: {e}"))?;
        if record.id != id {
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn load_samples(&self, id: u32) -> eyre::Result<Vec<SampleRow>> {
        let slot = id % PERSIST_SLOTS;
        match self.store.load_samples(slot).map_err(|e| eyre::eyre!("{e}"))? {
            Some(bytes) => Ok(SampleRow::decode_all(&bytes)),
            None => Ok(Vec::new()),
        }
    }

    pub fn delete(&self, id: u32) -> eyre::Result<()> {
        let slot = id % PERSIST_SLOTS;
        self.store.delete(slot).map_err(|e| eyre::eyre!("{e}"))
    }

    /// List the most recent committed sessions, newest first. Scans every
    /// persistence slot rather than tracking a separate index; with
    /// `PERSIST_SLOTS` slots that's also the natural cap on how many
    /// distinct sessions can be resident at once.
    pub fn list_recent(&self) -> eyre::Result<Vec<SessionRecord>> {
        let mut records = Vec::new();
        for slot in 0..PERSIST_SLOTS {
            let Some(bytes) = self.store.load_record(slot).map_err(|e| eyre::eyre!("{e}"))? else {
                continue;
            };
            match serde_json::from_slice::<SessionRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(slot, %e, "skipping corrupt session record");
                }
            }
        }
        records.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        records.truncate(20);
        Ok(records)
    }

    /// Flip a committed session's `synced` flag. Matches [`Self::load_record`]'s
    /// slot-overwrite rule: a stale `id` is silently a no-op.
    pub fn mark_synced(&self, id: u32) -> eyre::Result<bool> {
        let Some(mut record) = self.load_record(id)? else {
            return Ok(false);
        };
        record.synced = true;
        let slot = id % PERSIST_SLOTS;
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| eyre::eyre!("serialize session record: {e}"))?;
        self.store
            .save_record(slot, &bytes)
            .map_err(|e| eyre::eyre!("{e}"))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SharedSnapshot;
    use crate::test_support::TestClock;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct InMemoryStore {
        next_id: Mutex<u32>,
        records: Mutex<HashMap<u32, Vec<u8>>>,
        samples: Mutex<HashMap<u32, Vec<u8>>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("in-memory store error")]
    struct NeverErr;

    impl SessionStore for InMemoryStore {
        type Error = NeverErr;
        fn next_id(&self) -> Result<u32, Self::Error> {
            let mut n = self.next_id.lock().unwrap();
            *n += 1;
            Ok(*n)
        }
        fn save_record(&self, slot: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            self.records.lock().unwrap().insert(slot, bytes.to_vec());
            Ok(())
        }
        fn load_record(&self, slot: u32) -> Result<Option<Vec<u8>>, Self::Error> {
            Ok(self.records.lock().unwrap().get(&slot).cloned())
        }
        fn save_samples(&self, slot: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            self.samples.lock().unwrap().insert(slot, bytes.to_vec());
            Ok(())
        }
        fn load_samples(&self, slot: u32) -> Result<Option<Vec<u8>>, Self::Error> {
            Ok(self.samples.lock().unwrap().get(&slot).cloned())
        }
        fn delete(&self, slot: u32) -> Result<(), Self::Error> {
            self.records.lock().unwrap().remove(&slot);
            self.samples.lock().unwrap().remove(&slot);
            Ok(())
        }
    }

    fn controller() -> (SessionController<InMemoryStore>, Arc<TestClock>, Instant, Core, HrState) {
        let clock = Arc::new(TestClock::new());
        let epoch = clock.now();
        let config = Config::default();
        let controller = SessionController::new(
            InMemoryStore::default(),
            clock.clone(),
            Arc::new(UnsyncedWallClock),
            &config,
        );
        let snapshot = Arc::new(SharedSnapshot::default());
        let core = Core::new(config, clock.clone(), snapshot);
        let hr = HrState::new(clock.clone());
        (controller, clock, epoch, core, hr)
    }

    #[test]
    fn sample_row_roundtrips_through_bytes() {
        let row = SampleRow {
            power_w: 180,
            velocity_cm_s: 420,
            hr_bpm: 142,
            reserved: 0,
            distance_dm_delta: 12,
        };
        let bytes = row.to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(SampleRow::from_bytes(&bytes), row);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        ctl.start(&mut core, &mut hr, clock.us_since(epoch)).unwrap();
        let id_after_first = ctl.current_id();
        ctl.start(&mut core, &mut hr, 1_000_000).unwrap();
        assert_eq!(ctl.current_id(), id_after_first);
        assert_eq!(ctl.state(), SessionState::Running);
    }

    #[test]
    fn pause_then_resume_advances_total_paused_ms() {
        use std::time::Duration;
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        ctl.start(&mut core, &mut hr, 0).unwrap();
        clock.advance(Duration::from_secs(1));
        ctl.pause(clock.us_since(epoch));
        clock.advance(Duration::from_secs(3));
        ctl.resume(&core, clock.us_since(epoch));
        assert!(ctl.total_paused_ms >= 2_900 && ctl.total_paused_ms <= 3_100);
    }

    #[test]
    fn stop_discards_below_minimum_bar() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        ctl.start(&mut core, &mut hr, 0).unwrap();
        let snap = MetricsSnapshot {
            stroke_count: 1,
            distance_m: 5.0,
            ..Default::default()
        };
        let record = ctl.stop(&snap, &mut hr, clock.us_since(epoch)).unwrap();
        assert!(record.is_none());
        assert_eq!(ctl.state(), SessionState::None);
    }

    #[test]
    fn stop_commits_and_is_readable_then_deletable() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        ctl.start(&mut core, &mut hr, 0).unwrap();
        let snap = MetricsSnapshot {
            stroke_count: 10,
            distance_m: 120.0,
            ..Default::default()
        };
        let record = ctl
            .stop(&snap, &mut hr, clock.us_since(epoch))
            .unwrap()
            .expect("should commit");
        let loaded = ctl.load_record(record.id).unwrap().expect("readable");
        assert_eq!(loaded.stroke_count, 10);
        ctl.delete(record.id).unwrap();
        assert!(ctl.load_record(record.id).unwrap().is_none());
    }

    #[test]
    fn overwritten_slot_reads_as_not_found() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        // Commit 20 sessions to force a slot wraparound over the id space.
        let mut first_id = None;
        for _ in 0..(PERSIST_SLOTS + 1) {
            ctl.start(&mut core, &mut hr, 0).unwrap();
            let snap = MetricsSnapshot {
                stroke_count: 10,
                distance_m: 50.0,
                ..Default::default()
            };
            let rec = ctl
                .stop(&snap, &mut hr, clock.us_since(epoch))
                .unwrap()
                .unwrap();
            if first_id.is_none() {
                first_id = Some(rec.id);
            }
        }
        let stale_id = first_id.unwrap();
        assert!(ctl.load_record(stale_id).unwrap().is_none());
    }

    #[test]
    fn list_recent_sorts_newest_first_and_caps_at_twenty() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        for _ in 0..3 {
            ctl.start(&mut core, &mut hr, clock.us_since(epoch)).unwrap();
            let snap = MetricsSnapshot {
                stroke_count: 10,
                distance_m: 50.0,
                ..Default::default()
            };
            ctl.stop(&snap, &mut hr, clock.us_since(epoch)).unwrap();
        }
        let recent = ctl.list_recent().unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn mark_synced_flips_flag_and_ignores_stale_id() {
        let (mut ctl, clock, epoch, mut core, mut hr) = controller();
        ctl.start(&mut core, &mut hr, 0).unwrap();
        let snap = MetricsSnapshot {
            stroke_count: 10,
            distance_m: 120.0,
            ..Default::default()
        };
        let record = ctl
            .stop(&snap, &mut hr, clock.us_since(epoch))
            .unwrap()
            .expect("should commit");
        assert!(!record.synced);
        assert!(ctl.mark_synced(record.id).unwrap());
        let reloaded = ctl.load_record(record.id).unwrap().unwrap();
        assert!(reloaded.synced);
        assert!(!ctl.mark_synced(9_999).unwrap());
    }
}
