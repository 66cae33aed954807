//! Broadcast fan-out. Two independent periodic
//! dividers driven by one 10 Hz tick, dispatching an encoded frame to every
//! connected [`BroadcastSink`]. Dead clients are reaped on the tick that
//! observes the send failure; neither stream blocks the other.

use rowmetrics_traits::BroadcastSink;

use crate::ftms::encode_rower_data;
use crate::snapshot::MetricsSnapshot;
use crate::webjson::{sse_frame, HrStatus, MetricsJson};

/// Tick cadence the dividers are expressed in.
const TICK_MS: u32 = 100;

struct Divider {
    interval_ms: u32,
    accumulated_ms: u32,
}

impl Divider {
    fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: interval_ms.max(TICK_MS),
            accumulated_ms: 0,
        }
    }

    /// Returns true at most once per `interval_ms` of accumulated tick time.
    fn due(&mut self) -> bool {
        self.accumulated_ms += TICK_MS;
        if self.accumulated_ms >= self.interval_ms {
            self.accumulated_ms = 0;
            true
        } else {
            false
        }
    }
}

/// Owns the BLE-notify and web-push client lists and their independent
/// dividers. Sinks are trait objects:
/// a real BLE notify sink and a real WebSocket/SSE sink are different
/// concrete types, unified only by [`BroadcastSink`].
pub struct Fanout {
    ble_divider: Divider,
    web_divider: Divider,
    ble_clients: Vec<Box<dyn BroadcastSink>>,
    web_clients: Vec<Box<dyn BroadcastSink>>,
}

impl Fanout {
    pub fn new(ble_interval_ms: u32, web_interval_ms: u32) -> Self {
        Self {
            ble_divider: Divider::new(ble_interval_ms),
            web_divider: Divider::new(web_interval_ms),
            ble_clients: Vec::new(),
            web_clients: Vec::new(),
        }
    }

    pub fn add_ble_client(&mut self, client: Box<dyn BroadcastSink>) {
        self.ble_clients.push(client);
    }

    pub fn add_web_client(&mut self, client: Box<dyn BroadcastSink>) {
        self.web_clients.push(client);
    }

    pub fn ble_client_count(&self) -> usize {
        self.ble_clients.len()
    }

    pub fn web_client_count(&self) -> usize {
        self.web_clients.len()
    }

    /// Call once per 10 Hz tick. Encodes and dispatches only on the
    /// dividers that just came due; reaps any sink whose `send` failed.
    pub fn tick(&mut self, snapshot: &MetricsSnapshot, hr_status: HrStatus) {
        if self.ble_divider.due() && !self.ble_clients.is_empty() {
            let packet = encode_rower_data(snapshot);
            Self::dispatch(&mut self.ble_clients, &packet);
        }
        if self.web_divider.due() && !self.web_clients.is_empty() {
            let json = MetricsJson::from_snapshot(snapshot, hr_status);
            let frame = sse_frame(&json);
            Self::dispatch(&mut self.web_clients, frame.as_bytes());
        }
    }

    fn dispatch(clients: &mut Vec<Box<dyn BroadcastSink>>, bytes: &[u8]) {
        clients.retain_mut(|client| {
            if !client.is_connected() {
                return false;
            }
            match client.send(bytes) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "broadcast: dead client reaped");
                    false
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingSink {
        connected: bool,
        fail_next: bool,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl BroadcastSink for RecordingSink {
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn send(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail_next {
                return Err("send failed".into());
            }
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    #[test]
    fn ble_and_web_dividers_fire_independently() {
        let mut fanout = Fanout::new(500, 200);
        let ble_log = Arc::new(Mutex::new(Vec::new()));
        let web_log = Arc::new(Mutex::new(Vec::new()));
        fanout.add_ble_client(Box::new(RecordingSink {
            connected: true,
            fail_next: false,
            sent: ble_log.clone(),
        }));
        fanout.add_web_client(Box::new(RecordingSink {
            connected: true,
            fail_next: false,
            sent: web_log.clone(),
        }));

        let snapshot = MetricsSnapshot::default();
        for _ in 0..10 {
            fanout.tick(&snapshot, HrStatus::Idle);
        }
        // 10 ticks * 100ms = 1000ms: web fires every 200ms (5 times), ble every 500ms (2 times).
        assert_eq!(web_log.lock().unwrap().len(), 5);
        assert_eq!(ble_log.lock().unwrap().len(), 2);
    }

    #[test]
    fn failed_send_reaps_the_client() {
        let mut fanout = Fanout::new(100, 100);
        fanout.add_web_client(Box::new(RecordingSink {
            connected: true,
            fail_next: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }));
        assert_eq!(fanout.web_client_count(), 1);
        fanout.tick(&MetricsSnapshot::default(), HrStatus::Idle);
        assert_eq!(fanout.web_client_count(), 0);
    }

    #[test]
    fn disconnected_client_is_reaped_without_sending() {
        let mut fanout = Fanout::new(100, 100);
        fanout.add_web_client(Box::new(RecordingSink {
            connected: false,
            fail_next: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }));
        fanout.tick(&MetricsSnapshot::default(), HrStatus::Idle);
        assert_eq!(fanout.web_client_count(), 0);
    }
}
