//! Metrics JSON schema for the HTTP/SSE/WebSocket surface.
//!
//! This module owns serialization only; wiring it to routes is a contract
//! for whatever HTTP framework a caller wires up, out of scope here.

use serde::Serialize;

use crate::energy::format_pace_s500;
use crate::snapshot::MetricsSnapshot;
use crate::stroke::Phase;

/// Frozen field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsJson {
    pub distance: f32,
    pub pace: Option<f32>,
    #[serde(rename = "paceStr")]
    pub pace_str: String,
    #[serde(rename = "avgPace")]
    pub avg_pace: Option<f32>,
    #[serde(rename = "avgPaceStr")]
    pub avg_pace_str: String,
    pub power: f32,
    #[serde(rename = "avgPower")]
    pub avg_power: f32,
    #[serde(rename = "peakPower")]
    pub peak_power: f32,
    #[serde(rename = "strokeRate")]
    pub stroke_rate: f32,
    #[serde(rename = "avgStrokeRate")]
    pub avg_stroke_rate: f32,
    #[serde(rename = "strokeCount")]
    pub stroke_count: u32,
    pub calories: f32,
    #[serde(rename = "caloriesPerHour")]
    pub calories_per_hour: f32,
    #[serde(rename = "elapsedTime")]
    pub elapsed_time: u64,
    #[serde(rename = "dragFactor")]
    pub drag_factor: f32,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "isPaused")]
    pub is_paused: bool,
    pub phase: Phase,
    #[serde(rename = "heartRate")]
    pub heart_rate: u8,
    #[serde(rename = "avgHeartRate")]
    pub avg_heart_rate: u8,
    #[serde(rename = "hrValid")]
    pub hr_valid: bool,
    #[serde(rename = "hrStatus")]
    pub hr_status: HrStatus,
}

/// `hrStatus∈{idle,scanning,connecting,connected,error}`. The
/// BLE HR client itself is out of scope; this crate only carries the
/// enum a real client implementation would set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HrStatus {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Error,
}

impl MetricsJson {
    pub fn from_snapshot(s: &MetricsSnapshot, hr_status: HrStatus) -> Self {
        Self {
            distance: s.distance_m,
            pace: s.pace_inst_s500,
            pace_str: format_pace_s500(s.pace_inst_s500),
            avg_pace: s.pace_avg_s500,
            avg_pace_str: format_pace_s500(s.pace_avg_s500),
            power: s.power_inst_w,
            avg_power: s.power_avg_w,
            peak_power: s.power_peak_w,
            stroke_rate: s.stroke_rate_spm,
            avg_stroke_rate: s.avg_stroke_rate_spm,
            stroke_count: s.stroke_count,
            calories: s.calories_kcal,
            calories_per_hour: s.calories_per_hour,
            elapsed_time: s.elapsed_ms / 1000,
            drag_factor: s.drag_factor,
            is_active: s.is_active,
            is_paused: s.is_paused,
            phase: s.phase,
            heart_rate: s.heart_rate_bpm,
            avg_heart_rate: s.avg_heart_rate_bpm,
            hr_valid: s.heart_rate_bpm > 0,
            hr_status,
        }
    }
}

/// "SSE framing": `data: <json>\n\n` for a metrics frame.
/// The initial `event: connected\ndata: {"status":"connected"}\n\n` frame is
/// the caller's concern (it precedes any snapshot existing).
pub fn sse_frame(m: &MetricsJson) -> String {
    format!("data: {}\n\n", serde_json::to_string(m).expect("MetricsJson always serializes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_frozen_schema() {
        let snap = MetricsSnapshot {
            distance_m: 12.5,
            stroke_count: 3,
            ..Default::default()
        };
        let json = MetricsJson::from_snapshot(&snap, HrStatus::Idle);
        let value = serde_json::to_value(&json).unwrap();
        for key in [
            "distance",
            "pace",
            "paceStr",
            "avgPace",
            "avgPaceStr",
            "power",
            "avgPower",
            "peakPower",
            "strokeRate",
            "avgStrokeRate",
            "strokeCount",
            "calories",
            "caloriesPerHour",
            "elapsedTime",
            "dragFactor",
            "isActive",
            "isPaused",
            "phase",
            "heartRate",
            "avgHeartRate",
            "hrValid",
            "hrStatus",
        ] {
            assert!(value.get(key).is_some(), "missing frozen field {key}");
        }
    }

    #[test]
    fn phase_serializes_lowercase() {
        let snap = MetricsSnapshot {
            phase: Phase::Drive,
            ..Default::default()
        };
        let json = MetricsJson::from_snapshot(&snap, HrStatus::Connected);
        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["phase"], "drive");
        assert_eq!(value["hrStatus"], "connected");
    }

    #[test]
    fn sse_frame_is_data_prefixed_and_double_newline_terminated() {
        let json = MetricsJson::from_snapshot(&MetricsSnapshot::default(), HrStatus::Idle);
        let frame = sse_frame(&json);
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
    }
}
