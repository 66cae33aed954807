//! BLE Fitness Machine Service Rower Data packet encoder.
//!
//! A pure function: no GATT server, no advertising, no BLE host stack
//! dependency. Whatever concrete BLE transport exists downstream feeds this
//! the bytes to notify on the Rower Data characteristic (0x2AD1).

use crate::snapshot::MetricsSnapshot;

/// `TotalDistance(2) | InstPace(3) | AvgPace(4) | InstPower(5) | AvgPower(6)
/// | ExpendedEnergy(8) | ElapsedTime(11)` per the FTMS Rower Data flags
/// field.
const FLAGS: u16 = 0x097C;

/// Encoded packet length.
pub const PACKET_LEN: usize = 23;

fn pace_field(pace: Option<f32>) -> u16 {
    match pace {
        Some(p) if p <= 9999.0 && p >= 0.0 => p.round() as u16,
        _ => 0,
    }
}

/// Encode one Rower Data notification from a snapshot.
///
/// Field order: flags(u16), stroke rate(u8, 0.5 spm/unit), stroke count(u16),
/// total distance(u24), inst pace(u16), avg pace(u16), inst power(i16), avg
/// power(i16), total energy(u16 kcal), energy/hour(u16), energy/min(u8),
/// elapsed time(u16 s).
pub fn encode_rower_data(s: &MetricsSnapshot) -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    let mut i = 0;

    buf[i..i + 2].copy_from_slice(&FLAGS.to_le_bytes());
    i += 2;

    let stroke_rate_half_spm = (2.0 * s.stroke_rate_spm).round().clamp(0.0, u8::MAX as f32) as u8;
    buf[i] = stroke_rate_half_spm;
    i += 1;

    let stroke_count = s.stroke_count.min(u32::from(u16::MAX)) as u16;
    buf[i..i + 2].copy_from_slice(&stroke_count.to_le_bytes());
    i += 2;

    let distance_m = (s.distance_m.round() as u32).min(0x00FF_FFFF);
    buf[i..i + 3].copy_from_slice(&distance_m.to_le_bytes()[..3]);
    i += 3;

    buf[i..i + 2].copy_from_slice(&pace_field(s.pace_inst_s500).to_le_bytes());
    i += 2;
    buf[i..i + 2].copy_from_slice(&pace_field(s.pace_avg_s500).to_le_bytes());
    i += 2;

    let inst_power = s.power_inst_w.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    buf[i..i + 2].copy_from_slice(&inst_power.to_le_bytes());
    i += 2;
    let avg_power = s.power_avg_w.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    buf[i..i + 2].copy_from_slice(&avg_power.to_le_bytes());
    i += 2;

    let total_energy_kcal = s.calories_kcal.round().clamp(0.0, u16::MAX as f32) as u16;
    buf[i..i + 2].copy_from_slice(&total_energy_kcal.to_le_bytes());
    i += 2;
    let energy_per_hour = s.calories_per_hour.round().clamp(0.0, u16::MAX as f32) as u16;
    buf[i..i + 2].copy_from_slice(&energy_per_hour.to_le_bytes());
    i += 2;
    let energy_per_min = ((energy_per_hour as f32) / 60.0).round().clamp(0.0, u8::MAX as f32) as u8;
    buf[i] = energy_per_min;
    i += 1;

    let elapsed_s = (s.elapsed_ms / 1000).min(u64::from(u16::MAX)) as u16;
    buf[i..i + 2].copy_from_slice(&elapsed_s.to_le_bytes());
    i += 2;

    debug_assert_eq!(i, PACKET_LEN);
    buf
}
