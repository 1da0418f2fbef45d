// ── History entries ──
//
// Two record kinds, both immutable once logged. Optional numeric fields
// are kept only when present and finite; otherwise they serialize as an
// explicit `null`, never as zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A motion event. Recorded on every sample with `motion == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub distance: Option<f64>,
}

/// An environmental sample. Recorded at most once per sampling interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub soil_temperature: Option<f64>,
}

impl MotionEntry {
    pub fn from_sample(sample: &Value, timestamp: i64) -> Self {
        Self {
            timestamp,
            distance: finite(sample, &["distance"]),
        }
    }
}

impl EnvEntry {
    /// Main-board field names first, then the generic aliases.
    pub fn from_sample(sample: &Value, timestamp: i64) -> Self {
        Self {
            timestamp,
            temperature: finite(sample, &["dhtTemperature", "temperature"]),
            humidity: finite(sample, &["dhtHumidity", "humidity"]),
            soil_moisture: finite(sample, &["soilHumidity", "soilMoisture"]),
            soil_temperature: finite(sample, &["soilTemperature"]),
        }
    }
}

/// `true` when the sample reports motion (`motion == 1`).
pub fn is_motion(sample: &Value) -> bool {
    sample
        .get("motion")
        .and_then(Value::as_f64)
        .is_some_and(|m| (m - 1.0).abs() < f64::EPSILON)
}

/// First of `keys` holding a finite number.
fn finite(sample: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| sample.get(*k).and_then(Value::as_f64))
        .find(|v| v.is_finite())
}
