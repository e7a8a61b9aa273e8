// FitNode: Sensor samples & telemetry records

use serde::Serialize;

// ---------------------------------------------------------------------------
// Raw Sample (6-axis IMU reading from MPU6050)
// ---------------------------------------------------------------------------

/// One accelerometer + gyroscope reading in physical units.
/// Acceleration in g, angular rate in °/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl RawSample {
    /// Accelerometer-only sample with zero angular rate.
    pub fn accel(ax: f32, ay: f32, az: f32) -> Self {
        Self { ax, ay, az, ..Default::default() }
    }
}

// ---------------------------------------------------------------------------
// Link status
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Ok,
    #[default]
    Lost,
}

// ---------------------------------------------------------------------------
// Telemetry Record: one snapshot per transmission
// ---------------------------------------------------------------------------

/// Snapshot handed to the transport and the status display.
///
/// Field names are part of the relay's wire contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Degrees, one decimal place
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    /// Averaged BPM, 0 when no valid beats are buffered
    pub heart_rate: u32,
    /// At least one beat was accepted since the previous transmission
    pub beat_detected: bool,
    /// Seconds since boot
    pub timestamp: f64,
    pub link_status: LinkStatus,
}

impl TelemetryRecord {
    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Round to one decimal place for the wire.
pub fn round_tenth(value: f32) -> f32 {
    // Adding +0.0 turns -0.0 into 0.0
    (value * 10.0).round() / 10.0 + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_names() {
        let record = TelemetryRecord {
            pitch: 1.5,
            heart_rate: 72,
            beat_detected: true,
            timestamp: 2.5,
            link_status: LinkStatus::Ok,
            ..Default::default()
        };
        let value: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();

        for key in [
            "pitch", "roll", "yaw", "ax", "ay", "az", "gx", "gy", "gz", "heartRate",
            "beatDetected", "timestamp", "linkStatus",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["heartRate"], 72);
        assert_eq!(value["linkStatus"], "ok");
        assert_eq!(value["beatDetected"], true);
        assert!((value["timestamp"].as_f64().unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_link_lost_wire_name() {
        let record = TelemetryRecord::default();
        assert!(record.to_json().contains(r#""linkStatus":"lost""#));
    }

    #[test]
    fn test_round_tenth() {
        assert!((round_tenth(12.345) - 12.3).abs() < 1e-5);
        assert!((round_tenth(-0.06) - (-0.1)).abs() < 1e-5);
        assert!(round_tenth(-0.04).is_sign_positive());
    }
}
