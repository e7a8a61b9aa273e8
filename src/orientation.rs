// FitNode: Orientation Estimator
//
// Tilt and heading from a single MPU6050 sample per tick.  Pitch and roll
// come straight from the gravity vector, corrected by the static calibration
// offsets and smoothed by a single-pole low-pass.  Yaw is an open-loop
// integral of the z-axis rate; with no magnetometer it drifts for as long as
// the node runs.

use crate::calibration::CalibrationOffsets;
use crate::config::SMOOTHING_ALPHA;
use crate::events::RawSample;

/// `atan2` in degrees with `atan2(0, 0) = 0`.
pub fn atan2_deg(y: f32, x: f32) -> f32 {
    if (y == 0.0 && x == 0.0) || !y.is_finite() || !x.is_finite() {
        return 0.0;
    }
    y.atan2(x).to_degrees()
}

/// Wrap an angle into (-180°, 180°].
pub fn normalize_deg(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Uncorrected (pitch, roll) in degrees from an acceleration vector.
pub fn tilt_from_accel(ax: f32, ay: f32, az: f32) -> (f32, f32) {
    let pitch = atan2_deg(-ax, (ay * ay + az * az).sqrt());
    let roll = atan2_deg(ay, az);
    (pitch, roll)
}

/// Smoothed attitude, all angles in degrees within (-180°, 180°].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationState {
    pub pitch_smooth: f32,
    pub roll_smooth: f32,
    pub yaw: f32,
}

pub struct OrientationEstimator {
    alpha: f32,
    offsets: CalibrationOffsets,
    state: OrientationState,
}

impl OrientationEstimator {
    pub fn new() -> Self {
        Self::with_alpha(SMOOTHING_ALPHA)
    }

    pub fn with_alpha(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            offsets: CalibrationOffsets::default(),
            state: OrientationState::default(),
        }
    }

    pub fn state(&self) -> OrientationState {
        self.state
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }

    /// Replace both offsets in one assignment.
    pub fn set_offsets(&mut self, offsets: CalibrationOffsets) {
        self.offsets = offsets;
    }

    pub fn reset_yaw(&mut self) {
        self.state.yaw = 0.0;
    }

    /// Fold one sample into the estimate. `dt_ms` is the wall-clock time since
    /// the previous update.
    pub fn update(&mut self, raw: &RawSample, dt_ms: u64) -> OrientationState {
        let (pitch_raw, roll_raw) = tilt_from_accel(raw.ax, raw.ay, raw.az);

        let pitch_corr = normalize_deg(pitch_raw - self.offsets.pitch_offset);
        let roll_corr = normalize_deg(roll_raw - self.offsets.roll_offset);

        let a = self.alpha;
        self.state.pitch_smooth = normalize_deg(a * self.state.pitch_smooth + (1.0 - a) * pitch_corr);
        self.state.roll_smooth = normalize_deg(a * self.state.roll_smooth + (1.0 - a) * roll_corr);

        let gz = if raw.gz.is_finite() { raw.gz } else { 0.0 };
        self.state.yaw = normalize_deg(self.state.yaw + gz * (dt_ms as f32 / 1000.0));

        self.state
    }
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_range(angle: f32) -> bool {
        angle > -180.0 && angle <= 180.0
    }

    #[test]
    fn test_normalize_deg() {
        assert!((normalize_deg(0.0) - 0.0).abs() < 1e-4);
        assert!((normalize_deg(180.0) - 180.0).abs() < 1e-4);
        assert!((normalize_deg(-180.0) - 180.0).abs() < 1e-4);
        assert!((normalize_deg(190.0) - (-170.0)).abs() < 1e-4);
        assert!((normalize_deg(-190.0) - 170.0).abs() < 1e-4);
        assert!((normalize_deg(720.0 + 45.0) - 45.0).abs() < 1e-3);
        assert_eq!(normalize_deg(f32::NAN), 0.0);
    }

    #[test]
    fn test_atan2_degenerate_is_zero() {
        assert_eq!(atan2_deg(0.0, 0.0), 0.0);
        assert_eq!(atan2_deg(-0.0, 0.0), 0.0);
        let (pitch, roll) = tilt_from_accel(0.0, 0.0, 0.0);
        assert_eq!((pitch, roll), (0.0, 0.0));
    }

    #[test]
    fn test_tilt_sweep_is_finite_and_in_range() {
        let steps = [-2.0f32, -1.0, -0.5, -0.01, 0.0, 0.01, 0.5, 1.0, 2.0];
        for &ax in &steps {
            for &ay in &steps {
                for &az in &steps {
                    if ay * ay + az * az == 0.0 {
                        continue;
                    }
                    let (pitch, roll) = tilt_from_accel(ax, ay, az);
                    assert!(pitch.is_finite() && roll.is_finite());
                    assert!(in_range(normalize_deg(pitch)), "pitch {pitch}");
                    assert!(in_range(normalize_deg(roll)), "roll {roll}");
                }
            }
        }
    }

    #[test]
    fn test_known_tilts() {
        // Flat, face up
        let (pitch, roll) = tilt_from_accel(0.0, 0.0, 1.0);
        assert!(pitch.abs() < 1e-4 && roll.abs() < 1e-4);

        // Nose down 30°
        let s = 30f32.to_radians();
        let (pitch, _) = tilt_from_accel(-s.sin(), 0.0, s.cos());
        assert!((pitch - 30.0).abs() < 1e-3);

        // Rolled right 45°
        let r = 45f32.to_radians();
        let (_, roll) = tilt_from_accel(0.0, r.sin(), r.cos());
        assert!((roll - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_smoothing_converges_geometrically() {
        let mut est = OrientationEstimator::new();
        let s = 20f32.to_radians();
        let sample = RawSample::accel(-s.sin(), 0.0, s.cos());

        // Error after n steps is 20 * 0.9^n
        let mut expected_err = 20.0f32;
        for _ in 0..50 {
            let state = est.update(&sample, 10);
            expected_err *= SMOOTHING_ALPHA;
            let err = (20.0 - state.pitch_smooth).abs();
            assert!((err - expected_err).abs() < 1e-3, "err {err} vs {expected_err}");
        }
        assert!((est.state().pitch_smooth - 20.0).abs() < 0.2);
    }

    #[test]
    fn test_offsets_are_subtracted() {
        let mut est = OrientationEstimator::with_alpha(0.0);
        est.set_offsets(CalibrationOffsets { pitch_offset: 10.0, roll_offset: -5.0 });

        let state = est.update(&RawSample::accel(0.0, 0.0, 1.0), 0);
        assert!((state.pitch_smooth - (-10.0)).abs() < 1e-4);
        assert!((state.roll_smooth - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_corrected_angle_wraps() {
        // Upside down: roll_raw = 180°, offset -90° -> 270° -> -90°
        let mut est = OrientationEstimator::with_alpha(0.0);
        est.set_offsets(CalibrationOffsets { pitch_offset: 0.0, roll_offset: -90.0 });
        let state = est.update(&RawSample::accel(0.0, 0.0, -1.0), 0);
        assert!((state.roll_smooth - (-90.0)).abs() < 1e-3);
    }

    #[test]
    fn test_yaw_integrates_and_wraps() {
        let mut est = OrientationEstimator::new();
        let spin = RawSample { az: 1.0, gz: 90.0, ..Default::default() };

        // 90 °/s for 1 s
        for _ in 0..100 {
            est.update(&spin, 10);
        }
        assert!((est.state().yaw - 90.0).abs() < 0.05);

        // Another 1.5 s crosses +180° and wraps negative
        for _ in 0..150 {
            est.update(&spin, 10);
        }
        assert!((est.state().yaw - (-135.0)).abs() < 0.1);
        assert!(in_range(est.state().yaw));
    }

    #[test]
    fn test_reset_yaw() {
        let mut est = OrientationEstimator::new();
        est.update(&RawSample { az: 1.0, gz: 50.0, ..Default::default() }, 1000);
        assert!(est.state().yaw.abs() > 1.0);
        est.reset_yaw();
        assert_eq!(est.state().yaw, 0.0);
    }

    #[test]
    fn test_zero_dt_leaves_yaw() {
        let mut est = OrientationEstimator::new();
        est.update(&RawSample { az: 1.0, gz: 300.0, ..Default::default() }, 0);
        assert_eq!(est.state().yaw, 0.0);
    }
}
