// FitNode: Static Tilt Calibration
//
// The device must sit still for the whole window.  The mean gravity vector
// gives the mounting tilt, which is then subtracted from every subsequent
// pitch/roll estimate so that the resting pose reads as level.

use crate::config::CalibrationConfig;
use crate::error::{NodeError, Result};
use crate::hal::{Clock, MotionSensor};
use crate::orientation::tilt_from_accel;

/// Mounting tilt in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOffsets {
    pub pitch_offset: f32,
    pub roll_offset: f32,
}

impl CalibrationOffsets {
    /// Offsets that cancel the tilt of a mean acceleration vector.
    pub fn from_mean_accel(ax: f32, ay: f32, az: f32) -> Self {
        let (pitch_offset, roll_offset) = tilt_from_accel(ax, ay, az);
        Self { pitch_offset, roll_offset }
    }
}

pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Average `config.samples` accelerometer readings and derive offsets.
    ///
    /// Blocks for `samples * delay_ms`.  The first failed read aborts the
    /// window with `NodeError::SensorRead`; nothing is averaged from a bus
    /// that stopped answering.
    pub fn calibrate<M, C>(&self, sensor: &mut M, clock: &mut C) -> Result<CalibrationOffsets>
    where
        M: MotionSensor,
        C: Clock,
    {
        let n = self.config.samples.max(1);
        log::info!("Calibrating: hold still ({} samples)", n);

        let (mut sum_ax, mut sum_ay, mut sum_az) = (0.0f64, 0.0f64, 0.0f64);
        for i in 0..n {
            let sample = sensor.read_motion().map_err(|e| {
                log::error!("Calibration aborted at sample {}: {}", i, e);
                e
            })?;
            if !(sample.ax.is_finite() && sample.ay.is_finite() && sample.az.is_finite()) {
                return Err(NodeError::SensorRead(format!("non-finite sample {}", i)));
            }
            sum_ax += sample.ax as f64;
            sum_ay += sample.ay as f64;
            sum_az += sample.az as f64;
            clock.delay_ms(self.config.delay_ms);
        }

        let count = n as f64;
        let offsets = CalibrationOffsets::from_mean_accel(
            (sum_ax / count) as f32,
            (sum_ay / count) as f32,
            (sum_az / count) as f32,
        );
        log::info!(
            "Calibration done: pitch_offset={:.2}° roll_offset={:.2}°",
            offsets.pitch_offset,
            offsets.roll_offset
        );
        Ok(offsets)
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawSample;
    use crate::hal::Clock;
    use crate::orientation::OrientationEstimator;
    use crate::sim::{SimClock, SimMotion};

    fn tilted(pitch_deg: f32, roll_deg: f32) -> RawSample {
        let p = pitch_deg.to_radians();
        let r = roll_deg.to_radians();
        RawSample::accel(-p.sin(), p.cos() * r.sin(), p.cos() * r.cos())
    }

    #[test]
    fn test_flat_device_has_zero_offsets() {
        let mut sensor = SimMotion::new(RawSample::accel(0.0, 0.0, 1.0));
        let mut clock = SimClock::new();
        let offsets = Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap();
        assert!(offsets.pitch_offset.abs() < 1e-4);
        assert!(offsets.roll_offset.abs() < 1e-4);
    }

    #[test]
    fn test_blocks_for_full_window() {
        let mut sensor = SimMotion::new(RawSample::accel(0.0, 0.0, 1.0));
        let mut clock = SimClock::new();
        Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap();
        assert_eq!(clock.now_ms(), 300 * 5);
        assert_eq!(sensor.reads(), 300);
    }

    #[test]
    fn test_known_tilt_recovered() {
        let mut sensor = SimMotion::new(tilted(12.0, -25.0));
        let mut clock = SimClock::new();
        let offsets = Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap();
        assert!((offsets.pitch_offset - 12.0).abs() < 1e-2);
        assert!((offsets.roll_offset - (-25.0)).abs() < 1e-2);
    }

    #[test]
    fn test_estimator_reads_level_after_calibration() {
        let pose = tilted(-8.0, 30.0);
        let mut sensor = SimMotion::new(pose);
        let mut clock = SimClock::new();
        let offsets = Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap();

        let mut est = OrientationEstimator::new();
        est.set_offsets(offsets);
        for _ in 0..20 {
            let state = est.update(&pose, 10);
            assert!(state.pitch_smooth.abs() < 1e-2);
            assert!(state.roll_smooth.abs() < 1e-2);
        }
    }

    #[test]
    fn test_noise_is_averaged_out() {
        let script = (0..300).map(|i| {
            let jitter = if i % 2 == 0 { 0.02 } else { -0.02 };
            RawSample::accel(jitter, -jitter, 1.0)
        });
        let mut sensor = SimMotion::scripted(script, RawSample::accel(0.0, 0.0, 1.0));
        let mut clock = SimClock::new();
        let offsets = Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap();
        assert!(offsets.pitch_offset.abs() < 1e-3);
        assert!(offsets.roll_offset.abs() < 1e-3);
    }

    #[test]
    fn test_read_failure_is_reported() {
        let mut sensor = SimMotion::new(RawSample::accel(0.0, 0.0, 1.0));
        sensor.fault_handle().set(true);
        let mut clock = SimClock::new();
        let err = Calibrator::default().calibrate(&mut sensor, &mut clock).unwrap_err();
        assert!(matches!(err, NodeError::SensorRead(_)));
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut sensor = SimMotion::new(RawSample::accel(f32::NAN, 0.0, 1.0));
        let mut clock = SimClock::new();
        let result = Calibrator::default().calibrate(&mut sensor, &mut clock);
        assert!(matches!(result, Err(NodeError::SensorRead(_))));
    }
}
