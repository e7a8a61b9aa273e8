// FitNode: Sensor node core
//
// Orientation from a 6-axis IMU, heart rate from an analog PPG sensor, and
// the cooperative loop that streams both to the relay at 5 Hz.  Everything
// here is hardware-agnostic; the firmware binary binds the traits in `hal`
// to the ESP32-C3 peripherals.

pub mod calibration;
pub mod command;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod hal;
pub mod link;
pub mod orientation;
pub mod pulse;
pub mod sim;
pub mod tasks;


pub use calibration::{CalibrationOffsets, Calibrator};
pub use command::ControlCommand;
pub use error::NodeError;
pub use events::{LinkStatus, RawSample, TelemetryRecord};
pub use orientation::{OrientationEstimator, OrientationState};
pub use pulse::{PulseDetector, PulseEvent};
pub use tasks::{Devices, TelemetryScheduler};
