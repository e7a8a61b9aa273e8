// FitNode: Hardware seams
//
// Everything the telemetry loop touches outside its own state goes through
// these traits.  The firmware binds them to the MPU6050, the ADC, the OLED
// and the WebSocket server; tests bind them to `crate::sim`.

use crate::error::Result;
use crate::events::{RawSample, TelemetryRecord};

/// 6-axis motion sensor.
pub trait MotionSensor {
    fn read_motion(&mut self) -> Result<RawSample>;
}

/// Analog PPG front end.
pub trait PulseSensor {
    /// Latest raw ADC level.
    fn read_level(&mut self) -> Result<u16>;
}

/// Milliseconds since boot plus a bounded blocking delay.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn delay_ms(&mut self, ms: u64);
}

/// LED or haptic blip on each accepted beat.
pub trait BeatIndicator {
    /// Blocks for `duration_ms`.
    fn pulse(&mut self, duration_ms: u64);
}

/// Link to the relay.
pub trait Transport {
    /// Drain all inbound text messages received since the last call.
    fn poll_inbound(&mut self) -> Vec<String>;

    /// Send one text message. `NodeError::LinkLost` when nobody is listening.
    fn send(&mut self, payload: &str) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Local status page.
pub trait StatusDisplay {
    fn show(&mut self, snapshot: &TelemetryRecord) -> Result<()>;
}

/// Nodes without a screen.
pub struct NoDisplay;

impl StatusDisplay for NoDisplay {
    fn show(&mut self, _snapshot: &TelemetryRecord) -> Result<()> {
        Ok(())
    }
}

/// Optional screen: `None` when the panel failed its boot probe.
impl<S: StatusDisplay> StatusDisplay for Option<S> {
    fn show(&mut self, snapshot: &TelemetryRecord) -> Result<()> {
        match self {
            Some(display) => display.show(snapshot),
            None => Ok(()),
        }
    }
}
