// FitNode: Simulated Devices
//
// Host runs and tests.  Every device hands out a shared handle
// (`Rc<Cell<_>>` / `Rc<RefCell<_>>`) so a test can keep poking at a device
// after moving it into the scheduler.  Single-threaded only, like the loop
// they feed.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{NodeError, Result};
use crate::events::{RawSample, TelemetryRecord};
use crate::hal::{BeatIndicator, Clock, MotionSensor, PulseSensor, StatusDisplay, Transport};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Manually advanced clock.  `delay_ms` advances it instantly; clones share
/// the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u64) {
        self.advance(ms);
    }
}

// ---------------------------------------------------------------------------
// Motion sensor
// ---------------------------------------------------------------------------

/// Plays back a script of samples, then holds the last one.
pub struct SimMotion {
    script: VecDeque<RawSample>,
    hold: RawSample,
    fault: Rc<Cell<bool>>,
    fail_once_at: Option<usize>,
    reads: usize,
}

impl SimMotion {
    /// Always returns `sample`.
    pub fn new(sample: RawSample) -> Self {
        Self::scripted(core::iter::empty(), sample)
    }

    pub fn scripted<I>(script: I, hold: RawSample) -> Self
    where
        I: IntoIterator<Item = RawSample>,
    {
        Self {
            script: script.into_iter().collect(),
            hold,
            fault: Rc::new(Cell::new(false)),
            fail_once_at: None,
            reads: 0,
        }
    }

    /// The read after `reads` successful ones fails once; later reads succeed.
    pub fn fail_once_at(mut self, reads: usize) -> Self {
        self.fail_once_at = Some(reads);
        self
    }

    /// While set, every read fails with `NodeError::SensorRead`.
    pub fn fault_handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.fault)
    }

    /// Successful reads so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl MotionSensor for SimMotion {
    fn read_motion(&mut self) -> Result<RawSample> {
        if self.fault.get() {
            return Err(NodeError::SensorRead("simulated I2C NACK".into()));
        }
        if self.fail_once_at == Some(self.reads) {
            self.fail_once_at = None;
            return Err(NodeError::SensorRead("simulated I2C glitch".into()));
        }
        if let Some(next) = self.script.pop_front() {
            self.hold = next;
        }
        self.reads += 1;
        Ok(self.hold)
    }
}

// ---------------------------------------------------------------------------
// Pulse sensor
// ---------------------------------------------------------------------------

enum PulseSource {
    /// Fixed sequence, one level per read, then `idle`.
    Levels(VecDeque<u16>),
    /// Square pulse of `width_ms` every `period_ms`, timed off the clock.
    Periodic {
        clock: SimClock,
        period_ms: u64,
        width_ms: u64,
    },
}

pub struct SimPulse {
    source: PulseSource,
    idle: u16,
    high: u16,
    fault: Rc<Cell<bool>>,
}

impl SimPulse {
    pub fn levels<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            source: PulseSource::Levels(levels.into_iter().collect()),
            idle: 0,
            high: 0,
            fault: Rc::new(Cell::new(false)),
        }
    }

    /// `high` for the first `width_ms` of every `period_ms`, `idle` otherwise.
    pub fn periodic(clock: SimClock, period_ms: u64, width_ms: u64, idle: u16, high: u16) -> Self {
        Self {
            source: PulseSource::Periodic {
                clock,
                period_ms: period_ms.max(1),
                width_ms,
            },
            idle,
            high,
            fault: Rc::new(Cell::new(false)),
        }
    }

    pub fn fault_handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.fault)
    }
}

impl PulseSensor for SimPulse {
    fn read_level(&mut self) -> Result<u16> {
        if self.fault.get() {
            return Err(NodeError::SensorRead("simulated ADC timeout".into()));
        }
        let level = match &mut self.source {
            PulseSource::Levels(levels) => levels.pop_front().unwrap_or(self.idle),
            PulseSource::Periodic { clock, period_ms, width_ms } => {
                if clock.now_ms() % *period_ms < *width_ms {
                    self.high
                } else {
                    self.idle
                }
            }
        };
        Ok(level)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LinkLog {
    pub inbound: VecDeque<String>,
    pub sent: Vec<String>,
    pub connected: bool,
}

/// In-memory relay link.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    log: Rc<RefCell<LinkLog>>,
}

impl SimTransport {
    pub fn connected() -> Self {
        let transport = Self::default();
        transport.set_connected(true);
        transport
    }

    pub fn set_connected(&self, connected: bool) {
        self.log.borrow_mut().connected = connected;
    }

    /// Queue a message as if the relay had sent it.
    pub fn push_inbound(&self, message: &str) {
        self.log.borrow_mut().inbound.push_back(message.to_string());
    }

    pub fn sent(&self) -> Vec<String> {
        self.log.borrow().sent.clone()
    }

    /// Sent messages that parse as telemetry (have a `pitch` field).
    pub fn telemetry(&self) -> Vec<serde_json::Value> {
        self.sent_json().filter(|v| v.get("pitch").is_some()).collect()
    }

    /// Sent messages that are command acknowledgements.
    pub fn acks(&self) -> Vec<String> {
        self.sent_json()
            .filter_map(|v| v.get("status").and_then(|s| s.as_str()).map(str::to_string))
            .collect()
    }

    fn sent_json(&self) -> impl Iterator<Item = serde_json::Value> {
        self.sent()
            .into_iter()
            .filter_map(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
    }
}

impl Transport for SimTransport {
    fn poll_inbound(&mut self) -> Vec<String> {
        self.log.borrow_mut().inbound.drain(..).collect()
    }

    fn send(&mut self, payload: &str) -> Result<()> {
        let mut log = self.log.borrow_mut();
        if !log.connected {
            return Err(NodeError::LinkLost);
        }
        log.sent.push(payload.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.log.borrow().connected
    }
}

// ---------------------------------------------------------------------------
// Indicator & display
// ---------------------------------------------------------------------------

/// Counts pulses and advances the shared clock by their duration.
#[derive(Debug, Clone, Default)]
pub struct SimIndicator {
    pulses: Rc<Cell<u32>>,
    clock: Option<SimClock>,
}

impl SimIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses block on `clock` the way the real LED blip blocks the loop.
    pub fn blocking_on(clock: SimClock) -> Self {
        Self {
            pulses: Rc::default(),
            clock: Some(clock),
        }
    }

    pub fn count(&self) -> u32 {
        self.pulses.get()
    }
}

impl BeatIndicator for SimIndicator {
    fn pulse(&mut self, duration_ms: u64) {
        self.pulses.set(self.pulses.get() + 1);
        if let Some(clock) = &self.clock {
            clock.advance(duration_ms);
        }
    }
}

/// Keeps every snapshot it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct SimDisplay {
    frames: Rc<RefCell<Vec<TelemetryRecord>>>,
}

impl SimDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<TelemetryRecord> {
        self.frames.borrow().clone()
    }
}

impl StatusDisplay for SimDisplay {
    fn show(&mut self, snapshot: &TelemetryRecord) -> Result<()> {
        self.frames.borrow_mut().push(*snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_clones_share_time() {
        let clock = SimClock::new();
        let mut other = clock.clone();
        other.delay_ms(25);
        assert_eq!(clock.now_ms(), 25);
    }

    #[test]
    fn test_motion_script_then_hold() {
        let a = RawSample::accel(1.0, 0.0, 0.0);
        let b = RawSample::accel(0.0, 1.0, 0.0);
        let mut motion = SimMotion::scripted([a, b], RawSample::default());
        assert_eq!(motion.read_motion().unwrap(), a);
        assert_eq!(motion.read_motion().unwrap(), b);
        assert_eq!(motion.read_motion().unwrap(), b);
        assert_eq!(motion.reads(), 3);

        motion.fault_handle().set(true);
        assert!(motion.read_motion().is_err());
        assert_eq!(motion.reads(), 3);
    }

    #[test]
    fn test_motion_single_glitch() {
        let mut motion = SimMotion::new(RawSample::accel(0.0, 0.0, 1.0)).fail_once_at(2);
        assert!(motion.read_motion().is_ok());
        assert!(motion.read_motion().is_ok());
        assert!(motion.read_motion().is_err());
        assert!(motion.read_motion().is_ok());
        assert_eq!(motion.reads(), 3);
    }

    #[test]
    fn test_periodic_pulse_follows_clock() {
        let clock = SimClock::new();
        let mut ppg = SimPulse::periodic(clock.clone(), 600, 100, 10, 700);
        assert_eq!(ppg.read_level().unwrap(), 700);
        clock.set(150);
        assert_eq!(ppg.read_level().unwrap(), 10);
        clock.set(650);
        assert_eq!(ppg.read_level().unwrap(), 700);
    }

    #[test]
    fn test_transport_drops_when_disconnected() {
        let mut transport = SimTransport::default();
        assert!(matches!(transport.send("x"), Err(NodeError::LinkLost)));
        transport.set_connected(true);
        transport.send(r#"{"status":"yaw_reset"}"#).unwrap();
        assert_eq!(transport.acks(), vec!["yaw_reset".to_string()]);
    }
}
