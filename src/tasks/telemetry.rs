// FitNode: Telemetry Loop
//
// Single cooperative loop.  Each tick:
//   1. Apply commands received during the previous tick.
//   2. Drain the transport for new commands (queued, not applied).
//   3. Read the IMU and the PPG level.
//   4. Update the orientation estimate and the beat detector.
//   5. Every `send_interval_ms`, send a telemetry record.
//   6. Every `display_interval_ms`, refresh the status page.
//
// The estimators are owned here and only ever touched from `tick()`, so
// nothing needs a lock.  The only blocking spans are calibration and the
// beat indicator blip.

use crate::calibration::{CalibrationOffsets, Calibrator};
use crate::command::ControlCommand;
use crate::config::{NodeConfig, SchedulerConfig};
use crate::error::{NodeError, Result};
use crate::events::{round_tenth, LinkStatus, RawSample, TelemetryRecord};
use crate::hal::{BeatIndicator, Clock, MotionSensor, PulseSensor, StatusDisplay, Transport};
use crate::link::LinkMonitor;
use crate::orientation::{OrientationEstimator, OrientationState};
use crate::pulse::{PulseDetector, PulseEvent};

/// Hardware bundle driven by the loop.
pub struct Devices<M, P, C, T, I, D> {
    pub motion: M,
    pub pulse: P,
    pub clock: C,
    pub transport: T,
    pub indicator: I,
    pub display: D,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub commands_applied: usize,
    pub beat: Option<PulseEvent>,
    pub sent: bool,
    pub displayed: bool,
}

pub struct TelemetryScheduler<M, P, C, T, I, D> {
    dev: Devices<M, P, C, T, I, D>,
    config: SchedulerConfig,
    calibrator: Calibrator,
    orientation: OrientationEstimator,
    pulse: PulseDetector,
    link: LinkMonitor,
    pending: Vec<ControlCommand>,
    latest: RawSample,
    last_tick_ms: Option<u64>,
    last_send_ms: u64,
    last_display_ms: u64,
    beat_since_send: bool,
}

impl<M, P, C, T, I, D> TelemetryScheduler<M, P, C, T, I, D>
where
    M: MotionSensor,
    P: PulseSensor,
    C: Clock,
    T: Transport,
    I: BeatIndicator,
    D: StatusDisplay,
{
    pub fn new(dev: Devices<M, P, C, T, I, D>, config: NodeConfig) -> Self {
        let now = dev.clock.now_ms();
        Self {
            dev,
            config: config.scheduler,
            calibrator: Calibrator::new(config.calibration),
            orientation: OrientationEstimator::new(),
            pulse: PulseDetector::new(config.pulse),
            link: LinkMonitor::new(),
            pending: Vec::new(),
            latest: RawSample::default(),
            last_tick_ms: None,
            last_send_ms: now,
            last_display_ms: now,
            beat_since_send: false,
        }
    }

    pub fn orientation(&self) -> OrientationState {
        self.orientation.state()
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.orientation.offsets()
    }

    pub fn pulse(&self) -> &PulseDetector {
        &self.pulse
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn pending_commands(&self) -> &[ControlCommand] {
        &self.pending
    }

    pub fn devices(&self) -> &Devices<M, P, C, T, I, D> {
        &self.dev
    }

    /// Run a blocking calibration and install the result.  On failure the
    /// previous offsets stay in force.
    pub fn calibrate(&mut self) -> Result<CalibrationOffsets> {
        let result = self.calibrator.calibrate(&mut self.dev.motion, &mut self.dev.clock);
        // The sampling window is not a tick interval, even when it was cut
        // short; keep it out of yaw.
        self.last_tick_ms = Some(self.dev.clock.now_ms());
        let offsets = result?;
        self.orientation.set_offsets(offsets);
        Ok(offsets)
    }

    /// One loop iteration.  A sensor failure aborts the tick before anything
    /// is computed or sent.
    pub fn tick(&mut self) -> Result<TickReport> {
        let mut report = TickReport {
            commands_applied: self.apply_pending(),
            ..Default::default()
        };
        self.service_transport();

        // ---- read ----
        let raw = self.dev.motion.read_motion().map_err(|e| {
            log::warn!("IMU read error: {}", e);
            e
        })?;
        let level = self.dev.pulse.read_level().map_err(|e| {
            log::warn!("PPG read error: {}", e);
            e
        })?;

        let now = self.dev.clock.now_ms();
        let dt_ms = self.last_tick_ms.map_or(0, |last| now.saturating_sub(last));
        self.last_tick_ms = Some(now);

        // ---- compute ----
        self.latest = raw;
        self.orientation.update(&raw, dt_ms);

        if let Some(event) = self.pulse.on_sample(level, now) {
            if let PulseEvent::Beat { .. } = event {
                self.beat_since_send = true;
                self.dev.indicator.pulse(self.config.beat_indicator_ms);
            }
            report.beat = Some(event);
        }

        // ---- emit ----
        let link = self.link.observe(self.dev.transport.is_connected());

        if now.saturating_sub(self.last_send_ms) >= self.config.send_interval_ms {
            // While the link is down the record stays due and is retried on
            // every tick.
            if link == LinkStatus::Ok {
                let record = self.snapshot(now, link);
                match self.dev.transport.send(&record.to_json()) {
                    Ok(()) => {
                        report.sent = true;
                        self.beat_since_send = false;
                        self.last_send_ms = now;
                    }
                    Err(e) => {
                        log::debug!("Telemetry not sent: {}", e);
                        self.link.observe(false);
                    }
                }
            }
        }

        if now.saturating_sub(self.last_display_ms) >= self.config.display_interval_ms {
            let record = self.snapshot(now, self.link.status());
            if let Err(e) = self.dev.display.show(&record) {
                log::warn!("Display refresh failed: {}", e);
            }
            self.last_display_ms = now;
            report.displayed = true;
        }

        Ok(report)
    }

    /// `tick()` plus pacing to `loop_interval_ms`.
    pub fn step(&mut self) -> Result<TickReport> {
        let start = self.dev.clock.now_ms();
        let result = self.tick();
        let elapsed = self.dev.clock.now_ms().saturating_sub(start);
        if elapsed < self.config.loop_interval_ms {
            self.dev.clock.delay_ms(self.config.loop_interval_ms - elapsed);
        }
        result
    }

    /// Never returns; errors are logged inside `tick()` and the loop carries on.
    pub fn run(&mut self) -> ! {
        log::info!("Telemetry loop started");
        loop {
            let _ = self.step();
        }
    }

    /// Snapshot of the current state for the wire and the status page.
    pub fn snapshot(&self, now_ms: u64, link_status: LinkStatus) -> TelemetryRecord {
        let o = self.orientation.state();
        TelemetryRecord {
            pitch: round_tenth(o.pitch_smooth),
            roll: round_tenth(o.roll_smooth),
            yaw: round_tenth(o.yaw),
            ax: self.latest.ax,
            ay: self.latest.ay,
            az: self.latest.az,
            gx: self.latest.gx,
            gy: self.latest.gy,
            gz: self.latest.gz,
            heart_rate: self.pulse.heart_rate(),
            beat_detected: self.beat_since_send,
            timestamp: now_ms as f64 / 1000.0,
            link_status,
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn service_transport(&mut self) {
        for message in self.dev.transport.poll_inbound() {
            match ControlCommand::parse(&message) {
                Ok(command) => {
                    log::info!("Command queued: {:?}", command);
                    self.pending.push(command);
                }
                Err(e) => log::warn!("Dropping inbound message: {}", e),
            }
        }
    }

    fn apply_pending(&mut self) -> usize {
        let commands = std::mem::take(&mut self.pending);
        commands.into_iter().filter(|&command| self.apply(command)).count()
    }

    /// Returns whether the command took effect (and was acknowledged).
    fn apply(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Calibrate => {
                if let Err(e) = self.calibrate() {
                    log::error!("Recalibration failed, keeping previous offsets: {}", e);
                    return false;
                }
            }
            ControlCommand::ResetYaw => {
                self.orientation.reset_yaw();
                log::info!("Yaw reset");
            }
            ControlCommand::SetPulseThreshold(threshold) => {
                self.pulse.set_threshold(threshold);
                log::info!("Pulse threshold set to {}", threshold);
            }
        }

        match self.dev.transport.send(&command.ack_json()) {
            Ok(()) => {}
            Err(NodeError::LinkLost) => log::debug!("Ack for {:?} dropped: link lost", command),
            Err(e) => log::warn!("Ack for {:?} failed: {}", command, e),
        }
        true
    }
}
