// FitNode: Firmware Entry Point
//
// Boot sequence:
//   1. Bring up the shared I2C bus (MPU6050 + OLED).
//   2. Self-test and initialise the IMU, the OLED and the PPG ADC.
//   3. Join WiFi and open the WebSocket endpoint for the relay.
//   4. Calibrate against the resting pose (device must be still).
//   5. Enter the telemetry loop; it never returns.
//
// Built for anything other than ESP-IDF, the binary instead replays a
// synthetic session through the same loop and prints every telemetry
// record as a JSON line.

#[cfg(target_os = "espidf")]
mod drivers;
#[cfg(target_os = "espidf")]
mod net;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    replay::run()
}

// ---------------------------------------------------------------------------
// Firmware
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
mod firmware {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::gpio::{OutputPin, PinDriver};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use fitnode::config::{NetworkConfig, NodeConfig};
    use fitnode::hal::Clock;
    use fitnode::tasks::{Devices, TelemetryScheduler};

    use crate::drivers::haptic::HapticDriver;
    use crate::drivers::imu::Mpu6050;
    use crate::drivers::oled::OledDisplay;
    use crate::drivers::ppg::PpgSensor;
    use crate::net::{connect_wifi, WsTransport};

    /// Milliseconds since boot from the ESP high-resolution timer.
    pub struct EspClock;

    impl Clock for EspClock {
        fn now_ms(&self) -> u64 {
            unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u64 }
        }

        fn delay_ms(&mut self, ms: u64) {
            thread::sleep(Duration::from_millis(ms));
        }
    }

    pub fn run() -> anyhow::Result<()> {
        // Link esp-idf-sys runtime patches and initialise logging.
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        log::info!("FitNode firmware starting…");

        // ---- Peripherals --------------------------------------------------
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        // ---- I2C bus (shared between OLED and MPU6050) --------------------
        let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio6, // SDA
            peripherals.pins.gpio7, // SCL
            &i2c_config,
        )?;
        // SAFETY: The I2C peripheral is a singleton obtained from `Peripherals::take()`.
        // It will live for the entire programme duration (embedded firmware never exits).
        let i2c_bus: &'static Mutex<I2cDriver<'static>> =
            Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(i2c) })));

        // ---- Component self-test ------------------------------------------
        let imu = Mpu6050::new(i2c_bus);
        let imu_ok = imu.is_connected();
        if imu_ok {
            imu.init()?;
        }

        let mut oled = OledDisplay::new(i2c_bus);
        let display = if oled.is_connected() && oled.init().is_ok() {
            Some(oled)
        } else {
            None
        };

        if !imu_ok || display.is_none() {
            log::error!("Boot check FAILED: IMU:{} OLED:{}", imu_ok, display.is_some());
            // Continue anyway so we can still debug via serial; the loop
            // withholds telemetry while the IMU does not answer.
        }

        let ppg = PpgSensor::new()?;

        let beat_led = PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;

        // ---- Network ------------------------------------------------------
        let net_config = NetworkConfig::default();
        let _wifi = connect_wifi(peripherals.modem, sysloop, nvs, &net_config)?;
        let transport = WsTransport::start(&net_config)?;

        // ---- Telemetry loop -----------------------------------------------
        let devices = Devices {
            motion: imu,
            pulse: ppg,
            clock: EspClock,
            transport,
            indicator: HapticDriver::new(beat_led),
            display,
        };
        let mut node = TelemetryScheduler::new(devices, NodeConfig::default());

        log::info!("Hold still: boot calibration");
        if let Err(e) = node.calibrate() {
            log::error!("Boot calibration failed, starting with zero offsets: {}", e);
        }

        log::info!("Boot complete, entering telemetry loop");
        node.run()
    }
}

// ---------------------------------------------------------------------------
// Host replay
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
mod replay {
    use fitnode::config::NodeConfig;
    use fitnode::error::Result;
    use fitnode::events::RawSample;
    use fitnode::hal::{Clock, NoDisplay, Transport};
    use fitnode::sim::{SimClock, SimIndicator, SimMotion, SimPulse};
    use fitnode::tasks::{Devices, TelemetryScheduler};

    const REPLAY_MS: u64 = 10_000;

    /// Prints every outbound message on its own line.
    struct StdoutTransport;

    impl Transport for StdoutTransport {
        fn poll_inbound(&mut self) -> Vec<String> {
            Vec::new()
        }

        fn send(&mut self, payload: &str) -> Result<()> {
            println!("{}", payload);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    /// Flat device, 100 BPM pulse, 10 simulated seconds.
    pub fn run() -> anyhow::Result<()> {
        let clock = SimClock::new();
        let devices = Devices {
            motion: SimMotion::new(RawSample::accel(0.0, 0.0, 1.0)),
            pulse: SimPulse::periodic(clock.clone(), 600, 100, 300, 700),
            clock: clock.clone(),
            transport: StdoutTransport,
            indicator: SimIndicator::blocking_on(clock.clone()),
            display: NoDisplay,
        };
        let mut node = TelemetryScheduler::new(devices, NodeConfig::default());
        node.calibrate()?;

        let end = clock.now_ms() + REPLAY_MS;
        while clock.now_ms() < end {
            node.step()?;
        }
        Ok(())
    }
}
