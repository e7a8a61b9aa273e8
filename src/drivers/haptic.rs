// FitNode: Beat Indicator
//
// GPIO-driven LED or vibration motor, blipped once per accepted heartbeat.

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use fitnode::hal::BeatIndicator;

pub struct HapticDriver<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> HapticDriver<'d> {
    pub fn new(pin: PinDriver<'d, AnyOutputPin, Output>) -> Self {
        Self { pin }
    }

    /// Drive the pin high for `duration` (blocks the calling thread).
    pub fn buzz(&mut self, duration: Duration) {
        let _ = self.pin.set_high();
        thread::sleep(duration);
        let _ = self.pin.set_low();
    }
}

impl BeatIndicator for HapticDriver<'_> {
    fn pulse(&mut self, duration_ms: u64) {
        self.buzz(Duration::from_millis(duration_ms));
    }
}
