// FitNode: SSD1306 OLED Driver
//
// 128x64 panel on the shared I2C bus.  The status page is rendered into a
// `FrameBuffer` and pushed page by page in horizontal addressing mode.

use fitnode::config::*;
use fitnode::display::{render_status, FrameBuffer};
use fitnode::error::{NodeError, Result};
use fitnode::events::TelemetryRecord;
use fitnode::hal::StatusDisplay;

use crate::drivers::imu::SharedBus;

const CONTROL_CMD: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

const INIT_SEQUENCE: &[u8] = &[
    0xAE, // display off
    0xD5, 0x80, // clock divide
    0xA8, 0x3F, // multiplex 64
    0xD3, 0x00, // display offset
    0x40, // start line 0
    0x8D, 0x14, // charge pump on
    0x20, 0x00, // horizontal addressing
    0xA1, // segment remap
    0xC8, // COM scan descending
    0xDA, 0x12, // COM pins
    0x81, 0x8F, // contrast
    0xD9, 0xF1, // pre-charge
    0xDB, 0x40, // VCOMH
    0xA4, // resume from RAM
    0xA6, // normal (not inverted)
    0xAF, // display on
];

pub struct OledDisplay {
    bus: SharedBus,
    frame: FrameBuffer,
}

impl OledDisplay {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            bus,
            frame: FrameBuffer::new(),
        }
    }

    /// Probe the panel address.
    pub fn is_connected(&self) -> bool {
        self.command(&[0xE3]).is_ok() // NOP
    }

    pub fn init(&mut self) -> anyhow::Result<()> {
        self.command(INIT_SEQUENCE)?;
        self.flush()?;
        log::info!("SSD1306 initialised");
        Ok(())
    }

    fn command(&self, cmds: &[u8]) -> Result<()> {
        let mut bus = self
            .bus
            .lock()
            .map_err(|_| NodeError::Display("I2C bus mutex poisoned".into()))?;
        for &cmd in cmds {
            bus.write(I2C_ADDR_OLED, &[CONTROL_CMD, cmd], I2C_TIMEOUT_TICKS)
                .map_err(|e| NodeError::Display(format!("SSD1306 command: {}", e)))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Full-screen window: columns 0..127, pages 0..7
        self.command(&[0x21, 0x00, (SCREEN_WIDTH - 1) as u8, 0x22, 0x00, (SCREEN_HEIGHT / 8 - 1) as u8])?;

        let mut bus = self
            .bus
            .lock()
            .map_err(|_| NodeError::Display("I2C bus mutex poisoned".into()))?;
        let mut packet = [0u8; 1 + SCREEN_WIDTH as usize];
        packet[0] = CONTROL_DATA;
        for page in self.frame.pages() {
            packet[1..].copy_from_slice(page);
            bus.write(I2C_ADDR_OLED, &packet, I2C_TIMEOUT_TICKS)
                .map_err(|e| NodeError::Display(format!("SSD1306 data: {}", e)))?;
        }
        Ok(())
    }
}

impl StatusDisplay for OledDisplay {
    fn show(&mut self, snapshot: &TelemetryRecord) -> Result<()> {
        // FrameBuffer drawing is infallible
        let _ = render_status(&mut self.frame, snapshot);
        self.flush()
    }
}
