// FitNode: Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_PPG_ADC: u32 = 2;     // D0/A0 - Pulse sensor analog output (ADC1 ch2)
pub const PIN_BEAT_LED: i32 = 4;    // D2/A2 - Beat indicator (LED or haptic motor)
pub const PIN_I2C_SDA: i32 = 6;     // D4    - I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5    - I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_ADDR_OLED: u8 = 0x3C;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Display (SSD1306 OLED)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;
pub const DISPLAY_BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 1024

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const LOOP_INTERVAL_MS: u64 = 10;         // ~100 Hz cooperative loop
pub const SEND_INTERVAL_MS: u64 = 200;        // 5 Hz telemetry
pub const DISPLAY_INTERVAL_MS: u64 = 500;     // 2 Hz status page
pub const BEAT_INDICATOR_MS: u64 = 20;        // LED/haptic blip per accepted beat

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------
pub const CALIBRATION_SAMPLES: usize = 300;
pub const CALIBRATION_DELAY_MS: u64 = 5;      // 300 x 5 ms = 1.5 s stationary window

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------
pub const SMOOTHING_ALPHA: f32 = 0.90;

// ---------------------------------------------------------------------------
// Pulse detection
// ---------------------------------------------------------------------------
pub const ADC_MAX: u16 = 4095;                // 12-bit oneshot
pub const PULSE_THRESHOLD_DEFAULT: u16 = 520;
pub const PULSE_HYSTERESIS: u16 = 30;
pub const BPM_HISTORY_LEN: usize = 8;
pub const MIN_BEAT_INTERVAL_MS: u64 = 300;    // 200 BPM
pub const MAX_BEAT_INTERVAL_MS: u64 = 2000;   // 30 BPM

// ---------------------------------------------------------------------------
// MPU6050 Sensor Scale Factors
// ---------------------------------------------------------------------------
pub const ACCEL_SCALE_8G: f32 = 4096.0;   // LSB/g  at ±8 g
pub const GYRO_SCALE_500: f32 = 65.5;     // LSB/°/s at ±500 °/s

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------
pub const WS_PORT: u16 = 81;
pub const WS_PATH: &str = "/ws";

/// WiFi credentials and WebSocket endpoint.  SSID and password are baked in
/// at build time from `FITNODE_WIFI_SSID` / `FITNODE_WIFI_PASS`.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub ws_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("FITNODE_WIFI_SSID").unwrap_or("FitNode"),
            wifi_password: option_env!("FITNODE_WIFI_PASS").unwrap_or("fitnode123"),
            ws_port: WS_PORT,
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime-tunable component configuration
// ---------------------------------------------------------------------------

/// Static tilt calibration window.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationConfig {
    pub samples: usize,
    pub delay_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: CALIBRATION_SAMPLES,
            delay_ms: CALIBRATION_DELAY_MS,
        }
    }
}

/// Threshold-crossing beat detector tuning.
#[derive(Debug, Clone, Copy)]
pub struct PulseConfig {
    /// Rising-edge trigger level (raw ADC counts)
    pub threshold: u16,
    /// Falling edge fires at `threshold - hysteresis`
    pub hysteresis: u16,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            threshold: PULSE_THRESHOLD_DEFAULT,
            hysteresis: PULSE_HYSTERESIS,
            min_interval_ms: MIN_BEAT_INTERVAL_MS,
            max_interval_ms: MAX_BEAT_INTERVAL_MS,
        }
    }
}

/// Cadences of the cooperative loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub loop_interval_ms: u64,
    pub send_interval_ms: u64,
    pub display_interval_ms: u64,
    pub beat_indicator_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: LOOP_INTERVAL_MS,
            send_interval_ms: SEND_INTERVAL_MS,
            display_interval_ms: DISPLAY_INTERVAL_MS,
            beat_indicator_ms: BEAT_INDICATOR_MS,
        }
    }
}

/// Everything the telemetry loop needs at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeConfig {
    pub scheduler: SchedulerConfig,
    pub calibration: CalibrationConfig,
    pub pulse: PulseConfig,
}
