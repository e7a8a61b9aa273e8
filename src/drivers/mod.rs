pub mod haptic;
pub mod imu;
pub mod oled;
pub mod ppg;
