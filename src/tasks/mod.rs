pub mod telemetry;

pub use telemetry::{Devices, TelemetryScheduler, TickReport};
