// FitNode: Error taxonomy shared by the estimators and the telemetry loop.

/// Errors surfaced by the sensor node core.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Sensor bus or ADC read failed. Aborts the current tick.
    #[error("sensor read failed: {0}")]
    SensorRead(String),

    /// No telemetry consumer reachable. Reported through `linkStatus`.
    #[error("telemetry link lost")]
    LinkLost,

    /// Inbound command could not be parsed or is unknown. Dropped.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("display error: {0}")]
    Display(String),
}

pub type Result<T> = core::result::Result<T, NodeError>;
