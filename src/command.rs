// FitNode: Inbound control commands
//
// The relay sends JSON objects tagged by `command`:
//   {"command": "calibrate"}
//   {"command": "reset_yaw"}
//   {"command": "set_threshold", "value": 550}
// Each applied command is answered with {"status": "..."}.

use serde::{Deserialize, Serialize};

use crate::config::ADC_MAX;
use crate::error::{NodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Calibrate,
    ResetYaw,
    SetPulseThreshold(u16),
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum WireCommand {
    Calibrate,
    ResetYaw,
    SetThreshold { value: i64 },
}

impl ControlCommand {
    /// Parse one inbound text message.
    pub fn parse(message: &str) -> Result<Self> {
        let wire: WireCommand = serde_json::from_str(message.trim())
            .map_err(|e| NodeError::MalformedCommand(format!("{}: {}", e, message.trim())))?;

        match wire {
            WireCommand::Calibrate => Ok(Self::Calibrate),
            WireCommand::ResetYaw => Ok(Self::ResetYaw),
            WireCommand::SetThreshold { value } => u16::try_from(value)
                .ok()
                .filter(|v| *v <= ADC_MAX)
                .map(Self::SetPulseThreshold)
                .ok_or_else(|| {
                    NodeError::MalformedCommand(format!(
                        "threshold {} outside 0..={}",
                        value, ADC_MAX
                    ))
                }),
        }
    }

    pub fn ack_status(&self) -> &'static str {
        match self {
            Self::Calibrate => "calibrated",
            Self::ResetYaw => "yaw_reset",
            Self::SetPulseThreshold(_) => "threshold_set",
        }
    }

    /// Acknowledgement payload sent back once the command has been applied.
    pub fn ack_json(&self) -> String {
        serde_json::to_string(&Ack { status: self.ack_status() }).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct Ack {
    status: &'static str,
}
