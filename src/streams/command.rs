//! Log stream command frames
//!
//! The server pushes JSON objects of the form `{"command": <tag>, "value": <any>}`.
//! Tags the controller does not know about decode to [`LogCommand::Unknown`]
//! instead of failing.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum LogCommand {
    /// Server began streaming; switch to full log mode
    Start,
    /// One log line
    Log(String),
    /// Switch to determinate progress
    UseSteps,
    /// Progress percentage, clamped to 0..=100
    Step(u8),
    /// No more log output will follow
    Finalize,
    /// Unrecognized tag, kept for diagnostics
    Unknown(String),
}

impl LogCommand {
    pub fn tag(&self) -> &str {
        match self {
            LogCommand::Start => "start",
            LogCommand::Log(_) => "log",
            LogCommand::UseSteps => "use_steps",
            LogCommand::Step(_) => "step",
            LogCommand::Finalize => "finalize",
            LogCommand::Unknown(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is not valid JSON: {0}")]
    Json(String),

    #[error("'{command}' frame has an invalid value: {value}")]
    InvalidValue { command: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    command: String,
    #[serde(default)]
    value: Value,
}

/// Decode one text frame into a command
pub fn decode_frame(text: &str) -> Result<LogCommand, FrameError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))?;

    let command = match raw.command.as_str() {
        "start" => LogCommand::Start,
        "finalize" => LogCommand::Finalize,
        "use_steps" => LogCommand::UseSteps,
        "log" => LogCommand::Log(value_to_text(raw.value)),
        "step" => LogCommand::Step(value_to_percent(&raw.value).ok_or_else(|| {
            FrameError::InvalidValue {
                command: "step",
                value: raw.value.to_string(),
            }
        })?),
        _ => LogCommand::Unknown(raw.command),
    };
    Ok(command)
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_percent(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}
