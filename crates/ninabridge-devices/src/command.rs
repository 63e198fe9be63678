//! Command model.
//!
//! Inbound command payloads are JSON objects with an `action` field; every
//! other field is an action parameter. [`CommandPlan::resolve`] turns a
//! `(device, request)` pair into the concrete API call to make, so target
//! and parameter validation happens before any I/O.

use serde_json::{Map, Value};

use ninabridge_core::Error;

use crate::adapter::DeviceApiError;

/// Parameters forwarded to the screenshot endpoint when present.
const SCREENSHOT_PARAMS: [&str; 4] = ["resize", "quality", "size", "scale"];

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Lower-cased action name.
    pub action: String,
    /// All payload fields except `action`.
    pub parameters: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into().to_lowercase(),
            parameters: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Decode a raw payload. Only text that is not JSON at all is
    /// [`Error::MalformedCommand`]; an empty payload reads as `{}`.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Value, Error> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(payload).map_err(|e| Error::MalformedCommand {
            topic: topic.to_string(),
            message: e.to_string(),
        })
    }

    /// Build a request from a decoded payload. A missing or null `action`
    /// is the empty action, which no device except the screenshot target
    /// accepts.
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        let Value::Object(mut parameters) = value else {
            return Err(CommandError::InvalidParameter(
                "command payload must be a JSON object".to_string(),
            ));
        };
        let action = match parameters.remove("action") {
            Some(Value::String(action)) => action,
            None | Some(Value::Null) => String::new(),
            Some(other) => {
                return Err(CommandError::InvalidParameter(format!(
                    "'action' must be a string, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            action: action.trim().to_lowercase(),
            parameters,
        })
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

/// Why a command could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unsupported command target: {0}")]
    UnsupportedTarget(String),

    #[error("Unsupported {device} action: {action}")]
    UnsupportedAction { device: String, action: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Api(#[from] DeviceApiError),
}

impl CommandError {
    /// Convert into the core taxonomy for logging.
    pub fn into_dispatch_error(self, device: &str) -> Error {
        Error::CommandDispatch {
            device: device.to_string(),
            message: self.to_string(),
        }
    }
}

/// How the API response of a command is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Decoded JSON document.
    Json,
    /// Raw bytes, returned as `{"image_base64": "..."}`.
    ImageBase64,
}

/// A resolved API call: path, query and how to read the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub response: ResponseKind,
}

impl CommandPlan {
    fn json(path: &'static str) -> Self {
        Self {
            path,
            query: Vec::new(),
            response: ResponseKind::Json,
        }
    }

    fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Map a command for `device` onto an API call.
    pub fn resolve(device: &str, request: &CommandRequest) -> Result<Self, CommandError> {
        match device {
            "sequence" => Self::sequence(request),
            "mount" => Self::mount(request),
            "application" | "screenshot" => Ok(Self::screenshot(request)),
            other => Err(CommandError::UnsupportedTarget(other.to_string())),
        }
    }

    fn sequence(request: &CommandRequest) -> Result<Self, CommandError> {
        match request.action.as_str() {
            "start" => {
                let skip = request
                    .param("skipValidation")
                    .map(query_value)
                    .unwrap_or_else(|| "false".to_string());
                Ok(Self::json("/sequence/start").query("skipValidation", skip))
            }
            "stop" => Ok(Self::json("/sequence/stop")),
            "reset" | "restart" => Ok(Self::json("/sequence/reset")),
            action => Err(unsupported("sequence", action)),
        }
    }

    fn mount(request: &CommandRequest) -> Result<Self, CommandError> {
        match request.action.as_str() {
            "home" => Ok(Self::json("/equipment/mount/home")),
            "park" => Ok(Self::json("/equipment/mount/park")),
            "unpark" => Ok(Self::json("/equipment/mount/unpark")),
            "tracking" | "track" | "set_tracking" => {
                let mode = parse_tracking_mode(request.param("mode"))?;
                Ok(Self::json("/equipment/mount/tracking").query("mode", mode.to_string()))
            }
            action => Err(unsupported("mount", action)),
        }
    }

    fn screenshot(request: &CommandRequest) -> Self {
        let mut plan = Self {
            path: "/application/screenshot",
            query: vec![("stream".to_string(), "true".to_string())],
            response: ResponseKind::ImageBase64,
        };
        for key in SCREENSHOT_PARAMS {
            if let Some(value) = request.param(key) {
                plan = plan.query(key, query_value(value));
            }
        }
        plan
    }
}

fn unsupported(device: &str, action: &str) -> CommandError {
    CommandError::UnsupportedAction {
        device: device.to_string(),
        action: action.to_string(),
    }
}

/// Render a JSON parameter as a query string value.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accepts 0-4 (as a number or digit string) or a mode name.
pub fn parse_tracking_mode(mode: Option<&Value>) -> Result<u8, CommandError> {
    let invalid = || {
        CommandError::InvalidParameter(
            "Invalid tracking mode; expected 0-4 or sidereal/lunar/solar/king/stopped".to_string(),
        )
    };

    match mode {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(m @ 0..=4) => Ok(m as u8),
            _ => Err(invalid()),
        },
        Some(Value::String(s)) => {
            let normalized = s.trim().to_lowercase();
            match normalized.as_str() {
                "sidereal" | "siderial" => Ok(0),
                "lunar" | "moon" => Ok(1),
                "solar" | "sun" => Ok(2),
                "king" => Ok(3),
                "stop" | "stopped" | "off" => Ok(4),
                digits => match digits.parse::<u8>() {
                    Ok(m) if m <= 4 => Ok(m),
                    _ => Err(invalid()),
                },
            }
        }
        _ => Err(invalid()),
    }
}

/// Whether an API result carries anything worth reporting.
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
