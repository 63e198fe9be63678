//! Unified error handling for the NINA bridge.
//!
//! Every layer below process startup reports failures through this type.
//! Only [`Error::Config`] is fatal; the others are logged by the component
//! that observes them and turned into a degraded state (a dropped message,
//! an availability `OFF`, a command error topic).

/// Unified error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid settings. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The bus refused or failed to write a message.
    #[error("Transport publish error on {topic}: {message}")]
    Transport { topic: String, message: String },

    /// A device API call made while polling failed.
    #[error("Device fetch error for {device}: {message}")]
    DeviceFetch { device: String, message: String },

    /// The device API rejected or failed a command.
    #[error("Command dispatch error for {device}: {message}")]
    CommandDispatch { device: String, message: String },

    /// An inbound command payload could not be parsed.
    #[error("Malformed command payload on {topic}: {message}")]
    MalformedCommand { topic: String, message: String },

    /// A scheduled action panicked.
    #[error("Task '{task}' panicked: {message}")]
    TaskPanic { task: String, message: String },

    /// Publish consumer failure or drain timeout.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Scheduler lifecycle misuse or shutdown timeouts.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// I/O errors (configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for building an [`Error::Config`].
#[macro_export]
macro_rules! config_err {
    ($msg:expr) => {
        $crate::error::Error::Config($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Config(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_fatal() {
        let err = config_err!("refresh_every must be positive for device '{}'", "camera");
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Configuration error: refresh_every must be positive for device 'camera'"
        );
    }

    #[test]
    fn test_runtime_errors_are_not_fatal() {
        let err = Error::DeviceFetch {
            device: "mount".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("connection refused"));
    }
}
