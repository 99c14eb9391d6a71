//! Error handling for the step logger
//!
//! Configuration mistakes fail at the call site, durable sink failures are
//! propagated, and tracker failures are reported through [`TrackerError`] so
//! the logger can fall back to running without a tracker.

use thiserror::Error;

/// Main error type for the step logger
#[derive(Error, Debug)]
pub enum StepLogError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown severity: {name}")]
    UnknownSeverity { name: String },

    #[error("Malformed metric key '{key}': at most one '/' separator is allowed")]
    MalformedKey { key: String },

    #[error("Invalid style for {field}: {message}")]
    InvalidStyle { field: String, message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tracker operation failed: {operation}")]
    Tracker {
        operation: String,
        #[source]
        source: TrackerError,
    },

    #[error("Logger is closed")]
    Closed,

    #[error("Failed to load configuration")]
    ConfigLoad {
        #[source]
        source: Box<figment::Error>,
    },
}

/// Type alias for Result with StepLogError
pub type StepLogResult<T> = Result<T, StepLogError>;

impl StepLogError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown severity error
    pub fn unknown_severity(name: impl Into<String>) -> Self {
        Self::UnknownSeverity { name: name.into() }
    }

    /// Create a malformed metric key error
    pub fn malformed_key(key: impl Into<String>) -> Self {
        Self::MalformedKey { key: key.into() }
    }

    /// Create an invalid style error
    pub fn invalid_style(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStyle {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a tracker error
    pub fn tracker(operation: impl Into<String>, source: TrackerError) -> Self {
        Self::Tracker {
            operation: operation.into(),
            source,
        }
    }

    /// True for the errors that are caller mistakes rather than runtime failures
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StepLogError::Config { .. }
                | StepLogError::UnknownSeverity { .. }
                | StepLogError::MalformedKey { .. }
                | StepLogError::InvalidStyle { .. }
                | StepLogError::ConfigLoad { .. }
        )
    }
}

/// Failures reported by a tracker backend or run
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("tracker unavailable: {0}")]
    Unavailable(String),

    #[error("login rejected: {0}")]
    Login(String),

    #[error("run already finished")]
    Finished,

    #[error("tracker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("tracker payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convert from std::io errors
impl From<std::io::Error> for StepLogError {
    fn from(err: std::io::Error) -> Self {
        StepLogError::io("io_operation", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for StepLogError {
    fn from(err: serde_json::Error) -> Self {
        StepLogError::serialization("json_operation", err)
    }
}

/// Convert from figment errors
impl From<figment::Error> for StepLogError {
    fn from(err: figment::Error) -> Self {
        StepLogError::ConfigLoad {
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = StepLogError::config("print_interval must be positive");
        assert!(config_err.to_string().contains("Configuration error"));
        assert!(config_err.is_configuration());

        let key_err = StepLogError::malformed_key("a/b/c");
        assert!(key_err.to_string().contains("a/b/c"));
        assert!(key_err.is_configuration());

        assert!(!StepLogError::Closed.is_configuration());
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = StepLogError::io("appending man record", io_err);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("I/O operation failed"));

        let tracker_err = StepLogError::tracker("init", TrackerError::Unavailable("offline".into()));
        assert!(tracker_err.source().is_some());
    }
}
