//! Error types for stream decoding.
//!
//! Errors follow the decoding layers of the crate:
//!
//! - **Transport Errors**: disconnects, resets and short reads on a session
//! - **Configuration Errors**: invalid descriptor tables, patterns or config files
//! - **Decode Errors**: schema mismatches found while decoding a text frame
//! - **Query Errors**: lookups of names outside a decoder's vocabulary
//!
//! Transport errors end a session without reaching the consumer; they are
//! logged by the session loop. Only [`SensorError::TooManyCapturedValues`] is
//! surfaced from a decode attempt, and it is never fatal to the process.
//!
//! ```rust
//! use sensorwire::SensorError;
//!
//! let error = SensorError::connection_failed("peer reset the connection");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for decoder operations.
pub type Result<T, E = SensorError> = std::result::Result<T, E>;

/// Main error type for decoder operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SensorError {
    #[error("Connection failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error on {port}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Stream closed after {received} of {expected} bytes")]
    ShortRead { expected: usize, received: usize },

    #[error("Field '{field}' is not declared by this decoder")]
    UnknownField { field: String },

    #[error("Too many captured values: pattern produced {captured}, {declared} field names declared")]
    TooManyCapturedValues { captured: usize, declared: usize },

    #[error("Invalid frame pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid field descriptor '{field}': {details}")]
    Descriptor { field: String, details: String },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error")]
    ConfigParse(#[from] serde_yaml_ng::Error),
}

impl SensorError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SensorError::Connection { .. } => true,
            SensorError::Io(_) => true,
            #[cfg(feature = "serial")]
            SensorError::Serial { .. } => true,
            SensorError::ShortRead { .. } => true,
            SensorError::TooManyCapturedValues { .. } => true,
            SensorError::UnknownField { .. } => false,
            SensorError::Pattern { .. } => false,
            SensorError::Descriptor { .. } => false,
            SensorError::Config { .. } => false,
            SensorError::ConfigFile { .. } => false,
            SensorError::ConfigParse(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SensorError::Connection { .. } | SensorError::Io(_) => vec![
                "Check that the datalogger can reach the listening address",
                "Verify no firewall is dropping the connection",
                "Wait for the device to reconnect",
            ],
            #[cfg(feature = "serial")]
            SensorError::Serial { .. } => vec![
                "Check the serial device path exists",
                "Verify the user has permission to open the port",
                "Confirm the configured baud rate matches the sensor",
            ],
            SensorError::ShortRead { .. } => vec![
                "Check the link quality to the device",
                "Wait for the device to resend the frame",
            ],
            SensorError::TooManyCapturedValues { .. } => vec![
                "Declare one field name per capture group in the pattern",
                "Use non-capturing groups (?:...) for grouping only",
            ],
            SensorError::UnknownField { .. } => vec![
                "Check field name spelling",
                "List the available names with get_fields()",
            ],
            SensorError::Pattern { .. } => vec![
                "Check the regular expression syntax",
                "Escape literal characters with a backslash",
            ],
            SensorError::Descriptor { .. } => vec![
                "Check byte offsets and ranges in the field table",
                "Ensure every field name is unique",
            ],
            SensorError::Config { .. }
            | SensorError::ConfigFile { .. }
            | SensorError::ConfigParse(_) => vec![
                "Check the configuration file exists and is readable",
                "Validate the YAML syntax",
                "Compare against the documented configuration keys",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        SensorError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SensorError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for unknown field lookups.
    pub fn unknown_field(field: impl Into<String>) -> Self {
        SensorError::UnknownField { field: field.into() }
    }

    /// Helper constructor for descriptor validation errors.
    pub fn invalid_descriptor(field: impl Into<String>, details: impl Into<String>) -> Self {
        SensorError::Descriptor { field: field.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        SensorError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for pattern compilation errors.
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        SensorError::Pattern { pattern: pattern.into(), source }
    }

    /// Whether this error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        match self {
            SensorError::ShortRead { .. } => true,
            SensorError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            field_name in "\\w+",
            captured in 2usize..16,
            declared in 0usize..2,
          ) {
            let connection_error = SensorError::connection_failed(reason.clone());
            let field_error = SensorError::unknown_field(field_name.clone());
            let capture_error = SensorError::TooManyCapturedValues { captured, declared };

            prop_assert!(connection_error.to_string().contains(&reason));
            prop_assert!(field_error.to_string().contains(&field_name));

            let capture_msg = capture_error.to_string();
            prop_assert!(capture_msg.contains(&captured.to_string()));
            prop_assert!(capture_msg.contains(&declared.to_string()));
          }

          #[test]
          fn short_reads_always_count_as_disconnects(expected in 1usize..4096, received in 0usize..4096) {
            let error = SensorError::ShortRead { expected, received };
            prop_assert!(error.is_disconnect());
            prop_assert!(error.is_retryable());
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SensorError>();

        let error = SensorError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let connection_error = SensorError::connection_failed("test");
        let field_error = SensorError::unknown_field("volts");
        let descriptor_error = SensorError::invalid_descriptor("volts", "zero scale");

        assert!(connection_error.is_retryable());
        assert!(!field_error.is_retryable());
        assert!(!descriptor_error.is_retryable());

        for error in [&connection_error, &field_error, &descriptor_error] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn io_disconnect_kinds_are_classified() {
        let reset: SensorError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        let denied: SensorError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();

        assert!(reset.is_disconnect());
        assert!(!denied.is_disconnect());
    }

    #[test]
    fn source_chain_is_preserved() {
        let inner = std::io::Error::other("socket closed");
        let error = SensorError::connection_failed_with_source("accept failed", Box::new(inner));

        let source = std::error::Error::source(&error).expect("source should be set");
        assert!(source.to_string().contains("socket closed"));
    }
}
