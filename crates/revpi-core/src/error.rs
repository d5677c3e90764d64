//! Error types for process-image access.
//!
//! The variants fall into four groups:
//!
//! - **Handle errors**: the device node could not be opened, or a control
//!   code or positioned transfer failed at the driver.
//! - **Lookup errors**: a variable name or address does not resolve.
//! - **Configuration errors**: the module firmware has not configured an
//!   input line the way the caller asked for.
//! - **Decode errors**: the driver returned fewer bytes than the record
//!   width, or a record carries an illegal field value.
//!
//! None of these are retried by the library.

use crate::command::Command;
use std::io;
use std::path::PathBuf;

/// Result type alias for process-image operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the piControl driver.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The device node could not be opened.
    #[error("Failed to open {}: {source}", .path.display())]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The driver rejected a control code.
    #[error("Control code {command} failed: {source}")]
    ControlCodeFailed {
        command: Command,
        #[source]
        source: io::Error,
    },

    /// No variable with this name exists in the driver's variable table.
    #[error("Variable not found: {name}")]
    VariableNotFound { name: String },

    /// No device region contains the address.
    #[error("Address {address} is outside every device region")]
    AddressOutOfRange { address: u16 },

    /// The address is neither an input word nor a counter slot.
    #[error("{name} (address {address}) is not a digital input")]
    NotADigitalInput { name: String, address: u16 },

    /// The firmware has not configured the line for counting.
    #[error("{name} is not configured as a counter (mode {mode})")]
    NotConfiguredAsCounter { name: String, mode: u8 },

    /// The firmware has not configured the line as an encoder.
    #[error("{name} is not configured as an encoder (mode {mode})")]
    NotConfiguredAsEncoder { name: String, mode: u8 },

    /// The pin was never enabled.
    #[error("Pin {name} is disabled")]
    PinDisabled { name: String },

    /// The driver returned fewer bytes than requested.
    #[error("Short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// The driver accepted fewer bytes than written.
    #[error("Short write at offset {offset}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// A record returned by the driver could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Positioned process-image transfer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The hardware does not provide this operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// An edge-event line could not be opened or read.
    #[error("Event line error: {message}")]
    EventLine { message: String },
}

impl Error {
    /// Create a new control code error.
    pub fn control(command: Command, source: io::Error) -> Self {
        Self::ControlCodeFailed { command, source }
    }

    /// Create a new variable not found error.
    pub fn variable_not_found(name: impl Into<String>) -> Self {
        Self::VariableNotFound { name: name.into() }
    }

    /// Create a new decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new event line error.
    pub fn event_line(message: impl Into<String>) -> Self {
        Self::EventLine {
            message: message.into(),
        }
    }

    /// Whether the error reflects firmware-side line configuration rather
    /// than an I/O failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotADigitalInput { .. }
                | Self::NotConfiguredAsCounter { .. }
                | Self::NotConfiguredAsEncoder { .. }
        )
    }

    /// Whether the error is a width mismatch or malformed record.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::ShortRead { .. } | Self::ShortWrite { .. } | Self::Decode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_code_error_names_command() {
        let error = Error::control(
            Command::FindVariable,
            io::Error::new(io::ErrorKind::NotFound, "no such variable"),
        );
        assert!(matches!(error, Error::ControlCodeFailed { .. }));
        assert!(error.to_string().starts_with("Control code find-variable (0x4B11) failed"));
    }

    #[test]
    fn test_configuration_classification() {
        let error = Error::NotConfiguredAsCounter {
            name: "Counter_1".to_string(),
            mode: 0,
        };
        assert!(error.is_configuration());
        assert!(!error.is_decode());
        assert_eq!(
            error.to_string(),
            "Counter_1 is not configured as a counter (mode 0)"
        );
    }

    #[test]
    fn test_decode_classification() {
        let error = Error::ShortRead {
            offset: 6,
            expected: 4,
            actual: 2,
        };
        assert!(error.is_decode());
        assert!(!error.is_configuration());
        assert_eq!(
            error.to_string(),
            "Short read at offset 6: expected 4 bytes, got 2"
        );
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            Error::variable_not_found("I_1"),
            Error::AddressOutOfRange { address: 4096 },
            Error::unsupported("set_power_mode"),
            Error::config("empty device path"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
