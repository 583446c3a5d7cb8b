//! # Thermo Modbus Error Handling
//!
//! This module provides the error vocabulary for the gateway client, covering
//! connection establishment, exchange timeouts, protocol parsing and caller
//! misuse.
//!
//! ## Overview
//!
//! Callers of the client see a small, stable set of categories regardless of
//! what failed underneath:
//!
//! - [`ModbusError::Connection`] - the transport could not be established or
//!   re-established; the message names the gateway address.
//! - [`ModbusError::Timeout`] - the transport was up but an exchange did not
//!   complete, or connectivity was lost mid-exchange.
//! - [`ModbusError::Unsupported`] - a function code outside the set this
//!   client implements was requested or received. This is a programming
//!   error, not a runtime fault.
//!
//! The remaining variants describe transport-internal conditions (frame
//! parsing, device exceptions, invalid payloads) and are produced before the
//! session-level translation is applied.
//!
//! ## Usage Examples
//!
//! ```rust
//! use thermo_modbus::{ModbusError, ModbusResult};
//!
//! fn handle_error(result: ModbusResult<Vec<u16>>) {
//!     match result {
//!         Ok(data) => println!("Success: {:?}", data),
//!         Err(error) => {
//!             if error.is_recoverable() {
//!                 println!("Retryable error: {}", error);
//!             } else {
//!                 println!("Fatal error: {}", error);
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Retry policy belongs to the caller: this crate never retries an exchange
//! internally, because a blind retry on a single-outstanding-request protocol
//! can duplicate a write that actually reached the device.

use thiserror::Error;

/// Result type alias for Modbus operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Error categories produced by the gateway client
///
/// The first three variants form the stable vocabulary consumed by callers;
/// the rest describe transport- and protocol-internal failures.
#[derive(Error, Debug, Clone)]
pub enum ModbusError {
    /// Connection establishment or re-establishment failure
    ///
    /// The message names the target gateway address.
    ///
    /// # Examples
    /// - Connection refused by the gateway
    /// - Connect attempt did not complete within the configured timeout
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Exchange-level timeout or connectivity loss
    ///
    /// The transport was established at some point, but a request/response
    /// exchange did not complete.
    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// Unsupported function code
    ///
    /// The client was asked for, or the gateway answered with, a function
    /// code outside the six this library implements. Indicates a
    /// caller/library mismatch rather than a runtime fault.
    #[error("Unsupported function code: 0x{code:02X}")]
    Unsupported { code: u8 },

    /// I/O related errors (network)
    ///
    /// Low-level socket failures that are not connect-phase failures.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Frame parsing errors
    ///
    /// # Examples
    /// - Incomplete MBAP header
    /// - Response shorter than its claimed length
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Protocol-level errors that don't fit a more specific category
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Modbus exception response
    ///
    /// Standard exception codes returned by the device, with the original
    /// function code and a human-readable description.
    #[error("Modbus exception: function=0x{function:02X}, code=0x{code:02X} ({message})")]
    Exception { function: u8, code: u8, message: String },

    /// Invalid data value
    ///
    /// Payloads that don't conform to expected formats or ranges.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration errors
    ///
    /// # Examples
    /// - Unresolvable gateway host
    /// - Malformed configuration document
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// Create an unsupported-function error
    pub fn unsupported(code: u8) -> Self {
        Self::Unsupported { code }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a frame error
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame { message: message.into() }
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Create a Modbus exception error
    ///
    /// Maps standard exception codes to human-readable messages.
    pub fn exception(function: u8, code: u8) -> Self {
        let message = match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }.to_string();

        Self::Exception { function, code, message }
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// Determines whether an operation that failed with this error might
    /// succeed if the caller retries it. The client itself never retries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use thermo_modbus::ModbusError;
    ///
    /// let timeout = ModbusError::timeout("not connected to gateway");
    /// assert!(timeout.is_recoverable());
    ///
    /// let unsupported = ModbusError::unsupported(0x04);
    /// assert!(!unsupported.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Connection { .. } => true,
            Self::Timeout { .. } => true,
            Self::Exception { code, .. } => {
                // Acknowledge, Busy
                matches!(code, 0x05 | 0x06)
            },
            _ => false,
        }
    }

    /// Check if the error is a network/transport issue
    ///
    /// Transport-category errors are what the session translates into the
    /// fixed gateway-connectivity timeout before they reach callers.
    pub fn is_transport_error(&self) -> bool {
        matches!(self,
            Self::Io { .. } |
            Self::Connection { .. } |
            Self::Timeout { .. }
        )
    }

    /// Check if the error is a protocol issue
    pub fn is_protocol_error(&self) -> bool {
        matches!(self,
            Self::Protocol { .. } |
            Self::Unsupported { .. } |
            Self::Exception { .. } |
            Self::Frame { .. }
        )
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Convert from tokio timeout errors
impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("operation timed out")
    }
}

/// Convert from serde JSON errors
impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ModbusError::timeout("not connected to gateway");
        assert!(err.is_recoverable());
        assert!(err.is_transport_error());

        let err = ModbusError::exception(0x03, 0x02);
        assert!(!err.is_recoverable());
        assert!(err.is_protocol_error());

        let err = ModbusError::unsupported(0x04);
        assert!(err.is_protocol_error());
        assert!(!err.is_transport_error());
    }

    #[test]
    fn test_error_display() {
        let err = ModbusError::connection("could not connect to '192.168.1.101:502'");
        let msg = format!("{}", err);
        assert!(msg.contains("192.168.1.101:502"));

        let err = ModbusError::exception(0x10, 0x0B);
        let msg = format!("{}", err);
        assert!(msg.contains("Gateway Target Device Failed to Respond"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: ModbusError = io_err.into();
        assert!(err.is_transport_error());
    }
}
