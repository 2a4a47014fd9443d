//! # Voltage RTU Error Handling
//!
//! Error types for every failure class a half-duplex Modbus RTU exchange can
//! produce, from transport faults up to protocol exceptions reported by the
//! remote device.
//!
//! ## Error Categories
//!
//! ### Transport Errors
//! - **I/O Errors**: serial port write failures surfaced by the port driver
//! - **Timeout Errors**: a receive window elapsed without a valid frame
//!
//! ### Frame Errors
//! - **Buffer Overflow**: an append would exceed the 256-byte ADU capacity
//! - **Invalid State**: a frame mutation was refused because its precondition
//!   did not hold (e.g. setting an exception code on a non-exception frame)
//! - **CRC Mismatch**: the trailing CRC-16 did not match the frame contents
//!
//! ### Protocol Errors
//! - **Exception Responses**: standard Modbus exception codes from a server
//! - **Address Mismatch**: a frame arrived carrying the wrong device address
//! - **Invalid Function / Address / Data**: request validation failures
//!
//! Nothing is retried automatically; every failure surfaces to the caller.
//! The [`ModbusError::is_recoverable`] predicate tells callers which failures
//! are worth retrying on their own schedule.
//!
//! ```rust
//! use voltage_rtu::{ModbusError, ModbusResult};
//!
//! fn handle(result: ModbusResult<Vec<u16>>) {
//!     match result {
//!         Ok(values) => println!("read {} registers", values.len()),
//!         Err(ModbusError::Exception { function, code, message }) => {
//!             println!("device exception {:02X}/{:02X}: {}", function, code, message);
//!         }
//!         Err(error) if error.is_recoverable() => println!("retryable: {}", error),
//!         Err(error) => println!("fatal: {}", error),
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for Modbus operations
///
/// Convenience alias using `ModbusError` as the error type for all
/// operations throughout the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Comprehensive Modbus RTU error types
///
/// Covers all failure conditions of the ADU codec, the link layer and the
/// server/client transaction logic. Each variant carries enough context to
/// diagnose the failure without a debugger on the bus.
#[derive(Error, Debug, Clone)]
pub enum ModbusError {
    /// I/O related errors (serial port)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A receive window elapsed without a valid frame
    ///
    /// The timeout is a deadline for the whole read window, not for the
    /// first byte. A window that collected zero bytes reports this; a
    /// window that collected a corrupt frame reports [`Self::CrcMismatch`].
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// An append would exceed the fixed ADU capacity
    ///
    /// The frame buffer is left unchanged when this is reported.
    #[error("Frame buffer overflow: capacity={capacity}, requested={requested}")]
    BufferOverflow { capacity: usize, requested: usize },

    /// A frame mutation was refused because its precondition did not hold
    ///
    /// # Examples
    /// - `set_exception_code` on a frame whose length is not exactly 2
    /// - `set_exception` on a function code that already carries the bit
    /// - `send` on a frame without a valid CRC trailer
    #[error("Invalid frame state: {message}")]
    InvalidState { message: String },

    /// CRC validation failure
    ///
    /// The frame retains its bytes but must be treated as invalid. Both
    /// values are reported for debugging noise on the line.
    #[error("CRC validation failed: expected={expected:04X}, actual={actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Modbus exception response
    ///
    /// A server answered with the exception bit set. Carries the original
    /// function code, the exception code from the response payload and a
    /// human-readable description.
    ///
    /// # Standard Exception Codes
    /// - 0x01: Illegal Function
    /// - 0x02: Illegal Data Address
    /// - 0x03: Illegal Data Value
    /// - 0x04: Server Device Failure
    /// - 0x05: Acknowledge
    /// - 0x06: Server Device Busy
    /// - 0x07: Negative Acknowledge
    /// - 0x08: Memory Parity Error
    /// - 0x0A: Gateway Path Unavailable
    /// - 0x0B: Gateway Target Device Failed to Respond
    #[error("Modbus exception: function={function:02X}, code={code:02X} ({message})")]
    Exception { function: u8, code: u8, message: String },

    /// A response arrived from (or for) the wrong device address
    #[error("Device address mismatch: expected={expected:02X}, actual={actual:02X}")]
    AddressMismatch { expected: u8, actual: u8 },

    /// Invalid function code
    #[error("Invalid function code: {code:#04X}")]
    InvalidFunction { code: u8 },

    /// Invalid address range
    ///
    /// A register-table lookup or range check failed: the address (or part
    /// of the range) has no corresponding entry.
    #[error("Invalid address: start={start}, count={count}")]
    InvalidAddress { start: u16, count: u16 },

    /// Invalid data value
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Frame structure errors
    ///
    /// A received frame was too short or malformed for its claimed function
    /// code, or an outgoing frame was structurally unusable.
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Configuration errors
    ///
    /// Register-table setup failures such as exceeding a per-kind capacity
    /// cap.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a buffer overflow error
    pub fn buffer_overflow(capacity: usize, requested: usize) -> Self {
        Self::BufferOverflow { capacity, requested }
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a CRC mismatch error
    pub fn crc_mismatch(expected: u16, actual: u16) -> Self {
        Self::CrcMismatch { expected, actual }
    }

    /// Create a Modbus exception error
    ///
    /// Maps standard exception codes to human-readable messages.
    pub fn exception(function: u8, code: u8) -> Self {
        let message = match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x07 => "Negative Acknowledge",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
        .to_string();

        Self::Exception { function, code, message }
    }

    /// Create an address mismatch error
    pub fn address_mismatch(expected: u8, actual: u8) -> Self {
        Self::AddressMismatch { expected, actual }
    }

    /// Create an invalid function error
    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    /// Create an invalid address error
    pub fn invalid_address(start: u16, count: u16) -> Self {
        Self::InvalidAddress { start, count }
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Create a frame error
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// `true` when the condition might be temporary and retrying the
    /// operation could succeed, `false` for permanent failures.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Timeout { .. } => true,
            Self::CrcMismatch { .. } => true,
            Self::Exception { code, .. } => {
                // Acknowledge, Busy
                matches!(code, 0x05 | 0x06)
            }
            _ => false,
        }
    }

    /// Check if the error is a transport issue
    ///
    /// Identifies errors related to the serial link rather than the Modbus
    /// protocol content.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Timeout { .. })
    }

    /// Check if the error is a protocol issue
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Exception { .. }
                | Self::InvalidFunction { .. }
                | Self::CrcMismatch { .. }
                | Self::Frame { .. }
                | Self::AddressMismatch { .. }
        )
    }

    /// The exception code carried by this error, if any
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::Exception { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ModbusError::timeout("receive response", 1000);
        assert!(err.is_recoverable());
        assert!(err.is_transport_error());

        let err = ModbusError::exception(0x03, 0x02);
        assert!(!err.is_recoverable());
        assert!(err.is_protocol_error());
        assert_eq!(err.exception_code(), Some(0x02));

        let err = ModbusError::invalid_state("length must be 2");
        assert!(!err.is_recoverable());
        assert!(!err.is_transport_error());
        assert!(!err.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = ModbusError::crc_mismatch(0x1234, 0x5678);
        let msg = format!("{}", err);
        assert!(msg.contains("CRC validation failed"));
        assert!(msg.contains("1234"));
        assert!(msg.contains("5678"));

        let err = ModbusError::exception(0x05, 0x02);
        assert!(format!("{}", err).contains("Illegal Data Address"));
    }
}
