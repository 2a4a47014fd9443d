//! Callback-based packet logging
//!
//! The core never reaches for a process-wide sink: a [`CallbackLogger`] is
//! supplied at construction (or not at all) and receives each request and
//! response as it crosses the link, either as a raw hex dump, an
//! interpreted summary, or both.

use std::sync::Arc;

use crate::protocol::{ModbusAdu, ModbusException, ModbusFunction, ADU_DATA_INDEX};

/// Log levels for the callback logging system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Error messages
    Error,
    /// Warning messages
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
}

impl LogLevel {
    /// Convert log level to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Logging mode for packet display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Show raw frame bytes only
    Raw,
    /// Show interpreted frame fields
    Interpreted,
    /// Show both raw and interpreted data
    Both,
}

/// Type alias for log callback functions
///
/// The callback receives a log level and message string
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Logger that uses callbacks for flexible logging
#[derive(Clone)]
pub struct CallbackLogger {
    callback: Option<Arc<LogCallback>>,
    min_level: LogLevel,
    mode: LoggingMode,
}

impl CallbackLogger {
    /// Create a new callback logger
    pub fn new(callback: Option<LogCallback>, min_level: LogLevel) -> Self {
        Self {
            callback: callback.map(Arc::new),
            min_level,
            mode: LoggingMode::Interpreted,
        }
    }

    /// Create a new callback logger with a specific mode
    pub fn with_mode(callback: Option<LogCallback>, min_level: LogLevel, mode: LoggingMode) -> Self {
        Self {
            callback: callback.map(Arc::new),
            min_level,
            mode,
        }
    }

    /// Create a logger with default console output
    pub fn console() -> Self {
        let callback: LogCallback = Box::new(|level, message| {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            match level {
                LogLevel::Error => eprintln!("[{}] ERROR: {}", timestamp, message),
                LogLevel::Warn => eprintln!("[{}] WARN: {}", timestamp, message),
                LogLevel::Info => println!("[{}] INFO: {}", timestamp, message),
                LogLevel::Debug => println!("[{}] DEBUG: {}", timestamp, message),
            }
        });
        Self::new(Some(callback), LogLevel::Info)
    }

    /// Create a logger that outputs nothing (disabled)
    pub fn disabled() -> Self {
        Self::new(None, LogLevel::Error)
    }

    /// Set logging mode
    pub fn set_mode(&mut self, mode: LoggingMode) {
        self.mode = mode;
    }

    /// Get current logging mode
    pub fn get_mode(&self) -> LoggingMode {
        self.mode
    }

    /// Log a message at the specified level
    pub fn log(&self, level: LogLevel, message: &str) {
        if self.should_log(level) {
            if let Some(ref callback) = self.callback {
                callback(level, message);
            }
        }
    }

    /// Log an error message
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Log an info message
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.callback.is_some() && level as u8 <= self.min_level as u8
    }

    /// Log raw bytes with a hex dump
    pub fn log_packet(&self, level: LogLevel, direction: &str, data: &[u8]) {
        if !self.should_log(level) {
            return;
        }

        let hex_data = data
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");

        let message = format!("{} frame ({} bytes): {}", direction, data.len(), hex_data);
        self.log(level, &message);
    }

    /// Log an outgoing request frame
    pub fn log_request(&self, adu: &ModbusAdu) {
        match self.mode {
            LoggingMode::Raw => {
                self.info(&format!(
                    "Modbus Request -> Raw: {}",
                    Self::frame_hex(adu)
                ));
            }
            LoggingMode::Interpreted => {
                self.info(&self.interpret_request(adu));
            }
            LoggingMode::Both => {
                self.info(&self.interpret_request(adu));
                self.debug(&format!(
                    "Modbus Request -> Raw: {}",
                    Self::frame_hex(adu)
                ));
            }
        }
    }

    /// Log an incoming response frame
    pub fn log_response(&self, adu: &ModbusAdu) {
        match self.mode {
            LoggingMode::Raw => {
                self.info(&format!(
                    "Modbus Response <- Raw: {}",
                    Self::frame_hex(adu)
                ));
            }
            LoggingMode::Interpreted => {
                self.info(&self.interpret_response(adu));
            }
            LoggingMode::Both => {
                self.info(&self.interpret_response(adu));
                self.debug(&format!(
                    "Modbus Response <- Raw: {}",
                    Self::frame_hex(adu)
                ));
            }
        }
    }

    fn frame_hex(adu: &ModbusAdu) -> String {
        adu.as_bytes()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn function_name(function_code: u8) -> String {
        match ModbusFunction::from_u8(function_code) {
            Ok(function) => function.to_string(),
            Err(_) => format!("Unknown Function (0x{:02X})", function_code),
        }
    }

    fn interpret_request(&self, adu: &ModbusAdu) -> String {
        format!(
            "Modbus Request -> Device: 0x{:02X}, Function: {}, Address: {}, Quantity: {}",
            adu.device_address(),
            Self::function_name(adu.function_code()),
            adu.starting_address(),
            adu.quantity()
        )
    }

    fn interpret_response(&self, adu: &ModbusAdu) -> String {
        let function_code = adu.function_code();

        if function_code >= 0x80 {
            let code = adu.exception_code();
            let reason = ModbusException::from_u8(code)
                .map(|e| e.description())
                .unwrap_or("unknown exception code");
            return format!(
                "Modbus Response <- Device: 0x{:02X}, Exception to {}: 0x{:02X} ({})",
                adu.device_address(),
                Self::function_name(function_code & 0x7F),
                code,
                reason
            );
        }

        let detail = match function_code {
            0x01 | 0x02 => {
                let byte_count = adu.byte_at(ADU_DATA_INDEX);
                let mut bits = Vec::new();
                for i in 0..(byte_count as usize * 8).min(16) {
                    let byte = adu.byte_at(ADU_DATA_INDEX + 1 + i / 8);
                    bits.push((byte >> (i % 8)) & 0x01 != 0);
                }
                format!("Byte count: {}, Bits: {:?}", byte_count, bits)
            }
            0x03 | 0x04 => {
                let byte_count = adu.byte_at(ADU_DATA_INDEX);
                let mut registers = Vec::new();
                for i in 0..(byte_count as usize / 2).min(8) {
                    registers.push(adu.word_at(ADU_DATA_INDEX + 1 + i * 2));
                }
                format!("Byte count: {}, Registers: {:04X?}", byte_count, registers)
            }
            0x05 => {
                let value = adu.word_at(ADU_DATA_INDEX + 2);
                format!(
                    "Address: {}, Value: 0x{:04X} ({})",
                    adu.starting_address(),
                    value,
                    if value != 0 { "ON" } else { "OFF" }
                )
            }
            0x06 => {
                let value = adu.word_at(ADU_DATA_INDEX + 2);
                format!("Address: {}, Value: {} (0x{:04X})", adu.starting_address(), value, value)
            }
            0x0F | 0x10 => {
                format!(
                    "Address: {}, Quantity: {}",
                    adu.starting_address(),
                    adu.quantity()
                )
            }
            _ => format!("Data: {}", hex::encode(adu.as_bytes())),
        };

        format!(
            "Modbus Response <- Device: 0x{:02X}, Function: {}, {}",
            adu.device_address(),
            Self::function_name(function_code),
            detail
        )
    }
}

impl Default for CallbackLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Convenience macro for creating a simple console logger
#[macro_export]
macro_rules! console_logger {
    () => {
        $crate::logging::CallbackLogger::console()
    };
}

/// Convenience macro for creating a custom logger
#[macro_export]
macro_rules! custom_logger {
    ($callback:expr) => {
        $crate::logging::CallbackLogger::new(Some($callback), $crate::logging::LogLevel::Info)
    };
    ($callback:expr, $level:expr) => {
        $crate::logging::CallbackLogger::new(Some($callback), $level)
    };
    ($callback:expr, $level:expr, $mode:expr) => {
        $crate::logging::CallbackLogger::with_mode(Some($callback), $level, $mode)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture_logger(mode: LoggingMode) -> (CallbackLogger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: LogCallback = Box::new(move |_level, message| {
            sink.lock().unwrap().push(message.to_string());
        });
        (
            CallbackLogger::with_mode(Some(callback), LogLevel::Debug, mode),
            lines,
        )
    }

    fn sample_request() -> ModbusAdu {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x03).unwrap();
        adu.push_word(0x006B).unwrap();
        adu.push_word(0x0002).unwrap();
        adu.set_crc().unwrap();
        adu
    }

    #[test]
    fn test_interpreted_request() {
        let (logger, lines) = capture_logger(LoggingMode::Interpreted);
        logger.log_request(&sample_request());

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Read Holding Registers"));
        assert!(lines[0].contains("Address: 107"));
        assert!(lines[0].contains("Quantity: 2"));
    }

    #[test]
    fn test_raw_mode_dumps_hex() {
        let (logger, lines) = capture_logger(LoggingMode::Raw);
        logger.log_request(&sample_request());

        let lines = lines.lock().unwrap();
        assert!(lines[0].contains("11 03 00 6B 00 02"));
    }

    #[test]
    fn test_exception_interpretation() {
        let (logger, lines) = capture_logger(LoggingMode::Interpreted);

        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.push(0x83).unwrap();
        adu.push_bytes(&[0x02]).unwrap();
        adu.set_crc().unwrap();
        logger.log_response(&adu);

        let lines = lines.lock().unwrap();
        assert!(lines[0].contains("Exception"));
        assert!(lines[0].contains("0x02"));
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        let (logger, lines) = capture_logger(LoggingMode::Both);
        drop(logger);

        let logger = CallbackLogger::disabled();
        logger.log_request(&sample_request());
        logger.info("nothing");
        assert!(lines.lock().unwrap().is_empty());
    }
}
