use std::sync::Arc;

use crate::protocol::{ModbusFunction, ModbusRequest, ModbusResponse};

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

/// Logging mode for exchange display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Show raw packet data only
    Raw,
    /// Show interpreted packet data with field descriptions
    Interpreted,
    /// Show both raw and interpreted data
    Both,
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

/// Type alias for log callback functions
///
/// The callback receives a log level and message string
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Logger that hands gateway exchanges to a host-application callback
///
/// Host applications (HMIs, historians) often want the exchange stream in
/// their own logging pipeline; this mirrors each request/response pair to a
/// callback without touching the tracing-based packet logging inside the
/// transport.
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

    /// Create a new callback logger with specific mode
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

    /// Check if a message at the given level should be logged
    fn should_log(&self, level: LogLevel) -> bool {
        self.callback.is_some() && level as u8 <= self.min_level as u8
    }

    /// Log a gateway request
    pub fn log_request(&self, request: &ModbusRequest) {
        match self.mode {
            LoggingMode::Raw => {
                self.info(&format!("Gateway Request -> Raw: {}", self.raw_request(request)));
            }
            LoggingMode::Interpreted => {
                self.info(&self.interpret_request(request));
            }
            LoggingMode::Both => {
                self.info(&self.interpret_request(request));
                self.debug(&format!("Gateway Request -> Raw: {}", self.raw_request(request)));
            }
        }
    }

    /// Log a gateway response
    pub fn log_response(&self, response: &ModbusResponse) {
        match self.mode {
            LoggingMode::Raw => {
                self.info(&format!("Gateway Response <- Raw: {}", hex::encode(&response.data)));
            }
            LoggingMode::Interpreted => {
                self.info(&self.interpret_response(response));
            }
            LoggingMode::Both => {
                self.info(&self.interpret_response(response));
                self.debug(&format!("Gateway Response <- Raw: {}", hex::encode(&response.data)));
            }
        }
    }

    fn raw_request(&self, request: &ModbusRequest) -> String {
        let mut packet = Vec::with_capacity(4 + request.data.len());
        packet.push(request.function.to_u8());
        packet.extend_from_slice(&request.address.to_be_bytes());
        packet.extend_from_slice(&request.quantity.to_be_bytes());
        packet.extend_from_slice(&request.data);
        hex::encode(packet)
    }

    /// Interpret a request based on function kind
    ///
    /// Pre-encoded payloads (encode_skip) are shown as raw hex only; the
    /// caller owns their encoding and decoding them here would be misleading.
    fn interpret_request(&self, request: &ModbusRequest) -> String {
        let head = format!(
            "Gateway Request -> Function: {}, Address: {}, Quantity: {}",
            request.function, request.address, request.quantity
        );

        if request.data.is_empty() {
            return head;
        }

        if request.encode_skip {
            return format!("{}, Payload (pre-encoded): {}", head, hex::encode(&request.data));
        }

        match request.function {
            ModbusFunction::WriteSingleRegister | ModbusFunction::WriteMultipleRegisters => {
                let mut registers = Vec::new();
                for chunk in request.data.chunks(2) {
                    if chunk.len() == 2 {
                        registers.push(u16::from_be_bytes([chunk[0], chunk[1]]));
                    }
                }
                format!("{}, Values: {:?}", head, &registers[..registers.len().min(8)])
            }
            ModbusFunction::WriteSingleCoil => {
                let on = !request.data.is_empty() && request.data[0] != 0;
                format!("{}, Value: {}", head, if on { "ON" } else { "OFF" })
            }
            _ => format!("{}, Payload: {}", head, hex::encode(&request.data)),
        }
    }

    /// Interpret a response based on function kind
    fn interpret_response(&self, response: &ModbusResponse) -> String {
        let head = format!("Gateway Response <- Function: {}", response.function);

        if let Some(exception) = response.exception {
            return format!("{}, Exception: 0x{:02X}", head, exception.to_u8());
        }

        let data = &response.data;
        if data.is_empty() {
            return format!("{}, No data", head);
        }

        match response.function {
            ModbusFunction::ReadCoils => {
                match response.parse_bits() {
                    Ok(coils) => format!(
                        "{}, Coils: {:?}", head, &coils[..coils.len().min(16)]
                    ),
                    Err(_) => format!("{}, Data: {}", head, hex::encode(data)),
                }
            }
            ModbusFunction::ReadHoldingRegisters => {
                match response.parse_registers() {
                    Ok(registers) => format!(
                        "{}, Registers: {:?}", head, &registers[..registers.len().min(8)]
                    ),
                    Err(_) => format!("{}, Data: {}", head, hex::encode(data)),
                }
            }
            ModbusFunction::WriteSingleCoil |
            ModbusFunction::WriteSingleRegister |
            ModbusFunction::WriteMultipleCoils |
            ModbusFunction::WriteMultipleRegisters => {
                match response.parse_write_echo() {
                    Ok((address, value)) => format!(
                        "{}, Address: {}, Echo: 0x{:04X}", head, address, value
                    ),
                    Err(_) => format!("{}, Data: {}", head, hex::encode(data)),
                }
            }
        }
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
