//! # Thermo Modbus - Async Modbus TCP Client for Thermal Process Controllers
//!
//! **Author:** Evan Liu <evan.liu@voltageenergy.com>
//! **Version:** 0.3.0
//! **License:** MIT
//!
//! An async Modbus TCP client in pure Rust, specialized for reading and writing
//! process values (temperatures, setpoints, output percentages) on multi-zone
//! oven controllers behind a Modbus TCP gateway.
//!
//! ## Features
//!
//! - **🚀 Async Throughout**: Built on Tokio, non-blocking from connect to close
//! - **🔒 Serialized Exchanges**: One in-flight request per connection, FIFO admission
//! - **📦 Transparent Chunking**: Oversized reads/writes split into protocol-legal frames
//! - **🔄 Shared Connection Task**: Concurrent callers share one connection attempt
//! - **🛡️ Memory Safe**: Pure Rust implementation with zero unsafe code
//! - **📊 Built-in Monitoring**: Transport statistics and packet logging
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Supported |
//! |------|----------|-----------|
//! | 0x01 | Read Coils | ✅ |
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x05 | Write Single Coil | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! Only the function codes the gateway driver needs are implemented. Requesting
//! anything else is a caller defect and surfaces as
//! [`ModbusError::Unsupported`](error::ModbusError::Unsupported).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thermo_modbus::{GatewayClient, GatewayConfig, ModbusResult};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     // Construction starts the connection attempt in the background
//!     let client = GatewayClient::connect(GatewayConfig::new("192.168.1.101"));
//!
//!     // Reads larger than one frame are chunked transparently
//!     let values = client.read_registers(360, 200).await?;
//!     println!("Read {} registers", values.len());
//!
//!     client.write_registers(2160, &[0x41C8, 0x0000], false).await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Register Driver    │  (external: zone addressing, float codec)
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │   GatewayClient     │  chunking: 124-register reads, 62-value writes
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │   GatewaySession    │  connect task sharing, FIFO serialization,
//! └─────────────────────┘  error translation
//!           │
//! ┌─────────────────────┐
//! │    TcpTransport     │  MBAP framing, timeouts, reconnect
//! └─────────────────────┘
//! ```

/// Core error types and result handling
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod error;

/// Modbus protocol definitions and message handling
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod protocol;

/// Gateway endpoint configuration
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod config;

/// Network transport layer for TCP communication
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod transport;

/// Connection lifecycle and request serialization
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod session;

/// High-level gateway client with frame chunking
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod client;

/// Callback logging for host applications
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod logging;

/// Utility helpers and operation timing
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod utils;

// Re-export main types for convenience
pub use error::{ModbusError, ModbusResult};
pub use protocol::{ModbusRequest, ModbusResponse, ModbusFunction};
pub use config::GatewayConfig;
pub use transport::{ModbusTransport, TcpTransport, TransportStats};
pub use session::{ConnectionState, GatewaySession};
pub use client::GatewayClient;
pub use logging::{LogLevel, LogCallback, CallbackLogger, LoggingMode};
pub use utils::OperationTimer;

/// Default timeout for connect and exchange operations (1 second)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Protocol ceiling: registers returned in a single read response (250 bytes)
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

/// Registers requested per chunk when splitting an oversized read
pub const READ_CHUNK_REGISTERS: u16 = 124;

/// Values carried per chunk when splitting an oversized multi-register write
pub const WRITE_CHUNK_REGISTERS: usize = 62;

/// Address advance between write chunks (two registers per process value)
pub const WRITE_CHUNK_STRIDE: u16 = 124;

/// Maximum Modbus TCP frame size (MBAP header + PDU)
pub const MAX_TCP_FRAME_SIZE: usize = 260;

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Thermo Modbus v{} - async Modbus TCP client for thermal controllers by Evan Liu", VERSION)
}
