//! # Voltage RTU - Modbus RTU Protocol Engine
//!
//! **Author:** Evan Liu <evan.liu@voltageenergy.com>
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! A Modbus RTU protocol engine in pure Rust: the byte-exact ADU codec,
//! CRC-16 framing, a polled server dispatch state machine and a client
//! transaction driver for half-duplex serial links. Server and client roles
//! can share one physical bus, one exchange at a time.
//!
//! ## Features
//!
//! - **🧱 Byte-Exact Framing**: fixed-capacity ADU buffer with typed field
//!   accessors and explicit length tracking
//! - **🔁 Polled Server**: one request handled per `poll()`, silent drops for
//!   frames that are corrupt, misaddressed or carry the exception bit
//! - **📡 Transaction Client**: build / send / receive / validate pipeline
//!   with exception detection and packed-payload decoding
//! - **🗂 Sparse Register Tables**: non-contiguous address sets, linear
//!   lookup, per-kind capacity caps
//! - **🔌 Transport Agnostic**: any byte port behind the [`SerialPort`]
//!   trait; an in-memory [`LoopbackPort`] ships for tests and demos
//! - **📊 Built-in Statistics**: link, server and transaction counters
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client | Server |
//! |------|----------|--------|--------|
//! | 0x01 | Read Coils | ✅ | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ | ✅ |
//! | 0x03 | Read Holding Registers | ✅ | ✅ |
//! | 0x04 | Read Input Registers | ✅ | ✅ |
//! | 0x05 | Write Single Coil | ✅ | ✅ |
//! | 0x06 | Write Single Register | ✅ | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ | ✅ |
//!
//! Anything else is answered with exception 0x01 (Illegal Function).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_rtu::{
//!     LoopbackPort, ModbusClient, ModbusRtuClient, ModbusRtuServer, RtuLink,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (server_port, client_port) = LoopbackPort::pair();
//!
//!     // Server side: device 0x11 with ten holding registers.
//!     let mut server = ModbusRtuServer::new(RtuLink::new(server_port, 0x11));
//!     let bank = server.register_bank();
//!     bank.configure_holding_registers(0x0000, 10)?;
//!
//!     tokio::spawn(async move {
//!         loop {
//!             let _ = server.poll().await;
//!         }
//!     });
//!
//!     // Client side: talk to device 0x11.
//!     let mut link = RtuLink::new(client_port, 0x01);
//!     link.set_remote_address(0x11);
//!     let mut client = ModbusRtuClient::new(link);
//!
//!     client.write_single_register(0x0000, 0x1234).await?;
//!     let values = client.read_holding_registers(0x0000, 10).await?;
//!     println!("registers: {:?}", values);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐                      ┌─────────────────┐
//! │   Application   │                      │   Application   │
//! └─────────────────┘                      └─────────────────┘
//!          │                                        │
//! ┌─────────────────┐                      ┌─────────────────┐
//! │   RTU Client    │                      │   RTU Server    │
//! │  (transactions) │                      │  (poll/dispatch)│
//! └─────────────────┘                      └─────────────────┘
//!          │                                        │
//! ┌─────────────────┐                      ┌─────────────────┐
//! │    RtuLink      │                      │  Register Bank  │
//! │ (ADU + CRC-16)  │                      │ (sparse tables) │
//! └─────────────────┘                      └─────────────────┘
//!          │                                        │
//! ┌─────────────────┐      half-duplex     ┌─────────────────┐
//! │   SerialPort    │◄────────────────────►│    RtuLink      │
//! │  (byte stream)  │                      │  + SerialPort   │
//! └─────────────────┘                      └─────────────────┘
//! ```

/// Core error types and result handling
pub mod error;

/// Modbus protocol definitions and ADU frame handling
pub mod protocol;

/// Serial link layer: port trait, loopback port and the RTU link
pub mod transport;

/// Modbus RTU client implementation
pub mod client;

/// Modbus RTU server implementation
pub mod server;

/// Sparse register storage for server applications
pub mod register_bank;

/// Utility functions and performance monitoring
pub mod utils;

/// Callback logging system
pub mod logging;

// Re-export main types for convenience
pub use client::{ModbusClient, ModbusRtuClient};
pub use error::{ModbusError, ModbusResult};
pub use logging::{CallbackLogger, LogCallback, LogLevel, LoggingMode};
pub use protocol::{AduKind, ModbusAdu, ModbusException, ModbusFunction};
pub use register_bank::{ModbusRegisterBank, RegisterBankStats};
pub use server::{ModbusRtuServer, ServerStats};
pub use transport::{LoopbackPort, RtuLink, SerialPort, TransportStats};
pub use utils::{OperationTimer, PerformanceMetrics};

/// Default client receive timeout in milliseconds
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;

/// Default server poll window in milliseconds
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

/// Maximum Modbus RTU frame size
pub const MAX_RTU_FRAME_SIZE: usize = 256;

/// Maximum number of coils or discrete inputs in a single read request
pub const MAX_READ_COILS: u16 = 0x07D0;

/// Maximum number of registers in a single read request
pub const MAX_READ_REGISTERS: u16 = 0x007D;

/// Maximum number of coils in a single write request
pub const MAX_WRITE_COILS: u16 = 0x07B0;

/// Maximum number of registers in a single write request
pub const MAX_WRITE_REGISTERS: u16 = 0x007B;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Voltage RTU v{} - Modbus RTU protocol engine", VERSION)
}
