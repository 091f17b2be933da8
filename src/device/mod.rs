//! DAC simulator board control over a serial line.
//!
//! ```text
//!  DacCommand ──encode──▶ DacBoard ──bytes──▶ DeviceLink ──▶ serial port
//!                            │
//!                            └── sleep, then require ≥1 byte waiting
//! ```

pub mod board;
pub mod command;
pub mod serial;

#[cfg(test)]
pub mod mock;

use thiserror::Error;

pub use board::DacBoard;
pub use command::DacCommand;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device took too long to respond to '{0}'")]
    NoResponse(String),
    #[error("no Arduino serial port found")]
    PortNotFound,
    #[error("RTD mux needs exactly 5 bits of 0/1, got {0:?}")]
    BadRtdBits(Vec<u8>),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte transport to the board. Implemented for real serial ports and for
/// the in-memory mock used in tests.
pub trait DeviceLink {
    fn write_all(&mut self, bytes: &[u8]) -> DeviceResult<()>;

    /// Number of received bytes waiting to be read.
    fn bytes_waiting(&mut self) -> DeviceResult<u32>;

    /// Drain everything currently waiting.
    fn read_waiting(&mut self) -> DeviceResult<Vec<u8>>;
}
