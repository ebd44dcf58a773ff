//! # Error Types
//!
//! Custom error types for the Si46xx driver using `thiserror`.

use thiserror::Error;

use crate::protocol::reply::DeviceError;

/// Main error type for the Si46xx driver
#[derive(Debug, Error)]
pub enum Si46xxError {
    /// Byte exchange with the chip failed at the bus level
    #[error("Transport error: {0}")]
    Transport(String),

    /// A bounded wait ran out of iterations (CTS, tune, seek, RDS)
    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),

    /// The chip flagged an error in its status header
    #[error("Device error: {0}")]
    Protocol(DeviceError),

    /// Out-of-range input rejected before touching the bus
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A reply or record did not fit the buffer it was read from
    #[error("Truncated data: {0}")]
    Truncated(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors (firmware files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Si46xxError {
    /// True for errors raised by the bus itself.
    ///
    /// Retry loops use this to let transport failures escape immediately.
    pub fn is_transport(&self) -> bool {
        matches!(self, Si46xxError::Transport(_))
    }
}

/// Result type alias for the Si46xx driver
pub type Result<T> = std::result::Result<T, Si46xxError>;
