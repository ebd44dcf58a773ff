//! # Si46xx Control Library
//!
//! Driver for Si46xx AM/FM/DAB radio receivers over SPI or I2C.
//!
//! This library frames commands for the chip, polls its status register,
//! loads firmware images from the host or from external flash, and exposes
//! the tuning, RDS and DAB service operations of the running image.

pub mod channel;
pub mod config;
pub mod dab;
pub mod device;
pub mod error;
pub mod firmware;
pub mod flash;
pub mod logging;
pub mod protocol;
pub mod rds;
pub mod transport;
pub mod tuner;

pub use channel::CommandChannel;
pub use config::Config;
pub use device::Si46xx;
pub use error::{Result, Si46xxError};
pub use protocol::Mode;
pub use transport::{I2cTransport, SpiTransport, Transport};
