//! # Bus Transport
//!
//! Byte-exchange capability the command channel runs on.
//!
//! Two adapters are provided:
//! - [`SpiTransport`] over an `embedded-hal` SPI bus plus a chip-select pin
//! - [`I2cTransport`] over an `embedded-hal` I2C bus with one bound address
//!
//! The chip speaks the same command set over both; only the framing of a
//! status-register read differs, and that difference lives in
//! [`Transport::query`].

mod i2c;
mod spi;

pub use i2c::I2cTransport;
pub use spi::SpiTransport;

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::error::Result;

/// Synchronous byte exchange with the chip
///
/// `release` ends the bus transaction after the call (SPI: flush and raise
/// chip select). Passing `false` keeps the transaction open so a following
/// call continues the same exchange.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Send bytes to the chip
    fn write(&mut self, data: &[u8], release: bool) -> Result<()>;

    /// Receive `buf.len()` bytes from the chip
    fn read(&mut self, buf: &mut [u8], release: bool) -> Result<()>;

    /// Status-register exchange: send `request`, fill `reply`, end the
    /// transaction
    fn query(&mut self, request: &[u8], reply: &mut [u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8], release: bool) -> Result<()> {
        (**self).write(data, release)
    }

    fn read(&mut self, buf: &mut [u8], release: bool) -> Result<()> {
        (**self).read(buf, release)
    }

    fn query(&mut self, request: &[u8], reply: &mut [u8]) -> Result<()> {
        (**self).query(request, reply)
    }
}

/// Host delay backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }
}
