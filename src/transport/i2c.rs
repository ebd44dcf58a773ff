//! I2C adapter: one 7-bit device address bound at construction.

use embedded_hal::i2c::{Error as _, I2c};
use tracing::trace;

use super::Transport;
use crate::error::{Result, Si46xxError};

/// Lowest and highest non-reserved 7-bit addresses
const ADDRESS_MIN: u8 = 0x03;
const ADDRESS_MAX: u8 = 0x77;

/// I2C transport
///
/// Every call is its own bus transaction, so `release` has no effect.
pub struct I2cTransport<I> {
    i2c: I,
    address: u8,
}

impl<I> std::fmt::Debug for I2cTransport<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cTransport")
            .field("address", &format_args!("0x{:02X}", self.address))
            .finish_non_exhaustive()
    }
}

impl<I: I2c> I2cTransport<I> {
    /// Bind the bus to a device address
    ///
    /// # Arguments
    ///
    /// * `i2c` - Bus implementation
    /// * `address` - 7-bit device address
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the address is outside 0x03..=0x77
    pub fn new(i2c: I, address: u8) -> Result<Self> {
        if !(ADDRESS_MIN..=ADDRESS_MAX).contains(&address) {
            return Err(Si46xxError::InvalidArgument(format!(
                "I2C address 0x{:02X} out of range (0x{:02X}-0x{:02X})",
                address, ADDRESS_MIN, ADDRESS_MAX
            )));
        }
        Ok(Self { i2c, address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus
    pub fn release(self) -> I {
        self.i2c
    }
}

fn i2c_error<E: embedded_hal::i2c::Error>(e: E) -> Si46xxError {
    Si46xxError::Transport(format!("I2C {:?}", e.kind()))
}

impl<I: I2c> Transport for I2cTransport<I> {
    fn write(&mut self, data: &[u8], _release: bool) -> Result<()> {
        self.i2c.write(self.address, data).map_err(i2c_error)
    }

    fn read(&mut self, buf: &mut [u8], _release: bool) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.i2c.read(self.address, buf).map_err(i2c_error)
    }

    fn query(&mut self, request: &[u8], reply: &mut [u8]) -> Result<()> {
        self.i2c.write(self.address, request).map_err(i2c_error)?;
        self.i2c.read(self.address, reply).map_err(i2c_error)?;
        trace!("I2C query {:02X?} -> {:02X?}", request, reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x64;

    #[test]
    fn test_address_range() {
        for address in [0x00, 0x02, 0x78, 0x7F] {
            let mut bus = I2cMock::new(&[]);
            let result = I2cTransport::new(bus.clone(), address);
            assert!(
                matches!(result, Err(Si46xxError::InvalidArgument(_))),
                "address 0x{:02X} should be rejected",
                address
            );
            bus.done();
        }

        for address in [0x03, 0x64, 0x77] {
            let mut bus = I2cMock::new(&[]);
            let transport = I2cTransport::new(bus.clone(), address).unwrap();
            assert_eq!(transport.address(), address);
            bus.done();
        }
    }

    #[test]
    fn test_query_is_write_then_read() {
        let mut bus = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0x00]),
            I2cTransaction::read(ADDR, vec![0x80, 0x00, 0x00, 0xC0]),
        ]);

        let mut transport = I2cTransport::new(bus.clone(), ADDR).unwrap();
        let mut reply = [0u8; 4];
        transport.query(&[0x00], &mut reply).unwrap();
        assert_eq!(reply, [0x80, 0x00, 0x00, 0xC0]);

        bus.done();
    }

    #[test]
    fn test_write_and_read_ignore_release() {
        let mut bus = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0x09, 0x00]),
            I2cTransaction::read(ADDR, vec![0x12, 0x34]),
        ]);

        let mut transport = I2cTransport::new(bus.clone(), ADDR).unwrap();
        transport.write(&[0x09, 0x00], false).unwrap();
        let mut buf = [0u8; 2];
        transport.read(&mut buf, true).unwrap();
        assert_eq!(buf, [0x12, 0x34]);

        bus.done();
    }

    #[test]
    fn test_bus_error_maps_to_transport() {
        let mut bus = I2cMock::new(&[I2cTransaction::write(ADDR, vec![0x07, 0x00])
            .with_error(ErrorKind::Other)]);

        let mut transport = I2cTransport::new(bus.clone(), ADDR).unwrap();
        let err = transport.write(&[0x07, 0x00], true).unwrap_err();
        assert!(err.is_transport());

        bus.done();
    }
}
