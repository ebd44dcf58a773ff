//! SPI adapter: `SpiBus` plus a manually driven chip-select line.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as _, SpiBus};
use tracing::{trace, warn};

use super::Transport;
use crate::error::{Result, Si46xxError};

/// SPI transport
///
/// Chip select is driven by hand so that one logical exchange can span
/// several bus calls (the dynamic reply read needs this). CS goes low on
/// the first call of an exchange and back high after the call that passes
/// `release = true`.
pub struct SpiTransport<SPI, CS> {
    spi: SPI,
    cs: CS,
    selected: bool,
}

impl<SPI, CS> std::fmt::Debug for SpiTransport<SPI, CS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiTransport")
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl<SPI, CS> SpiTransport<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            spi,
            cs,
            selected: false,
        }
    }

    /// Give back the bus and the chip-select pin
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self) -> Result<()> {
        if !self.selected {
            self.cs
                .set_low()
                .map_err(|e| Si46xxError::Transport(format!("chip select: {:?}", e)))?;
            self.selected = true;
        }
        Ok(())
    }

    /// Drop chip select after a failed bus call
    fn abort(&mut self, err: Si46xxError) -> Si46xxError {
        if let Err(e) = self.cs.set_high() {
            warn!("chip select release after bus error failed: {:?}", e);
        }
        self.selected = false;
        err
    }

    fn finish(&mut self, release: bool) -> Result<()> {
        if release {
            if let Err(e) = self.spi.flush() {
                return Err(self.abort(spi_error(e)));
            }
            self.cs
                .set_high()
                .map_err(|e| Si46xxError::Transport(format!("chip select: {:?}", e)))?;
            self.selected = false;
        }
        Ok(())
    }
}

fn spi_error<E: embedded_hal::spi::Error>(e: E) -> Si46xxError {
    Si46xxError::Transport(format!("SPI {:?}", e.kind()))
}

impl<SPI, CS> Transport for SpiTransport<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    fn write(&mut self, data: &[u8], release: bool) -> Result<()> {
        self.select()?;
        if !data.is_empty() {
            if let Err(e) = self.spi.write(data) {
                return Err(self.abort(spi_error(e)));
            }
        }
        self.finish(release)
    }

    fn read(&mut self, buf: &mut [u8], release: bool) -> Result<()> {
        self.select()?;
        if !buf.is_empty() {
            if let Err(e) = self.spi.read(buf) {
                return Err(self.abort(spi_error(e)));
            }
        }
        self.finish(release)
    }

    /// One full-duplex transfer; bytes clocked in while the request goes
    /// out are discarded
    fn query(&mut self, request: &[u8], reply: &mut [u8]) -> Result<()> {
        let mut frame = vec![0u8; request.len() + reply.len()];
        frame[..request.len()].copy_from_slice(request);

        self.select()?;
        if let Err(e) = self.spi.transfer_in_place(&mut frame) {
            return Err(self.abort(spi_error(e)));
        }
        self.finish(true)?;

        reply.copy_from_slice(&frame[request.len()..]);
        trace!("SPI query {:02X?} -> {:02X?}", request, reply);
        Ok(())
    }
}
