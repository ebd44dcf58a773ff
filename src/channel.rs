//! # Command Channel
//!
//! Frames commands onto a [`Transport`], polls the status register for
//! clear-to-send and decodes the reply header.
//!
//! The chip carries no request identifiers, so replies must be consumed in
//! the order commands were issued. The channel owns its transport
//! exclusively; every exchange goes through `&mut self`.

use embedded_hal::delay::DelayNs;
use tracing::{debug, trace, warn};

use crate::error::{Result, Si46xxError};
use crate::protocol::encoder::{command_frame, host_load_frame};
use crate::protocol::opcodes::{
    command_name, DYNAMIC_HEADER_LEN, DYNAMIC_MAX_PAYLOAD, RD_REPLY, STATUS_CTS,
    STATUS_HEADER_LEN,
};
use crate::protocol::reply::{decode_error, CommandReply};
use crate::transport::Transport;

/// Status poll budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTiming {
    /// Status reads before giving up on CTS
    pub max_polls: u32,
    /// Pause between status reads
    pub poll_interval_us: u32,
}

impl Default for ChannelTiming {
    fn default() -> Self {
        Self {
            max_polls: 1000,
            poll_interval_us: 20,
        }
    }
}

/// Command/reply engine over one transport
pub struct CommandChannel<T, D> {
    transport: T,
    delay: D,
    timing: ChannelTiming,
    /// Bit 7 of the last status byte seen
    pending: bool,
}

impl<T, D> std::fmt::Debug for CommandChannel<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("timing", &self.timing)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, D: DelayNs> CommandChannel<T, D> {
    pub fn new(transport: T, delay: D) -> Self {
        Self::with_timing(transport, delay, ChannelTiming::default())
    }

    pub fn with_timing(transport: T, delay: D, timing: ChannelTiming) -> Self {
        Self {
            transport,
            delay,
            timing,
            pending: false,
        }
    }

    pub fn timing(&self) -> ChannelTiming {
        self.timing
    }

    /// True if the last status read had bit 7 set
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Take the channel apart
    pub fn into_parts(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Sleep on the injected delay
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Send a regular command
    ///
    /// Checks that the chip is idle first. Nothing is written unless that
    /// check sees CTS.
    ///
    /// # Arguments
    ///
    /// * `cmd` - Opcode
    /// * `args` - Argument packet
    ///
    /// # Errors
    ///
    /// * `Protocol` - Busy check saw the error bit without CTS
    /// * `Timeout` - Chip never became ready
    /// * Any transport error unchanged
    pub fn send(&mut self, cmd: u8, args: &[u8]) -> Result<()> {
        if let Err(e) = self.poll_reply(STATUS_HEADER_LEN) {
            if let Si46xxError::Protocol(err) = &e {
                warn!("Busy check before {} reported {}", command_name(cmd), err);
            }
            return Err(e);
        }

        let frame = command_frame(cmd, args);
        debug!("-> {} ({} arg bytes)", command_name(cmd), args.len());
        trace!("-> {:02X?}", &frame[..]);
        self.transport.write(&frame, true)
    }

    /// Send one HOST_LOAD chunk, without a busy check
    pub fn write_host_load(&mut self, chunk: &[u8]) -> Result<()> {
        let frame = host_load_frame(chunk);
        trace!("-> HOST_LOAD {} bytes", chunk.len());
        self.transport.write(&frame, true)
    }

    /// Poll the status register until the chip answers
    ///
    /// Each poll reads `expected_len` bytes. CTS wins over the error bit;
    /// an error bit without CTS ends the wait at once.
    ///
    /// # Returns
    ///
    /// * `Result<CommandReply>` - Raw reply, header included
    ///
    /// # Errors
    ///
    /// * `Protocol` - Error bit set while CTS is clear
    /// * `Timeout` - CTS never seen within `max_polls` reads
    pub fn poll_reply(&mut self, expected_len: usize) -> Result<CommandReply> {
        let mut buf = vec![0u8; expected_len.max(1)];

        self.delay.delay_us(self.timing.poll_interval_us);
        for _ in 0..self.timing.max_polls {
            self.transport.query(&[RD_REPLY], &mut buf)?;
            self.pending = buf[0] & STATUS_CTS != 0;

            if self.pending {
                trace!("<- {:02X?}", &buf);
                return Ok(CommandReply::new(buf));
            }
            if let Some(err) = decode_error(&buf) {
                debug!("<- error without CTS: {}", err);
                return Err(Si46xxError::Protocol(err));
            }
            self.delay.delay_us(self.timing.poll_interval_us);
        }

        warn!("Timeout waiting for CTS after {} polls", self.timing.max_polls);
        Err(Si46xxError::Timeout("CTS"))
    }

    /// Poll for a reply and reject it if the header reports an error
    ///
    /// # Errors
    ///
    /// As [`Self::poll_reply`], plus `Protocol` when CTS arrives together
    /// with the error bit
    pub fn read_reply(&mut self, len: usize) -> Result<CommandReply> {
        let reply = self.poll_reply(len)?;
        if let Some(err) = reply.device_error() {
            warn!("Device reported {}", err);
            for cause in err.causes() {
                debug!("  cause: {}", cause);
            }
            return Err(Si46xxError::Protocol(err));
        }
        Ok(reply)
    }

    /// Send a command and read its checked reply
    pub fn command(&mut self, cmd: u8, args: &[u8], reply_len: usize) -> Result<CommandReply> {
        self.send(cmd, args)?;
        self.read_reply(reply_len)
    }

    /// Read a reply whose length is given in its own header
    ///
    /// One RD_REPLY byte, a 6-byte header with the payload length at offset 4,
    /// then the payload, all inside one bus transaction. A declared length
    /// above 3000 is treated as corrupt and read as 0.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<u8>>` - Header followed by payload (at most 3006 bytes)
    pub fn read_dynamic(&mut self) -> Result<Vec<u8>> {
        let mut data = vec![0u8; DYNAMIC_HEADER_LEN];

        self.transport.write(&[RD_REPLY], false)?;
        self.transport.read(&mut data, false)?;

        let mut len = u16::from_le_bytes([data[4], data[5]]) as usize;
        if len > DYNAMIC_MAX_PAYLOAD {
            warn!("Dynamic reply declares {} bytes, treating as corrupt", len);
            len = 0;
        }

        data.resize(DYNAMIC_HEADER_LEN + len, 0);
        self.transport.read(&mut data[DYNAMIC_HEADER_LEN..], true)?;

        debug!("<- dynamic reply, {} payload bytes", len);
        Ok(data)
    }
}
