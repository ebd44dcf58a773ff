//! # Flash Programmer
//!
//! Drives the bootloader's flash utility (sub-commands of FLASH_LOAD):
//! erase, property read, CRC-guarded block writes and boot-from-flash.
//!
//! Every operation requires the chip to be in bootloader mode.

use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::error::{Result, Si46xxError};
use crate::firmware::{FirmwareLoader, DEFAULT_SETTLE_MS};
use crate::protocol::crc::flash_block_crc;
use crate::protocol::decoder::decode_property_value;
use crate::protocol::encoder::{
    flash_erase_chip_args, flash_erase_sector_args, flash_load_args, flash_property_get_args,
    flash_write_args,
};
use crate::protocol::opcodes::{
    BL_PROPERTIES, BOOT, FLASH_LOAD, FLASH_WRITE_CHUNK_SIZE, STATUS_HEADER_LEN,
};
use crate::protocol::types::FlashBlock;
use crate::transport::Transport;

/// Boot retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicy {
    pub attempts: u32,
    /// Wait after each BOOT before reading its reply
    pub retry_delay_ms: u32,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            retry_delay_ms: 300,
        }
    }
}

/// Boot the loaded image, retrying on device errors and timeouts
///
/// Transport errors end the loop at once.
///
/// # Errors
///
/// Returns the last attempt's error if every attempt fails
pub fn boot<T: Transport, D: DelayNs>(
    channel: &mut CommandChannel<T, D>,
    policy: BootPolicy,
) -> Result<()> {
    let mut last_err = Si46xxError::Timeout("BOOT");

    for attempt in 1..=policy.attempts.max(1) {
        debug!("BOOT attempt {}/{}", attempt, policy.attempts);
        let result = channel.send(BOOT, &[0x00]).and_then(|_| {
            channel.delay_ms(policy.retry_delay_ms);
            channel.read_reply(STATUS_HEADER_LEN)
        });

        match result {
            Ok(_) => {
                info!("Boot complete after {} attempt(s)", attempt);
                return Ok(());
            }
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                warn!("BOOT attempt {} failed: {}", attempt, e);
                last_err = e;
            }
        }
    }

    Err(last_err)
}

/// Flash utility over a borrowed command channel
pub struct FlashProgrammer<'a, T, D> {
    channel: &'a mut CommandChannel<T, D>,
    boot_policy: BootPolicy,
    settle_ms: u32,
}

impl<'a, T: Transport, D: DelayNs> FlashProgrammer<'a, T, D> {
    pub fn new(channel: &'a mut CommandChannel<T, D>) -> Self {
        Self {
            channel,
            boot_policy: BootPolicy::default(),
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }

    pub fn with_boot_policy(mut self, policy: BootPolicy) -> Self {
        self.boot_policy = policy;
        self
    }

    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    fn utility(&mut self, args: &[u8], reply_len: usize) -> Result<Vec<u8>> {
        self.channel.send(FLASH_LOAD, args)?;
        Ok(self.channel.poll_reply(reply_len)?.raw)
    }

    /// Erase the whole flash
    pub fn erase_chip(&mut self) -> Result<()> {
        info!("Erasing flash");
        self.utility(&flash_erase_chip_args(), STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Erase the sector containing `addr`
    pub fn erase_sector(&mut self, addr: u32) -> Result<()> {
        info!("Erasing flash sector at 0x{:08X}", addr);
        self.utility(&flash_erase_sector_args(addr), STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Read one bootloader flash property
    pub fn property_get(&mut self, id: u16) -> Result<u16> {
        let reply = self.utility(&flash_property_get_args(id), 6)?;
        let value = decode_property_value(&reply)?;
        debug!("Flash property 0x{:04X} = 0x{:04X}", id, value);
        Ok(value)
    }

    /// Read every bootloader flash property
    ///
    /// # Returns
    ///
    /// * `Result<Vec<(u16, u16)>>` - (property id, value) pairs
    pub fn dump_properties(&mut self) -> Result<Vec<(u16, u16)>> {
        BL_PROPERTIES
            .iter()
            .map(|&id| self.property_get(id).map(|value| (id, value)))
            .collect()
    }

    /// Write one block
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for blocks over 4084 bytes, before anything
    /// is sent
    pub fn write_block(&mut self, block: &FlashBlock) -> Result<()> {
        let args = flash_write_args(block)?;
        debug!(
            "Flash write {} bytes at 0x{:08X} (verify: {})",
            block.size, block.offset, block.verify
        );
        self.utility(&args, STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Write a whole image in verified 2048-byte blocks
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of blocks written
    pub fn write_image(&mut self, offset: u32, image: &[u8]) -> Result<usize> {
        info!("Flashing {} bytes at 0x{:08X}", image.len(), offset);

        let mut blocks = 0;
        for (index, chunk) in image.chunks(FLASH_WRITE_CHUNK_SIZE).enumerate() {
            let block_offset = offset + (index * FLASH_WRITE_CHUNK_SIZE) as u32;
            let block = FlashBlock::new(block_offset, chunk.to_vec(), flash_block_crc(chunk), true);
            self.write_block(&block)?;
            blocks += 1;
        }
        Ok(blocks)
    }

    /// Boot the currently loaded image
    pub fn boot(&mut self) -> Result<()> {
        boot(self.channel, self.boot_policy)
    }

    /// Load the image stored at `offset` and boot it
    pub fn load_and_boot(&mut self, offset: u32) -> Result<()> {
        info!("Booting from flash at 0x{:08X}", offset);
        FirmwareLoader::new(self.channel)
            .with_settle_ms(self.settle_ms)
            .load_init()?;
        self.utility(&flash_load_args(offset), STATUS_HEADER_LEN)?;
        self.boot()
    }
}
