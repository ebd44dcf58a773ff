//! # Command Encoder
//!
//! Builds command frames and argument packets. All multi-byte fields are
//! little-endian.

use bytes::{BufMut, Bytes, BytesMut};

use super::opcodes::*;
use super::types::{FlashBlock, PowerUpArgs};
use crate::error::{Result, Si46xxError};

/// Frame a regular command: opcode followed by its argument packet
///
/// # Examples
///
/// ```
/// use si46xx_ctl::protocol::encoder::command_frame;
/// use si46xx_ctl::protocol::opcodes::GET_SYS_STATE;
///
/// let frame = command_frame(GET_SYS_STATE, &[0x00]);
/// assert_eq!(&frame[..], &[0x09, 0x00]);
/// ```
pub fn command_frame(cmd: u8, args: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(1 + args.len());
    frame.put_u8(cmd);
    frame.put_slice(args);
    frame.freeze()
}

/// Frame one HOST_LOAD chunk: opcode, three reserved zeros, image bytes
pub fn host_load_frame(chunk: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(HOST_LOAD_HEADER_LEN + chunk.len());
    frame.put_u8(HOST_LOAD);
    frame.put_bytes(0, HOST_LOAD_HEADER_LEN - 1);
    frame.put_slice(chunk);
    frame.freeze()
}

/// POWER_UP argument packet (15 bytes)
///
/// ```text
/// ARG1    CTSIEN(7)
/// ARG2    CLK_MODE(5:4) | TR_SIZE(3:0)
/// ARG3    IBIAS
/// ARG4-7  XTAL_FREQ (u32 le)
/// ARG8    CTUN
/// ARG9    0x10
/// ARG13   IBIAS_RUN
/// ```
pub fn power_up_args(args: &PowerUpArgs) -> Bytes {
    let mut buf = BytesMut::with_capacity(15);
    buf.put_u8(if args.cts_interrupt { 0x80 } else { 0x00 });
    buf.put_u8(((args.clk_mode & 0x03) << 4) | (args.tr_size & 0x0F));
    buf.put_u8(args.ibias);
    buf.put_u32_le(args.xtal_freq);
    buf.put_u8(args.ctun);
    buf.put_u8(0x10);
    buf.put_bytes(0, 3);
    buf.put_u8(args.ibias_run);
    buf.put_bytes(0, 2);
    buf.freeze()
}

/// SET_PROPERTY argument packet
pub fn set_property_args(id: u16, value: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(0);
    buf.put_u16_le(id);
    buf.put_u16_le(value);
    buf.freeze()
}

/// GET_PROPERTY argument packet for a single property
pub fn get_property_args(id: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(1);
    buf.put_u16_le(id);
    buf.freeze()
}

/// FM_TUNE_FREQ argument packet
///
/// The chip takes FM frequencies in 10 kHz units and an 8-bit antcap.
///
/// # Errors
///
/// Returns `InvalidArgument` if the frequency does not fit the 16-bit field
pub fn fm_tune_args(khz: u32, antcap: u16) -> Result<Bytes> {
    let units = u16::try_from(khz / 10).map_err(|_| {
        Si46xxError::InvalidArgument(format!("FM frequency {} kHz out of range", khz))
    })?;

    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(0);
    buf.put_u16_le(units);
    buf.put_u8((antcap & 0xFF) as u8);
    buf.put_u8(0);
    Ok(buf.freeze())
}

/// AM_TUNE_FREQ argument packet (frequency in kHz, 16-bit antcap)
///
/// # Errors
///
/// Returns `InvalidArgument` if the frequency does not fit the 16-bit field
pub fn am_tune_args(khz: u32, antcap: u16) -> Result<Bytes> {
    let khz16 = u16::try_from(khz).map_err(|_| {
        Si46xxError::InvalidArgument(format!("AM frequency {} kHz out of range", khz))
    })?;

    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(0);
    buf.put_u16_le(khz16);
    buf.put_u16_le(antcap);
    Ok(buf.freeze())
}

/// DAB_TUNE_FREQ argument packet (index into the installed frequency list)
pub fn dab_tune_args(index: u8, antcap: u8) -> Bytes {
    Bytes::copy_from_slice(&[0, index, 0, antcap, 0])
}

/// AM/FM SEEK_START argument packet
pub fn seek_args(up: bool, wrap: bool) -> Bytes {
    let flags = ((up as u8) << 1) | (wrap as u8);
    Bytes::copy_from_slice(&[0, flags, 0, 0, 0])
}

/// DAB_SET_FREQ_LIST argument packet
///
/// # Errors
///
/// Returns `InvalidArgument` unless 1 to 48 frequencies are given
pub fn set_freq_list_args(freqs_khz: &[u32]) -> Result<Bytes> {
    if freqs_khz.is_empty() || freqs_khz.len() > DAB_MAX_FREQUENCIES {
        return Err(Si46xxError::InvalidArgument(format!(
            "frequency list must hold 1 to {} entries, got {}",
            DAB_MAX_FREQUENCIES,
            freqs_khz.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(3 + 4 * freqs_khz.len());
    buf.put_u8(freqs_khz.len() as u8);
    buf.put_bytes(0, 2);
    for &freq in freqs_khz {
        buf.put_u32_le(freq);
    }
    Ok(buf.freeze())
}

/// START_DIGITAL_SERVICE argument packet
pub fn start_service_args(service_id: u32, component_id: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(11);
    buf.put_bytes(0, 3);
    buf.put_u32_le(service_id);
    buf.put_u32_le(component_id);
    buf.freeze()
}

/// DAB_GET_SERVICE_LINKING_INFO argument packet
pub fn service_linking_args(service_id: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(7);
    buf.put_bytes(0, 3);
    buf.put_u32_le(service_id);
    buf.freeze()
}

/// Flash utility: erase the whole chip
pub fn flash_erase_chip_args() -> Bytes {
    Bytes::from_static(&FLASH_ERASE_CHIP)
}

/// Flash utility: erase the sector containing `addr`
pub fn flash_erase_sector_args(addr: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(7);
    buf.put_slice(&FLASH_ERASE_SECTOR);
    buf.put_u32_le(addr);
    buf.freeze()
}

/// Flash utility: read a bootloader property
pub fn flash_property_get_args(id: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(FLASH_GET_PROPERTY);
    buf.put_u16_le(id);
    buf.freeze()
}

/// Flash utility: write one block
///
/// ```text
/// [0xF1 verify | 0xF0] 0x0C 0xED | CRC32 | OFFSET | SIZE | DATA...
/// ```
///
/// The CRC field is zero when verification is off.
///
/// # Errors
///
/// Returns `InvalidArgument` if `size` exceeds 4084 bytes or disagrees
/// with the payload length
pub fn flash_write_args(block: &FlashBlock) -> Result<Bytes> {
    if block.size as usize > FLASH_MAX_BLOCK_SIZE {
        return Err(Si46xxError::InvalidArgument(format!(
            "flash block of {} bytes exceeds maximum {}",
            block.size, FLASH_MAX_BLOCK_SIZE
        )));
    }
    if block.size as usize != block.payload.len() {
        return Err(Si46xxError::InvalidArgument(format!(
            "flash block size {} does not match payload length {}",
            block.size,
            block.payload.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(15 + block.payload.len());
    buf.put_u8(if block.verify {
        FLASH_WRITE_BLOCK_VERIFY
    } else {
        FLASH_WRITE_BLOCK
    });
    buf.put_slice(&FLASH_WRITE_MAGIC);
    buf.put_u32_le(if block.verify { block.crc32 } else { 0 });
    buf.put_u32_le(block.offset);
    buf.put_u32_le(block.size);
    buf.put_slice(&block.payload);
    Ok(buf.freeze())
}

/// FLASH_LOAD argument packet: boot image at `offset`
pub fn flash_load_args(offset: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(11);
    buf.put_bytes(0, 3);
    buf.put_u32_le(offset);
    buf.put_u32_le(0);
    buf.freeze()
}
