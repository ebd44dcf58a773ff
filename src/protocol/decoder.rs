//! # Status Decoders
//!
//! Fixed-offset decoders for the chip's status replies. Every decoder takes
//! the full reply (status header included) and checks its length first.

use bytes::Buf;

use super::opcodes::FLASH_WRITE_BLOCK_VERIFY;
use super::types::*;
use crate::error::{Result, Si46xxError};

fn require(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        return Err(Si46xxError::Truncated(format!(
            "{} reply needs {} bytes, got {}",
            what,
            len,
            buf.len()
        )));
    }
    Ok(())
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Decode a fixed-width, null-padded label
pub fn decode_label(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

/// Decode GET_SYS_STATE (image id at byte 4)
///
/// # Errors
///
/// Returns `Truncated` if the reply is shorter than 5 bytes
pub fn decode_sys_state(buf: &[u8]) -> Result<SysState> {
    require(buf, 5, "GET_SYS_STATE")?;
    let image = buf[4];
    Ok(SysState {
        mode: Mode::from_image(image),
        image,
    })
}

/// Decode GET_PART_INFO
///
/// ```text
/// Byte 4: CHIPREV
/// Byte 5: ROMID
/// Byte 8-9: PART (u16 le)
/// ```
pub fn decode_part_info(buf: &[u8]) -> Result<PartInfo> {
    require(buf, 10, "GET_PART_INFO")?;
    Ok(PartInfo {
        chip_rev: buf[4],
        rom_id: buf[5],
        part: u16_at(buf, 8),
    })
}

/// Decode a single property value (u16 le at byte 4)
pub fn decode_property_value(buf: &[u8]) -> Result<u16> {
    require(buf, 6, "property")?;
    Ok(u16_at(buf, 4))
}

/// Decode FM_RSQ_STATUS
///
/// The chip reports FM frequency in 10 kHz units; the result is in kHz.
///
/// ```text
/// Byte 6-7:   READFREQ (u16 le, 10 kHz)
/// Byte 8:     FREQOFF
/// Byte 9:     RSSI (dBuV, signed)
/// Byte 10:    SNR (dB, signed)
/// Byte 12-13: READANTCAP (u16 le)
/// ```
pub fn decode_fm_rsq(buf: &[u8]) -> Result<RsqStatus> {
    require(buf, 14, "FM_RSQ_STATUS")?;
    Ok(RsqStatus {
        snr: buf[10] as i8,
        rssi: buf[9] as i8,
        frequency: u16_at(buf, 6) as u32 * 10,
        freq_offset: buf[8],
        read_ant_cap: u16_at(buf, 12),
        am_modulation_pct: None,
        hd_level_pct: None,
    })
}

/// Decode AM_RSQ_STATUS
///
/// Same layout as FM with the frequency in kHz, plus modulation depth at
/// byte 11 and HD level at byte 15.
pub fn decode_am_rsq(buf: &[u8]) -> Result<RsqStatus> {
    require(buf, 16, "AM_RSQ_STATUS")?;
    Ok(RsqStatus {
        snr: buf[10] as i8,
        rssi: buf[9] as i8,
        frequency: u16_at(buf, 6) as u32,
        freq_offset: buf[8],
        read_ant_cap: u16_at(buf, 12),
        am_modulation_pct: Some(buf[11]),
        hd_level_pct: Some(buf[15]),
    })
}

/// Decode DAB_DIGRAD_STATUS
///
/// ```text
/// Byte 5:     ACQ(2) | VALID(0)
/// Byte 6:     RSSI
/// Byte 7:     SNR
/// Byte 8:     FIC_QUALITY
/// Byte 9:     CNR
/// Byte 12-15: TUNE_FREQ (u32 le, kHz)
/// Byte 16:    TUNE_INDEX
/// Byte 17:    FFT_OFFSET
/// Byte 18-19: READANTCAP (u16 le)
/// ```
pub fn decode_digrad(buf: &[u8]) -> Result<DigradStatus> {
    require(buf, 20, "DAB_DIGRAD_STATUS")?;
    Ok(DigradStatus {
        acq: buf[5] & 0x04 != 0,
        valid: buf[5] & 0x01 != 0,
        rssi: buf[6] as i8,
        snr: buf[7] as i8,
        fic_quality: buf[8],
        cnr: buf[9],
        fft_offset: buf[17] as i8,
        frequency: u32_at(buf, 12),
        tuned_index: buf[16],
        read_ant_cap: u16_at(buf, 18),
    })
}

/// Decode FM_RDS_BLOCKCOUNT
pub fn decode_rds_blockcount(buf: &[u8]) -> Result<RdsBlockCount> {
    require(buf, 10, "FM_RDS_BLOCKCOUNT")?;
    Ok(RdsBlockCount {
        expected: u16_at(buf, 4),
        received: u16_at(buf, 6),
        uncorrectable: u16_at(buf, 8),
    })
}

/// Decode DAB_GET_ENSEMBLE_INFO label (16 bytes at byte 6)
pub fn decode_ensemble_label(buf: &[u8]) -> Result<String> {
    require(buf, 22, "DAB_GET_ENSEMBLE_INFO")?;
    Ok(decode_label(&buf[6..22]))
}

/// Decode DAB_GET_AUDIO_INFO
pub fn decode_audio_info(buf: &[u8]) -> Result<AudioInfo> {
    require(buf, 9, "DAB_GET_AUDIO_INFO")?;
    let flags = buf[8];
    Ok(AudioInfo {
        bit_rate: u16_at(buf, 4),
        sample_rate: u16_at(buf, 6),
        mode: AudioMode::from_bits(flags),
        sbr: flags & 0x04 != 0,
        ps: flags & 0x08 != 0,
    })
}

/// Decode DAB_GET_SUBCHAN_INFO
pub fn decode_subchannel_info(buf: &[u8]) -> Result<SubchannelInfo> {
    require(buf, 12, "DAB_GET_SUBCHAN_INFO")?;
    Ok(SubchannelInfo {
        service_mode: ServiceMode::from_raw(buf[4]),
        protection: ProtectionMode::from_raw(buf[5]),
        bit_rate: u16_at(buf, 6),
        capacity_units: u16_at(buf, 8),
        cu_start_address: u16_at(buf, 10),
    })
}

/// Decode a flash write packet back into its block
///
/// Inverse of [`super::encoder::flash_write_args`].
///
/// # Errors
///
/// Returns `Truncated` if the packet is shorter than its 15-byte header
/// or than the size it declares
pub fn decode_flash_block(packet: &[u8]) -> Result<FlashBlock> {
    require(packet, 15, "flash write")?;

    let mut buf = packet;
    let verify = buf.get_u8() == FLASH_WRITE_BLOCK_VERIFY;
    buf.advance(2);
    let crc32 = buf.get_u32_le();
    let offset = buf.get_u32_le();
    let size = buf.get_u32_le();

    if buf.remaining() < size as usize {
        return Err(Si46xxError::Truncated(format!(
            "flash block declares {} bytes, {} present",
            size,
            buf.remaining()
        )));
    }

    Ok(FlashBlock {
        offset,
        size,
        crc32,
        verify,
        payload: buf[..size as usize].to_vec(),
    })
}
