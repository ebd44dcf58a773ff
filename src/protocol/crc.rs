//! # Flash Block CRC
//!
//! CRC-32 (IEEE 802.3, reflected, polynomial 0xEDB88320) as checked by the
//! bootloader's verified flash write.
//!
//! **Initial Value**: 0xFFFFFFFF, **Final XOR**: 0xFFFFFFFF

/// Calculate the CRC-32 of a flash block payload
///
/// # Examples
///
/// ```
/// use si46xx_ctl::protocol::crc::flash_block_crc;
///
/// assert_eq!(flash_block_crc(b"123456789"), 0xCBF4_3926);
/// ```
pub fn flash_block_crc(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Bitwise reference implementation, used to check the fast path
#[cfg(test)]
fn flash_block_crc_slow(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}
