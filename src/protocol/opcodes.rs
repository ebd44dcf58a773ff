//! # Si46xx Command Set
//!
//! Opcodes, argument magic numbers and size limits defined by the chip's
//! programming guide. These values go on the wire verbatim.

/// Read the status register / reply buffer
pub const RD_REPLY: u8 = 0x00;
/// Power up the device and configure the crystal
pub const POWER_UP: u8 = 0x01;
/// Load a chunk of an image from the host
pub const HOST_LOAD: u8 = 0x04;
/// Load an image from external flash (also the bootloader flash utility)
pub const FLASH_LOAD: u8 = 0x05;
/// Prepare the bootloader for a new image
pub const LOAD_INIT: u8 = 0x06;
/// Boot the loaded image
pub const BOOT: u8 = 0x07;
/// Chip revision, ROM id and part number
pub const GET_PART_INFO: u8 = 0x08;
/// Currently running image
pub const GET_SYS_STATE: u8 = 0x09;
/// Write one property
pub const SET_PROPERTY: u8 = 0x13;
/// Read one or more properties
pub const GET_PROPERTY: u8 = 0x14;

pub const FM_TUNE_FREQ: u8 = 0x30;
pub const FM_SEEK_START: u8 = 0x31;
pub const FM_RSQ_STATUS: u8 = 0x32;
pub const FM_RDS_STATUS: u8 = 0x34;
pub const FM_RDS_BLOCKCOUNT: u8 = 0x35;

pub const AM_TUNE_FREQ: u8 = 0x40;
pub const AM_SEEK_START: u8 = 0x41;
pub const AM_RSQ_STATUS: u8 = 0x42;

pub const DAB_GET_DIGITAL_SERVICE_LIST: u8 = 0x80;
pub const DAB_START_DIGITAL_SERVICE: u8 = 0x81;
pub const DAB_TUNE_FREQ: u8 = 0xB0;
pub const DAB_DIGRAD_STATUS: u8 = 0xB2;
pub const DAB_GET_ENSEMBLE_INFO: u8 = 0xB4;
pub const DAB_GET_SERVICE_LINKING_INFO: u8 = 0xB7;
pub const DAB_SET_FREQ_LIST: u8 = 0xB8;
pub const DAB_GET_AUDIO_INFO: u8 = 0xBD;
pub const DAB_GET_SUBCHAN_INFO: u8 = 0xBE;

/// Status byte 0: clear to send
pub const STATUS_CTS: u8 = 0x80;
/// Status byte 0: command error
pub const STATUS_ERR_CMD: u8 = 0x40;
/// Status byte 0: seek/tune complete
pub const STATUS_STC: u8 = 0x01;

/// Size of the common status header at the start of every reply
pub const STATUS_HEADER_LEN: usize = 4;

/// Maximum HOST_LOAD chunk accepted by the bootloader
pub const HOST_LOAD_CHUNK_SIZE: usize = 2048;

/// HOST_LOAD frame header: opcode plus three reserved zero bytes
pub const HOST_LOAD_HEADER_LEN: usize = 4;

/// Flash utility sub-command prefixes (FLASH_LOAD arguments)
pub const FLASH_ERASE_CHIP: [u8; 3] = [0xFF, 0xDE, 0xC0];
pub const FLASH_ERASE_SECTOR: [u8; 3] = [0xFE, 0xDE, 0xC0];
pub const FLASH_GET_PROPERTY: u8 = 0x11;
pub const FLASH_WRITE_BLOCK: u8 = 0xF0;
pub const FLASH_WRITE_BLOCK_VERIFY: u8 = 0xF1;
pub const FLASH_WRITE_MAGIC: [u8; 2] = [0x0C, 0xED];

/// Largest payload a single flash write block may carry
pub const FLASH_MAX_BLOCK_SIZE: usize = 4084;

/// Block size used when writing whole images to flash
pub const FLASH_WRITE_CHUNK_SIZE: usize = 2048;

/// Dynamic replies: fixed header length and the corruption guard
pub const DYNAMIC_HEADER_LEN: usize = 6;
pub const DYNAMIC_MAX_PAYLOAD: usize = 3000;

/// DAB_SET_FREQ_LIST accepts between 1 and 48 frequencies
pub const DAB_MAX_FREQUENCIES: usize = 48;

/// DAB_DIGRAD_STATUS argument: DIGRAD_ACK | STC_ACK
pub const DIGRAD_ACK_ALL: u8 = (1 << 3) | 1;

/// FM_RDS_STATUS argument: acknowledge the RDS interrupt
pub const RDS_STATUS_INTACK: u8 = 0x01;

/// Bootloader flash properties readable through the flash utility
pub const BL_SPI_CLOCK_FREQ_KHZ: u16 = 0x0001;
pub const BL_SPI_MODE: u16 = 0x0002;
pub const BL_READ_CMD: u16 = 0x0101;
pub const BL_HIGH_SPEED_READ_CMD: u16 = 0x0102;
pub const BL_HIGH_SPEED_READ_MAX_FREQ_MHZ: u16 = 0x0103;
pub const BL_WRITE_CMD: u16 = 0x0201;
pub const BL_ERASE_SECTOR_CMD: u16 = 0x0202;
pub const BL_ERASE_CHIP_CMD: u16 = 0x0203;

/// All bootloader flash properties, in dump order
pub const BL_PROPERTIES: [u16; 8] = [
    BL_SPI_CLOCK_FREQ_KHZ,
    BL_SPI_MODE,
    BL_READ_CMD,
    BL_HIGH_SPEED_READ_CMD,
    BL_HIGH_SPEED_READ_MAX_FREQ_MHZ,
    BL_WRITE_CMD,
    BL_ERASE_SECTOR_CMD,
    BL_ERASE_CHIP_CMD,
];

/// Command name for log output
pub fn command_name(cmd: u8) -> &'static str {
    match cmd {
        RD_REPLY => "RD_REPLY",
        POWER_UP => "POWER_UP",
        HOST_LOAD => "HOST_LOAD",
        FLASH_LOAD => "FLASH_LOAD",
        LOAD_INIT => "LOAD_INIT",
        BOOT => "BOOT",
        GET_PART_INFO => "GET_PART_INFO",
        GET_SYS_STATE => "GET_SYS_STATE",
        SET_PROPERTY => "SET_PROPERTY",
        GET_PROPERTY => "GET_PROPERTY",
        FM_TUNE_FREQ => "FM_TUNE_FREQ",
        FM_SEEK_START => "FM_SEEK_START",
        FM_RSQ_STATUS => "FM_RSQ_STATUS",
        FM_RDS_STATUS => "FM_RDS_STATUS",
        FM_RDS_BLOCKCOUNT => "FM_RDS_BLOCKCOUNT",
        AM_TUNE_FREQ => "AM_TUNE_FREQ",
        AM_SEEK_START => "AM_SEEK_START",
        AM_RSQ_STATUS => "AM_RSQ_STATUS",
        DAB_GET_DIGITAL_SERVICE_LIST => "GET_DIGITAL_SERVICE_LIST",
        DAB_START_DIGITAL_SERVICE => "START_DIGITAL_SERVICE",
        DAB_TUNE_FREQ => "DAB_TUNE_FREQ",
        DAB_DIGRAD_STATUS => "DAB_DIGRAD_STATUS",
        DAB_GET_ENSEMBLE_INFO => "DAB_GET_ENSEMBLE_INFO",
        DAB_GET_SERVICE_LINKING_INFO => "DAB_GET_SERVICE_LINKING_INFO",
        DAB_SET_FREQ_LIST => "DAB_SET_FREQ_LIST",
        DAB_GET_AUDIO_INFO => "DAB_GET_AUDIO_INFO",
        DAB_GET_SUBCHAN_INFO => "DAB_GET_SUBCHAN_INFO",
        _ => "UNKNOWN",
    }
}
