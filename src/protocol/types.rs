//! # Protocol Data Types
//!
//! Decoded views of chip replies and the argument records the driver builds.

use std::fmt;

/// Receiver operating mode, derived from the running image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Unknown,
    Boot,
    Fm,
    Am,
    Dab,
}

impl Mode {
    /// Map a GET_SYS_STATE image id to a mode
    ///
    /// Image ids: 0 bootloader, 1/4 FM(HD), 2/3 DAB (or data-only DAB),
    /// 5/6 AM(HD) and AM demod.
    pub fn from_image(image: u8) -> Self {
        match image {
            0 => Mode::Boot,
            1 | 4 => Mode::Fm,
            2 | 3 => Mode::Dab,
            5 | 6 => Mode::Am,
            _ => Mode::Unknown,
        }
    }

    /// True once a functional (receiver) image is running
    pub fn is_booted(self) -> bool {
        matches!(self, Mode::Fm | Mode::Am | Mode::Dab)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Mode::Unknown => "unknown",
            Mode::Boot => "boot",
            Mode::Fm => "fm",
            Mode::Am => "am",
            Mode::Dab => "dab",
        };
        f.write_str(label)
    }
}

/// GET_SYS_STATE result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysState {
    pub mode: Mode,
    /// Raw image id as reported by the chip
    pub image: u8,
}

/// GET_PART_INFO result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartInfo {
    pub chip_rev: u8,
    pub rom_id: u8,
    pub part: u16,
}

/// AM/FM received signal quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsqStatus {
    /// SNR in dB
    pub snr: i8,
    /// RSSI in dBuV
    pub rssi: i8,
    /// Tuned frequency in kHz
    pub frequency: u32,
    /// Raw frequency offset (2 ppm units)
    pub freq_offset: u8,
    pub read_ant_cap: u16,
    /// AM modulation depth in percent (AM only)
    pub am_modulation_pct: Option<u8>,
    /// HD signal level in percent (AM only)
    pub hd_level_pct: Option<u8>,
}

/// DAB digital radio link status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigradStatus {
    pub acq: bool,
    pub valid: bool,
    pub rssi: i8,
    pub snr: i8,
    pub fic_quality: u8,
    pub cnr: u8,
    pub fft_offset: i8,
    /// Tuned frequency in kHz
    pub frequency: u32,
    pub tuned_index: u8,
    pub read_ant_cap: u16,
}

/// RDS block counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsBlockCount {
    pub expected: u16,
    pub received: u16,
    pub uncorrectable: u16,
}

/// Audio channel mode of the running DAB service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    DualMono,
    Mono,
    Stereo,
    JointStereo,
}

impl AudioMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => AudioMode::DualMono,
            1 => AudioMode::Mono,
            2 => AudioMode::Stereo,
            _ => AudioMode::JointStereo,
        }
    }
}

/// DAB_GET_AUDIO_INFO result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// kbps
    pub bit_rate: u16,
    /// Hz
    pub sample_rate: u16,
    pub mode: AudioMode,
    /// Spectral band replication in use
    pub sbr: bool,
    /// Parametric stereo in use
    pub ps: bool,
}

/// Service mode of the current DAB subchannel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    AudioStream,
    DataStream,
    Fidc,
    MscDataPacket,
    DabPlus,
    Dab,
    Fic,
    XpadData,
    NoMedia,
    Other(u8),
}

impl ServiceMode {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ServiceMode::AudioStream,
            1 => ServiceMode::DataStream,
            2 => ServiceMode::Fidc,
            3 => ServiceMode::MscDataPacket,
            4 => ServiceMode::DabPlus,
            5 => ServiceMode::Dab,
            6 => ServiceMode::Fic,
            7 => ServiceMode::XpadData,
            8 => ServiceMode::NoMedia,
            other => ServiceMode::Other(other),
        }
    }
}

/// Error protection profile of the current DAB subchannel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMode {
    /// Unequal error protection, levels 1-5
    Uep(u8),
    /// Equal error protection, profile A, levels 1-4
    EepA(u8),
    /// Equal error protection, profile B, levels 1-4
    EepB(u8),
    Other(u8),
}

impl ProtectionMode {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1..=5 => ProtectionMode::Uep(raw),
            6..=9 => ProtectionMode::EepA(raw - 5),
            10..=13 => ProtectionMode::EepB(raw - 9),
            other => ProtectionMode::Other(other),
        }
    }
}

/// DAB_GET_SUBCHAN_INFO result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubchannelInfo {
    pub service_mode: ServiceMode,
    pub protection: ProtectionMode,
    /// kbps
    pub bit_rate: u16,
    pub capacity_units: u16,
    pub cu_start_address: u16,
}

/// One flash write request
///
/// `size` is carried separately from `payload` because it goes on the wire
/// as its own field; [`FlashBlock::new`] keeps the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashBlock {
    pub offset: u32,
    pub size: u32,
    pub crc32: u32,
    pub verify: bool,
    pub payload: Vec<u8>,
}

impl FlashBlock {
    /// Build a block whose `size` matches its payload
    pub fn new(offset: u32, payload: Vec<u8>, crc32: u32, verify: bool) -> Self {
        Self {
            offset,
            size: payload.len() as u32,
            crc32,
            verify,
            payload,
        }
    }
}

/// Power-up argument set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerUpArgs {
    /// Enable the CTS interrupt (ARG1 bit 7)
    pub cts_interrupt: bool,
    /// Crystal clock mode (ARG2 bits 4-5)
    pub clk_mode: u8,
    /// Crystal trim size (ARG2 bits 0-3)
    pub tr_size: u8,
    /// Crystal bias current during startup
    pub ibias: u8,
    /// Crystal frequency in Hz
    pub xtal_freq: u32,
    /// Crystal load capacitance trim
    pub ctun: u8,
    /// Crystal bias current while running
    pub ibias_run: u8,
}
