//! # Reply Header Decoding
//!
//! Every reply starts with the same 4-byte status header:
//!
//! ```text
//! Byte 0: CTS(7) | ERR_CMD(6) | ... | STCINT(0)
//! Byte 1: interrupt sources (mode specific)
//! Byte 2: interrupt sources (mode specific)
//! Byte 3: PUP_STATE(7:6) | ... | REPOFERR(3) | CMDOFERR(2) | ARBERR(1) | ERRNR(0)
//! ```

use std::fmt;

use super::opcodes::{STATUS_CTS, STATUS_ERR_CMD, STATUS_HEADER_LEN};

/// Power-up state reported in byte 3, bits 6-7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    OutOfReset,
    Reserved,
    Bootloader,
    Application,
}

impl BootState {
    pub fn from_status(byte3: u8) -> Self {
        match byte3 >> 6 {
            0 => BootState::OutOfReset,
            1 => BootState::Reserved,
            2 => BootState::Bootloader,
            _ => BootState::Application,
        }
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BootState::OutOfReset => "out of reset",
            BootState::Reserved => "reserved",
            BootState::Bootloader => "bootloader",
            BootState::Application => "application",
        };
        f.write_str(label)
    }
}

/// Device error causes, in increasing severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// No cause bit set alongside ERR_CMD
    Unspecified,
    /// REPOFERR: reply read too fast
    ReplyTooFast,
    /// CMDOFERR: command sent too fast
    CommandTooFast,
    /// ARBERR: arbiter error
    ArbiterError,
    /// ERRNR: non-recoverable error
    NonRecoverable,
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceErrorKind::Unspecified => "ERR_CMD",
            DeviceErrorKind::ReplyTooFast => "REPOFERR (reply too fast)",
            DeviceErrorKind::CommandTooFast => "CMDOFERR (command too fast)",
            DeviceErrorKind::ArbiterError => "ARBERR (arbiter error)",
            DeviceErrorKind::NonRecoverable => "ERRNR (non-recoverable error)",
        };
        f.write_str(label)
    }
}

/// Decoded error report from a status header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError {
    /// Most severe cause present
    pub kind: DeviceErrorKind,
    /// Raw cause bits (byte 3, low nibble)
    pub flags: u8,
    /// Power-up state at the time of the error
    pub boot_state: BootState,
}

impl DeviceError {
    /// All cause bits present, most severe last
    pub fn causes(&self) -> Vec<DeviceErrorKind> {
        [
            (0x08, DeviceErrorKind::ReplyTooFast),
            (0x04, DeviceErrorKind::CommandTooFast),
            (0x02, DeviceErrorKind::ArbiterError),
            (0x01, DeviceErrorKind::NonRecoverable),
        ]
        .iter()
        .filter(|(bit, _)| self.flags & bit != 0)
        .map(|&(_, kind)| kind)
        .collect()
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (flags 0x{:X}, state: {})", self.kind, self.flags, self.boot_state)
    }
}

/// Decode the error portion of a status header
///
/// # Arguments
///
/// * `header` - First bytes of a reply; missing bytes are treated as zero
///
/// # Returns
///
/// * `Option<DeviceError>` - `Some` when ERR_CMD (byte 0, bit 6) is set
pub fn decode_error(header: &[u8]) -> Option<DeviceError> {
    let status = header.first().copied().unwrap_or(0);
    if status & STATUS_ERR_CMD == 0 {
        return None;
    }

    let byte3 = header.get(3).copied().unwrap_or(0);
    let flags = byte3 & 0x0F;

    // Later checks win so the most severe cause is reported
    let mut kind = DeviceErrorKind::Unspecified;
    if flags & 0x08 != 0 {
        kind = DeviceErrorKind::ReplyTooFast;
    }
    if flags & 0x04 != 0 {
        kind = DeviceErrorKind::CommandTooFast;
    }
    if flags & 0x02 != 0 {
        kind = DeviceErrorKind::ArbiterError;
    }
    if flags & 0x01 != 0 {
        kind = DeviceErrorKind::NonRecoverable;
    }

    Some(DeviceError {
        kind,
        flags,
        boot_state: BootState::from_status(byte3),
    })
}

/// Status-register exchange result
///
/// `raw` holds the full reply, starting with the status header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub cts: bool,
    pub error: bool,
    pub raw: Vec<u8>,
}

impl CommandReply {
    pub fn new(raw: Vec<u8>) -> Self {
        let status = raw.first().copied().unwrap_or(0);
        Self {
            cts: status & STATUS_CTS != 0,
            error: status & STATUS_ERR_CMD != 0,
            raw,
        }
    }

    /// Status byte 0
    pub fn status(&self) -> u8 {
        self.raw.first().copied().unwrap_or(0)
    }

    pub fn boot_state(&self) -> BootState {
        BootState::from_status(self.raw.get(3).copied().unwrap_or(0))
    }

    pub fn device_error(&self) -> Option<DeviceError> {
        decode_error(&self.raw[..self.raw.len().min(STATUS_HEADER_LEN)])
    }

    /// Reply bytes after the status header
    pub fn payload(&self) -> &[u8] {
        self.raw.get(STATUS_HEADER_LEN..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl AsRef<[u8]> for CommandReply {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_error_without_err_cmd() {
        assert_eq!(decode_error(&[0x80, 0, 0, 0x0F]), None);
    }

    #[test]
    fn test_error_flags_map_to_kinds() {
        let cases = [
            (0x08, DeviceErrorKind::ReplyTooFast),
            (0x04, DeviceErrorKind::CommandTooFast),
            (0x02, DeviceErrorKind::ArbiterError),
            (0x01, DeviceErrorKind::NonRecoverable),
            (0x00, DeviceErrorKind::Unspecified),
        ];

        for (flags, kind) in cases {
            let err = decode_error(&[0x40, 0, 0, flags]).unwrap();
            assert_eq!(err.kind, kind, "flags 0x{:X}", flags);
            assert_eq!(err.flags, flags);
        }
    }

    #[test]
    fn test_most_severe_flag_wins() {
        let err = decode_error(&[0xC0, 0, 0, 0x0D]).unwrap();
        assert_eq!(err.kind, DeviceErrorKind::NonRecoverable);
        assert_eq!(
            err.causes(),
            vec![
                DeviceErrorKind::ReplyTooFast,
                DeviceErrorKind::CommandTooFast,
                DeviceErrorKind::NonRecoverable,
            ]
        );
    }

    #[test]
    fn test_boot_state_from_top_bits() {
        assert_eq!(BootState::from_status(0x00), BootState::OutOfReset);
        assert_eq!(BootState::from_status(0x40), BootState::Reserved);
        assert_eq!(BootState::from_status(0x80), BootState::Bootloader);
        assert_eq!(BootState::from_status(0xC0), BootState::Application);

        let err = decode_error(&[0x40, 0, 0, 0xC2]).unwrap();
        assert_eq!(err.boot_state, BootState::Application);
        assert_eq!(err.kind, DeviceErrorKind::ArbiterError);
    }

    #[test]
    fn test_short_header_is_tolerated() {
        let err = decode_error(&[0x40]).unwrap();
        assert_eq!(err.kind, DeviceErrorKind::Unspecified);
        assert_eq!(decode_error(&[]), None);
    }

    #[test]
    fn test_command_reply_flags() {
        let reply = CommandReply::new(vec![0x81, 0x00, 0x00, 0x80, 0x12, 0x34]);
        assert!(reply.cts);
        assert!(!reply.error);
        assert_eq!(reply.status(), 0x81);
        assert_eq!(reply.boot_state(), BootState::Bootloader);
        assert_eq!(reply.payload(), &[0x12, 0x34]);
        assert!(reply.device_error().is_none());

        let reply = CommandReply::new(vec![0x40, 0x00, 0x00, 0x01]);
        assert!(!reply.cts);
        assert!(reply.error);
        assert!(reply.payload().is_empty());
        assert_eq!(reply.device_error().unwrap().kind, DeviceErrorKind::NonRecoverable);
    }

    #[test]
    fn test_device_error_display() {
        let err = decode_error(&[0x40, 0, 0, 0x84]).unwrap();
        let text = err.to_string();
        assert!(text.contains("CMDOFERR"));
        assert!(text.contains("bootloader"));
    }
}
