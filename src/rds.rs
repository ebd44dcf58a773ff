//! # RDS Decoder
//!
//! Accumulates the programme service name (group 0A) and radiotext
//! (group 2A) from repeated FM_RDS_STATUS reads.
//!
//! ```text
//! Block A: PI code
//! Block B: GROUP_TYPE(15:12) | VERSION(11) | ... | TEXT_AB(4) | ADDRESS(3:0)
//! Block C: radiotext chars 1-2 (2A)
//! Block D: name chars (0A) or radiotext chars 3-4 (2A)
//! ```

use embedded_hal::delay::DelayNs;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::error::{Result, Si46xxError};
use crate::protocol::opcodes::{FM_RDS_STATUS, RDS_STATUS_INTACK};
use crate::transport::Transport;

pub const PS_NAME_LEN: usize = 8;
pub const RADIOTEXT_LEN: usize = 128;

/// Name mask once all four 2-char segments arrived
pub const PS_NAME_COMPLETE: u8 = 0x0F;
/// Radiotext mask once all sixteen 4-char segments arrived
pub const RADIOTEXT_COMPLETE: u16 = 0xFFFF;

const RDS_STATUS_REPLY_LEN: usize = 20;
const CARRIAGE_RETURN: u8 = b'\r';

/// Sync flag and the four blocks of one FM_RDS_STATUS reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsStatusReply {
    pub sync: bool,
    pub blocks: [u16; 4],
}

impl RdsStatusReply {
    /// Decode a 20-byte FM_RDS_STATUS reply (sync at byte 5 bit 1, blocks
    /// A-D at bytes 12-19)
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < RDS_STATUS_REPLY_LEN {
            return Err(Si46xxError::Truncated(format!(
                "FM_RDS_STATUS reply needs {} bytes, got {}",
                RDS_STATUS_REPLY_LEN,
                buf.len()
            )));
        }
        let block = |i: usize| u16::from_le_bytes([buf[12 + 2 * i], buf[13 + 2 * i]]);
        Ok(Self {
            sync: buf[5] & 0x02 != 0,
            blocks: [block(0), block(1), block(2), block(3)],
        })
    }
}

/// Running RDS decode state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdsAccumulator {
    pub pi: u16,
    pub ps_name: [u8; PS_NAME_LEN],
    pub ps_mask: u8,
    pub radiotext: [u8; RADIOTEXT_LEN],
    pub radiotext_mask: u16,
    pub sync: bool,
}

impl Default for RdsAccumulator {
    fn default() -> Self {
        Self {
            pi: 0,
            ps_name: [0; PS_NAME_LEN],
            ps_mask: 0,
            radiotext: [0; RADIOTEXT_LEN],
            radiotext_mask: 0,
            sync: false,
        }
    }
}

impl RdsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one group into the state
    ///
    /// A carriage return in a radiotext segment ends the text: it is
    /// replaced by NUL and the radiotext mask is set to complete, whether
    /// or not the other segments have arrived.
    ///
    /// # Returns
    ///
    /// * `bool` - True once both name and radiotext are complete
    pub fn accumulate(&mut self, blocks: [u16; 4]) -> bool {
        self.pi = blocks[0];
        let group = (blocks[1] & 0xF800) >> 11;

        if group == 0x00 {
            // 0A: programme service name
            let addr = (blocks[1] & 0x03) as usize;
            let [hi, lo] = blocks[3].to_be_bytes();
            self.ps_name[addr * 2] = hi;
            self.ps_name[addr * 2 + 1] = lo;
            self.ps_mask |= 1 << addr;
        } else if group == 0x04 && blocks[1] & 0x10 == 0 {
            // 2A, text A only
            let addr = (blocks[1] & 0x0F) as usize;
            let [c0, c1] = blocks[2].to_be_bytes();
            let [c2, c3] = blocks[3].to_be_bytes();
            let segment = &mut self.radiotext[addr * 4..addr * 4 + 4];
            segment.copy_from_slice(&[c0, c1, c2, c3]);

            for ch in segment.iter_mut() {
                if *ch == CARRIAGE_RETURN {
                    *ch = 0;
                    self.radiotext_mask = RADIOTEXT_COMPLETE;
                }
            }
            self.radiotext_mask |= 1 << addr;
        }

        self.is_complete()
    }

    pub fn name_complete(&self) -> bool {
        self.ps_mask == PS_NAME_COMPLETE
    }

    pub fn is_complete(&self) -> bool {
        self.name_complete() && self.radiotext_mask == RADIOTEXT_COMPLETE
    }

    /// Programme service name up to its first NUL
    pub fn ps_name(&self) -> String {
        text_until_nul(&self.ps_name)
    }

    /// Radiotext up to its first NUL
    pub fn radiotext(&self) -> String {
        text_until_nul(&self.radiotext)
    }
}

fn text_until_nul(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// RDS decode loop limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsLoopOptions {
    pub max_iterations: u32,
    /// Stop as soon as the name is complete, without waiting for radiotext
    pub stop_at_name: bool,
}

impl Default for RdsLoopOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            stop_at_name: true,
        }
    }
}

/// Read RDS status until the decode is done or sync is lost
///
/// # Returns
///
/// * `Result<RdsAccumulator>` - Final state; check `sync` for an early stop
///
/// # Errors
///
/// Returns `Timeout` if neither completion nor sync loss happened within
/// `max_iterations` reads
pub fn decode_loop<T: Transport, D: DelayNs>(
    channel: &mut CommandChannel<T, D>,
    options: RdsLoopOptions,
) -> Result<RdsAccumulator> {
    let mut rds = RdsAccumulator::new();

    for iteration in 0..options.max_iterations {
        channel.send(FM_RDS_STATUS, &[RDS_STATUS_INTACK])?;
        let reply = channel.poll_reply(RDS_STATUS_REPLY_LEN)?;
        let status = RdsStatusReply::decode(&reply.raw)?;

        rds.sync = status.sync;
        if !rds.sync {
            debug!("RDS sync lost after {} reads", iteration + 1);
            return Ok(rds);
        }
        if rds.accumulate(status.blocks) {
            debug!("RDS complete after {} reads", iteration + 1);
            return Ok(rds);
        }
        if options.stop_at_name && rds.name_complete() {
            debug!("RDS name complete after {} reads", iteration + 1);
            return Ok(rds);
        }
    }

    warn!("RDS decode gave up after {} reads", options.max_iterations);
    Err(Si46xxError::Timeout("RDS"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mocks::{RecordingDelay, ScriptedTransport};

    fn group_0a(pi: u16, addr: u16, chars: &[u8; 2]) -> [u16; 4] {
        [pi, addr & 0x03, 0, u16::from_be_bytes(*chars)]
    }

    fn group_2a(pi: u16, addr: u16, chars: &[u8; 4]) -> [u16; 4] {
        [
            pi,
            (0x04 << 11) | (addr & 0x0F),
            u16::from_be_bytes([chars[0], chars[1]]),
            u16::from_be_bytes([chars[2], chars[3]]),
        ]
    }

    fn status_reply(sync: bool, blocks: [u16; 4]) -> Vec<u8> {
        let mut buf = vec![0u8; 20];
        buf[0] = 0x80;
        buf[5] = if sync { 0x02 } else { 0x00 };
        for (i, block) in blocks.iter().enumerate() {
            buf[12 + 2 * i..14 + 2 * i].copy_from_slice(&block.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_ps_name_in_reverse_order() {
        let mut rds = RdsAccumulator::new();
        let name = b"BBC R2  ";

        for addr in (0..4u16).rev() {
            let i = addr as usize * 2;
            rds.accumulate(group_0a(0xC202, addr, &[name[i], name[i + 1]]));
        }

        assert_eq!(rds.ps_name(), "BBC R2  ");
        assert_eq!(rds.ps_mask, 0x0F);
        assert!(rds.name_complete());
        assert_eq!(rds.pi, 0xC202);
    }

    #[test]
    fn test_partial_name_mask() {
        let mut rds = RdsAccumulator::new();
        rds.accumulate(group_0a(0x1234, 2, b"AB"));
        assert_eq!(rds.ps_mask, 0x04);
        assert!(!rds.name_complete());
    }

    #[test]
    fn test_carriage_return_forces_radiotext_complete() {
        let mut rds = RdsAccumulator::new();

        rds.accumulate(group_2a(0x1234, 5, b"ab\rd"));

        assert_eq!(rds.radiotext_mask, 0xFFFF, "single CR completes the text");
        assert_eq!(&rds.radiotext[20..24], &[b'a', b'b', 0, b'd']);
    }

    #[test]
    fn test_every_carriage_return_is_cleared() {
        let mut rds = RdsAccumulator::new();
        rds.accumulate(group_2a(0x1234, 0, b"\rx\ry"));
        assert_eq!(&rds.radiotext[..4], &[0, b'x', 0, b'y']);
    }

    #[test]
    fn test_radiotext_segments() {
        let mut rds = RdsAccumulator::new();
        rds.accumulate(group_2a(0x1234, 1, b"o wo"));
        rds.accumulate(group_2a(0x1234, 0, b"Hell"));
        rds.accumulate(group_2a(0x1234, 2, b"rld\r"));

        assert_eq!(rds.radiotext(), "Hello world");
        assert_eq!(rds.radiotext_mask, 0xFFFF);
    }

    #[test]
    fn test_text_b_and_other_groups_ignored() {
        let mut rds = RdsAccumulator::new();
        // 2A with the text A/B flag set
        rds.accumulate([0x1234, (0x04 << 11) | 0x10, 0x4142, 0x4344]);
        // group 2B (version bit set)
        rds.accumulate([0x1234, (0x05 << 11), 0x4142, 0x4344]);
        // group 4A
        rds.accumulate([0x1234, (0x08 << 11), 0x4142, 0x4344]);

        assert_eq!(rds.radiotext_mask, 0);
        assert_eq!(rds.ps_mask, 0);
        assert_eq!(rds.radiotext(), "");
    }

    #[test]
    fn test_complete_requires_both() {
        let mut rds = RdsAccumulator::new();
        for addr in 0..4u16 {
            assert!(!rds.accumulate(group_0a(1, addr, b"XY")));
        }
        assert!(rds.accumulate(group_2a(1, 0, b"end\r")));
    }

    #[test]
    fn test_status_reply_decode() {
        let buf = status_reply(true, [0x1111, 0x2222, 0x3333, 0x4444]);
        let status = RdsStatusReply::decode(&buf).unwrap();
        assert!(status.sync);
        assert_eq!(status.blocks, [0x1111, 0x2222, 0x3333, 0x4444]);

        assert!(RdsStatusReply::decode(&buf[..19]).is_err());
    }

    #[test]
    fn test_decode_loop_stops_at_name() {
        let transport = ScriptedTransport::new();
        let name = b"JAZZ FM ";
        for addr in 0..4u16 {
            let i = addr as usize * 2;
            transport.push_command_reply(&status_reply(
                true,
                group_0a(0xD123, addr, &[name[i], name[i + 1]]),
            ));
        }
        let mut channel = CommandChannel::new(transport.clone(), RecordingDelay::new());

        let rds = decode_loop(&mut channel, RdsLoopOptions::default()).unwrap();

        assert_eq!(rds.ps_name(), "JAZZ FM ");
        assert!(rds.sync);
        assert_eq!(transport.commands(FM_RDS_STATUS).len(), 4);
        assert_eq!(transport.commands(FM_RDS_STATUS)[0], vec![FM_RDS_STATUS, 0x01]);
    }

    #[test]
    fn test_decode_loop_stops_on_sync_loss() {
        let transport = ScriptedTransport::new();
        transport.push_command_reply(&status_reply(true, group_0a(0xD123, 0, b"AB")));
        transport.push_command_reply(&status_reply(false, [0; 4]));
        let mut channel = CommandChannel::new(transport.clone(), RecordingDelay::new());

        let rds = decode_loop(&mut channel, RdsLoopOptions::default()).unwrap();

        assert!(!rds.sync);
        assert_eq!(rds.ps_mask, 0x01);
        assert_eq!(transport.commands(FM_RDS_STATUS).len(), 2);
    }

    #[test]
    fn test_decode_loop_timeout() {
        let transport = ScriptedTransport::new();
        // synced but never a useful group
        transport.set_idle(&status_reply(true, [0x1234, 0x08 << 11, 0, 0]));
        let mut channel = CommandChannel::new(transport.clone(), RecordingDelay::new());

        let options = RdsLoopOptions {
            max_iterations: 50,
            stop_at_name: true,
        };
        let result = decode_loop(&mut channel, options);

        assert!(matches!(result, Err(Si46xxError::Timeout("RDS"))));
        assert_eq!(transport.commands(FM_RDS_STATUS).len(), 50);
    }

    #[test]
    fn test_decode_loop_waits_for_text_when_asked() {
        let transport = ScriptedTransport::new();
        for addr in 0..4u16 {
            transport.push_command_reply(&status_reply(true, group_0a(1, addr, b"NM")));
        }
        transport.push_command_reply(&status_reply(true, group_2a(1, 0, b"Hi\r ")));
        let mut channel = CommandChannel::new(transport.clone(), RecordingDelay::new());

        let options = RdsLoopOptions {
            max_iterations: 100,
            stop_at_name: false,
        };
        let rds = decode_loop(&mut channel, options).unwrap();

        assert!(rds.is_complete());
        assert_eq!(rds.radiotext(), "Hi");
        assert_eq!(transport.commands(FM_RDS_STATUS).len(), 5);
    }
}
