//! # Tune / Seek Controller
//!
//! Issues the mode-specific TUNE and SEEK commands and waits for the
//! seek/tune-complete (STC) bit.
//!
//! - FM and AM tunes take a frequency in kHz and are confirmed by a single
//!   status read; completion is awaited separately with [`TuneSeekController::wait`]
//! - DAB tunes take an index into the installed frequency list and poll
//!   for STC themselves

use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::error::{Result, Si46xxError};
use crate::protocol::encoder::{am_tune_args, dab_tune_args, fm_tune_args, seek_args};
use crate::protocol::opcodes::{
    AM_SEEK_START, AM_TUNE_FREQ, DAB_MAX_FREQUENCIES, DAB_TUNE_FREQ, FM_SEEK_START,
    FM_TUNE_FREQ, STATUS_HEADER_LEN, STATUS_STC,
};
use crate::protocol::types::Mode;
use crate::transport::Transport;

/// Status length read while waiting for STC
const WAIT_REPLY_LEN: usize = 5;

/// Tune polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneTiming {
    pub dab_tune_attempts: u32,
    pub dab_tune_poll_ms: u32,
}

impl Default for TuneTiming {
    fn default() -> Self {
        Self {
            dab_tune_attempts: 20,
            dab_tune_poll_ms: 100,
        }
    }
}

/// Seek direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Up,
    Down,
}

/// Tune/seek driver over a borrowed command channel
pub struct TuneSeekController<'a, T, D> {
    channel: &'a mut CommandChannel<T, D>,
    timing: TuneTiming,
}

impl<'a, T: Transport, D: DelayNs> TuneSeekController<'a, T, D> {
    pub fn new(channel: &'a mut CommandChannel<T, D>) -> Self {
        Self {
            channel,
            timing: TuneTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: TuneTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Tune the receiver
    ///
    /// # Arguments
    ///
    /// * `mode` - Receiver mode the chip is running
    /// * `freq` - Frequency in kHz (FM/AM) or frequency list index (DAB)
    /// * `antcap` - Antenna capacitance, 0 for automatic
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - Frequency out of range, or a mode without a
    ///   receiver
    /// * `Timeout` - DAB tune never reported STC
    pub fn tune(&mut self, mode: Mode, freq: u32, antcap: u16) -> Result<()> {
        match mode {
            Mode::Fm => {
                let args = fm_tune_args(freq, antcap)?;
                info!("FM tune {} kHz", freq);
                self.channel.send(FM_TUNE_FREQ, &args)?;
                self.channel.poll_reply(STATUS_HEADER_LEN)?;
                Ok(())
            }
            Mode::Am => {
                let args = am_tune_args(freq, antcap)?;
                info!("AM tune {} kHz", freq);
                self.channel.send(AM_TUNE_FREQ, &args)?;
                self.channel.poll_reply(STATUS_HEADER_LEN)?;
                Ok(())
            }
            Mode::Dab => {
                let index = u8::try_from(freq)
                    .ok()
                    .filter(|&i| (i as usize) < DAB_MAX_FREQUENCIES)
                    .ok_or_else(|| {
                        Si46xxError::InvalidArgument(format!("DAB frequency index {} out of range", freq))
                    })?;
                self.tune_dab(index, (antcap & 0xFF) as u8)
            }
            Mode::Boot | Mode::Unknown => Err(Si46xxError::InvalidArgument(format!(
                "cannot tune in {} mode",
                mode
            ))),
        }
    }

    /// Tune to entry `index` of the installed DAB frequency list and wait
    /// for STC
    pub fn tune_dab(&mut self, index: u8, antcap: u8) -> Result<()> {
        info!("DAB tune index {}", index);
        self.channel.send(DAB_TUNE_FREQ, &dab_tune_args(index, antcap))?;

        for attempt in 0..self.timing.dab_tune_attempts {
            let reply = self.channel.poll_reply(STATUS_HEADER_LEN)?;
            if reply.status() & STATUS_STC != 0 {
                debug!("DAB tune complete after {} polls", attempt + 1);
                return Ok(());
            }
            self.channel.delay_ms(self.timing.dab_tune_poll_ms);
        }

        warn!("DAB tune to index {} did not complete", index);
        Err(Si46xxError::Timeout("DAB tune"))
    }

    /// Start a seek; returns once the chip accepted the command
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for modes other than FM and AM
    pub fn seek(&mut self, mode: Mode, direction: SeekDirection, wrap: bool) -> Result<()> {
        let cmd = match mode {
            Mode::Fm => FM_SEEK_START,
            Mode::Am => AM_SEEK_START,
            other => {
                return Err(Si46xxError::InvalidArgument(format!(
                    "seek not supported in {} mode",
                    other
                )))
            }
        };

        debug!("{} seek {:?} (wrap: {})", mode, direction, wrap);
        self.channel
            .send(cmd, &seek_args(direction == SeekDirection::Up, wrap))?;
        self.channel.poll_reply(STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Wait for tune/seek completion
    ///
    /// Polls at 1 ms intervals; at least one poll always happens.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if STC is not seen within `timeout_ms` polls
    pub fn wait(&mut self, timeout_ms: u32) -> Result<()> {
        let polls = timeout_ms.max(1);
        for _ in 0..polls {
            let reply = self.channel.poll_reply(WAIT_REPLY_LEN)?;
            if reply.status() & STATUS_STC != 0 {
                return Ok(());
            }
            self.channel.delay_ms(1);
        }
        Err(Si46xxError::Timeout("tune/seek complete"))
    }
}
