//! # DAB Receiver Operations
//!
//! Frequency list, service directory, service start, link status and
//! ensemble scan for a chip running the DAB image.
//!
//! [`DabController`] borrows the command channel together with the
//! [`DabState`] the session keeps between calls: the installed frequency
//! list and the last service list read from the chip.

pub mod channels;
pub mod service_list;

pub use service_list::{ServiceList, ServiceListEntry};

use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::error::{Result, Si46xxError};
use crate::protocol::decoder::{
    decode_audio_info, decode_digrad, decode_ensemble_label, decode_subchannel_info,
};
use crate::protocol::encoder::{service_linking_args, set_freq_list_args, start_service_args};
use crate::protocol::opcodes::{
    DAB_DIGRAD_STATUS, DAB_GET_AUDIO_INFO, DAB_GET_DIGITAL_SERVICE_LIST,
    DAB_GET_ENSEMBLE_INFO, DAB_GET_SERVICE_LINKING_INFO, DAB_GET_SUBCHAN_INFO,
    DAB_SET_FREQ_LIST, DAB_START_DIGITAL_SERVICE, DIGRAD_ACK_ALL, DYNAMIC_HEADER_LEN,
    STATUS_HEADER_LEN,
};
use crate::protocol::types::{AudioInfo, DigradStatus, SubchannelInfo};
use crate::transport::Transport;
use crate::tuner::{TuneSeekController, TuneTiming};

const DIGRAD_REPLY_LEN: usize = 22;
const ENSEMBLE_REPLY_LEN: usize = 22;
const AUDIO_INFO_REPLY_LEN: usize = 9;
const SUBCHAN_INFO_REPLY_LEN: usize = 12;
const SERVICE_LINKING_REPLY_LEN: usize = 24;

/// Retry budgets for DAB operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DabTiming {
    pub service_list_attempts: u32,
    pub digrad_attempts: u32,
    pub ensemble_attempts: u32,
    /// Wait after an ensemble is acquired during a scan
    pub scan_settle_ms: u32,
    pub tune: TuneTiming,
}

impl Default for DabTiming {
    fn default() -> Self {
        Self {
            service_list_attempts: 100,
            digrad_attempts: 10,
            ensemble_attempts: 10,
            scan_settle_ms: 1000,
            tune: TuneTiming::default(),
        }
    }
}

/// DAB state kept across calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DabState {
    /// Installed frequency list, kHz
    pub frequencies: Vec<u32>,
    /// Last service list read from the chip
    pub service_list: ServiceList,
}

/// One scanned frequency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub index: u8,
    pub frequency_khz: u32,
    pub status: DigradStatus,
    /// Ensemble label, when the ensemble was acquired
    pub ensemble: Option<String>,
}

/// DAB operations over a borrowed command channel
pub struct DabController<'a, T, D> {
    channel: &'a mut CommandChannel<T, D>,
    state: &'a mut DabState,
    timing: DabTiming,
}

impl<'a, T: Transport, D: DelayNs> DabController<'a, T, D> {
    pub fn new(channel: &'a mut CommandChannel<T, D>, state: &'a mut DabState) -> Self {
        Self {
            channel,
            state,
            timing: DabTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: DabTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Install the frequency list tune indices refer to
    ///
    /// # Arguments
    ///
    /// * `freqs_khz` - 1 to 48 frequencies in kHz
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty or oversized list, before
    /// anything is sent
    pub fn set_freq_list(&mut self, freqs_khz: &[u32]) -> Result<()> {
        let args = set_freq_list_args(freqs_khz)?;
        info!("Installing {} DAB frequencies", freqs_khz.len());
        self.channel.send(DAB_SET_FREQ_LIST, &args)?;
        self.channel.poll_reply(STATUS_HEADER_LEN)?;
        self.state.frequencies = freqs_khz.to_vec();
        Ok(())
    }

    /// Install a frequency list given as Band III channel labels
    pub fn set_channels<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<()> {
        let freqs = channels::frequency_list(labels)?;
        self.set_freq_list(&freqs)
    }

    /// Fetch, decode and keep the service list of the tuned ensemble
    ///
    /// The chip answers with an empty list until it has decoded the
    /// ensemble's directory, so the request is repeated until a reply
    /// longer than the dynamic header arrives.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if every attempt came back empty
    pub fn service_list(&mut self) -> Result<&ServiceList> {
        for attempt in 1..=self.timing.service_list_attempts {
            self.channel.send(DAB_GET_DIGITAL_SERVICE_LIST, &[0x00])?;
            let data = self.channel.read_dynamic()?;

            if data.len() > DYNAMIC_HEADER_LEN {
                debug!("Service list after {} request(s), {} bytes", attempt, data.len());
                self.state.service_list = ServiceList::parse(&data);
                info!("{} DAB services", self.state.service_list.len());
                return Ok(&self.state.service_list);
            }
        }

        warn!(
            "No service list after {} requests",
            self.timing.service_list_attempts
        );
        self.state.service_list = ServiceList::default();
        Err(Si46xxError::Timeout("service list"))
    }

    /// Start a service component
    pub fn start_service(&mut self, service_id: u32, component_id: u32) -> Result<()> {
        info!(
            "Starting service 0x{:08X} component 0x{:X}",
            service_id, component_id
        );
        self.channel.send(
            DAB_START_DIGITAL_SERVICE,
            &start_service_args(service_id, component_id),
        )?;
        self.channel.poll_reply(STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Start entry `index` of the stored service list with its first
    /// component
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the stored list has no entry `index`
    pub fn start_service_by_index(&mut self, index: usize) -> Result<()> {
        let (service_id, component_id) = {
            let entry = self.state.service_list.get(index).ok_or_else(|| {
                Si46xxError::InvalidArgument(format!(
                    "service index {} out of range ({} services)",
                    index,
                    self.state.service_list.len()
                ))
            })?;
            debug!("Service {}: {}", index, entry.label());
            (entry.service_id, entry.primary_component().unwrap_or(0))
        };
        self.start_service(service_id, component_id as u32)
    }

    /// Read and acknowledge the digital radio link status
    ///
    /// An attempt that times out waiting for the chip is repeated, up to
    /// `digrad_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if every attempt timed out; device and transport
    /// errors end the loop at once
    pub fn digrad_status(&mut self) -> Result<DigradStatus> {
        for attempt in 1..=self.timing.digrad_attempts {
            let reply = self
                .channel
                .send(DAB_DIGRAD_STATUS, &[DIGRAD_ACK_ALL])
                .and_then(|_| self.channel.poll_reply(DIGRAD_REPLY_LEN));
            match reply {
                Ok(reply) => return decode_digrad(&reply.raw),
                Err(Si46xxError::Timeout(_)) => {
                    debug!("Digrad status not ready (attempt {})", attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Si46xxError::Timeout("DAB digrad status"))
    }

    /// Read the ensemble label
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the reply never becomes ready
    pub fn ensemble_info(&mut self) -> Result<String> {
        self.channel.send(DAB_GET_ENSEMBLE_INFO, &[0x00])?;

        for attempt in 1..=self.timing.ensemble_attempts {
            match self.channel.poll_reply(ENSEMBLE_REPLY_LEN) {
                Ok(reply) => return decode_ensemble_label(&reply.raw),
                Err(Si46xxError::Timeout(_)) => {
                    debug!("Ensemble info not ready (attempt {})", attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Si46xxError::Timeout("ensemble info"))
    }

    /// Audio parameters of the running service
    pub fn audio_info(&mut self) -> Result<AudioInfo> {
        self.channel.send(DAB_GET_AUDIO_INFO, &[0x00])?;
        let reply = self.channel.poll_reply(AUDIO_INFO_REPLY_LEN)?;
        decode_audio_info(&reply.raw)
    }

    /// Subchannel parameters of the running service
    pub fn subchannel_info(&mut self) -> Result<SubchannelInfo> {
        self.channel.send(DAB_GET_SUBCHAN_INFO, &[0x00])?;
        let reply = self.channel.poll_reply(SUBCHAN_INFO_REPLY_LEN)?;
        decode_subchannel_info(&reply.raw)
    }

    /// Service linking information, undecoded
    ///
    /// # Returns
    ///
    /// * `Result<Vec<u8>>` - The 24-byte reply, status header included
    pub fn service_linking_info(&mut self, service_id: u32) -> Result<Vec<u8>> {
        self.channel
            .send(DAB_GET_SERVICE_LINKING_INFO, &service_linking_args(service_id))?;
        Ok(self.channel.poll_reply(SERVICE_LINKING_REPLY_LEN)?.raw)
    }

    /// Tune every installed frequency and report what was found
    ///
    /// A tune that never completes is logged and the link status read
    /// anyway. Acquired ensembles get a settle wait before their label is
    /// read.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if no frequency list is installed
    pub fn scan(&mut self) -> Result<Vec<ScanResult>> {
        if self.state.frequencies.is_empty() {
            return Err(Si46xxError::InvalidArgument(
                "no DAB frequency list installed".to_string(),
            ));
        }

        let frequencies = self.state.frequencies.clone();
        let mut results = Vec::with_capacity(frequencies.len());

        for (index, &frequency_khz) in frequencies.iter().enumerate() {
            let index = index as u8;
            let tuned = TuneSeekController::new(self.channel)
                .with_timing(self.timing.tune)
                .tune_dab(index, 0);
            match tuned {
                Ok(()) => {}
                Err(Si46xxError::Timeout(_)) => {
                    warn!("Scan: tune to index {} incomplete", index);
                }
                Err(e) => return Err(e),
            }

            let status = self.digrad_status()?;
            let ensemble = if status.acq {
                self.channel.delay_ms(self.timing.scan_settle_ms);
                Some(self.ensemble_info()?)
            } else {
                None
            };

            info!(
                "Channel {} ({} kHz): acq {} rssi {} snr {} {}",
                index,
                frequency_khz,
                status.acq,
                status.rssi,
                status.snr,
                ensemble.as_deref().unwrap_or("")
            );
            results.push(ScanResult {
                index,
                frequency_khz,
                status,
                ensemble,
            });
        }

        Ok(results)
    }
}
