//! # Configuration Module
//!
//! Handles loading and validating driver configuration from TOML files.
//!
//! Every section and every field is optional; missing values fall back to
//! the defaults below, which match the chip's datasheet timings and a
//! 19.2 MHz crystal.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::channel::ChannelTiming;
use crate::dab::channels::{frequency_list, region_channels, BAND_III};
use crate::error::{Result, Si46xxError};
use crate::flash::BootPolicy;
use crate::protocol::opcodes::{DAB_MAX_FREQUENCIES, HOST_LOAD_CHUNK_SIZE};
use crate::protocol::types::{Mode, PowerUpArgs};
use crate::rds::RdsLoopOptions;
use crate::tuner::TuneTiming;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub power_up: PowerUpConfig,

    #[serde(default)]
    pub firmware: FirmwareConfig,

    #[serde(default)]
    pub flash: FlashConfig,

    #[serde(default)]
    pub dab: DabConfig,

    #[serde(default)]
    pub rds: RdsConfig,

    #[serde(default)]
    pub properties: PropertiesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Poll budgets and settle times
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_cts_max_polls")]
    pub cts_max_polls: u32,

    #[serde(default = "default_cts_poll_interval_us")]
    pub cts_poll_interval_us: u32,

    #[serde(default = "default_load_settle_ms")]
    pub load_settle_ms: u32,

    #[serde(default = "default_boot_attempts")]
    pub boot_attempts: u32,

    #[serde(default = "default_boot_retry_delay_ms")]
    pub boot_retry_delay_ms: u32,

    #[serde(default = "default_tune_timeout_ms")]
    pub tune_timeout_ms: u32,

    #[serde(default = "default_seek_timeout_ms")]
    pub seek_timeout_ms: u32,

    #[serde(default = "default_dab_tune_attempts")]
    pub dab_tune_attempts: u32,

    #[serde(default = "default_dab_tune_poll_ms")]
    pub dab_tune_poll_ms: u32,

    #[serde(default = "default_rds_max_iterations")]
    pub rds_max_iterations: u32,

    #[serde(default = "default_service_list_attempts")]
    pub service_list_attempts: u32,

    #[serde(default = "default_digrad_attempts")]
    pub digrad_attempts: u32,

    #[serde(default = "default_ensemble_attempts")]
    pub ensemble_attempts: u32,

    /// Wait after acquiring an ensemble during a scan
    #[serde(default = "default_scan_settle_ms")]
    pub scan_settle_ms: u32,
}

/// POWER_UP arguments
#[derive(Debug, Deserialize, Clone)]
pub struct PowerUpConfig {
    #[serde(default = "default_cts_interrupt")]
    pub cts_interrupt: bool,

    #[serde(default = "default_clk_mode")]
    pub clk_mode: u8,

    #[serde(default = "default_tr_size")]
    pub tr_size: u8,

    #[serde(default = "default_ibias")]
    pub ibias: u8,

    #[serde(default = "default_xtal_freq")]
    pub xtal_freq: u32,

    #[serde(default = "default_ctun")]
    pub ctun: u8,

    #[serde(default = "default_ibias_run")]
    pub ibias_run: u8,
}

/// Firmware image locations
#[derive(Debug, Deserialize, Clone)]
pub struct FirmwareConfig {
    #[serde(default = "default_firmware_dir")]
    pub dir: String,

    #[serde(default = "default_patch_image")]
    pub patch: String,

    #[serde(default = "default_fm_image")]
    pub fm: String,

    #[serde(default = "default_dab_image")]
    pub dab: String,

    #[serde(default = "default_am_image")]
    pub am: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause after each HOST_LOAD chunk
    #[serde(default = "default_chunk_gap_ms")]
    pub chunk_gap_ms: u32,
}

/// Image offsets in external flash
#[derive(Debug, Deserialize, Clone)]
pub struct FlashConfig {
    #[serde(default = "default_patch_offset")]
    pub patch_offset: u32,

    #[serde(default = "default_fm_offset")]
    pub fm_offset: u32,

    #[serde(default = "default_dab_offset")]
    pub dab_offset: u32,

    #[serde(default = "default_am_offset")]
    pub am_offset: u32,
}

/// DAB frequency list, as Band III channel labels or a regional preset
#[derive(Debug, Deserialize, Clone)]
pub struct DabConfig {
    #[serde(default = "default_dab_channels")]
    pub channels: Vec<String>,

    /// Regional preset code; replaces `channels` when set
    #[serde(default)]
    pub region: Option<String>,
}

/// RDS decoding
#[derive(Debug, Deserialize, Clone)]
pub struct RdsConfig {
    #[serde(default = "default_stop_at_name")]
    pub stop_at_name: bool,
}

/// One SET_PROPERTY write
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PropertyWrite {
    pub id: u16,
    pub value: u16,
}

/// Property writes applied after a mode's image boots
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PropertiesConfig {
    #[serde(default)]
    pub fm: Vec<PropertyWrite>,

    #[serde(default)]
    pub am: Vec<PropertyWrite>,

    #[serde(default)]
    pub dab: Vec<PropertyWrite>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_cts_max_polls() -> u32 { 1000 }
fn default_cts_poll_interval_us() -> u32 { 20 }
fn default_load_settle_ms() -> u32 { 4 }
fn default_boot_attempts() -> u32 { 5 }
fn default_boot_retry_delay_ms() -> u32 { 300 }
fn default_tune_timeout_ms() -> u32 { 100 }
fn default_seek_timeout_ms() -> u32 { 2000 }
fn default_dab_tune_attempts() -> u32 { 20 }
fn default_dab_tune_poll_ms() -> u32 { 100 }
fn default_rds_max_iterations() -> u32 { 5000 }
fn default_service_list_attempts() -> u32 { 100 }
fn default_digrad_attempts() -> u32 { 10 }
fn default_ensemble_attempts() -> u32 { 10 }
fn default_scan_settle_ms() -> u32 { 1000 }
fn default_cts_interrupt() -> bool { true }
fn default_clk_mode() -> u8 { 1 }
fn default_tr_size() -> u8 { 7 }
fn default_ibias() -> u8 { 0x48 }
fn default_xtal_freq() -> u32 { 19_200_000 }
fn default_ctun() -> u8 { 0x1F }
fn default_ibias_run() -> u8 { 0 }
fn default_firmware_dir() -> String { "firmware".to_string() }
fn default_patch_image() -> String { "patch.bin".to_string() }
fn default_fm_image() -> String { "fm.bif".to_string() }
fn default_dab_image() -> String { "dab.bif".to_string() }
fn default_am_image() -> String { "am.bif".to_string() }
fn default_chunk_size() -> usize { HOST_LOAD_CHUNK_SIZE }
fn default_chunk_gap_ms() -> u32 { 1 }
fn default_patch_offset() -> u32 { 0x0000_2000 }
fn default_fm_offset() -> u32 { 0x0000_6000 }
fn default_dab_offset() -> u32 { 0x0008_6000 }
fn default_am_offset() -> u32 { 0x0010_6000 }
fn default_dab_channels() -> Vec<String> {
    BAND_III.iter().map(|(label, _)| label.to_string()).collect()
}
fn default_stop_at_name() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cts_max_polls: default_cts_max_polls(),
            cts_poll_interval_us: default_cts_poll_interval_us(),
            load_settle_ms: default_load_settle_ms(),
            boot_attempts: default_boot_attempts(),
            boot_retry_delay_ms: default_boot_retry_delay_ms(),
            tune_timeout_ms: default_tune_timeout_ms(),
            seek_timeout_ms: default_seek_timeout_ms(),
            dab_tune_attempts: default_dab_tune_attempts(),
            dab_tune_poll_ms: default_dab_tune_poll_ms(),
            rds_max_iterations: default_rds_max_iterations(),
            service_list_attempts: default_service_list_attempts(),
            digrad_attempts: default_digrad_attempts(),
            ensemble_attempts: default_ensemble_attempts(),
            scan_settle_ms: default_scan_settle_ms(),
        }
    }
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            cts_interrupt: default_cts_interrupt(),
            clk_mode: default_clk_mode(),
            tr_size: default_tr_size(),
            ibias: default_ibias(),
            xtal_freq: default_xtal_freq(),
            ctun: default_ctun(),
            ibias_run: default_ibias_run(),
        }
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            dir: default_firmware_dir(),
            patch: default_patch_image(),
            fm: default_fm_image(),
            dab: default_dab_image(),
            am: default_am_image(),
            chunk_size: default_chunk_size(),
            chunk_gap_ms: default_chunk_gap_ms(),
        }
    }
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            patch_offset: default_patch_offset(),
            fm_offset: default_fm_offset(),
            dab_offset: default_dab_offset(),
            am_offset: default_am_offset(),
        }
    }
}

impl Default for DabConfig {
    fn default() -> Self {
        Self {
            channels: default_dab_channels(),
            region: None,
        }
    }
}

impl Default for RdsConfig {
    fn default() -> Self {
        Self {
            stop_at_name: default_stop_at_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TimingConfig {
    pub fn channel_timing(&self) -> ChannelTiming {
        ChannelTiming {
            max_polls: self.cts_max_polls,
            poll_interval_us: self.cts_poll_interval_us,
        }
    }

    pub fn boot_policy(&self) -> BootPolicy {
        BootPolicy {
            attempts: self.boot_attempts,
            retry_delay_ms: self.boot_retry_delay_ms,
        }
    }

    pub fn tune_timing(&self) -> TuneTiming {
        TuneTiming {
            dab_tune_attempts: self.dab_tune_attempts,
            dab_tune_poll_ms: self.dab_tune_poll_ms,
        }
    }
}

impl PowerUpConfig {
    pub fn to_args(&self) -> PowerUpArgs {
        PowerUpArgs {
            cts_interrupt: self.cts_interrupt,
            clk_mode: self.clk_mode,
            tr_size: self.tr_size,
            ibias: self.ibias,
            xtal_freq: self.xtal_freq,
            ctun: self.ctun,
            ibias_run: self.ibias_run,
        }
    }
}

impl FirmwareConfig {
    pub fn patch_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.patch)
    }

    /// Image file for a receiver mode, `None` for boot/unknown
    pub fn image_path(&self, mode: Mode) -> Option<PathBuf> {
        let file = match mode {
            Mode::Fm => &self.fm,
            Mode::Dab => &self.dab,
            Mode::Am => &self.am,
            Mode::Boot | Mode::Unknown => return None,
        };
        Some(Path::new(&self.dir).join(file))
    }
}

impl FlashConfig {
    /// Flash offset of a receiver mode's image, `None` for boot/unknown
    pub fn offset(&self, mode: Mode) -> Option<u32> {
        match mode {
            Mode::Fm => Some(self.fm_offset),
            Mode::Dab => Some(self.dab_offset),
            Mode::Am => Some(self.am_offset),
            Mode::Boot | Mode::Unknown => None,
        }
    }
}

impl DabConfig {
    /// True if a frequency list should be installed after DAB boot
    pub fn has_frequencies(&self) -> bool {
        self.region.is_some() || !self.channels.is_empty()
    }

    /// Resolve the region preset, or else the channel labels, to
    /// frequencies in kHz
    pub fn frequencies_khz(&self) -> Result<Vec<u32>> {
        match &self.region {
            Some(code) => {
                let labels = region_channels(code).ok_or_else(|| {
                    Si46xxError::InvalidArgument(format!("unknown DAB region '{}'", code))
                })?;
                frequency_list(labels)
            }
            None => frequency_list(self.channels.as_slice()),
        }
    }
}

impl PropertiesConfig {
    pub fn for_mode(&self, mode: Mode) -> &[PropertyWrite] {
        match mode {
            Mode::Fm => &self.fm,
            Mode::Am => &self.am,
            Mode::Dab => &self.dab,
            Mode::Boot | Mode::Unknown => &[],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use si46xx_ctl::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// RDS loop limits from the timing and rds sections
    pub fn rds_options(&self) -> RdsLoopOptions {
        RdsLoopOptions {
            max_iterations: self.timing.rds_max_iterations,
            stop_at_name: self.rds.stop_at_name,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `Config` if any value is out of its valid range
    pub fn validate(&self) -> Result<()> {
        // Poll budgets
        for (name, value) in [
            ("cts_max_polls", self.timing.cts_max_polls),
            ("boot_attempts", self.timing.boot_attempts),
            ("dab_tune_attempts", self.timing.dab_tune_attempts),
            ("rds_max_iterations", self.timing.rds_max_iterations),
            ("service_list_attempts", self.timing.service_list_attempts),
            ("digrad_attempts", self.timing.digrad_attempts),
            ("ensemble_attempts", self.timing.ensemble_attempts),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        // Power-up bit fields
        if self.power_up.clk_mode > 3 {
            return Err(invalid("clk_mode must be between 0 and 3"));
        }
        if self.power_up.tr_size > 15 {
            return Err(invalid("tr_size must be between 0 and 15"));
        }

        // Firmware
        if self.firmware.dir.is_empty() {
            return Err(invalid("firmware dir cannot be empty"));
        }
        if self.firmware.chunk_size == 0 || self.firmware.chunk_size > HOST_LOAD_CHUNK_SIZE {
            return Err(invalid(format!(
                "chunk_size must be between 1 and {}",
                HOST_LOAD_CHUNK_SIZE
            )));
        }

        // DAB frequency list
        if self.dab.channels.len() > DAB_MAX_FREQUENCIES {
            return Err(invalid(format!(
                "dab channels holds {} entries, at most {} allowed",
                self.dab.channels.len(),
                DAB_MAX_FREQUENCIES
            )));
        }
        if self.dab.has_frequencies() {
            self.dab
                .frequencies_khz()
                .map_err(|e| invalid(format!("dab channels: {}", e)))?;
        }

        // Log level
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

fn invalid<S: std::fmt::Display>(message: S) -> Si46xxError {
    Si46xxError::Config(toml::de::Error::custom(message))
}
