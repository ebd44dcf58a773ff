//! # Si46xx Session
//!
//! [`Si46xx`] owns the command channel, the configuration and the DAB
//! state, and exposes the device-level operations: power-up, image
//! loading and mode switching, properties, status reads and the receiver
//! controllers.
//!
//! Mode switching follows the chip's boot flow:
//!
//! ```text
//! (unknown) -> POWER_UP -> patch -> LOAD_INIT -> image -> BOOT -> (fm | am | dab)
//! ```

use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::config::Config;
use crate::dab::{DabController, DabState, DabTiming, ServiceList};
use crate::error::{Result, Si46xxError};
use crate::firmware::FirmwareLoader;
use crate::flash::{self, FlashProgrammer};
use crate::protocol::decoder::{
    decode_am_rsq, decode_fm_rsq, decode_part_info, decode_property_value,
    decode_rds_blockcount, decode_sys_state,
};
use crate::protocol::encoder::{get_property_args, power_up_args, set_property_args};
use crate::protocol::opcodes::{
    AM_RSQ_STATUS, FM_RDS_BLOCKCOUNT, FM_RSQ_STATUS, GET_PART_INFO, GET_PROPERTY,
    GET_SYS_STATE, POWER_UP, SET_PROPERTY, STATUS_HEADER_LEN,
};
use crate::protocol::types::{Mode, PartInfo, RdsBlockCount, RsqStatus, SysState};
use crate::rds::{self, RdsAccumulator};
use crate::transport::Transport;
use crate::tuner::{SeekDirection, TuneSeekController};

const SYS_STATE_REPLY_LEN: usize = 6;
const PART_INFO_REPLY_LEN: usize = 22;
const PROPERTY_REPLY_LEN: usize = 6;
const FM_RSQ_REPLY_LEN: usize = 20;
const AM_RSQ_REPLY_LEN: usize = 16;
const RDS_BLOCKCOUNT_REPLY_LEN: usize = 10;

/// Settle time after POWER_UP
const POWER_UP_SETTLE_MS: u32 = 1;

/// Driver session for one Si46xx chip
pub struct Si46xx<T, D> {
    channel: CommandChannel<T, D>,
    config: Config,
    dab: DabState,
    /// Mode from the last sys state read
    mode: Mode,
}

impl<T, D> std::fmt::Debug for Si46xx<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Si46xx")
            .field("mode", &self.mode)
            .field("channel", &self.channel)
            .field("dab", &self.dab)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, D: DelayNs> Si46xx<T, D> {
    /// Create a session
    ///
    /// # Arguments
    ///
    /// * `transport` - SPI or I2C adapter
    /// * `delay` - Sleep provider
    /// * `config` - Validated configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use si46xx_ctl::config::Config;
    /// use si46xx_ctl::transport::{StdDelay, Transport};
    /// use si46xx_ctl::{Mode, Si46xx};
    ///
    /// # fn demo<T: Transport>(transport: T) -> si46xx_ctl::Result<()> {
    /// let config = Config::load("config/default.toml")?;
    /// let mut radio = Si46xx::new(transport, StdDelay, config);
    /// radio.init_mode(Mode::Fm)?;
    /// radio.tune(98_500, 0)?;
    /// radio.wait_tune()?;
    /// println!("{:?}", radio.rsq_status(Mode::Fm)?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(transport: T, delay: D, config: Config) -> Self {
        let channel =
            CommandChannel::with_timing(transport, delay, config.timing.channel_timing());
        Self {
            channel,
            config,
            dab: DabState::default(),
            mode: Mode::Unknown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mode seen by the last sys state read
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn dab_state(&self) -> &DabState {
        &self.dab
    }

    /// Service list from the last [`DabController::service_list`] call
    pub fn services(&self) -> &ServiceList {
        &self.dab.service_list
    }

    /// Direct access to the command channel
    pub fn channel(&mut self) -> &mut CommandChannel<T, D> {
        &mut self.channel
    }

    /// Release the transport and delay
    pub fn into_parts(self) -> (T, D) {
        self.channel.into_parts()
    }

    /// Read the running image
    pub fn sys_state(&mut self) -> Result<SysState> {
        let reply = self
            .channel
            .command(GET_SYS_STATE, &[0x00], SYS_STATE_REPLY_LEN)?;
        let state = decode_sys_state(&reply.raw)?;
        debug!("Sys state: image {} ({})", state.image, state.mode);
        self.mode = state.mode;
        Ok(state)
    }

    /// Read the running image as a mode
    pub fn sys_mode(&mut self) -> Result<Mode> {
        self.sys_state().map(|state| state.mode)
    }

    /// Chip revision and part number
    pub fn part_info(&mut self) -> Result<PartInfo> {
        let reply = self
            .channel
            .command(GET_PART_INFO, &[0x00], PART_INFO_REPLY_LEN)?;
        let info = decode_part_info(&reply.raw)?;
        info!(
            "Si46{:02} rev 0x{:02X} rom 0x{:02X}",
            info.part % 100,
            info.chip_rev,
            info.rom_id
        );
        Ok(info)
    }

    /// Power up with the configured crystal settings
    pub fn power_up(&mut self) -> Result<()> {
        info!("POWER_UP");
        let args = power_up_args(&self.config.power_up.to_args());
        self.channel.send(POWER_UP, &args)?;
        self.channel.delay_ms(POWER_UP_SETTLE_MS);
        self.channel.read_reply(STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Prepare the bootloader for a new image
    pub fn load_init(&mut self) -> Result<()> {
        FirmwareLoader::new(&mut self.channel)
            .with_settle_ms(self.config.timing.load_settle_ms)
            .load_init()
    }

    /// Mode for boot decisions; a chip that rejects GET_SYS_STATE has not
    /// been powered up yet
    fn current_mode(&mut self) -> Result<Mode> {
        match self.sys_mode() {
            Err(Si46xxError::Protocol(err)) => {
                debug!("GET_SYS_STATE rejected ({}), treating mode as unknown", err);
                self.mode = Mode::Unknown;
                Ok(Mode::Unknown)
            }
            other => other,
        }
    }

    /// Bring the chip into bootloader mode with the patch applied
    ///
    /// Does nothing if the bootloader is already running. A chip in an
    /// unknown state is powered up first.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the patch file cannot be read
    pub fn init_patch(&mut self) -> Result<()> {
        let mode = self.current_mode()?;
        if mode == Mode::Boot {
            return Ok(());
        }

        if mode == Mode::Unknown {
            self.power_up()?;
        }

        let path = self.config.firmware.patch_path();
        info!("Loading patch {}", path.display());
        FirmwareLoader::new(&mut self.channel)
            .with_settle_ms(self.config.timing.load_settle_ms)
            .with_chunk_size(self.config.firmware.chunk_size)
            .with_chunk_gap_ms(self.config.firmware.chunk_gap_ms)
            .load_file(&path)?;
        Ok(())
    }

    /// Switch to `mode`, loading and booting its image from the host
    ///
    /// Skips everything if the chip already runs `mode`. After booting a
    /// receiver image the configured properties for that mode are written;
    /// DAB additionally gets the configured frequency list.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - `mode` is `Unknown`
    /// * `Io` - Patch or image file missing
    /// * Any device error from the boot sequence
    pub fn init_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == Mode::Unknown {
            return Err(Si46xxError::InvalidArgument(
                "cannot switch to unknown mode".to_string(),
            ));
        }

        if self.current_mode()? == mode {
            debug!("Already in {} mode", mode);
            return Ok(());
        }
        info!("Switching to {} mode", mode);

        self.init_patch()?;

        let Some(path) = self.config.firmware.image_path(mode) else {
            return self.load_init();
        };

        FirmwareLoader::new(&mut self.channel)
            .with_settle_ms(self.config.timing.load_settle_ms)
            .with_chunk_size(self.config.firmware.chunk_size)
            .with_chunk_gap_ms(self.config.firmware.chunk_gap_ms)
            .load_file(&path)?;
        flash::boot(&mut self.channel, self.config.timing.boot_policy())?;

        self.sys_state()?;
        self.part_info()?;
        self.apply_mode_settings(mode)
    }

    /// Boot the image stored in external flash at `offset`
    pub fn boot_flash(&mut self, offset: u32) -> Result<()> {
        self.init_patch()?;
        self.flash().load_and_boot(offset)?;
        self.sys_state()?;
        Ok(())
    }

    /// Boot `mode` from its configured flash offset and apply its settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for modes without a flash image
    pub fn boot_flash_mode(&mut self, mode: Mode) -> Result<()> {
        let offset = self.config.flash.offset(mode).ok_or_else(|| {
            Si46xxError::InvalidArgument(format!("no flash image for {} mode", mode))
        })?;
        self.boot_flash(offset)?;
        if self.mode != mode {
            warn!("Flash image at 0x{:08X} booted into {} mode", offset, self.mode);
        }
        self.apply_mode_settings(mode)
    }

    fn apply_mode_settings(&mut self, mode: Mode) -> Result<()> {
        let writes = self.config.properties.for_mode(mode).to_vec();
        for write in writes {
            self.set_property(write.id, write.value)?;
        }

        if mode == Mode::Dab && self.config.dab.has_frequencies() {
            let freqs = self.config.dab.frequencies_khz()?;
            self.dab().set_freq_list(&freqs)?;
        }
        Ok(())
    }

    /// Flash utility configured from the session settings
    pub fn flash(&mut self) -> FlashProgrammer<'_, T, D> {
        let policy = self.config.timing.boot_policy();
        FlashProgrammer::new(&mut self.channel)
            .with_boot_policy(policy)
            .with_settle_ms(self.config.timing.load_settle_ms)
    }

    /// Write one property
    pub fn set_property(&mut self, id: u16, value: u16) -> Result<()> {
        debug!("SET_PROPERTY 0x{:04X} = 0x{:04X}", id, value);
        self.channel
            .command(SET_PROPERTY, &set_property_args(id, value), STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Read one property
    pub fn get_property(&mut self, id: u16) -> Result<u16> {
        let reply = self
            .channel
            .command(GET_PROPERTY, &get_property_args(id), PROPERTY_REPLY_LEN)?;
        decode_property_value(&reply.raw)
    }

    /// Received signal quality of the analog receivers
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for modes other than FM and AM
    pub fn rsq_status(&mut self, mode: Mode) -> Result<RsqStatus> {
        match mode {
            Mode::Fm => {
                self.channel.send(FM_RSQ_STATUS, &[0x00])?;
                decode_fm_rsq(&self.channel.poll_reply(FM_RSQ_REPLY_LEN)?.raw)
            }
            Mode::Am => {
                self.channel.send(AM_RSQ_STATUS, &[0x00])?;
                decode_am_rsq(&self.channel.poll_reply(AM_RSQ_REPLY_LEN)?.raw)
            }
            other => Err(Si46xxError::InvalidArgument(format!(
                "no RSQ status in {} mode",
                other
            ))),
        }
    }

    /// Decode RDS until the station name (and radiotext, if configured)
    /// is complete or sync is lost
    pub fn rds_status(&mut self) -> Result<RdsAccumulator> {
        let options = self.config.rds_options();
        let rds = rds::decode_loop(&mut self.channel, options)?;
        info!(
            "RDS sync {} PI 0x{:04X} name '{}' text '{}'",
            rds.sync,
            rds.pi,
            rds.ps_name(),
            rds.radiotext()
        );
        Ok(rds)
    }

    /// RDS block counters
    pub fn rds_blockcount(&mut self) -> Result<RdsBlockCount> {
        self.channel.send(FM_RDS_BLOCKCOUNT, &[0x00])?;
        let reply = self.channel.poll_reply(RDS_BLOCKCOUNT_REPLY_LEN)?;
        decode_rds_blockcount(&reply.raw)
    }

    /// Tune/seek controller configured from the session settings
    pub fn tuner(&mut self) -> TuneSeekController<'_, T, D> {
        let timing = self.config.timing.tune_timing();
        TuneSeekController::new(&mut self.channel).with_timing(timing)
    }

    /// Tune in the current mode
    ///
    /// # Arguments
    ///
    /// * `freq` - kHz for FM/AM, frequency list index for DAB
    /// * `antcap` - Antenna capacitance, 0 for automatic
    pub fn tune(&mut self, freq: u32, antcap: u16) -> Result<()> {
        let mode = self.mode;
        self.tuner().tune(mode, freq, antcap)
    }

    /// Start a seek in the current mode
    pub fn seek(&mut self, direction: SeekDirection, wrap: bool) -> Result<()> {
        let mode = self.mode;
        self.tuner().seek(mode, direction, wrap)
    }

    /// Wait for a tune to complete, within the configured tune timeout
    pub fn wait_tune(&mut self) -> Result<()> {
        let timeout = self.config.timing.tune_timeout_ms;
        self.tuner().wait(timeout)
    }

    /// Wait for a seek to complete, within the configured seek timeout
    pub fn wait_seek(&mut self) -> Result<()> {
        let timeout = self.config.timing.seek_timeout_ms;
        self.tuner().wait(timeout)
    }

    /// DAB controller configured from the session settings
    pub fn dab(&mut self) -> DabController<'_, T, D> {
        let timing = &self.config.timing;
        let dab_timing = DabTiming {
            service_list_attempts: timing.service_list_attempts,
            digrad_attempts: timing.digrad_attempts,
            ensemble_attempts: timing.ensemble_attempts,
            scan_settle_ms: timing.scan_settle_ms,
            tune: timing.tune_timing(),
        };
        DabController::new(&mut self.channel, &mut self.dab).with_timing(dab_timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyWrite;
    use crate::protocol::opcodes::{
        BOOT, DAB_SET_FREQ_LIST, FLASH_LOAD, FM_TUNE_FREQ, HOST_LOAD, LOAD_INIT,
    };
    use crate::protocol::encoder::flash_load_args;
    use crate::transport::mocks::{RecordingDelay, ScriptedTransport};
    use std::fs;
    use tempfile::TempDir;

    /// Status + sys state reply for an image id
    fn sys_state_reply(image: u8) -> [u8; 6] {
        [0x80, 0x00, 0x00, 0xC0, image, 0x00]
    }

    fn firmware_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("patch.bin"), vec![0xA5; 100]).unwrap();
        fs::write(dir.path().join("fm.bif"), vec![0x11; 3000]).unwrap();
        fs::write(dir.path().join("dab.bif"), vec![0x22; 10]).unwrap();
        fs::write(dir.path().join("am.bif"), vec![0x33; 10]).unwrap();
        dir
    }

    fn session(
        transport: &ScriptedTransport,
        config: Config,
    ) -> (RecordingDelay, Si46xx<ScriptedTransport, RecordingDelay>) {
        let delay = RecordingDelay::new();
        let radio = Si46xx::new(transport.clone(), delay.clone(), config);
        (delay, radio)
    }

    fn config_with_firmware(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.firmware.dir = dir.path().to_string_lossy().into_owned();
        config.timing.boot_retry_delay_ms = 1;
        config
    }

    fn opcodes(transport: &ScriptedTransport) -> Vec<u8> {
        transport.writes().iter().map(|w| w[0]).collect()
    }

    #[test]
    fn test_sys_state_updates_mode() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(2));
        let (_delay, mut radio) = session(&transport, Config::default());

        let state = radio.sys_state().unwrap();

        assert_eq!(state.image, 2);
        assert_eq!(state.mode, Mode::Dab);
        assert_eq!(radio.mode(), Mode::Dab);
        assert_eq!(transport.commands(GET_SYS_STATE), vec![vec![GET_SYS_STATE, 0x00]]);
    }

    #[test]
    fn test_part_info() {
        let transport = ScriptedTransport::new();
        let mut reply = vec![0u8; 22];
        reply[0] = 0x80;
        reply[4] = 0x02;
        reply[5] = 0x11;
        reply[8..10].copy_from_slice(&4684u16.to_le_bytes());
        transport.push_command_reply(&reply);
        let (_delay, mut radio) = session(&transport, Config::default());

        let info = radio.part_info().unwrap();

        assert_eq!(info.chip_rev, 0x02);
        assert_eq!(info.rom_id, 0x11);
        assert_eq!(info.part, 4684);
    }

    #[test]
    fn test_power_up_packet() {
        let transport = ScriptedTransport::new();
        let (delay, mut radio) = session(&transport, Config::default());

        radio.power_up().unwrap();

        assert_eq!(
            transport.commands(POWER_UP),
            vec![vec![
                POWER_UP, 0x80, 0x17, 0x48, 0x00, 0xF8, 0x24, 0x01, 0x1F, 0x10, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00
            ]]
        );
        assert_eq!(delay.total_ms(), 1);
    }

    #[test]
    fn test_power_up_rejected() {
        let transport = ScriptedTransport::new();
        transport.push_reply(&[0x80, 0x00, 0x00, 0xC0]);
        transport.push_reply(&[0xC0, 0x00, 0x00, 0x01]);
        let (_delay, mut radio) = session(&transport, Config::default());

        assert!(matches!(radio.power_up(), Err(Si46xxError::Protocol(_))));
    }

    #[test]
    fn test_init_patch_skipped_in_bootloader() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0));
        let (_delay, mut radio) = session(&transport, Config::default());

        radio.init_patch().unwrap();

        assert_eq!(opcodes(&transport), vec![GET_SYS_STATE]);
    }

    #[test]
    fn test_init_patch_powers_up_unknown_chip() {
        let dir = firmware_dir();
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0x0F));
        let (_delay, mut radio) = session(&transport, config_with_firmware(&dir));

        radio.init_patch().unwrap();

        assert_eq!(
            opcodes(&transport),
            vec![GET_SYS_STATE, POWER_UP, LOAD_INIT, HOST_LOAD]
        );
        let patch = &transport.commands(HOST_LOAD)[0];
        assert_eq!(patch.len(), 4 + 100);
        assert!(patch[4..].iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn test_init_patch_missing_file() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(1));
        let mut config = Config::default();
        config.firmware.dir = "/nonexistent/si46xx".to_string();
        let (_delay, mut radio) = session(&transport, config);

        assert!(matches!(radio.init_patch(), Err(Si46xxError::Io(_))));
    }

    #[test]
    fn test_init_mode_skips_running_mode() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(1));
        let (_delay, mut radio) = session(&transport, Config::default());

        radio.init_mode(Mode::Fm).unwrap();

        assert_eq!(opcodes(&transport), vec![GET_SYS_STATE]);
        assert_eq!(radio.mode(), Mode::Fm);
    }

    #[test]
    fn test_init_mode_rejects_unknown() {
        let transport = ScriptedTransport::new();
        let (_delay, mut radio) = session(&transport, Config::default());

        assert!(matches!(
            radio.init_mode(Mode::Unknown),
            Err(Si46xxError::InvalidArgument(_))
        ));
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_init_mode_boot_only_load_init() {
        let dir = firmware_dir();
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(1));
        let (_delay, mut radio) = session(&transport, config_with_firmware(&dir));

        radio.init_mode(Mode::Boot).unwrap();

        assert_eq!(
            opcodes(&transport),
            vec![GET_SYS_STATE, GET_SYS_STATE, LOAD_INIT, HOST_LOAD, LOAD_INIT]
        );
    }

    #[test]
    fn test_init_mode_fm_from_bootloader() {
        let dir = firmware_dir();
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0));
        let mut config = config_with_firmware(&dir);
        config.properties.fm = vec![PropertyWrite { id: 0x3C00, value: 0x0001 }];
        let (_delay, mut radio) = session(&transport, config);

        radio.init_mode(Mode::Fm).unwrap();

        assert_eq!(
            opcodes(&transport),
            vec![
                GET_SYS_STATE,
                GET_SYS_STATE,
                LOAD_INIT,
                HOST_LOAD,
                HOST_LOAD,
                BOOT,
                GET_SYS_STATE,
                GET_PART_INFO,
                SET_PROPERTY
            ]
        );
        let chunks = transport.commands(HOST_LOAD);
        assert_eq!(chunks[0].len(), 4 + 2048);
        assert_eq!(chunks[1].len(), 4 + 952);
        assert_eq!(
            transport.commands(SET_PROPERTY),
            vec![vec![SET_PROPERTY, 0x00, 0x00, 0x3C, 0x01, 0x00]]
        );
    }

    #[test]
    fn test_init_mode_dab_installs_frequency_list() {
        let dir = firmware_dir();
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0));
        let mut config = config_with_firmware(&dir);
        config.dab.channels = vec!["5C".to_string(), "11D".to_string()];
        let (_delay, mut radio) = session(&transport, config);

        radio.init_mode(Mode::Dab).unwrap();

        let lists = transport.commands(DAB_SET_FREQ_LIST);
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0][1], 2);
        assert_eq!(radio.dab_state().frequencies, vec![178_352, 222_064]);
    }

    #[test]
    fn test_init_mode_dab_uses_region_preset() {
        let dir = firmware_dir();
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0));
        let mut config = config_with_firmware(&dir);
        config.dab.channels.clear();
        config.dab.region = Some("rp".to_string());
        let (_delay, mut radio) = session(&transport, config);

        radio.init_mode(Mode::Dab).unwrap();

        assert_eq!(radio.dab_state().frequencies, vec![178_352, 216_928]);
    }

    #[test]
    fn test_boot_flash() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(0));
        let mut config = Config::default();
        config.timing.boot_retry_delay_ms = 1;
        let (_delay, mut radio) = session(&transport, config);

        radio.boot_flash(0x6000).unwrap();

        assert_eq!(
            opcodes(&transport),
            vec![GET_SYS_STATE, LOAD_INIT, FLASH_LOAD, BOOT, GET_SYS_STATE]
        );
        let mut expected = vec![FLASH_LOAD];
        expected.extend_from_slice(&flash_load_args(0x6000));
        assert_eq!(transport.commands(FLASH_LOAD), vec![expected]);
    }

    #[test]
    fn test_boot_flash_mode_rejects_boot() {
        let transport = ScriptedTransport::new();
        let (_delay, mut radio) = session(&transport, Config::default());

        assert!(matches!(
            radio.boot_flash_mode(Mode::Boot),
            Err(Si46xxError::InvalidArgument(_))
        ));
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_properties() {
        let transport = ScriptedTransport::new();
        let (_delay, mut radio) = session(&transport, Config::default());

        radio.set_property(0x0800, 0x0003).unwrap();
        transport.push_command_reply(&[0x80, 0x00, 0x00, 0xC0, 0x34, 0x12]);
        let value = radio.get_property(0x3100).unwrap();

        assert_eq!(value, 0x1234);
        assert_eq!(
            transport.commands(SET_PROPERTY),
            vec![vec![SET_PROPERTY, 0x00, 0x00, 0x08, 0x03, 0x00]]
        );
        assert_eq!(
            transport.commands(GET_PROPERTY),
            vec![vec![GET_PROPERTY, 0x01, 0x00, 0x31]]
        );
    }

    #[test]
    fn test_fm_rsq_status() {
        let transport = ScriptedTransport::new();
        let mut reply = vec![0u8; 20];
        reply[0] = 0x80;
        reply[6..8].copy_from_slice(&10_550u16.to_le_bytes());
        reply[8] = 3;
        reply[9] = 45;
        reply[10] = 0xFE; // -2 dB
        reply[12..14].copy_from_slice(&30u16.to_le_bytes());
        transport.push_command_reply(&reply);
        let (_delay, mut radio) = session(&transport, Config::default());

        let rsq = radio.rsq_status(Mode::Fm).unwrap();

        assert_eq!(rsq.frequency, 105_500);
        assert_eq!(rsq.rssi, 45);
        assert_eq!(rsq.snr, -2);
        assert_eq!(rsq.freq_offset, 3);
        assert_eq!(rsq.read_ant_cap, 30);
        assert_eq!(rsq.am_modulation_pct, None);
    }

    #[test]
    fn test_am_rsq_status() {
        let transport = ScriptedTransport::new();
        let mut reply = vec![0u8; 16];
        reply[0] = 0x80;
        reply[6..8].copy_from_slice(&1_404u16.to_le_bytes());
        reply[11] = 80;
        reply[15] = 0;
        transport.push_command_reply(&reply);
        let (_delay, mut radio) = session(&transport, Config::default());

        let rsq = radio.rsq_status(Mode::Am).unwrap();

        assert_eq!(rsq.frequency, 1_404);
        assert_eq!(rsq.am_modulation_pct, Some(80));
        assert_eq!(rsq.hd_level_pct, Some(0));
    }

    #[test]
    fn test_rsq_status_other_modes() {
        let transport = ScriptedTransport::new();
        let (_delay, mut radio) = session(&transport, Config::default());

        assert!(matches!(
            radio.rsq_status(Mode::Dab),
            Err(Si46xxError::InvalidArgument(_))
        ));
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_rds_blockcount() {
        let transport = ScriptedTransport::new();
        transport.push_command_reply(&[0x80, 0, 0, 0, 10, 0, 8, 0, 1, 0]);
        let (_delay, mut radio) = session(&transport, Config::default());

        let counts = radio.rds_blockcount().unwrap();

        assert_eq!(counts.expected, 10);
        assert_eq!(counts.received, 8);
        assert_eq!(counts.uncorrectable, 1);
        assert_eq!(
            transport.commands(FM_RDS_BLOCKCOUNT),
            vec![vec![FM_RDS_BLOCKCOUNT, 0x00]]
        );
    }

    #[test]
    fn test_rds_status_stops_on_sync_loss() {
        let transport = ScriptedTransport::new();
        // idle replies carry no RDSSYNC bit
        let (_delay, mut radio) = session(&transport, Config::default());

        let rds = radio.rds_status().unwrap();

        assert!(!rds.sync);
        assert_eq!(transport.commands(crate::protocol::opcodes::FM_RDS_STATUS).len(), 1);
    }

    #[test]
    fn test_tune_uses_current_mode() {
        let transport = ScriptedTransport::new();
        transport.set_idle(&sys_state_reply(1));
        let (_delay, mut radio) = session(&transport, Config::default());

        assert!(matches!(
            radio.tune(98_500, 0),
            Err(Si46xxError::InvalidArgument(_))
        ));

        radio.sys_state().unwrap();
        radio.tune(98_500, 0).unwrap();

        assert_eq!(
            transport.commands(FM_TUNE_FREQ),
            vec![vec![FM_TUNE_FREQ, 0x00, 0x7A, 0x26, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_wait_tune_uses_configured_timeout() {
        let transport = ScriptedTransport::new();
        let mut config = Config::default();
        config.timing.tune_timeout_ms = 5;
        let (_delay, mut radio) = session(&transport, config);

        assert!(matches!(radio.wait_tune(), Err(Si46xxError::Timeout(_))));
        assert_eq!(transport.query_count(), 5);
    }

    #[test]
    fn test_dab_controller_uses_configured_timing() {
        let transport = ScriptedTransport::new();
        let mut config = Config::default();
        config.timing.service_list_attempts = 2;
        let (_delay, mut radio) = session(&transport, config);

        assert!(radio.dab().service_list().is_err());
        assert_eq!(
            transport
                .commands(crate::protocol::opcodes::DAB_GET_DIGITAL_SERVICE_LIST)
                .len(),
            2
        );
        assert!(radio.services().is_empty());
    }
}
