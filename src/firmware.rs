//! # Firmware Loader
//!
//! Uploads a raw image into the chip's RAM through the bootloader:
//!
//! ```text
//! LOAD_INIT -> settle -> HOST_LOAD chunk, gap ... -> settle -> completion reply -> settle
//! ```
//!
//! The first failure aborts the load; the bootloader has no resume, so the
//! caller starts over from LOAD_INIT.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use embedded_hal::delay::DelayNs;
use tracing::{debug, info};

use crate::channel::CommandChannel;
use crate::error::{Result, Si46xxError};
use crate::protocol::opcodes::{HOST_LOAD_CHUNK_SIZE, LOAD_INIT, STATUS_HEADER_LEN};
use crate::transport::Transport;

/// Default settle time around LOAD_INIT and after the last chunk
pub const DEFAULT_SETTLE_MS: u32 = 4;

/// Default pause after each HOST_LOAD chunk
pub const DEFAULT_CHUNK_GAP_MS: u32 = 1;

/// Uploads images over a borrowed command channel
pub struct FirmwareLoader<'a, T, D> {
    channel: &'a mut CommandChannel<T, D>,
    settle_ms: u32,
    chunk_size: usize,
    chunk_gap_ms: u32,
}

impl<'a, T: Transport, D: DelayNs> FirmwareLoader<'a, T, D> {
    pub fn new(channel: &'a mut CommandChannel<T, D>) -> Self {
        Self {
            channel,
            settle_ms: DEFAULT_SETTLE_MS,
            chunk_size: HOST_LOAD_CHUNK_SIZE,
            chunk_gap_ms: DEFAULT_CHUNK_GAP_MS,
        }
    }

    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Use smaller HOST_LOAD chunks (clamped to 1..=2048)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, HOST_LOAD_CHUNK_SIZE);
        self
    }

    /// Pause after every HOST_LOAD chunk; 0 disables the gap
    pub fn with_chunk_gap_ms(mut self, chunk_gap_ms: u32) -> Self {
        self.chunk_gap_ms = chunk_gap_ms;
        self
    }

    /// Prepare the bootloader for a new image
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the chip rejects LOAD_INIT
    pub fn load_init(&mut self) -> Result<()> {
        debug!("LOAD_INIT");
        self.channel.send(LOAD_INIT, &[0x00])?;
        self.channel.delay_ms(self.settle_ms);
        self.channel.read_reply(STATUS_HEADER_LEN)?;
        Ok(())
    }

    /// Upload an in-memory image
    ///
    /// # Arguments
    ///
    /// * `image` - Raw firmware bytes
    ///
    /// # Errors
    ///
    /// Returns the first transport or device error; nothing after it is sent
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use si46xx_ctl::channel::CommandChannel;
    /// use si46xx_ctl::firmware::FirmwareLoader;
    /// # fn demo<T: si46xx_ctl::transport::Transport>(transport: T) -> si46xx_ctl::Result<()> {
    /// let mut channel = CommandChannel::new(transport, si46xx_ctl::transport::StdDelay);
    /// let patch = std::fs::read("firmware/patch.bin")?;
    /// FirmwareLoader::new(&mut channel).load_image(&patch)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        self.load_init()?;

        let chunks = image.chunks(self.chunk_size);
        let count = chunks.len();
        for chunk in chunks {
            self.write_chunk(chunk)?;
        }
        debug!("Sent {} bytes in {} HOST_LOAD chunks", image.len(), count);

        self.finish()
    }

    /// Upload an image streamed from a reader
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of image bytes sent
    pub fn load_from_reader<R: Read>(&mut self, mut reader: R) -> Result<usize> {
        self.load_init()?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut total = 0;
        loop {
            let filled = fill_chunk(&mut reader, &mut buffer)?;
            if filled == 0 {
                break;
            }
            self.write_chunk(&buffer[..filled])?;
            total += filled;
            if filled < buffer.len() {
                break;
            }
        }
        debug!("Streamed {} bytes", total);

        self.finish()?;
        Ok(total)
    }

    /// Upload an image file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened or read
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        info!("Loading {} ({} bytes)", path.display(), len);

        self.load_from_reader(file)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.channel.write_host_load(chunk)?;
        if self.chunk_gap_ms > 0 {
            self.channel.delay_ms(self.chunk_gap_ms);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.channel.delay_ms(self.settle_ms);
        let result = self.channel.read_reply(STATUS_HEADER_LEN);
        self.channel.delay_ms(self.settle_ms);
        result.map(|_| ())
    }
}

/// Read until `buf` is full or the reader is exhausted
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Si46xxError::Io(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::opcodes::{HOST_LOAD, RD_REPLY};
    use crate::transport::mocks::{BusEvent, RecordingDelay, ScriptedTransport};
    use std::io::Write;

    fn setup() -> (ScriptedTransport, RecordingDelay, CommandChannel<ScriptedTransport, RecordingDelay>) {
        let transport = ScriptedTransport::new();
        let delay = RecordingDelay::new();
        let channel = CommandChannel::new(transport.clone(), delay.clone());
        (transport, delay, channel)
    }

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_load_4096_bytes_sends_two_chunks() {
        let (transport, _delay, mut channel) = setup();
        let data = image(4096);

        FirmwareLoader::new(&mut channel).load_image(&data).unwrap();

        let loads = transport.commands(HOST_LOAD);
        assert_eq!(loads.len(), 2, "expected exactly two HOST_LOAD writes");
        assert_eq!(&loads[0][..4], &[HOST_LOAD, 0, 0, 0]);
        assert_eq!(&loads[0][4..], &data[..2048]);
        assert_eq!(&loads[1][4..], &data[2048..]);

        // Everything after the last chunk is the single completion read
        let events = transport.events();
        let last_write = events
            .iter()
            .rposition(|e| matches!(e, BusEvent::Write { .. }))
            .unwrap();
        assert_eq!(
            &events[last_write + 1..],
            &[BusEvent::Query { request: vec![RD_REPLY], len: 4 }]
        );
    }

    #[test]
    fn test_load_sequence_and_settle_time() {
        let (transport, delay, mut channel) = setup();

        FirmwareLoader::new(&mut channel).load_image(&image(100)).unwrap();

        let writes = transport.writes();
        assert_eq!(writes[0], vec![LOAD_INIT, 0x00]);
        assert_eq!(writes[1].len(), 104);
        // three 4 ms settles, one chunk gap, plus poll intervals
        assert!(delay.total_ms() >= 13);
        assert!(delay.total_ms() < 14);
    }

    #[test]
    fn test_chunk_gap_follows_every_chunk() {
        let (_transport, delay, mut channel) = setup();

        FirmwareLoader::new(&mut channel)
            .with_chunk_gap_ms(2)
            .load_image(&image(5000))
            .unwrap();

        // three chunks at 2 ms each on top of the 12 ms of settles
        assert!(delay.total_ms() >= 18);
        assert!(delay.total_ms() < 19);

        let (_transport, delay, mut channel) = setup();
        FirmwareLoader::new(&mut channel)
            .with_chunk_gap_ms(0)
            .load_image(&image(5000))
            .unwrap();
        assert!(delay.total_ms() < 13);
    }

    #[test]
    fn test_partial_last_chunk() {
        let (transport, _delay, mut channel) = setup();

        FirmwareLoader::new(&mut channel).load_image(&image(5000)).unwrap();

        let sizes: Vec<usize> = transport
            .commands(HOST_LOAD)
            .iter()
            .map(|w| w.len() - 4)
            .collect();
        assert_eq!(sizes, vec![2048, 2048, 904]);
    }

    #[test]
    fn test_transport_failure_aborts_load() {
        let (transport, _delay, mut channel) = setup();
        // LOAD_INIT and the first chunk succeed, the second chunk fails
        transport.fail_after_writes(2);

        let result = FirmwareLoader::new(&mut channel).load_image(&image(8192));

        assert!(result.unwrap_err().is_transport());
        assert_eq!(transport.commands(HOST_LOAD).len(), 1);
        // no completion read after the failure
        assert!(matches!(
            transport.events().last(),
            Some(BusEvent::Write { .. })
        ));
    }

    #[test]
    fn test_load_init_rejected() {
        let (transport, _delay, mut channel) = setup();
        transport.push_reply(&[0x80, 0, 0, 0x80]);
        transport.push_reply(&[0xC0, 0, 0, 0x81]);

        let result = FirmwareLoader::new(&mut channel).load_image(&image(16));

        assert!(matches!(result, Err(Si46xxError::Protocol(_))));
        assert!(transport.commands(HOST_LOAD).is_empty());
    }

    #[test]
    fn test_reader_and_memory_loads_match() {
        let data = image(4500);

        let (memory_transport, _d1, mut memory_channel) = setup();
        FirmwareLoader::new(&mut memory_channel).load_image(&data).unwrap();

        let (reader_transport, _d2, mut reader_channel) = setup();
        let sent = FirmwareLoader::new(&mut reader_channel)
            .load_from_reader(&data[..])
            .unwrap();

        assert_eq!(sent, 4500);
        assert_eq!(memory_transport.writes(), reader_transport.writes());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&image(3000)).unwrap();
        file.flush().unwrap();

        let (transport, _delay, mut channel) = setup();
        let sent = FirmwareLoader::new(&mut channel).load_file(file.path()).unwrap();

        assert_eq!(sent, 3000);
        assert_eq!(transport.commands(HOST_LOAD).len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let (transport, _delay, mut channel) = setup();
        let result = FirmwareLoader::new(&mut channel).load_file("/nonexistent/patch.bin");

        assert!(matches!(result, Err(Si46xxError::Io(_))));
        assert!(transport.writes().is_empty());
    }

    #[test]
    fn test_custom_chunk_size() {
        let (transport, _delay, mut channel) = setup();

        FirmwareLoader::new(&mut channel)
            .with_chunk_size(256)
            .load_image(&image(1024))
            .unwrap();

        assert_eq!(transport.commands(HOST_LOAD).len(), 4);
    }
}
