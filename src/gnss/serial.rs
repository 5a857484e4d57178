//! # NMEA Serial Receiver
//!
//! Reads NMEA sentences from a GNSS receiver attached to a serial port and
//! restarts acquisition by writing a receiver command sentence.

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf,
};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::checksum::frame_sentence;
use super::nmea::parse_sentence;
use super::{PositionSample, PositionSource, NOTIFICATION_CHANNEL_CAPACITY};
use crate::config::GnssConfig;
use crate::error::{Result, UplinkError};

/// Longest line kept; NMEA sentences are at most 82 bytes
pub const MAX_LINE_BYTES: usize = 128;

/// Byte stream the receiver talks over
pub trait ReceiverIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ReceiverIo for T {}

type BoxedIo = Box<dyn ReceiverIo>;

/// GNSS receiver speaking NMEA 0183 over a serial port
pub struct NmeaSerialSource {
    /// Device path (e.g., /dev/ttyUSB1)
    device_path: String,
    baud_rate: u32,
    /// Command body written on forced restart
    restart_sentence: String,
    /// Stream to use instead of opening the device
    preopened: Option<BoxedIo>,
    writer: Option<WriteHalf<BoxedIo>>,
}

impl std::fmt::Debug for NmeaSerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NmeaSerialSource")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl NmeaSerialSource {
    /// Create a source for the configured serial receiver
    ///
    /// The port is opened lazily by [`PositionSource::subscribe`], on the
    /// runtime of the acquisition worker.
    pub fn new(config: &GnssConfig) -> Self {
        Self {
            device_path: config.port.clone(),
            baud_rate: config.baud_rate,
            restart_sentence: config.restart_sentence.clone(),
            preopened: None,
            writer: None,
        }
    }

    /// Create a source over an already open byte stream
    pub fn with_stream<T: ReceiverIo + 'static>(stream: T, restart_sentence: &str) -> Self {
        Self {
            device_path: "<stream>".to_string(),
            baud_rate: 0,
            restart_sentence: restart_sentence.to_string(),
            preopened: Some(Box::new(stream)),
            writer: None,
        }
    }

    /// Get the device path of the receiver
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Open the serial port with NMEA settings (8N1, no flow control)
    fn open_port(&self) -> Result<BoxedIo> {
        let port = tokio_serial::new(&self.device_path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                UplinkError::Serial(format!("Failed to open {}: {}", self.device_path, e))
            })?;

        info!("Opened GNSS receiver at {} ({} baud)", self.device_path, self.baud_rate);
        Ok(Box::new(port))
    }
}

#[async_trait]
impl PositionSource for NmeaSerialSource {
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<PositionSample>> {
        let stream = match self.preopened.take() {
            Some(stream) => stream,
            None => self.open_port()?,
        };

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(writer);

        let (tx, rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        tokio::spawn(pump_sentences(reader, tx));
        Ok(rx)
    }

    async fn force_restart(&mut self) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| UplinkError::Serial("Receiver not subscribed".to_string()))?;

        write_command(writer, &self.restart_sentence).await
    }
}

/// Write a framed command sentence to the receiver
pub async fn write_command<W: AsyncWrite + Unpin>(writer: &mut W, body: &str) -> Result<()> {
    let sentence = frame_sentence(body);

    writer
        .write_all(sentence.as_bytes())
        .await
        .map_err(|e| UplinkError::Serial(format!("Failed to write command: {}", e)))?;

    writer
        .flush()
        .await
        .map_err(|e| UplinkError::Serial(format!("Failed to flush serial port: {}", e)))?;

    debug!("Sent receiver command {}", sentence.trim_end());
    Ok(())
}

/// Read sentences until the stream ends, forwarding every `GGA` sample
///
/// Malformed sentences are dropped; receivers emit partial lines on startup.
/// Lines longer than [`MAX_LINE_BYTES`] are skipped up to the next newline.
///
/// # Returns
///
/// * `usize` - Number of samples forwarded
pub async fn pump_sentences<R: AsyncRead + Unpin>(
    reader: R,
    tx: mpsc::Sender<PositionSample>,
) -> usize {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut forwarded = 0;
    let mut overlong = false;

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)
            .await;

        match read {
            Ok(0) => {
                warn!("GNSS receiver stream ended");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read from GNSS receiver: {}", e);
                break;
            }
        }

        let terminated = line.last() == Some(&b'\n');
        if !terminated && line.len() == MAX_LINE_BYTES {
            if !overlong {
                debug!("Discarding line longer than {} bytes", MAX_LINE_BYTES);
            }
            overlong = true;
            continue;
        }
        if overlong {
            // Tail of the overlong line
            overlong = false;
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match parse_sentence(text) {
            Ok(Some(sample)) => {
                if tx.send(sample).await.is_err() {
                    debug!("Position subscriber gone, stopping reader");
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => debug!("Discarding sentence: {}", e),
        }
    }

    forwarded
}
