use crate::error::DeviceError;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Output format requested for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

/// The single hardware audio output.
///
/// `configure` → any number of `write`s → `release` is one session; the
/// engine never opens a second session before releasing the first.
pub trait AudioOutput: Send {
    fn configure(&mut self, format: StreamFormat) -> Result<(), DeviceError>;

    /// Queue PCM bytes. Returns how many were accepted; implementations give
    /// up after their write timeout with `DeviceError::Timeout`.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError>;

    fn release(&mut self);
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn configure(&mut self, format: StreamFormat) -> Result<(), DeviceError> {
        (**self).configure(format)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        (**self).write(bytes)
    }

    fn release(&mut self) {
        (**self).release();
    }
}

/// Host sink that consumes PCM at the configured real-time rate, the way a
/// DMA-fed I2S peripheral applies back-pressure, and discards it.
#[derive(Debug)]
pub struct PacedOutput {
    write_timeout: Duration,
    format: Option<StreamFormat>,
    /// Wall-clock point up to which queued audio has been "played".
    horizon: Option<Instant>,
    /// Audio that may be queued ahead of real time (DMA ring depth).
    lead: Duration,
}

impl PacedOutput {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            write_timeout,
            format: None,
            horizon: None,
            lead: Duration::from_millis(40),
        }
    }

    fn duration_of(format: StreamFormat, bytes: usize) -> Duration {
        let frame_bytes = u64::from(format.channels) * u64::from(format.bits_per_sample / 8);
        let frames = bytes as u64 / frame_bytes.max(1);
        Duration::from_micros(frames * 1_000_000 / u64::from(format.sample_rate.max(1)))
    }
}

impl AudioOutput for PacedOutput {
    fn configure(&mut self, format: StreamFormat) -> Result<(), DeviceError> {
        if format.bits_per_sample != 16 {
            return Err(DeviceError::Rejected(format!(
                "{}-bit output not supported",
                format.bits_per_sample
            )));
        }
        if format.sample_rate == 0 || !(1..=2).contains(&format.channels) {
            return Err(DeviceError::Rejected(format!("bad format {format:?}")));
        }
        info!(
            "audio output: {} Hz, {} ch, {} bit",
            format.sample_rate, format.channels, format.bits_per_sample
        );
        self.format = Some(format);
        self.horizon = None;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        let format = self
            .format
            .ok_or_else(|| DeviceError::Rejected("write before configure".into()))?;

        let now = Instant::now();
        let horizon = self.horizon.map_or(now, |h| h.max(now));
        let wait = horizon.saturating_duration_since(now).saturating_sub(self.lead);
        if wait > self.write_timeout {
            std::thread::sleep(self.write_timeout);
            return Err(DeviceError::Timeout);
        }
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        self.horizon = Some(horizon + Self::duration_of(format, bytes.len()));
        Ok(bytes.len())
    }

    fn release(&mut self) {
        if self.format.take().is_some() {
            debug!("audio output released");
        }
        self.horizon = None;
    }
}
