#![allow(dead_code)]

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wavnav::audio::output::{AudioOutput, StreamFormat};
use wavnav::error::DeviceError;

/// Mono 8 kHz 16-bit WAV holding `samples`.
pub fn wav(samples: &[i16]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

/// Samples 0, 1, 2, ... so the position of any chunk is recognizable.
pub fn ramp(len: usize) -> Vec<u8> {
    wav(&(0..len).map(|i| i as i16).collect::<Vec<_>>())
}

/// A clip whose every sample is `value`.
pub fn tone(value: i16, len: usize) -> Vec<u8> {
    wav(&vec![value; len])
}

/// Everything the recording output saw.
#[derive(Debug, Default)]
pub struct Log {
    /// PCM of every session, in order.
    pub sessions: Vec<Vec<u8>>,
    pub open: bool,
    /// Sessions configured while another was still open.
    pub overlaps: usize,
    pub writes: usize,
}

impl Log {
    pub fn samples(&self, session: usize) -> Vec<i16> {
        self.sessions[session]
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }
}

type Hook = Box<dyn FnMut(usize) + Send>;

/// Audio output that records sessions and optionally runs a hook after
/// every write, with the write count.
pub struct Recorder {
    log: Arc<Mutex<Log>>,
    delay: Duration,
    hook: Option<Hook>,
}

impl Recorder {
    pub fn new() -> (Self, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let recorder = Self {
            log: Arc::clone(&log),
            delay: Duration::ZERO,
            hook: None,
        };
        (recorder, log)
    }

    /// Sleep this long in every write, standing in for device back-pressure.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_hook(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl AudioOutput for Recorder {
    fn configure(&mut self, _format: StreamFormat) -> Result<(), DeviceError> {
        let mut log = self.log.lock().unwrap();
        if log.open {
            log.overlaps += 1;
        }
        log.open = true;
        log.sessions.push(Vec::new());
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let writes = {
            let mut log = self.log.lock().unwrap();
            if let Some(session) = log.sessions.last_mut() {
                session.extend_from_slice(bytes);
            }
            log.writes += 1;
            log.writes
        };
        if let Some(hook) = self.hook.as_mut() {
            hook(writes);
        }
        Ok(bytes.len())
    }

    fn release(&mut self) {
        self.log.lock().unwrap().open = false;
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
