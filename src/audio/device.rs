//! Default sound device output through cpal.
//!
//! PCM written by the engine lands in a lock-free ring that the device
//! callback drains. A `cpal::Stream` is not `Send` on every host, so each
//! session keeps its stream on a dedicated thread that lives until release.

use super::output::{AudioOutput, StreamFormat};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Audio held in the ring ahead of the device (DMA ring depth).
const RING_MS: u64 = 100;
/// Sleep between attempts to push into a full ring.
const PUSH_RETRY: Duration = Duration::from_millis(2);

struct Session {
    producer: HeapProd<i16>,
    /// Dropping it ends the stream thread.
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    drain: Duration,
}

/// Output to the host's default audio device.
pub struct CpalOutput {
    write_timeout: Duration,
    session: Option<Session>,
    scratch: Vec<i16>,
}

impl CpalOutput {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            write_timeout,
            session: None,
            scratch: Vec::new(),
        }
    }
}

impl AudioOutput for CpalOutput {
    fn configure(&mut self, format: StreamFormat) -> Result<(), DeviceError> {
        check_format(format)?;
        self.release();

        let builder = std::thread::Builder::new().name("wavnav-audio".into());
        let session = open_session(builder, format)?;

        info!(
            "audio output: {} Hz, {} ch, {} bit",
            format.sample_rate, format.channels, format.bits_per_sample
        );
        self.session = Some(session);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DeviceError::Rejected("write before configure".into()))?;
        decode_le(bytes, &mut self.scratch);
        let pushed = push_with_timeout(&mut session.producer, &self.scratch, self.write_timeout)?;
        Ok(pushed * 2)
    }

    fn release(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let deadline = Instant::now() + session.drain;
        while !session.producer.is_empty() && Instant::now() < deadline {
            std::thread::sleep(PUSH_RETRY);
        }
        drop(session.stop);
        if session.thread.join().is_err() {
            warn!("audio thread panicked");
        }
        debug!("audio output released");
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.release();
    }
}

/// Start the stream thread on `builder` and wait until the device plays.
fn open_session(builder: std::thread::Builder, format: StreamFormat) -> Result<Session, DeviceError> {
    let (producer, consumer) = HeapRb::<i16>::new(ring_capacity(format)).split();
    let (stop, stopped) = mpsc::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);
    let thread = builder.spawn(move || host_stream(format, consumer, &ready_tx, &stopped))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(Session {
            producer,
            stop,
            thread,
            drain: Duration::from_millis(RING_MS * 2),
        }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(DeviceError::Rejected("audio thread exited".into()))
        }
    }
}

fn check_format(format: StreamFormat) -> Result<(), DeviceError> {
    if format.bits_per_sample != 16 {
        return Err(DeviceError::Rejected(format!(
            "{}-bit output not supported",
            format.bits_per_sample
        )));
    }
    if format.sample_rate == 0 || !(1..=2).contains(&format.channels) {
        return Err(DeviceError::Rejected(format!("bad format {format:?}")));
    }
    Ok(())
}

/// Ring size in samples for `RING_MS` of audio, at least one frame.
fn ring_capacity(format: StreamFormat) -> usize {
    let channels = u64::from(format.channels);
    let samples = u64::from(format.sample_rate) * channels * RING_MS / 1000;
    usize::try_from(samples.max(channels)).unwrap_or(usize::MAX)
}

fn decode_le(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]])),
    );
}

/// Push as much of `samples` as fits before `timeout`. A partial push is
/// reported as such; nothing pushed at all is a timeout.
fn push_with_timeout(
    producer: &mut HeapProd<i16>,
    samples: &[i16],
    timeout: Duration,
) -> Result<usize, DeviceError> {
    let deadline = Instant::now() + timeout;
    let mut pushed = 0;
    loop {
        pushed += producer.push_slice(&samples[pushed..]);
        if pushed == samples.len() {
            return Ok(pushed);
        }
        if Instant::now() >= deadline {
            return if pushed == 0 {
                Err(DeviceError::Timeout)
            } else {
                Ok(pushed)
            };
        }
        std::thread::sleep(PUSH_RETRY);
    }
}

/// Device callback body: queued samples, then silence on underrun.
fn fill(consumer: &mut HeapCons<i16>, data: &mut [i16]) -> usize {
    let n = consumer.pop_slice(data);
    data[n..].fill(0);
    n
}

fn host_stream(
    format: StreamFormat,
    consumer: HeapCons<i16>,
    ready: &mpsc::SyncSender<Result<(), DeviceError>>,
    stopped: &mpsc::Receiver<()>,
) {
    let stream = match open_stream(format, consumer) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    // Returns once the session drops its sender.
    let _ = stopped.recv();
    drop(stream);
}

fn open_stream(format: StreamFormat, mut consumer: HeapCons<i16>) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| DeviceError::Rejected("no output device found".into()))?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    debug!("opening audio device: {name}");

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                fill(&mut consumer, data);
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| DeviceError::Rejected(format!("{name}: {e}")))?;
    stream
        .play()
        .map_err(|e| DeviceError::Rejected(format!("{name}: cannot start stream: {e}")))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(sample_rate: u32) -> StreamFormat {
        StreamFormat {
            sample_rate,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    #[test]
    fn full_ring_times_out_after_write_timeout() {
        let (mut producer, _consumer) = HeapRb::<i16>::new(4).split();
        assert_eq!(
            push_with_timeout(&mut producer, &[1, 2, 3], Duration::from_millis(5)).unwrap(),
            3
        );

        // one slot left: partial push is reported, not an error
        let pushed = push_with_timeout(&mut producer, &[4, 5], Duration::from_millis(5)).unwrap();
        assert_eq!(pushed, 1);

        let start = Instant::now();
        let err = push_with_timeout(&mut producer, &[6], Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, DeviceError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn draining_consumer_unblocks_push() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(2).split();
        let reader = std::thread::spawn(move || {
            let mut got = Vec::new();
            let mut buf = [0i16; 2];
            while got.len() < 6 {
                let n = consumer.pop_slice(&mut buf);
                got.extend_from_slice(&buf[..n]);
                std::thread::sleep(Duration::from_millis(1));
            }
            got
        });
        let pushed =
            push_with_timeout(&mut producer, &[1, 2, 3, 4, 5, 6], Duration::from_secs(2)).unwrap();
        assert_eq!(pushed, 6);
        assert_eq!(reader.join().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn underrun_is_padded_with_silence() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(8).split();
        producer.push_slice(&[7, 8]);
        let mut data = [1i16; 4];
        assert_eq!(fill(&mut consumer, &mut data), 2);
        assert_eq!(data, [7, 8, 0, 0]);
    }

    #[test]
    fn decodes_little_endian_pcm() {
        let mut out = Vec::new();
        decode_le(&[0x01, 0x00, 0xff, 0xff, 0x7f], &mut out);
        assert_eq!(out, vec![1, -1]);
    }

    #[test]
    fn ring_holds_a_tenth_of_a_second() {
        assert_eq!(ring_capacity(mono(8_000)), 800);
        let stereo = StreamFormat {
            channels: 2,
            ..mono(44_100)
        };
        assert_eq!(ring_capacity(stereo), 8_820);
        assert_eq!(ring_capacity(mono(1)), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn thread_spawn_failure_is_io_error() {
        // a stack no address space can hold makes spawn fail before any device is touched
        let builder = std::thread::Builder::new().stack_size(1 << 62);
        let err = open_session(builder, mono(8_000)).err().unwrap();
        assert!(matches!(err, DeviceError::Io(_)), "{err:?}");
    }

    #[test]
    fn refuses_unsupported_format_and_early_write() {
        let mut out = CpalOutput::new(Duration::from_millis(10));
        let err = out
            .configure(StreamFormat {
                bits_per_sample: 8,
                ..mono(8_000)
            })
            .unwrap_err();
        assert!(matches!(err, DeviceError::Rejected(_)));
        assert!(matches!(out.write(&[0, 0]), Err(DeviceError::Rejected(_))));
        out.release();
    }
}
