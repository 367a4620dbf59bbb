pub mod device;
pub mod output;
pub mod volume;
pub mod wav;

use crate::error::{DeviceError, StreamError};
use crate::state::Volume;
use crate::storage::{MediaReader, Storage};
use output::{AudioOutput, StreamFormat};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wav::HeaderError;

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// End of data reached.
    Completed,
    /// Abort observed before the file finished. `frame` is the position of
    /// the first frame not rendered, usable to resume later.
    Aborted { frame: u64 },
}

/// Live controls read by the streaming loop on every chunk.
pub struct StreamControl<'a> {
    pub volume: &'a Volume,
    pub pause: &'a dyn Fn() -> bool,
    pub abort: &'a dyn Fn() -> bool,
}

/// Streams WAV files to the single audio output.
pub struct AudioEngine<O> {
    output: O,
    storage: Arc<dyn Storage>,
    chunk_frames: usize,
    pause_poll: Duration,
}

/// One configured output session; released on drop, on every exit path.
struct Session<'a, O: AudioOutput> {
    output: &'a mut O,
}

impl<'a, O: AudioOutput> Session<'a, O> {
    fn open(output: &'a mut O, format: StreamFormat) -> Result<Self, DeviceError> {
        if let Err(e) = output.configure(format) {
            output.release();
            return Err(e);
        }
        Ok(Self { output })
    }

    /// Write the whole chunk, tolerating device timeouts: whatever the
    /// device refuses is dropped and logged.
    fn write_chunk(&mut self, mut bytes: &[u8], path: &Path) {
        while !bytes.is_empty() {
            match self.output.write(bytes) {
                Ok(0) => {
                    warn!("audio output accepted nothing, dropping chunk: {}", path.display());
                    return;
                }
                Ok(n) => bytes = &bytes[n.min(bytes.len())..],
                Err(DeviceError::Timeout) => {
                    warn!("audio write timed out: {}", path.display());
                    return;
                }
                Err(e) => {
                    warn!("audio write failed: {}: {e}", path.display());
                    return;
                }
            }
        }
    }
}

impl<O: AudioOutput> Drop for Session<'_, O> {
    fn drop(&mut self) {
        self.output.release();
    }
}

impl<O: AudioOutput> AudioEngine<O> {
    pub fn new(output: O, storage: Arc<dyn Storage>, chunk_frames: usize, pause_poll: Duration) -> Self {
        Self {
            output,
            storage,
            chunk_frames: chunk_frames.max(1),
            pause_poll,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Stream `path` from its first frame.
    ///
    /// # Errors
    /// See [`AudioEngine::stream_from`].
    pub fn stream(&mut self, path: &Path, control: &StreamControl<'_>) -> Result<StreamOutcome, StreamError> {
        self.stream_from(path, 0, control)
    }

    /// Stream `path` starting at `start_frame`, blocking until the data ends
    /// or `control.abort` is observed at the top of a chunk.
    ///
    /// # Errors
    /// `NotFound` for a missing file, `BadHeader` / `UnsupportedFormat` for a
    /// file that is not 16-bit little-endian PCM, `DeviceConfig` when the
    /// output refuses the format, `Read` when the medium fails mid-stream.
    pub fn stream_from(
        &mut self,
        path: &Path,
        start_frame: u64,
        control: &StreamControl<'_>,
    ) -> Result<StreamOutcome, StreamError> {
        let reader = self.open(path)?;
        let mut wav = wav::open(reader).map_err(|e| header_error(path, e))?;
        let spec = wav.spec();

        let start = start_frame.min(u64::from(wav.duration()));
        if start > 0 {
            let frame = u32::try_from(start).unwrap_or(u32::MAX);
            wav.seek(frame).map_err(|source| read_error(path, source))?;
        }

        let format = StreamFormat {
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels,
        };
        let mut session = Session::open(&mut self.output, format).map_err(StreamError::DeviceConfig)?;
        info!(
            "streaming {} ({} Hz, {} ch) from frame {start}",
            path.display(),
            spec.sample_rate,
            spec.channels
        );

        let channels = usize::from(spec.channels);
        let chunk_samples = self.chunk_frames * channels;
        let mut pcm = Vec::with_capacity(chunk_samples * 2);
        let mut samples = wav.samples::<i16>();
        let mut frame = start;
        let mut truncated = false;

        loop {
            if (control.abort)() {
                info!("stream interrupted: {}", path.display());
                return Ok(StreamOutcome::Aborted { frame });
            }
            if (control.pause)() {
                std::thread::sleep(self.pause_poll);
                continue;
            }
            if truncated {
                return Ok(StreamOutcome::Completed);
            }

            pcm.clear();
            for sample in samples.by_ref().take(chunk_samples) {
                match sample {
                    Ok(s) => pcm.extend_from_slice(&s.to_le_bytes()),
                    Err(hound::Error::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        warn!("data ends early: {}", path.display());
                        truncated = true;
                        break;
                    }
                    Err(hound::Error::IoError(source)) => return Err(read_error(path, source)),
                    Err(e) => return Err(read_error(path, io::Error::new(io::ErrorKind::InvalidData, e))),
                }
            }
            // Whole frames only; a dangling sample of a cut-off stereo file is dropped.
            let frame_bytes = channels * 2;
            pcm.truncate(pcm.len() - pcm.len() % frame_bytes);
            if pcm.is_empty() {
                debug!("stream finished: {}", path.display());
                return Ok(StreamOutcome::Completed);
            }

            volume::scale_in_place(&mut pcm, control.volume.percent());
            session.write_chunk(&pcm, path);
            frame += (pcm.len() / frame_bytes) as u64;
        }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn MediaReader>, StreamError> {
        match self.storage.open_for_read(path) {
            Ok(reader) => Ok(reader),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("stream: not found: {}", path.display());
                Err(StreamError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(read_error(path, source)),
        }
    }
}

fn header_error(path: &Path, err: HeaderError) -> StreamError {
    let path: PathBuf = path.to_path_buf();
    match err {
        HeaderError::Malformed(reason) => {
            warn!("invalid WAV header: {}: {reason}", path.display());
            StreamError::BadHeader { path, reason }
        }
        HeaderError::Unsupported(reason) => {
            warn!("unsupported WAV: {}: {reason}", path.display());
            StreamError::UnsupportedFormat { path, reason }
        }
        HeaderError::Io(source) => StreamError::Read { path, source },
    }
}

fn read_error(path: &Path, source: io::Error) -> StreamError {
    StreamError::Read {
        path: path.to_path_buf(),
        source,
    }
}
