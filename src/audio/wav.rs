//! WAV header checks on top of `hound`.

use hound::{SampleFormat, WavReader, WavSpec};
use std::io::{self, Read};

/// Why a file was refused before any audio was produced.
#[derive(Debug)]
pub enum HeaderError {
    /// Not a RIFF/WAVE file, or the header is truncated or inconsistent.
    Malformed(String),
    /// A well-formed file this player cannot render.
    Unsupported(String),
    /// The medium failed while the header was read.
    Io(io::Error),
}

impl From<hound::Error> for HeaderError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                HeaderError::Malformed("truncated header".into())
            }
            hound::Error::IoError(e) => HeaderError::Io(e),
            hound::Error::FormatError(reason) => HeaderError::Malformed(reason.into()),
            other => HeaderError::Unsupported(other.to_string()),
        }
    }
}

/// Parse the header of `reader` and accept only 16-bit integer PCM, mono
/// or stereo. `WAVE_FORMAT_EXTENSIBLE` with a PCM sub-format is accepted.
pub fn open<R: Read>(reader: R) -> Result<WavReader<R>, HeaderError> {
    let wav = WavReader::new(reader)?;
    check_spec(&wav.spec())?;
    Ok(wav)
}

fn check_spec(spec: &WavSpec) -> Result<(), HeaderError> {
    if spec.sample_format != SampleFormat::Int {
        return Err(HeaderError::Unsupported("floating point samples".into()));
    }
    if spec.bits_per_sample != 16 {
        return Err(HeaderError::Unsupported(format!(
            "{}-bit samples, only 16-bit PCM is supported",
            spec.bits_per_sample
        )));
    }
    if !(1..=2).contains(&spec.channels) {
        return Err(HeaderError::Unsupported(format!(
            "{} channels, only mono or stereo",
            spec.channels
        )));
    }
    if spec.sample_rate == 0 {
        return Err(HeaderError::Malformed("sample rate is zero".into()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hound::WavWriter;
    use std::io::Cursor;

    fn write<S: hound::Sample + Copy>(spec: WavSpec, samples: &[S]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// 16-bit integer PCM holding `samples` (interleaved).
    pub(crate) fn pcm16(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write(spec, samples)
    }

    /// 8-bit integer PCM, which the player refuses.
    pub(crate) fn pcm8(sample_rate: u32, samples: &[i8]) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        write(spec, samples)
    }

    /// 16-bit mono PCM declared as `WAVE_FORMAT_EXTENSIBLE`.
    fn extensible_pcm16(samples: &[i16]) -> Vec<u8> {
        const PCM_SUBFORMAT: [u8; 16] = [
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38,
            0x9b, 0x71,
        ];
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(60 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&0xfffeu16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8_000u32.to_le_bytes());
        out.extend_from_slice(&16_000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(&22u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&PCM_SUBFORMAT);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn accepts_canonical_pcm() {
        let wav = open(Cursor::new(pcm16(22_050, 2, &[1, -1, 2, -2]))).unwrap();
        assert_eq!(wav.spec().sample_rate, 22_050);
        assert_eq!(wav.spec().channels, 2);
        assert_eq!(wav.duration(), 2);
    }

    #[test]
    fn accepts_extensible_pcm() {
        let mut wav = open(Cursor::new(extensible_pcm16(&[5, 6, 7]))).unwrap();
        assert_eq!(wav.spec().channels, 1);
        let samples: Vec<i16> = wav.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![5, 6, 7]);
    }

    #[test]
    fn rejects_eight_bit() {
        let err = open(Cursor::new(pcm8(8_000, &[0, 1]))).err().unwrap();
        assert!(matches!(err, HeaderError::Unsupported(_)), "{err:?}");
    }

    #[test]
    fn rejects_float_and_surround() {
        let float = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let err = open(Cursor::new(write(float, &[0.5f32]))).err().unwrap();
        assert!(matches!(err, HeaderError::Unsupported(_)), "{err:?}");

        let err = open(Cursor::new(pcm16(8_000, 6, &[0; 6]))).err().unwrap();
        assert!(matches!(err, HeaderError::Unsupported(_)), "{err:?}");
    }

    #[test]
    fn rejects_garbage_and_truncation() {
        let err = open(Cursor::new(b"not a wav file at all".to_vec())).err().unwrap();
        assert!(matches!(err, HeaderError::Malformed(_)), "{err:?}");

        let err = open(Cursor::new(Vec::new())).err().unwrap();
        assert!(matches!(err, HeaderError::Malformed(_)), "{err:?}");

        let bytes = pcm16(8_000, 1, &[0]);
        let err = open(Cursor::new(bytes[..30].to_vec())).err().unwrap();
        assert!(matches!(err, HeaderError::Malformed(_)), "{err:?}");
    }
}
