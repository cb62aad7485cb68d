//! WAV file I/O
//!
//! Offline import/export for the CLI and tests. Audio is read into 32-bit
//! float planar buffers at the file's own sample rate; the engine is
//! prepared for that rate rather than resampling.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{FastVoxError, Result};

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    /// 32-bit float, lossless for the engine's internal format
    pub fn float() -> Self {
        ExportFormat { bit_depth: 32 }
    }
}

fn wav_error(context: &str, e: hound::Error) -> FastVoxError {
    FastVoxError::InvalidAudio {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    }
}

/// Read a mono or stereo WAV file
///
/// # Errors
/// * `FileNotFound` - the file does not exist
/// * `InvalidAudio` - not a readable WAV file, or empty
/// * `UnsupportedFormat` - more than two channels or an odd bit depth
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(FastVoxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| wav_error("Failed to open WAV file", e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(FastVoxError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec)?;
    if interleaved.is_empty() {
        return Err(FastVoxError::InvalidAudio {
            reason: "file contains no samples".to_string(),
            source: None,
        });
    }

    debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        frames = interleaved.len() / channels,
        "Imported WAV"
    );

    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
}

fn read_samples_as_f32<R: std::io::Read>(reader: WavReader<R>, spec: WavSpec) -> Result<Vec<f32>> {
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| wav_error("Failed to read samples", e)),
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1_i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| wav_error("Failed to read samples", e))
        }
        (format, bits) => Err(FastVoxError::UnsupportedFormat {
            format: format!("{:?} {}-bit", format, bits),
        }),
    }
}

/// Write a buffer to a WAV file at the buffer's sample rate
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    if !matches!(format.bit_depth, 16 | 24 | 32) {
        return Err(FastVoxError::UnsupportedFormat {
            format: format!("{}-bit export", format.bit_depth),
        });
    }

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| wav_error("Failed to create WAV file", e))?;

    for sample in buffer.to_interleaved() {
        let written = match format.bit_depth {
            16 => writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16),
            24 => writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32),
            _ => writer.write_sample(sample),
        };
        written.map_err(|e| wav_error("Failed to write sample", e))?;
    }

    writer
        .finalize()
        .map_err(|e| wav_error("Failed to finalize WAV file", e))?;

    debug!(path = %path.display(), frames = buffer.len(), "Exported WAV");
    Ok(())
}

/// Sine test tone on every channel
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    num_channels: usize,
    num_samples: usize,
    sample_rate: u32,
) -> AudioBuffer {
    let mut buffer = AudioBuffer::silence(num_channels, num_samples, sample_rate);
    let step = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    for channel in &mut buffer.samples {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = amplitude * (step * i as f64).sin() as f32;
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_float_round_trip_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(440.0, 0.5, 2, 4800, 44100);

        export_audio(&tone, &path, ExportFormat::float()).unwrap();
        let loaded = import_audio(&path).unwrap();

        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded, tone);
    }

    #[test]
    fn test_16_bit_round_trip_is_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone16.wav");
        let tone = generate_test_tone(1000.0, 0.8, 1, 1000, 48000);

        export_audio(&tone, &path, ExportFormat::new(16)).unwrap();
        let loaded = import_audio(&path).unwrap();

        let max_err = tone
            .channel(0)
            .iter()
            .zip(loaded.channel(0))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 1e-4, "max error {}", max_err);
    }

    #[test]
    fn test_missing_file() {
        let err = import_audio(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_rejects_odd_bit_depth() {
        let dir = tempdir().unwrap();
        let tone = generate_test_tone(440.0, 0.5, 1, 10, 48000);
        assert!(export_audio(&tone, &dir.path().join("x.wav"), ExportFormat::new(12)).is_err());
    }
}
