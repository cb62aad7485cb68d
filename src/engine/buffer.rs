//! Audio Buffer Management
//!
//! Planar float buffers shared by the real-time processor, the offline
//! renderer and the tests, plus the dB helpers every stage uses.

use crate::error::{FastVoxError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default processing sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Level reported for silence by the meters (dB)
pub const NEGATIVE_INFINITY_DB: f32 = -72.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero or negative input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Convert linear amplitude to decibels, never going below `floor_db`
#[inline]
pub fn linear_to_db_floor(linear: f32, floor_db: f32) -> f32 {
    linear_to_db(linear).max(floor_db)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved 32-bit float audio
///
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use fastvox::engine::buffer::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(512, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 512);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer at the default sample rate
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self::silence(layout.num_channels(), num_samples, DEFAULT_SAMPLE_RATE)
    }

    /// Create a silent buffer with an arbitrary channel count
    pub fn silence(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Wrap existing planar channel data
    ///
    /// # Errors
    /// `InvalidAudio` if the channels differ in length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = samples.first() {
            if samples.iter().any(|ch| ch.len() != first.len()) {
                return Err(FastVoxError::InvalidAudio {
                    reason: "channels have different lengths".to_string(),
                    source: None,
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Errors
    /// `InvalidAudio` if the data length is not a multiple of the channel count.
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 || interleaved.len() % num_channels != 0 {
            return Err(FastVoxError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());

        for sample_idx in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Immutable view of one channel
    ///
    /// # Panics
    /// If `channel` is out of range.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.samples[channel]
    }

    /// Mutable view of one channel
    ///
    /// # Panics
    /// If `channel` is out of range.
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.samples[channel]
    }

    /// Multiply every sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Zero every sample without changing the size
    pub fn clear(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// RMS of one channel, linear. Zero for empty or missing channels.
    pub fn rms_level(&self, channel: usize) -> f32 {
        let Some(samples) = self.samples.get(channel) else {
            return 0.0;
        };
        if samples.is_empty() {
            return 0.0;
        }

        let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_sq / samples.len() as f64).sqrt() as f32
    }

    /// RMS of one channel in dB
    pub fn rms_db(&self, channel: usize) -> f32 {
        linear_to_db(self.rms_level(channel))
    }

    /// Peak absolute value of one channel, linear
    pub fn peak_level(&self, channel: usize) -> f32 {
        self.samples
            .get(channel)
            .map(|ch| ch.iter().fold(0.0_f32, |acc, s| acc.max(s.abs())))
            .unwrap_or(0.0)
    }

    /// True when every sample is finite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }

    /// Copy `len` frames starting at `start` into a new buffer
    ///
    /// The range is truncated at the end of the buffer.
    pub fn slice(&self, start: usize, len: usize) -> AudioBuffer {
        let start = start.min(self.len());
        let end = (start + len).min(self.len());
        AudioBuffer {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Overwrite frames starting at `start` with the contents of `block`
    ///
    /// Channels and frames that do not fit are ignored.
    pub fn write_at(&mut self, start: usize, block: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(&block.samples) {
            if start >= dst.len() {
                continue;
            }
            let n = src.len().min(dst.len() - start);
            dst[start..start + n].copy_from_slice(&src[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_conversion() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501187, epsilon = 1e-5);
        assert_relative_eq!(linear_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
        assert_eq!(linear_to_db_floor(0.0, -48.0), -48.0);
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 44100).unwrap();

        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[-1.0, -2.0, -3.0]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged_data() {
        assert!(AudioBuffer::from_interleaved(&[0.0; 5], 2, 48000).is_err());
        assert!(AudioBuffer::from_interleaved(&[0.0; 4], 0, 48000).is_err());
    }

    #[test]
    fn test_from_channels_rejects_mismatched_lengths() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 48000);
        assert!(result.is_err());
    }

    #[test]
    fn test_rms_of_full_scale_sine() {
        let mut buffer = AudioBuffer::new(48000, ChannelLayout::Mono);
        for (i, s) in buffer.channel_mut(0).iter_mut().enumerate() {
            *s = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin();
        }
        assert_relative_eq!(buffer.rms_level(0), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
        assert_eq!(buffer.rms_level(5), 0.0);
    }

    #[test]
    fn test_slice_and_write_at() {
        let mut buffer =
            AudioBuffer::from_channels(vec![(0..10).map(|i| i as f32).collect()], 48000).unwrap();
        let mut block = buffer.slice(8, 4);
        assert_eq!(block.len(), 2);

        block.apply_gain(-1.0);
        buffer.write_at(8, &block);
        assert_eq!(&buffer.channel(0)[7..], &[7.0, -8.0, -9.0]);
    }
}
