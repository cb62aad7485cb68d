//! Engine configuration
//!
//! Sizes and display ranges that are fixed for the life of an engine
//! instance. Everything has a sensible default; a JSON file may override any
//! subset of fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FastVoxError, Result};

/// Accepted range for [`EngineConfig::fft_order`]
pub const FFT_ORDER_RANGE: std::ops::RangeInclusive<u32> = 6..=16;

/// Highest accepted observer refresh rate
pub const MAX_REFRESH_HZ: f32 = 1000.0;

/// Static configuration for the processor and the observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// FFT size is `2^fft_order`
    pub fft_order: u32,
    /// Slots in each analyzer ring buffer
    pub ring_capacity: usize,
    /// Spectrum floor in dB; quieter bins are drawn at this level
    pub noise_floor_db: f32,
    /// Observer refresh rate in Hz
    pub refresh_hz: f32,
    /// Lowest frequency on the display axis
    pub min_frequency: f32,
    /// Highest frequency on the display axis
    pub max_frequency: f32,
    /// Response curve spans `-response_range_db..=response_range_db`
    pub response_range_db: f32,
    /// Block size used when the host has not said otherwise
    pub default_block_size: usize,
    /// Sample rate used when the host has not said otherwise
    pub default_sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_order: 11,
            ring_capacity: crate::engine::ring_buffer::DEFAULT_CAPACITY,
            noise_floor_db: -48.0,
            refresh_hz: 60.0,
            min_frequency: 20.0,
            max_frequency: 20000.0,
            response_range_db: 24.0,
            default_block_size: 512,
            default_sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE,
        }
    }
}

impl EngineConfig {
    /// Samples per FFT frame, with the order clamped into [`FFT_ORDER_RANGE`]
    pub fn fft_size(&self) -> usize {
        1 << self
            .fft_order
            .clamp(*FFT_ORDER_RANGE.start(), *FFT_ORDER_RANGE.end())
    }

    /// Time between observer ticks
    ///
    /// A rate that is not positive falls back to the default one.
    pub fn refresh_interval(&self) -> Duration {
        let hz = if self.refresh_hz > 0.0 {
            self.refresh_hz.min(MAX_REFRESH_HZ)
        } else {
            Self::default().refresh_hz
        };
        Duration::from_secs_f64(1.0 / hz as f64)
    }

    /// Check that every field is usable
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(FastVoxError::InvalidConfig { reason });

        if !FFT_ORDER_RANGE.contains(&self.fft_order) {
            return fail(format!(
                "fft_order {} outside {}..={}",
                self.fft_order,
                FFT_ORDER_RANGE.start(),
                FFT_ORDER_RANGE.end()
            ));
        }
        if self.ring_capacity == 0 {
            return fail("ring_capacity must be at least 1".to_string());
        }
        if !(self.noise_floor_db < 0.0) {
            return fail(format!(
                "noise_floor_db must be negative, got {}",
                self.noise_floor_db
            ));
        }
        if !(self.refresh_hz > 0.0 && self.refresh_hz <= MAX_REFRESH_HZ) {
            return fail(format!(
                "refresh_hz {} outside (0, {}]",
                self.refresh_hz, MAX_REFRESH_HZ
            ));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return fail(format!(
                "frequency range {}..{} is empty or not positive",
                self.min_frequency, self.max_frequency
            ));
        }
        if !(self.response_range_db > 0.0) {
            return fail("response_range_db must be positive".to_string());
        }
        if self.default_block_size == 0 || self.default_sample_rate == 0 {
            return fail("default block size and sample rate must be non-zero".to_string());
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FastVoxError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let config: EngineConfig = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "Loaded engine config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
