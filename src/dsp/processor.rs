//! Processor trait
//!
//! Common lifecycle for the fixed stages of the vocal chain. Stages are not
//! composable at runtime; the trait exists so the engine can prepare and
//! reset them uniformly.

use crate::engine::buffer::AudioBuffer;

/// Host processing configuration, fixed between `prepare` calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub num_channels: usize,
}

impl ProcessSpec {
    pub fn stereo(sample_rate: f64, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            num_channels: 2,
        }
    }
}

/// A stage of the real-time chain
///
/// `process` runs on the audio thread: it must not allocate, lock or log.
pub trait Processor: Send {
    /// Called before processing starts and whenever the spec changes
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process audio in place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Clear internal history (filter state, envelopes)
    fn reset(&mut self);

    /// Short identifier for logs
    fn name(&self) -> &'static str;
}
