//! Gain trim
//!
//! Input and output trims. A gain change is ramped linearly across the next
//! block instead of stepping, which would click.

use super::processor::{ProcessSpec, Processor};
use crate::engine::buffer::{db_to_linear, AudioBuffer};

/// Minimum trim in dB
pub const MIN_GAIN_DB: f32 = -24.0;

/// Maximum trim in dB
pub const MAX_GAIN_DB: f32 = 24.0;

/// Block-ramped gain
#[derive(Debug, Clone)]
pub struct GainStage {
    name: &'static str,
    gain_db: f32,
    target: f32,
    current: f32,
}

impl GainStage {
    /// Create a trim already settled at `gain_db`
    pub fn new(name: &'static str, gain_db: f32) -> Self {
        let gain_db = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        let linear = db_to_linear(gain_db);
        Self {
            name,
            gain_db,
            target: linear,
            current: linear,
        }
    }

    /// Set the target gain; reached by the end of the next block
    pub fn set_gain_db(&mut self, gain_db: f32) {
        let gain_db = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        if gain_db != self.gain_db {
            self.gain_db = gain_db;
            self.target = db_to_linear(gain_db);
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Linear gain currently applied
    pub fn current_gain(&self) -> f32 {
        self.current
    }
}

impl Processor for GainStage {
    fn prepare(&mut self, _spec: &ProcessSpec) {
        self.current = self.target;
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let len = buffer.len();
        if len == 0 {
            return;
        }

        if self.current == self.target {
            // Unity gain optimization
            if (self.current - 1.0).abs() < f32::EPSILON {
                return;
            }
            buffer.apply_gain(self.current);
            return;
        }

        let start = self.current;
        let step = (self.target - start) / len as f32;
        for channel in &mut buffer.samples {
            for (i, sample) in channel.iter_mut().enumerate() {
                *sample *= start + step * (i + 1) as f32;
            }
        }
        self.current = self.target;
    }

    fn reset(&mut self) {
        self.current = self.target;
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
