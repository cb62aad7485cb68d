//! Dynamics processor
//!
//! Owns the parameter-application contract around [`Compressor`]: settings
//! are read once per block, and bypass passes the audio through untouched
//! while the envelope keeps tracking the signal, so switching bypass off
//! resumes exactly where a never-bypassed compressor would be.

use serde::{Deserialize, Serialize};

use super::compressor::Compressor;
use super::processor::{ProcessSpec, Processor};
use crate::engine::buffer::AudioBuffer;

/// Selectable compression ratios (x:1)
pub const RATIO_CHOICES: [f32; 14] = [
    1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 15.0, 20.0, 50.0,
];

/// Display labels for [`RATIO_CHOICES`]
pub const RATIO_LABELS: [&str; 14] = [
    "1.0", "1.5", "2.0", "3.0", "4.0", "5.0", "6.0", "7.0", "8.0", "9.0", "10.0", "15.0", "20.0",
    "50.0",
];

/// Parse ratio text ("4", "4.0", "4:1")
///
/// Anything that is not one of [`RATIO_CHOICES`] gives 1:1.
pub fn ratio_from_text(text: &str) -> f32 {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix(":1").unwrap_or(trimmed).trim();
    number
        .parse::<f32>()
        .ok()
        .and_then(|r| RATIO_CHOICES.iter().copied().find(|&c| (c - r).abs() < 1e-3))
        .unwrap_or(1.0)
}

/// Compressor settings as read from the parameter store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsSettings {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub ratio: f32,
    pub bypassed: bool,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            threshold_db: 0.0,
            attack_ms: 50.0,
            release_ms: 250.0,
            ratio: 3.0,
            bypassed: false,
        }
    }
}

/// Compressor stage with bypass
#[derive(Debug, Clone, Default)]
pub struct DynamicsProcessor {
    compressor: Compressor,
    settings: DynamicsSettings,
}

impl DynamicsProcessor {
    pub fn new(settings: DynamicsSettings) -> Self {
        let mut processor = Self {
            compressor: Compressor::new(),
            settings,
        };
        processor.apply(&settings);
        processor
    }

    /// Push settings into the compressor. Call once per block, before `process`.
    pub fn apply(&mut self, settings: &DynamicsSettings) {
        self.compressor.set_threshold_db(settings.threshold_db);
        self.compressor.set_ratio(settings.ratio);
        self.compressor.set_attack_ms(settings.attack_ms);
        self.compressor.set_release_ms(settings.release_ms);
        self.settings = *settings;
    }

    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    pub fn is_bypassed(&self) -> bool {
        self.settings.bypassed
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.compressor.gain_reduction_db()
    }
}

impl Processor for DynamicsProcessor {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.compressor.prepare(spec);
        let settings = self.settings;
        self.apply(&settings);
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.settings.bypassed {
            self.compressor.track(buffer);
        } else {
            self.compressor.process(buffer);
        }
    }

    fn reset(&mut self) {
        self.compressor.reset();
    }

    fn name(&self) -> &'static str {
        "dynamics"
    }
}
