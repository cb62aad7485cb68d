//! Compressor primitive
//!
//! Feed-forward, hard-knee, per-channel compressor with a peak ballistics
//! envelope follower. It knows nothing about parameters or bypass; that
//! contract lives in [`super::dynamics`].

use super::processor::ProcessSpec;
use crate::engine::buffer::{db_to_linear, AudioBuffer};

/// Smoothing coefficient for a ballistics time constant
///
/// Times under a microsecond make the follower instantaneous.
fn ballistics_coefficient(time_ms: f32, sample_rate: f64) -> f32 {
    if time_ms < 1.0e-3 || sample_rate <= 0.0 {
        return 0.0;
    }
    (-2.0 * std::f64::consts::PI * 1000.0 / (sample_rate * time_ms as f64)).exp() as f32
}

/// Peak envelope follower with separate attack and release
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_ms: f32,
    release_ms: f32,
    cte_attack: f32,
    cte_release: f32,
    sample_rate: f64,
    /// Last output per channel
    levels: Vec<f32>,
}

impl EnvelopeFollower {
    pub fn new(attack_ms: f32, release_ms: f32) -> Self {
        let mut follower = Self {
            attack_ms,
            release_ms,
            cte_attack: 0.0,
            cte_release: 0.0,
            sample_rate: 48000.0,
            levels: vec![0.0; 2],
        };
        follower.update_coefficients();
        follower
    }

    pub fn prepare(&mut self, sample_rate: f64, num_channels: usize) {
        self.sample_rate = sample_rate;
        self.levels = vec![0.0; num_channels];
        self.update_coefficients();
    }

    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        if attack_ms != self.attack_ms {
            self.attack_ms = attack_ms;
            self.update_coefficients();
        }
    }

    pub fn set_release_ms(&mut self, release_ms: f32) {
        if release_ms != self.release_ms {
            self.release_ms = release_ms;
            self.update_coefficients();
        }
    }

    fn update_coefficients(&mut self) {
        self.cte_attack = ballistics_coefficient(self.attack_ms, self.sample_rate);
        self.cte_release = ballistics_coefficient(self.release_ms, self.sample_rate);
    }

    /// Advance channel `channel` by one sample and return the envelope
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let Some(previous) = self.levels.get_mut(channel) else {
            return input.abs();
        };
        let x = input.abs();
        let cte = if x > *previous {
            self.cte_attack
        } else {
            self.cte_release
        };
        let level = x + cte * (*previous - x);
        *previous = level;
        level
    }

    pub fn level(&self, channel: usize) -> f32 {
        self.levels.get(channel).copied().unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.levels.fill(0.0);
    }
}

/// Hard-knee compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    threshold: f32,
    threshold_inverse: f32,
    ratio_inverse: f32,
    envelope: EnvelopeFollower,
    /// Smallest gain applied during the last block, for metering
    min_gain: f32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    pub fn new() -> Self {
        let mut comp = Self {
            threshold_db: 0.0,
            ratio: 1.0,
            threshold: 1.0,
            threshold_inverse: 1.0,
            ratio_inverse: 1.0,
            envelope: EnvelopeFollower::new(1.0, 100.0),
            min_gain: 1.0,
        };
        comp.set_threshold_db(0.0);
        comp
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.envelope.prepare(spec.sample_rate, spec.num_channels);
        self.min_gain = 1.0;
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db;
        self.threshold = db_to_linear(threshold_db);
        self.threshold_inverse = 1.0 / self.threshold;
    }

    /// Ratios below 1:1 are treated as 1:1
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = if ratio.is_finite() { ratio.max(1.0) } else { 1.0 };
        self.ratio_inverse = 1.0 / self.ratio;
    }

    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.envelope.set_attack_ms(attack_ms);
    }

    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.envelope.set_release_ms(release_ms);
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Static gain for an envelope level
    #[inline]
    fn gain_for(&self, envelope: f32) -> f32 {
        if envelope < self.threshold {
            1.0
        } else {
            (envelope * self.threshold_inverse).powf(self.ratio_inverse - 1.0)
        }
    }

    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let env = self.envelope.process_sample(channel, input);
        let gain = self.gain_for(env);
        self.min_gain = self.min_gain.min(gain);
        gain * input
    }

    /// Compress every channel in place
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        self.min_gain = 1.0;
        for (ch, samples) in buffer.samples.iter_mut().enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(ch, *sample);
            }
        }
    }

    /// Run the envelope over the audio without touching it
    pub fn track(&mut self, buffer: &AudioBuffer) {
        for (ch, samples) in buffer.samples.iter().enumerate() {
            for &sample in samples {
                self.envelope.process_sample(ch, sample);
            }
        }
        self.min_gain = 1.0;
    }

    /// Deepest gain reduction of the last processed block (dB, <= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        20.0 * self.min_gain.max(1.0e-6).log10()
    }

    pub fn envelope(&self) -> &EnvelopeFollower {
        &self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope.reset();
        self.min_gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn prepared(threshold_db: f32, ratio: f32) -> Compressor {
        let mut comp = Compressor::new();
        comp.prepare(&ProcessSpec::stereo(48000.0, 512));
        comp.set_threshold_db(threshold_db);
        comp.set_ratio(ratio);
        comp.set_attack_ms(5.0);
        comp.set_release_ms(50.0);
        comp
    }

    #[test]
    fn test_ballistics_coefficient() {
        let cte = ballistics_coefficient(10.0, 48000.0);
        assert_relative_eq!(cte, (-2.0 * std::f32::consts::PI / 480.0).exp(), epsilon = 1e-6);
        assert_eq!(ballistics_coefficient(0.0, 48000.0), 0.0);
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let mut comp = prepared(-6.0, 4.0);
        let mut buffer = AudioBuffer::silence(2, 4800, 48000);
        for s in buffer.channel_mut(0) {
            *s = 0.1;
        }
        let original = buffer.clone();
        comp.process(&mut buffer);
        assert_eq!(buffer, original);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_steady_state_follows_static_curve() {
        // Constant 0 dBFS into a -20 dB threshold at 4:1 settles to -15 dB
        let mut comp = prepared(-20.0, 4.0);
        let mut buffer = AudioBuffer::silence(1, 48000, 48000);
        buffer.channel_mut(0).fill(1.0);
        comp.process(&mut buffer);

        let last = *buffer.channel(0).last().unwrap();
        assert_relative_eq!(20.0 * last.log10(), -15.0, epsilon = 0.05);
        assert!(comp.gain_reduction_db() < -14.9);
    }

    #[test]
    fn test_unity_ratio_is_transparent() {
        let mut comp = prepared(-40.0, 0.5);
        assert_eq!(comp.ratio(), 1.0);
        let mut buffer = AudioBuffer::silence(1, 256, 48000);
        buffer.channel_mut(0).fill(0.8);
        comp.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|&s| (s - 0.8).abs() < 1e-6));
    }

    #[test]
    fn test_track_advances_envelope_only() {
        let mut comp = prepared(-20.0, 4.0);
        let mut buffer = AudioBuffer::silence(1, 1024, 48000);
        buffer.channel_mut(0).fill(0.5);
        let original = buffer.clone();

        comp.track(&buffer);
        assert_eq!(buffer, original);
        assert!(comp.envelope().level(0) > 0.4);
    }
}
