//! Biquad sections
//!
//! Coefficient design (Audio EQ Cookbook) and a Direct Form I state for one
//! channel. Coefficients are computed in f64 on the control thread; the audio
//! thread only ever runs [`BiquadState::process`].

use std::f64::consts::PI;

/// Lowest frequency any filter is designed at (Hz)
const MIN_DESIGN_FREQUENCY: f64 = 1.0;

/// Q range accepted by the designers
const MIN_Q: f64 = 0.025;
const MAX_Q: f64 = 40.0;

/// Clamp a design frequency into (0, Nyquist)
///
/// Cutoffs at or above Nyquist would fold the bilinear transform over and
/// produce unstable or NaN coefficients.
#[inline]
pub fn clamp_frequency(frequency: f64, sample_rate: f64) -> f64 {
    let upper = (sample_rate / 2.0 - 1.0).max(MIN_DESIGN_FREQUENCY);
    if frequency.is_nan() {
        return upper;
    }
    frequency.clamp(MIN_DESIGN_FREQUENCY, upper)
}

/// Normalized biquad coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Pass-through section
    pub const IDENTITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Peaking EQ (constant-Q)
    pub fn peak(sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        let freq = clamp_frequency(frequency, sample_rate);
        let q = q.clamp(MIN_Q, MAX_Q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// High shelf: boost or cut above `frequency`
    pub fn high_shelf(sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        let freq = clamp_frequency(frequency, sample_rate);
        let q = q.clamp(MIN_Q, MAX_Q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * w0.sin() / (2.0 * q);

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// Second-order high-pass
    pub fn high_pass(sample_rate: f64, frequency: f64, q: f64) -> Self {
        let freq = clamp_frequency(frequency, sample_rate);
        let q = q.clamp(MIN_Q, MAX_Q);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// |H(e^jw)| at `frequency`
    pub fn magnitude(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (sin1, cos1) = w.sin_cos();
        let (sin2, cos2) = (2.0 * w).sin_cos();

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        let den = den_re * den_re + den_im * den_im;
        if den <= f64::MIN_POSITIVE {
            return 0.0;
        }
        ((num_re * num_re + num_im * num_im) / den).sqrt()
    }

    /// Poles strictly inside the unit circle and every coefficient finite
    pub fn is_stable(&self) -> bool {
        let finite = [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite());
        finite && self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

/// Q of section `k` in an `order`-th order Butterworth cascade
///
/// Order must be even; the cascade has `order / 2` sections.
pub fn butterworth_q(order: usize, k: usize) -> f64 {
    let n = order as f64;
    1.0 / (2.0 * ((2.0 * k as f64 + 1.0) * PI / (2.0 * n)).cos())
}

/// Design an even-order Butterworth high-pass as cascaded second-order sections
///
/// Writes `order / 2` sections into the front of `out` and returns how many
/// were written (capped at `out.len()`).
pub fn butterworth_high_pass(
    sample_rate: f64,
    frequency: f64,
    order: usize,
    out: &mut [BiquadCoeffs],
) -> usize {
    let sections = (order / 2).min(out.len());
    for (k, slot) in out.iter_mut().take(sections).enumerate() {
        *slot = BiquadCoeffs::high_pass(sample_rate, frequency, butterworth_q(order, k));
    }
    sections
}

/// Direct Form I history for one section on one channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn db(linear: f64) -> f64 {
        20.0 * linear.log10()
    }

    #[test]
    fn test_identity_passes_through() {
        let mut state = BiquadState::default();
        for x in [1.0, -0.5, 0.25, 0.0] {
            assert_eq!(state.process(x, &BiquadCoeffs::IDENTITY), x);
        }
        assert_relative_eq!(BiquadCoeffs::IDENTITY.magnitude(1234.0, 48000.0), 1.0);
    }

    #[test]
    fn test_peak_hits_gain_at_center() {
        let coeffs = BiquadCoeffs::peak(48000.0, 1000.0, 6.0, 1.0);
        assert_relative_eq!(db(coeffs.magnitude(1000.0, 48000.0)), 6.0, epsilon = 1e-6);
        assert!(db(coeffs.magnitude(20.0, 48000.0)).abs() < 0.1);
        assert!(coeffs.is_stable());
    }

    #[test]
    fn test_high_shelf_plateaus_above_corner() {
        let coeffs = BiquadCoeffs::high_shelf(48000.0, 1000.0, 12.0, 0.707);
        let high = db(coeffs.magnitude(15000.0, 48000.0));
        let low = db(coeffs.magnitude(50.0, 48000.0));
        assert!((high - 12.0).abs() < 0.5, "shelf plateau was {:.2} dB", high);
        assert!(low.abs() < 0.1, "below the shelf was {:.2} dB", low);
    }

    #[test]
    fn test_butterworth_second_order_is_3db_down_at_cutoff() {
        let mut out = [BiquadCoeffs::IDENTITY; 4];
        let n = butterworth_high_pass(48000.0, 100.0, 2, &mut out);
        assert_eq!(n, 1);
        assert_relative_eq!(butterworth_q(2, 0), std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(db(out[0].magnitude(100.0, 48000.0)), -3.0103, epsilon = 0.01);
        assert_eq!(out[1], BiquadCoeffs::IDENTITY);
    }

    #[test]
    fn test_butterworth_eighth_order_is_steep() {
        let mut out = [BiquadCoeffs::IDENTITY; 4];
        assert_eq!(butterworth_high_pass(48000.0, 1000.0, 8, &mut out), 4);

        let at = |f: f64| db(out.iter().map(|c| c.magnitude(f, 48000.0)).product());
        assert_relative_eq!(at(1000.0), -3.0103, epsilon = 0.05);
        // 48 dB/oct an octave below the corner
        assert!((at(500.0) + 48.0).abs() < 1.0, "got {:.2}", at(500.0));
    }

    #[test]
    fn test_cutoff_above_nyquist_is_clamped() {
        let coeffs = BiquadCoeffs::high_pass(44100.0, 30000.0, 0.707);
        assert!(coeffs.is_stable());
        assert!(clamp_frequency(f64::NAN, 48000.0) < 24000.0);
        assert_eq!(clamp_frequency(-5.0, 48000.0), 1.0);
    }
}
