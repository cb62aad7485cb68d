//! Windowed magnitude spectrum
//!
//! Blackman-Harris window, forward real FFT, magnitudes normalized by the
//! number of bins and converted to dB against a noise floor. All buffers are
//! allocated up front; `produce` does no allocation.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// 4-term Blackman-Harris window of length `len`
pub fn blackman_harris(len: usize) -> Vec<f32> {
    const A0: f64 = 0.35875;
    const A1: f64 = 0.48829;
    const A2: f64 = 0.14128;
    const A3: f64 = 0.01168;

    if len <= 1 {
        return vec![1.0; len];
    }
    let n = (len - 1) as f64;
    (0..len)
        .map(|i| {
            let x = 2.0 * std::f64::consts::PI * i as f64 / n;
            (A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()) as f32
        })
        .collect()
}

/// Fixed-size spectrum generator
pub struct FftDataGenerator {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes_db: Vec<f32>,
}

impl std::fmt::Debug for FftDataGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftDataGenerator")
            .field("fft_size", &self.fft_size())
            .finish()
    }
}

impl FftDataGenerator {
    /// Plan an FFT of `fft_size` samples (rounded up to at least 2)
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            window: blackman_harris(fft_size),
            magnitudes_db: vec![0.0; fft_size / 2],
            fft,
            input,
            spectrum,
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Bins in the produced spectrum (`fft_size / 2`, DC included, Nyquist dropped)
    pub fn num_bins(&self) -> usize {
        self.magnitudes_db.len()
    }

    /// Hz between adjacent bins
    pub fn bin_width(&self, sample_rate: f64) -> f64 {
        sample_rate / self.fft_size() as f64
    }

    /// dB magnitude per bin for the most recent `fft_size` samples
    ///
    /// Shorter input is zero-padded at the front so the newest samples stay
    /// at the tail of the frame.
    pub fn produce(&mut self, samples: &[f32], noise_floor_db: f32) -> &[f32] {
        let size = self.fft_size();
        let take = samples.len().min(size);
        let pad = size - take;

        self.input[..pad].fill(0.0);
        for ((dst, &src), &w) in self.input[pad..]
            .iter_mut()
            .zip(&samples[samples.len() - take..])
            .zip(&self.window[pad..])
        {
            *dst = src * w;
        }

        if self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .is_err()
        {
            self.magnitudes_db.fill(noise_floor_db);
            return &self.magnitudes_db;
        }

        let num_bins = self.magnitudes_db.len() as f32;
        for (db, bin) in self.magnitudes_db.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() / num_bins;
            *db = if magnitude > 0.0 {
                (20.0 * magnitude.log10()).max(noise_floor_db)
            } else {
                noise_floor_db
            };
        }

        &self.magnitudes_db
    }

    /// Last produced spectrum
    pub fn magnitudes_db(&self) -> &[f32] {
        &self.magnitudes_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_shape() {
        let w = blackman_harris(2048);
        assert_relative_eq!(w[0], 0.00006, epsilon = 1e-5);
        assert_relative_eq!(w[2047], w[0], epsilon = 1e-6);
        assert!(w[1023] > 0.99);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let size = 2048;
        let sample_rate = 48000.0;
        let mut gen = FftDataGenerator::new(size);
        // Exactly bin 64
        let freq = 64.0 * sample_rate / size as f64;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin() as f32)
            .collect();

        let spectrum = gen.produce(&samples, -48.0).to_vec();
        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(peak_bin, 64);
        // Coherent gain of the window is a0, so a full-scale sine lands near 20*log10(0.35875)
        assert_relative_eq!(spectrum[64], -8.9, epsilon = 0.2);
        assert_eq!(spectrum[500], -48.0);
    }

    #[test]
    fn test_silence_sits_on_the_floor() {
        let mut gen = FftDataGenerator::new(512);
        let spectrum = gen.produce(&[0.0; 512], -60.0);
        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.iter().all(|&db| db == -60.0));
    }

    #[test]
    fn test_short_input_is_front_padded() {
        let mut gen = FftDataGenerator::new(256);
        let spectrum = gen.produce(&[0.5; 10], -48.0);
        assert!(spectrum.iter().all(|db| db.is_finite()));
    }
}
