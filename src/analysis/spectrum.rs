//! Per-channel spectrum path producer
//!
//! Pulls completed blocks off one analyzer tap, keeps the newest FFT frame in
//! a sliding window and turns it into a polyline with one point per pixel on
//! a log-frequency axis.
//!
//! ```text
//!   Idle ──pull──▶ Accumulating ──window full──▶ FrameReady ──process──▶ Idle
//! ```

use tracing::trace;

use super::fft::FftDataGenerator;
use super::path::{map_to_log10, remap, Path, Rect};
use crate::config::EngineConfig;
use crate::engine::accumulator::{BlockReceiver, Channel, SlidingWindow};

/// Where the analyzer is in its frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    /// No new samples since the last frame
    Idle,
    /// Receiving samples, window not yet filled once
    Accumulating,
    /// New samples in a full window, waiting for `process`
    FrameReady,
}

/// Spectrum analyzer for one channel tap
pub struct SpectrumAnalyzer {
    receiver: BlockReceiver,
    window: SlidingWindow,
    fft: FftDataGenerator,
    state: AnalyzerState,
    /// Samples received since creation, saturating at the window length
    filled: usize,
    noise_floor_db: f32,
    min_frequency: f64,
    max_frequency: f64,
    ready: Option<Path>,
    frames: u64,
}

impl SpectrumAnalyzer {
    pub fn new(receiver: BlockReceiver, config: &EngineConfig) -> Self {
        let fft_size = config.fft_size();
        Self {
            receiver,
            window: SlidingWindow::new(fft_size),
            fft: FftDataGenerator::new(fft_size),
            state: AnalyzerState::Idle,
            filled: 0,
            noise_floor_db: config.noise_floor_db,
            min_frequency: config.min_frequency as f64,
            max_frequency: config.max_frequency as f64,
            ready: None,
            frames: 0,
        }
    }

    /// Drain every ready block into the window
    ///
    /// Returns the number of blocks consumed; an empty ring is not an error.
    pub fn pull(&mut self) -> usize {
        let drained = self.receiver.drain_into(&mut self.window);
        if drained == 0 {
            return 0;
        }

        let window_len = self.window.len();
        self.filled = (self.filled + drained * self.receiver.block_len()).min(window_len);
        self.state = if self.filled >= window_len {
            AnalyzerState::FrameReady
        } else {
            AnalyzerState::Accumulating
        };
        drained
    }

    /// Keep the window current without queuing a frame
    pub fn drain_only(&mut self) -> usize {
        let drained = self.pull();
        if self.state == AnalyzerState::FrameReady {
            self.state = AnalyzerState::Idle;
        }
        drained
    }

    /// Turn a ready frame into a path across `bounds`
    ///
    /// Returns `true` when a new path was published. Nothing happens unless
    /// a frame is ready and `bounds` has at least one pixel.
    pub fn process(&mut self, bounds: Rect, sample_rate: f64) -> bool {
        if self.state != AnalyzerState::FrameReady || bounds.is_empty() || !(sample_rate > 0.0) {
            return false;
        }

        let floor = self.noise_floor_db;
        let bin_width = self.fft.bin_width(sample_rate);
        let spectrum = self.fft.produce(self.window.as_slice(), floor);
        let last_bin = spectrum.len().saturating_sub(1);

        let width = bounds.pixel_width();
        let span = (width.max(2) - 1) as f64;
        let mut path = Path::with_capacity(width);

        for px in 0..width {
            let frequency = map_to_log10(px as f64 / span, self.min_frequency, self.max_frequency);
            let position = (frequency / bin_width).min(last_bin as f64);
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(last_bin);
            let frac = (position - lower as f64) as f32;
            let db = spectrum[lower] + (spectrum[upper] - spectrum[lower]) * frac;

            let y = remap(db, floor, 0.0, bounds.bottom(), bounds.y);
            path.push(bounds.x + px as f32, y);
        }

        self.ready = Some(path);
        self.state = AnalyzerState::Idle;
        self.frames += 1;
        trace!(channel = ?self.channel(), frame = self.frames, "Spectrum path produced");
        true
    }

    /// Most recent path, if one was produced since the last call
    pub fn take_path(&mut self) -> Option<Path> {
        self.ready.take()
    }

    pub fn has_path(&self) -> bool {
        self.ready.is_some()
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    pub fn channel(&self) -> Channel {
        self.receiver.channel()
    }

    /// Paths produced so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Blocks the audio thread could not hand over
    pub fn dropped_blocks(&self) -> u64 {
        self.receiver.dropped_blocks()
    }

    /// Latest per-bin dB magnitudes
    pub fn magnitudes_db(&self) -> &[f32] {
        self.fft.magnitudes_db()
    }

    pub fn fft_size(&self) -> usize {
        self.fft.fft_size()
    }
}
