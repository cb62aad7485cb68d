//! Filter chain: low-cut cascade, peak, high shelf
//!
//! The control thread derives coefficients into a scratch [`ChainSnapshot`]
//! and publishes it with one atomic pointer swap. The audio thread loads the
//! snapshot once per block, so a stage's bypass flag and its coefficients are
//! always seen together, and every channel of a block sees the same filter.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use serde::{Deserialize, Serialize};

use super::biquad::{butterworth_high_pass, BiquadCoeffs, BiquadState};
use super::processor::{ProcessSpec, Processor};
use crate::engine::buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
use crate::engine::params::{ParamId, ParameterListener, ParameterStore};

/// Number of second-order sections reserved for the low-cut cascade
pub const LOW_CUT_STAGES: usize = 4;

/// Total number of biquad stages per channel
pub const NUM_STAGES: usize = LOW_CUT_STAGES + 2;

// ============================================================================
// Slope
// ============================================================================

/// Low-cut slope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Choice index, 0..=3
    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range indices saturate to the steepest slope
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Active second-order sections
    pub fn stages(self) -> usize {
        self.index() + 1
    }

    /// Butterworth order of the cascade
    pub fn order(self) -> usize {
        2 * self.stages()
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stages() as u32
    }

    pub const fn label(self) -> &'static str {
        match self {
            Slope::Db12 => "12 db/Oct",
            Slope::Db24 => "24 db/Oct",
            Slope::Db36 => "36 db/Oct",
            Slope::Db48 => "48 db/Oct",
        }
    }
}

// ============================================================================
// Stage identifiers
// ============================================================================

/// Position in the per-channel cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    LowCut(usize),
    Peak,
    Shelf,
}

impl StageId {
    pub const ALL: [StageId; NUM_STAGES] = [
        StageId::LowCut(0),
        StageId::LowCut(1),
        StageId::LowCut(2),
        StageId::LowCut(3),
        StageId::Peak,
        StageId::Shelf,
    ];

    /// Index into the stage array, `None` for a low-cut index past the cascade
    pub fn index(self) -> Option<usize> {
        match self {
            StageId::LowCut(i) if i < LOW_CUT_STAGES => Some(i),
            StageId::LowCut(_) => None,
            StageId::Peak => Some(LOW_CUT_STAGES),
            StageId::Shelf => Some(LOW_CUT_STAGES + 1),
        }
    }

    pub fn is_low_cut(self) -> bool {
        matches!(self, StageId::LowCut(_))
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Everything needed to derive a full chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub low_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_q: f32,
    pub peak_bypassed: bool,
    pub shelf_freq: f32,
    pub shelf_gain_db: f32,
    pub shelf_q: f32,
    pub shelf_bypassed: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            low_cut_freq: 20.0,
            low_cut_slope: Slope::Db12,
            low_cut_bypassed: false,
            peak_freq: 750.0,
            peak_gain_db: 0.0,
            peak_q: 1.0,
            peak_bypassed: false,
            shelf_freq: 20000.0,
            shelf_gain_db: 0.0,
            shelf_q: 1.0,
            shelf_bypassed: false,
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// One stage as the audio thread sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSnapshot {
    pub coeffs: BiquadCoeffs,
    pub bypassed: bool,
}

impl Default for StageSnapshot {
    fn default() -> Self {
        Self {
            coeffs: BiquadCoeffs::IDENTITY,
            bypassed: false,
        }
    }
}

/// Immutable, complete description of the chain at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSnapshot {
    pub stages: [StageSnapshot; NUM_STAGES],
    pub slope: Slope,
    /// Group bypass for the whole low-cut cascade
    pub low_cut_bypassed: bool,
    pub sample_rate: f64,
    /// What the stages were derived from, so a rate change can re-derive all of them
    pub settings: ChainSettings,
}

impl Default for ChainSnapshot {
    fn default() -> Self {
        let mut snapshot = Self {
            stages: [StageSnapshot::default(); NUM_STAGES],
            slope: Slope::Db12,
            low_cut_bypassed: false,
            sample_rate: DEFAULT_SAMPLE_RATE as f64,
            settings: ChainSettings::default(),
        };
        snapshot.design_all(&ChainSettings::default());
        snapshot
    }
}

impl ChainSnapshot {
    /// Whether a stage contributes to the output
    #[inline]
    pub fn is_active(&self, index: usize) -> bool {
        let stage = &self.stages[index];
        !stage.bypassed && !(index < LOW_CUT_STAGES && self.low_cut_bypassed)
    }

    /// Number of low-cut sections currently enabled (ignoring the group flag)
    pub fn enabled_low_cut_stages(&self) -> usize {
        self.stages[..LOW_CUT_STAGES]
            .iter()
            .filter(|s| !s.bypassed)
            .count()
    }

    fn design_low_cut(&mut self, freq: f64, slope: Slope) {
        let mut designed = [BiquadCoeffs::IDENTITY; LOW_CUT_STAGES];
        let active = butterworth_high_pass(self.sample_rate, freq, slope.order(), &mut designed);

        for (i, (stage, coeffs)) in self.stages[..LOW_CUT_STAGES]
            .iter_mut()
            .zip(designed)
            .enumerate()
        {
            stage.coeffs = coeffs;
            stage.bypassed = i >= active;
        }
        self.slope = slope;
    }

    fn design_peak(&mut self, freq: f64, gain_db: f64, q: f64) {
        self.stages[LOW_CUT_STAGES].coeffs = BiquadCoeffs::peak(self.sample_rate, freq, gain_db, q);
    }

    fn design_shelf(&mut self, freq: f64, gain_db: f64, q: f64) {
        self.stages[LOW_CUT_STAGES + 1].coeffs =
            BiquadCoeffs::high_shelf(self.sample_rate, freq, gain_db, q);
    }

    fn design_all(&mut self, settings: &ChainSettings) {
        self.settings = *settings;
        self.design_low_cut(settings.low_cut_freq as f64, settings.low_cut_slope);
        self.low_cut_bypassed = settings.low_cut_bypassed;
        self.design_peak(
            settings.peak_freq as f64,
            settings.peak_gain_db as f64,
            settings.peak_q as f64,
        );
        self.stages[LOW_CUT_STAGES].bypassed = settings.peak_bypassed;
        self.design_shelf(
            settings.shelf_freq as f64,
            settings.shelf_gain_db as f64,
            settings.shelf_q as f64,
        );
        self.stages[LOW_CUT_STAGES + 1].bypassed = settings.shelf_bypassed;
    }

    /// Run one channel's block through low-cut, peak, shelf in place
    ///
    /// Bypassed stages leave their history untouched.
    #[inline]
    pub fn process(&self, state: &mut ChannelFilterState, block: &mut [f32]) {
        for (index, stage_state) in state.stages.iter_mut().enumerate() {
            if !self.is_active(index) {
                continue;
            }
            let coeffs = &self.stages[index].coeffs;
            for sample in block.iter_mut() {
                *sample = stage_state.process(*sample as f64, coeffs) as f32;
            }
        }
    }

    /// Combined |H(f)| of every active stage at one frequency
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        (0..NUM_STAGES)
            .filter(|&i| self.is_active(i))
            .map(|i| self.stages[i].coeffs.magnitude(frequency, sample_rate))
            .product()
    }

    /// Combined |H(f)| at each of `frequencies`
    pub fn magnitude_response(&self, frequencies: &[f64], sample_rate: f64) -> Vec<f64> {
        frequencies
            .iter()
            .map(|&f| self.magnitude_at(f, sample_rate))
            .collect()
    }
}

/// Per-channel filter history, owned by the audio thread
#[derive(Debug, Clone, Default)]
pub struct ChannelFilterState {
    stages: [BiquadState; NUM_STAGES],
}

impl ChannelFilterState {
    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(BiquadState::reset);
    }
}

// ============================================================================
// Filter Chain
// ============================================================================

/// Shared handle to the published filter coefficients
///
/// Writers (control thread, `prepare`) derive a complete new snapshot and
/// swap it in. Readers load it; nothing is ever mutated in place.
#[derive(Debug)]
pub struct FilterChain {
    snapshot: ArcSwap<ChainSnapshot>,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(ChainSnapshot::default()),
        }
    }

    /// Build a chain already derived from `settings`
    pub fn with_settings(settings: &ChainSettings, sample_rate: f64) -> Self {
        let chain = Self::new();
        chain.apply_settings(settings, sample_rate);
        chain
    }

    /// Current snapshot. Cheap and lock-free; call once per block.
    #[inline]
    pub fn load(&self) -> Guard<Arc<ChainSnapshot>> {
        self.snapshot.load()
    }

    /// Owned reference to the current snapshot
    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        self.snapshot.load_full()
    }

    pub fn sample_rate(&self) -> f64 {
        self.snapshot.load().sample_rate
    }

    fn update(&self, mut edit: impl FnMut(&mut ChainSnapshot)) {
        self.snapshot.rcu(|current| {
            let mut next = ChainSnapshot::clone(current);
            edit(&mut next);
            next
        });
    }

    /// Edit the stored settings and re-derive
    ///
    /// A rate change re-derives every stage, otherwise only `stage` is
    /// redesigned. Both happen inside the same publish.
    fn update_settings(
        &self,
        stage: StageId,
        sample_rate: f64,
        mut edit: impl FnMut(&mut ChainSettings),
    ) {
        self.update(|next| {
            let mut settings = next.settings;
            edit(&mut settings);
            if next.sample_rate != sample_rate {
                next.sample_rate = sample_rate;
                next.design_all(&settings);
                return;
            }
            next.settings = settings;
            match stage {
                StageId::LowCut(_) => {
                    next.design_low_cut(settings.low_cut_freq as f64, settings.low_cut_slope)
                }
                StageId::Peak => next.design_peak(
                    settings.peak_freq as f64,
                    settings.peak_gain_db as f64,
                    settings.peak_q as f64,
                ),
                StageId::Shelf => next.design_shelf(
                    settings.shelf_freq as f64,
                    settings.shelf_gain_db as f64,
                    settings.shelf_q as f64,
                ),
            }
        });
    }

    /// Re-derive every stage from `settings` at `sample_rate` and publish
    pub fn apply_settings(&self, settings: &ChainSettings, sample_rate: f64) {
        self.update(|next| {
            next.sample_rate = sample_rate;
            next.design_all(settings);
        });
    }

    /// Re-derive every stage from `settings` at whatever rate is published
    ///
    /// The rate is read inside the swap, so a concurrent `prepare` is never
    /// undone.
    pub fn apply_settings_at_current_rate(&self, settings: &ChainSettings) {
        self.update(|next| next.design_all(settings));
    }

    /// Butterworth high-pass of order `2 × (slope + 1)` at `freq`
    ///
    /// Enables the first `slope + 1` sections and bypasses the rest, which
    /// also replaces any per-section bypass set through [`Self::set_bypassed`].
    pub fn set_low_cut(&self, freq: f32, slope: Slope, sample_rate: f64) {
        self.update_settings(StageId::LowCut(0), sample_rate, |s| {
            s.low_cut_freq = freq;
            s.low_cut_slope = slope;
        });
    }

    pub fn set_peak(&self, freq: f32, gain_db: f32, q: f32, sample_rate: f64) {
        self.update_settings(StageId::Peak, sample_rate, |s| {
            s.peak_freq = freq;
            s.peak_gain_db = gain_db;
            s.peak_q = q;
        });
    }

    pub fn set_shelf(&self, freq: f32, gain_db: f32, q: f32, sample_rate: f64) {
        self.update_settings(StageId::Shelf, sample_rate, |s| {
            s.shelf_freq = freq;
            s.shelf_gain_db = gain_db;
            s.shelf_q = q;
        });
    }

    /// Bypass or enable one stage without touching coefficients
    ///
    /// Peak and shelf bypass is kept in the stored settings and survives
    /// later edits through this type. Low-cut sections follow the slope, so
    /// the next low-cut edit resets them. When the chain listens to a
    /// [`ParameterStore`], the store owns every bypass flag and a filter
    /// parameter change re-derives them from it. Out-of-range low-cut
    /// indices are ignored.
    pub fn set_bypassed(&self, stage: StageId, bypassed: bool) {
        let Some(index) = stage.index() else {
            return;
        };
        self.update(|next| {
            next.stages[index].bypassed = bypassed;
            match stage {
                StageId::Peak => next.settings.peak_bypassed = bypassed,
                StageId::Shelf => next.settings.shelf_bypassed = bypassed,
                StageId::LowCut(_) => {}
            }
        });
    }

    /// Bypass the whole low-cut cascade, keeping the slope selection
    pub fn set_low_cut_bypassed(&self, bypassed: bool) {
        self.update(|next| {
            next.low_cut_bypassed = bypassed;
            next.settings.low_cut_bypassed = bypassed;
        });
    }

    pub fn is_bypassed(&self, stage: StageId) -> bool {
        stage
            .index()
            .map(|i| !self.snapshot.load().is_active(i))
            .unwrap_or(true)
    }

    /// Process one channel with the current snapshot
    pub fn process(&self, state: &mut ChannelFilterState, block: &mut [f32]) {
        self.snapshot.load().process(state, block);
    }

    /// Combined |H(f)| of the active stages at each frequency
    pub fn magnitude_response(&self, frequencies: &[f64], sample_rate: f64) -> Vec<f64> {
        self.snapshot.load().magnitude_response(frequencies, sample_rate)
    }
}

impl ParameterListener for FilterChain {
    fn parameter_changed(&self, store: &ParameterStore, id: ParamId) {
        if id.affects_filters() {
            self.apply_settings_at_current_rate(&store.chain_settings());
        }
    }
}

/// Audio-thread side of the chain: per-channel history plus a shared handle
#[derive(Debug)]
pub struct FilterStage {
    chain: Arc<FilterChain>,
    states: Vec<ChannelFilterState>,
}

impl FilterStage {
    pub fn new(chain: Arc<FilterChain>) -> Self {
        Self {
            chain,
            states: vec![ChannelFilterState::default(); 2],
        }
    }

    pub fn chain(&self) -> &Arc<FilterChain> {
        &self.chain
    }
}

impl Processor for FilterStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.states = vec![ChannelFilterState::default(); spec.num_channels];
    }

    /// One snapshot load per block; every channel sees the same filter
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let snapshot = self.chain.load();
        for (state, samples) in self.states.iter_mut().zip(buffer.samples.iter_mut()) {
            snapshot.process(state, samples);
        }
    }

    fn reset(&mut self) {
        self.states.iter_mut().for_each(ChannelFilterState::reset);
    }

    fn name(&self) -> &'static str {
        "filters"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    const SR: f64 = 48000.0;

    fn db(linear: f64) -> f64 {
        20.0 * linear.log10()
    }

    #[test_case(Slope::Db12, 1; "12 dB per octave")]
    #[test_case(Slope::Db24, 2; "24 dB per octave")]
    #[test_case(Slope::Db36, 3; "36 dB per octave")]
    #[test_case(Slope::Db48, 4; "48 dB per octave")]
    fn test_slope_enables_leading_stages(slope: Slope, expected: usize) {
        let chain = FilterChain::new();
        chain.set_low_cut(100.0, slope, SR);

        let snapshot = chain.snapshot();
        assert_eq!(snapshot.enabled_low_cut_stages(), expected);
        for i in 0..LOW_CUT_STAGES {
            assert_eq!(snapshot.is_active(i), i < expected, "stage {}", i);
        }
        assert_eq!(slope.order(), 2 * expected);
    }

    #[test]
    fn test_reducing_slope_resets_unused_sections() {
        let chain = FilterChain::new();
        chain.set_low_cut(100.0, Slope::Db48, SR);
        chain.set_low_cut(100.0, Slope::Db12, SR);

        // Re-enabling a stale section must not bring back old coefficients
        chain.set_bypassed(StageId::LowCut(3), false);
        assert_eq!(chain.snapshot().stages[3].coeffs, BiquadCoeffs::IDENTITY);
    }

    #[test]
    fn test_group_bypass_keeps_slope() {
        let chain = FilterChain::new();
        chain.set_low_cut(200.0, Slope::Db36, SR);
        chain.set_low_cut_bypassed(true);

        let snapshot = chain.snapshot();
        assert_eq!(snapshot.slope, Slope::Db36);
        assert_eq!(snapshot.enabled_low_cut_stages(), 3);
        assert!((0..LOW_CUT_STAGES).all(|i| !snapshot.is_active(i)));
        assert_relative_eq!(snapshot.magnitude_at(50.0, SR), 1.0, epsilon = 1e-9);

        chain.set_low_cut_bypassed(false);
        assert!(chain.snapshot().magnitude_at(50.0, SR) < 0.1);
    }

    #[test]
    fn test_peak_response() {
        let chain = FilterChain::new();
        chain.set_peak(1000.0, 6.0, 1.0, SR);
        chain.set_low_cut_bypassed(true);
        chain.set_bypassed(StageId::Shelf, true);

        let response = chain.magnitude_response(&[20.0, 1000.0, 20000.0], SR);
        assert!((db(response[1]) - 6.0).abs() < 0.2, "center {:.3}", db(response[1]));
        assert!(db(response[0]).abs() < 0.5);
        assert!(db(response[2]).abs() < 0.5);
    }

    #[test]
    fn test_bypassed_stage_keeps_history() {
        let chain = FilterChain::new();
        chain.set_peak(1000.0, 12.0, 1.0, SR);
        let mut state = ChannelFilterState::default();

        let mut block = vec![1.0_f32; 64];
        chain.process(&mut state, &mut block);
        let history = state.stages[LOW_CUT_STAGES];

        chain.set_bypassed(StageId::Peak, true);
        let mut silent = vec![0.5_f32; 64];
        chain.process(&mut state, &mut silent);

        assert_eq!(state.stages[LOW_CUT_STAGES], history);
    }

    #[test]
    fn test_sample_rate_change_rederives() {
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            ..ChainSettings::default()
        };
        let chain = FilterChain::with_settings(&settings, 44100.0);
        let at_44k = chain.snapshot().stages[LOW_CUT_STAGES].coeffs;

        chain.apply_settings(&settings, 96000.0);
        let snapshot = chain.snapshot();
        assert_eq!(snapshot.sample_rate, 96000.0);
        assert_ne!(snapshot.stages[LOW_CUT_STAGES].coeffs, at_44k);
        assert_relative_eq!(db(snapshot.magnitude_at(1000.0, 96000.0)), 6.0, epsilon = 0.05);
    }

    #[test]
    fn test_single_stage_edit_at_new_rate_rederives_all() {
        let chain = FilterChain::new();
        chain.set_low_cut_bypassed(true);
        chain.set_bypassed(StageId::Shelf, true);
        chain.set_peak(1000.0, 6.0, 1.0, SR);

        chain.set_low_cut(20.0, Slope::Db12, 96000.0);
        let snapshot = chain.snapshot();
        assert_eq!(snapshot.sample_rate, 96000.0);
        assert_relative_eq!(db(snapshot.magnitude_at(1000.0, 96000.0)), 6.0, epsilon = 0.05);

        // Same rate: only the edited stage changes
        let peak = snapshot.stages[LOW_CUT_STAGES].coeffs;
        chain.set_shelf(8000.0, 3.0, 0.7, 96000.0);
        assert_eq!(chain.snapshot().stages[LOW_CUT_STAGES].coeffs, peak);
    }

    #[test]
    fn test_direct_bypass_survives_other_edits() {
        let chain = FilterChain::new();
        chain.set_bypassed(StageId::Peak, true);
        chain.set_low_cut_bypassed(true);

        chain.set_shelf(8000.0, 3.0, 0.7, SR);
        chain.set_low_cut(150.0, Slope::Db24, 96000.0);

        let snapshot = chain.snapshot();
        assert!(!snapshot.is_active(LOW_CUT_STAGES));
        assert!(snapshot.low_cut_bypassed);
        assert_eq!(snapshot.slope, Slope::Db24);
    }

    #[test]
    fn test_listener_keeps_published_rate() {
        let store = ParameterStore::new();
        let chain = FilterChain::with_settings(&store.chain_settings(), 96000.0);
        store.set(ParamId::PeakGain, 6.0);
        chain.parameter_changed(&store, ParamId::PeakGain);

        let snapshot = chain.snapshot();
        assert_eq!(snapshot.sample_rate, 96000.0);
        assert_eq!(snapshot.settings, store.chain_settings());
    }

    #[test]
    fn test_out_of_range_stage_is_ignored() {
        let chain = FilterChain::new();
        let before = chain.snapshot();
        chain.set_bypassed(StageId::LowCut(9), true);
        assert_eq!(*chain.snapshot(), *before);
        assert!(chain.is_bypassed(StageId::LowCut(9)));
    }
}
