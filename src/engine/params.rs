//! Parameter store
//!
//! Every user-facing control lives here as a lock-free atomic float. The
//! audio thread reads plain values at the start of each block; the control
//! thread writes them and fans the change out to registered listeners, which
//! is where derived state (filter coefficients, the response-curve flag) gets
//! updated.
//!
//! Choices are stored as their index and booleans as 0.0 / 1.0, so a single
//! `AtomicF32` per parameter covers all three kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dsp::dynamics::{ratio_from_text, DynamicsSettings, RATIO_CHOICES, RATIO_LABELS};
use crate::dsp::filter_chain::{ChainSettings, Slope};
use crate::error::{FastVoxError, Result};

/// Current version of the persisted parameter state
pub const STATE_VERSION: u32 = 1;

const SLOPE_LABELS: [&str; 4] = [
    Slope::Db12.label(),
    Slope::Db24.label(),
    Slope::Db36.label(),
    Slope::Db48.label(),
];

// ============================================================================
// Parameter identifiers and kinds
// ============================================================================

/// Every parameter the engine exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamId {
    LowCutFreq,
    LowCutSlope,
    LowCutBypassed,
    PeakFreq,
    PeakGain,
    PeakQuality,
    PeakBypassed,
    HighShelfFreq,
    HighShelfGain,
    HighShelfQuality,
    HighShelfBypassed,
    Threshold,
    Attack,
    Release,
    Ratio,
    CompressorBypassed,
    AnalyzerEnabled,
    InputGain,
    OutputGain,
}

impl ParamId {
    pub const COUNT: usize = 19;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::LowCutFreq,
        ParamId::LowCutSlope,
        ParamId::LowCutBypassed,
        ParamId::PeakFreq,
        ParamId::PeakGain,
        ParamId::PeakQuality,
        ParamId::PeakBypassed,
        ParamId::HighShelfFreq,
        ParamId::HighShelfGain,
        ParamId::HighShelfQuality,
        ParamId::HighShelfBypassed,
        ParamId::Threshold,
        ParamId::Attack,
        ParamId::Release,
        ParamId::Ratio,
        ParamId::CompressorBypassed,
        ParamId::AnalyzerEnabled,
        ParamId::InputGain,
        ParamId::OutputGain,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Host-visible name, also the key in persisted state
    pub fn name(self) -> &'static str {
        match self {
            ParamId::LowCutFreq => "LowCut Freq",
            ParamId::LowCutSlope => "LowCut Slope",
            ParamId::LowCutBypassed => "LowCut Bypassed",
            ParamId::PeakFreq => "Peak Freq",
            ParamId::PeakGain => "Peak Gain",
            ParamId::PeakQuality => "Peak Quality",
            ParamId::PeakBypassed => "Peak Bypassed",
            ParamId::HighShelfFreq => "HighShelf Freq",
            ParamId::HighShelfGain => "HighShelf Gain",
            ParamId::HighShelfQuality => "HighShelf Quality",
            ParamId::HighShelfBypassed => "HighShelf Bypassed",
            ParamId::Threshold => "Threshold",
            ParamId::Attack => "Attack",
            ParamId::Release => "Release",
            ParamId::Ratio => "Ratio",
            ParamId::CompressorBypassed => "Compressor Bypassed",
            ParamId::AnalyzerEnabled => "Analyzer Enabled",
            ParamId::InputGain => "Input Gain",
            ParamId::OutputGain => "Output Gain",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<ParamId> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }

    pub fn kind(self) -> ParamKind {
        use ParamKind::{Bool, Choice, Float};
        use Unit::{Decibels, Hertz, Milliseconds, Ratio};

        const FREQ_SKEW: f32 = 0.25;

        match self {
            ParamId::LowCutFreq => Float {
                min: 20.0,
                max: 20000.0,
                default: 20.0,
                skew: FREQ_SKEW,
                unit: Hertz,
            },
            ParamId::PeakFreq => Float {
                min: 20.0,
                max: 20000.0,
                default: 750.0,
                skew: FREQ_SKEW,
                unit: Hertz,
            },
            ParamId::HighShelfFreq => Float {
                min: 20.0,
                max: 20000.0,
                default: 20000.0,
                skew: FREQ_SKEW,
                unit: Hertz,
            },
            ParamId::PeakGain | ParamId::HighShelfGain | ParamId::InputGain | ParamId::OutputGain => {
                Float {
                    min: -24.0,
                    max: 24.0,
                    default: 0.0,
                    skew: 1.0,
                    unit: Decibels,
                }
            }
            ParamId::PeakQuality | ParamId::HighShelfQuality => Float {
                min: 0.1,
                max: 10.0,
                default: 1.0,
                skew: 1.0,
                unit: Ratio,
            },
            ParamId::Threshold => Float {
                min: -60.0,
                max: 12.0,
                default: 0.0,
                skew: 1.0,
                unit: Decibels,
            },
            ParamId::Attack => Float {
                min: 5.0,
                max: 500.0,
                default: 50.0,
                skew: 1.0,
                unit: Milliseconds,
            },
            ParamId::Release => Float {
                min: 5.0,
                max: 500.0,
                default: 250.0,
                skew: 1.0,
                unit: Milliseconds,
            },
            ParamId::LowCutSlope => Choice {
                choices: &SLOPE_LABELS,
                default: 0,
            },
            ParamId::Ratio => Choice {
                choices: &RATIO_LABELS,
                default: 3,
            },
            ParamId::LowCutBypassed
            | ParamId::PeakBypassed
            | ParamId::HighShelfBypassed
            | ParamId::CompressorBypassed => Bool { default: false },
            ParamId::AnalyzerEnabled => Bool { default: true },
        }
    }

    /// Parameters whose change requires new filter coefficients
    pub fn affects_filters(self) -> bool {
        matches!(
            self,
            ParamId::LowCutFreq
                | ParamId::LowCutSlope
                | ParamId::LowCutBypassed
                | ParamId::PeakFreq
                | ParamId::PeakGain
                | ParamId::PeakQuality
                | ParamId::PeakBypassed
                | ParamId::HighShelfFreq
                | ParamId::HighShelfGain
                | ParamId::HighShelfQuality
                | ParamId::HighShelfBypassed
        )
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display unit of a float parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Hertz,
    Decibels,
    Milliseconds,
    Ratio,
}

/// What kind of control a parameter is, with its range and default
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    Float {
        min: f32,
        max: f32,
        default: f32,
        /// Exponent of the normalized mapping; < 1 spends more travel on the low end
        skew: f32,
        unit: Unit,
    },
    Choice {
        choices: &'static [&'static str],
        default: usize,
    },
    Bool {
        default: bool,
    },
}

impl ParamKind {
    /// Default as a stored value
    pub fn default_value(&self) -> f32 {
        match *self {
            ParamKind::Float { default, .. } => default,
            ParamKind::Choice { default, .. } => default as f32,
            ParamKind::Bool { default } => bool_to_value(default),
        }
    }

    /// Bring any value into the legal set for this kind
    ///
    /// NaN falls back to the default.
    pub fn sanitize(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default_value();
        }
        match *self {
            ParamKind::Float { min, max, .. } => value.clamp(min, max),
            ParamKind::Choice { choices, .. } => {
                value.round().clamp(0.0, (choices.len() - 1) as f32)
            }
            ParamKind::Bool { .. } => bool_to_value(value >= 0.5),
        }
    }

    /// Map a stored value to 0..=1
    pub fn to_normalized(&self, value: f32) -> f32 {
        match *self {
            ParamKind::Float { min, max, skew, .. } => {
                let proportion = ((value - min) / (max - min)).clamp(0.0, 1.0);
                if (skew - 1.0).abs() > f32::EPSILON && proportion > 0.0 {
                    proportion.powf(skew)
                } else {
                    proportion
                }
            }
            ParamKind::Choice { choices, .. } => {
                if choices.len() > 1 {
                    value / (choices.len() - 1) as f32
                } else {
                    0.0
                }
            }
            ParamKind::Bool { .. } => value,
        }
    }

    /// Map 0..=1 back to a stored value
    pub fn from_normalized(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        match *self {
            ParamKind::Float { min, max, skew, .. } => {
                let proportion = if (skew - 1.0).abs() > f32::EPSILON && normalized > 0.0 {
                    (normalized.ln() / skew).exp()
                } else {
                    normalized
                };
                min + (max - min) * proportion
            }
            ParamKind::Choice { choices, .. } => {
                self.sanitize(normalized * (choices.len() - 1) as f32)
            }
            ParamKind::Bool { .. } => self.sanitize(normalized),
        }
    }
}

#[inline]
fn bool_to_value(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

// ============================================================================
// Text conversion
// ============================================================================

fn format_value(kind: &ParamKind, value: f32) -> String {
    match *kind {
        ParamKind::Float { unit, .. } => match unit {
            Unit::Hertz if value >= 1000.0 => format!("{:.2} kHz", value / 1000.0),
            Unit::Hertz => format!("{:.0} Hz", value),
            Unit::Decibels => format!("{:.1} dB", value),
            Unit::Milliseconds => format!("{:.0} ms", value),
            Unit::Ratio => format!("{:.2}", value),
        },
        ParamKind::Choice { choices, .. } => choices
            .get(value as usize)
            .copied()
            .unwrap_or_default()
            .to_string(),
        ParamKind::Bool { .. } => {
            if value >= 0.5 {
                "On".to_string()
            } else {
                "Off".to_string()
            }
        }
    }
}

/// Leading number of `text`, ignoring any unit suffix
fn leading_number(text: &str) -> Option<f32> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

fn parse_value(id: ParamId, kind: &ParamKind, text: &str) -> Result<f32> {
    let invalid = |expected: &str| FastVoxError::invalid_param(id.name(), text, expected);

    match *kind {
        ParamKind::Float { min, max, unit, .. } => {
            let number = leading_number(text).ok_or_else(|| invalid("a number"))?;
            let scaled = if unit == Unit::Hertz && text.to_ascii_lowercase().contains("khz") {
                number * 1000.0
            } else {
                number
            };
            Ok(scaled.clamp(min, max))
        }
        ParamKind::Choice { choices, .. } if id == ParamId::Ratio => {
            // Unknown ratios fail closed to 1:1
            let ratio = ratio_from_text(text);
            let index = RATIO_CHOICES.iter().position(|&c| c == ratio).unwrap_or(0);
            Ok(index.min(choices.len() - 1) as f32)
        }
        ParamKind::Choice { choices, .. } => {
            let trimmed = text.trim();
            if let Some(index) = choices.iter().position(|c| c.eq_ignore_ascii_case(trimmed)) {
                return Ok(index as f32);
            }
            // "24" or "24 dB" picks the slope by its dB/oct value
            let number = leading_number(trimmed).ok_or_else(|| invalid("one of the listed choices"))?;
            choices
                .iter()
                .position(|c| leading_number(c) == Some(number))
                .map(|i| i as f32)
                .ok_or_else(|| invalid("one of the listed choices"))
        }
        ParamKind::Bool { .. } => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(1.0),
            "0" | "false" | "off" | "no" => Ok(0.0),
            _ => Err(invalid("on/off")),
        },
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Receives parameter changes on the thread that made them
///
/// Never called from the audio thread.
pub trait ParameterListener: Send + Sync {
    fn parameter_changed(&self, store: &ParameterStore, id: ParamId);
}

// ============================================================================
// Persisted state
// ============================================================================

/// Name → stored value map, the only persisted form of the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    pub version: u32,
    pub values: BTreeMap<String, f32>,
}

impl ParameterState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FastVoxError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// One row of [`ParameterStore::describe`]
#[derive(Debug, Clone, Serialize)]
pub struct ParamInfo {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
    pub value: f32,
    pub display: String,
}

// ============================================================================
// Parameter Store
// ============================================================================

/// Lock-free parameter values plus change notification
pub struct ParameterStore {
    values: [AtomicF32; ParamId::COUNT],
    listeners: ArcSwap<Vec<Arc<dyn ParameterListener>>>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for id in ParamId::ALL {
            map.entry(&id.name(), &self.get(id));
        }
        map.finish()
    }
}

impl ParameterStore {
    /// Store with every parameter at its default
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicF32::new(ParamId::ALL[i].kind().default_value())),
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Reads (any thread, including audio)
    // ------------------------------------------------------------------

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get(id) >= 0.5
    }

    #[inline]
    pub fn get_choice(&self, id: ParamId) -> usize {
        self.get(id).max(0.0) as usize
    }

    pub fn low_cut_slope(&self) -> Slope {
        Slope::from_index(self.get_choice(ParamId::LowCutSlope))
    }

    /// Compression ratio for the current choice
    pub fn ratio(&self) -> f32 {
        RATIO_CHOICES
            .get(self.get_choice(ParamId::Ratio))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            low_cut_freq: self.get(ParamId::LowCutFreq),
            low_cut_slope: self.low_cut_slope(),
            low_cut_bypassed: self.get_bool(ParamId::LowCutBypassed),
            peak_freq: self.get(ParamId::PeakFreq),
            peak_gain_db: self.get(ParamId::PeakGain),
            peak_q: self.get(ParamId::PeakQuality),
            peak_bypassed: self.get_bool(ParamId::PeakBypassed),
            shelf_freq: self.get(ParamId::HighShelfFreq),
            shelf_gain_db: self.get(ParamId::HighShelfGain),
            shelf_q: self.get(ParamId::HighShelfQuality),
            shelf_bypassed: self.get_bool(ParamId::HighShelfBypassed),
        }
    }

    pub fn dynamics_settings(&self) -> DynamicsSettings {
        DynamicsSettings {
            threshold_db: self.get(ParamId::Threshold),
            attack_ms: self.get(ParamId::Attack),
            release_ms: self.get(ParamId::Release),
            ratio: self.ratio(),
            bypassed: self.get_bool(ParamId::CompressorBypassed),
        }
    }

    pub fn display_string(&self, id: ParamId) -> String {
        format_value(&id.kind(), self.get(id))
    }

    pub fn normalized(&self, id: ParamId) -> f32 {
        id.kind().to_normalized(self.get(id))
    }

    /// Every parameter with its range, value and display text
    pub fn describe(&self) -> Vec<ParamInfo> {
        ParamId::ALL
            .into_iter()
            .map(|id| ParamInfo {
                name: id.name(),
                kind: id.kind(),
                value: self.get(id),
                display: self.display_string(id),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Writes (control thread)
    // ------------------------------------------------------------------

    /// Set a value, clamped into range, and notify listeners if it changed
    ///
    /// Returns the value actually stored.
    pub fn set(&self, id: ParamId, value: f32) -> f32 {
        let stored = id.kind().sanitize(value);
        let previous = self.values[id.index()].swap(stored, Ordering::Relaxed);
        if previous != stored {
            self.notify(id);
        }
        stored
    }

    pub fn set_bool(&self, id: ParamId, value: bool) {
        self.set(id, bool_to_value(value));
    }

    pub fn set_normalized(&self, id: ParamId, normalized: f32) -> f32 {
        self.set(id, id.kind().from_normalized(normalized))
    }

    /// Set by host-visible name
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32> {
        let id = ParamId::from_name(name).ok_or_else(|| FastVoxError::UnknownParameter {
            name: name.to_string(),
        })?;
        Ok(self.set(id, value))
    }

    /// Parse display-style text ("1.5 kHz", "24 db/Oct", "on") and set it
    ///
    /// Numbers are clamped into range. Ratio text that matches no choice
    /// falls back to 1:1 rather than failing.
    pub fn set_from_text(&self, id: ParamId, text: &str) -> Result<f32> {
        let value = parse_value(id, &id.kind(), text)?;
        Ok(self.set(id, value))
    }

    pub fn reset_to_defaults(&self) {
        for id in ParamId::ALL {
            self.set(id, id.kind().default_value());
        }
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn ParameterListener>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&listener));
            next
        });
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ParameterListener>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|l| !Arc::ptr_eq(l, listener))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    fn notify(&self, id: ParamId) {
        let listeners = self.listeners.load_full();
        for listener in listeners.iter() {
            listener.parameter_changed(self, id);
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn state(&self) -> ParameterState {
        ParameterState {
            version: STATE_VERSION,
            values: ParamId::ALL
                .into_iter()
                .map(|id| (id.name().to_string(), self.get(id)))
                .collect(),
        }
    }

    /// Apply a saved state
    ///
    /// Unknown names are skipped with a warning; parameters missing from the
    /// state keep their current value. Every parameter is announced to the
    /// listeners afterwards so derived state is rebuilt from scratch.
    pub fn load_state(&self, state: &ParameterState) -> Result<()> {
        if state.version > STATE_VERSION {
            return Err(FastVoxError::InvalidConfig {
                reason: format!(
                    "parameter state version {} is newer than supported version {}",
                    state.version, STATE_VERSION
                ),
            });
        }

        let mut applied = 0;
        for (name, &value) in &state.values {
            match ParamId::from_name(name) {
                Some(id) => {
                    self.values[id.index()].store(id.kind().sanitize(value), Ordering::Relaxed);
                    applied += 1;
                }
                None => warn!(parameter = %name, "Ignoring unknown parameter in saved state"),
            }
        }

        for id in ParamId::ALL {
            self.notify(id);
        }

        debug!(applied, total = state.values.len(), "Parameter state loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    impl ParameterListener for CountingListener {
        fn parameter_changed(&self, _store: &ParameterStore, _id: ParamId) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_defaults() {
        let store = ParameterStore::new();
        assert_eq!(store.get(ParamId::LowCutFreq), 20.0);
        assert_eq!(store.get(ParamId::HighShelfFreq), 20000.0);
        assert_eq!(store.get(ParamId::PeakFreq), 750.0);
        assert_eq!(store.get(ParamId::Attack), 50.0);
        assert_eq!(store.get(ParamId::Release), 250.0);
        assert_eq!(store.ratio(), 3.0);
        assert_eq!(store.low_cut_slope(), Slope::Db12);
        assert!(store.get_bool(ParamId::AnalyzerEnabled));
        assert!(!store.get_bool(ParamId::CompressorBypassed));
    }

    #[test]
    fn test_values_are_clamped() {
        let store = ParameterStore::new();
        assert_eq!(store.set(ParamId::PeakQuality, 42.0), 10.0);
        assert_eq!(store.set(ParamId::Threshold, -100.0), -60.0);
        assert_eq!(store.set(ParamId::LowCutSlope, 7.0), 3.0);
        assert_eq!(store.set(ParamId::PeakBypassed, 0.7), 1.0);
        assert_eq!(store.set(ParamId::Attack, f32::NAN), 50.0);
    }

    #[test]
    fn test_display_strings() {
        let store = ParameterStore::new();
        store.set(ParamId::PeakFreq, 1500.0);
        store.set(ParamId::LowCutSlope, 1.0);
        store.set(ParamId::Ratio, 4.0);

        assert_eq!(store.display_string(ParamId::PeakFreq), "1.50 kHz");
        assert_eq!(store.display_string(ParamId::LowCutFreq), "20 Hz");
        assert_eq!(store.display_string(ParamId::LowCutSlope), "24 db/Oct");
        assert_eq!(store.display_string(ParamId::Ratio), "4.0");
        assert_eq!(store.display_string(ParamId::Threshold), "0.0 dB");
        assert_eq!(store.display_string(ParamId::AnalyzerEnabled), "On");
    }

    #[test]
    fn test_set_from_text() {
        let store = ParameterStore::new();
        assert_eq!(store.set_from_text(ParamId::PeakFreq, "2.5 kHz").unwrap(), 2500.0);
        assert_eq!(store.set_from_text(ParamId::PeakGain, "-6 dB").unwrap(), -6.0);
        assert_eq!(store.set_from_text(ParamId::LowCutSlope, "36 db/Oct").unwrap(), 2.0);
        assert_eq!(store.set_from_text(ParamId::LowCutSlope, "48").unwrap(), 3.0);
        assert_eq!(store.set_from_text(ParamId::PeakBypassed, "on").unwrap(), 1.0);
        assert!(store.set_from_text(ParamId::PeakGain, "loud").is_err());
        assert!(store.set_from_text(ParamId::LowCutSlope, "13 db/Oct").is_err());
    }

    #[test]
    fn test_bad_ratio_text_falls_back_to_unity() {
        let store = ParameterStore::new();
        store.set_from_text(ParamId::Ratio, "8").unwrap();
        assert_eq!(store.ratio(), 8.0);

        store.set_from_text(ParamId::Ratio, "banana").unwrap();
        assert_eq!(store.ratio(), 1.0);

        store.set_from_text(ParamId::Ratio, "13").unwrap();
        assert_eq!(store.ratio(), 1.0);
    }

    #[test]
    fn test_unknown_name() {
        let store = ParameterStore::new();
        let err = store.set_by_name("Wet", 1.0).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PARAMETER");
        assert_eq!(store.set_by_name("peak gain", 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_normalized_frequency_is_skewed() {
        let store = ParameterStore::new();
        store.set_normalized(ParamId::PeakFreq, 0.5);
        let mid = store.get(ParamId::PeakFreq);
        // Skew 0.25 puts the midpoint far below the linear midpoint
        assert!(mid < 2000.0, "midpoint was {}", mid);
        assert_relative_eq!(store.normalized(ParamId::PeakFreq), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_listeners_fire_on_change_only() {
        let store = ParameterStore::new();
        let listener = Arc::new(CountingListener::default());
        store.add_listener(listener.clone());

        store.set(ParamId::PeakGain, 3.0);
        store.set(ParamId::PeakGain, 3.0);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

        let as_dyn: Arc<dyn ParameterListener> = listener.clone();
        store.remove_listener(&as_dyn);
        assert_eq!(store.listener_count(), 0);
        store.set(ParamId::PeakGain, 4.0);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_round_trip_notifies() {
        let source = ParameterStore::new();
        source.set(ParamId::PeakGain, 6.0);
        source.set(ParamId::LowCutSlope, 2.0);
        let json = source.state().to_json().unwrap();

        let target = ParameterStore::new();
        let listener = Arc::new(CountingListener::default());
        target.add_listener(listener.clone());
        target.load_state(&ParameterState::from_json(&json).unwrap()).unwrap();

        assert_eq!(target.state(), source.state());
        assert_eq!(listener.calls.load(Ordering::SeqCst), ParamId::COUNT);
    }

    #[test]
    fn test_state_skips_unknown_and_rejects_future_versions() {
        let store = ParameterStore::new();
        let mut state = store.state();
        state.values.insert("Gate Threshold".to_string(), -20.0);
        state.values.insert("Peak Gain".to_string(), 99.0);
        store.load_state(&state).unwrap();
        assert_eq!(store.get(ParamId::PeakGain), 24.0);

        state.version = STATE_VERSION + 1;
        assert!(store.load_state(&state).is_err());
    }
}
