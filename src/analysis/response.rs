//! Combined filter response as a display path
//!
//! The curve is only recomputed when something could have changed it: a
//! parameter notification, a new drawing area or a new sample rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::path::{map_to_log10, remap, Path, Rect};
use crate::config::EngineConfig;
use crate::dsp::FilterChain;
use crate::engine::params::{ParamId, ParameterListener, ParameterStore};

/// Floor applied before mapping, so a deep notch cannot produce -inf
const RESPONSE_FLOOR_DB: f64 = -100.0;

/// Set by any parameter change, cleared by the one consumer that acts on it
///
/// Writers publish the derived state before marking; the consumer takes the
/// flag before reading that state. Either way round, a change is never
/// consumed against data older than it.
#[derive(Debug)]
pub struct ParameterChangeFlag {
    changed: AtomicBool,
}

impl Default for ParameterChangeFlag {
    /// Starts set so the first consumer always does its work
    fn default() -> Self {
        Self {
            changed: AtomicBool::new(true),
        }
    }
}

impl ParameterChangeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.changed.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.changed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }
}

impl ParameterListener for ParameterChangeFlag {
    fn parameter_changed(&self, _store: &ParameterStore, _id: ParamId) {
        self.mark();
    }
}

/// Response curve over the same log axis as the spectrum
pub struct ResponseCurve {
    chain: Arc<FilterChain>,
    flag: Arc<ParameterChangeFlag>,
    path: Path,
    last_bounds: Option<Rect>,
    last_sample_rate: f64,
    min_frequency: f64,
    max_frequency: f64,
    range_db: f32,
}

impl ResponseCurve {
    pub fn new(
        chain: Arc<FilterChain>,
        flag: Arc<ParameterChangeFlag>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            chain,
            flag,
            path: Path::default(),
            last_bounds: None,
            last_sample_rate: 0.0,
            min_frequency: config.min_frequency as f64,
            max_frequency: config.max_frequency as f64,
            range_db: config.response_range_db,
        }
    }

    /// Recompute if the flag was set or `bounds`/sample rate moved
    ///
    /// Returns `true` when the path was rebuilt.
    pub fn update(&mut self, bounds: Rect) -> bool {
        // Always consume the flag so a stale set does not trigger a rebuild later.
        // Taken before the load: a snapshot published after this read re-marks.
        let params_changed = self.flag.take();
        let snapshot = self.chain.snapshot();
        let geometry_changed = self.last_bounds != Some(bounds)
            || self.last_sample_rate != snapshot.sample_rate;

        if !params_changed && !geometry_changed {
            return false;
        }

        self.last_bounds = Some(bounds);
        self.last_sample_rate = snapshot.sample_rate;
        self.path.clear();
        if bounds.is_empty() {
            return true;
        }

        let width = bounds.pixel_width();
        let span = (width.max(2) - 1) as f64;
        let range = self.range_db;

        for px in 0..width {
            let frequency = map_to_log10(px as f64 / span, self.min_frequency, self.max_frequency);
            let magnitude = snapshot.magnitude_at(frequency, snapshot.sample_rate);
            let db = if magnitude > 0.0 {
                (20.0 * magnitude.log10()).max(RESPONSE_FLOOR_DB)
            } else {
                RESPONSE_FLOOR_DB
            };
            let db = (db as f32).clamp(-range, range);
            let y = remap(db, -range, range, bounds.bottom(), bounds.y);
            self.path.push(bounds.x + px as f32, y);
        }
        true
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// dB of the combined response at each frequency, unclamped
    pub fn response_db(&self, frequencies: &[f64]) -> Vec<f64> {
        let snapshot = self.chain.snapshot();
        snapshot
            .magnitude_response(frequencies, snapshot.sample_rate)
            .into_iter()
            .map(|m| if m > 0.0 { 20.0 * m.log10() } else { RESPONSE_FLOOR_DB })
            .collect()
    }

    pub fn flag(&self) -> &Arc<ParameterChangeFlag> {
        &self.flag
    }
}
