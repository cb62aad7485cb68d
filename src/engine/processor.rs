//! Real-time vocal chain processor
//!
//! The host-facing half of the engine. `prepare` runs on the host's setup
//! thread and may allocate; `process` runs on the audio thread and only
//! reads atomics, loads the published filter snapshot and copies samples
//! into the analyzer taps.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;
use tracing::{info, warn};

use super::accumulator::{channel_tap, BlockAccumulator, BlockReceiver, Channel};
use super::buffer::{linear_to_db_floor, AudioBuffer, NEGATIVE_INFINITY_DB};
use super::params::{ParamId, ParameterListener, ParameterStore};
use crate::config::EngineConfig;
use crate::dsp::{
    DynamicsProcessor, FilterChain, FilterStage, GainStage, ProcessSpec, Processor,
};
use crate::error::{FastVoxError, Result};

/// Channels the engine accepts on both input and output
pub const SUPPORTED_CHANNELS: usize = 2;

/// Observer-side ends of the analyzer taps, handed out by `prepare`
pub struct AnalyzerFeed {
    pub left: BlockReceiver,
    pub right: BlockReceiver,
}

/// RMS levels published by the audio thread
#[derive(Debug)]
pub struct LevelMeters {
    input_db: AtomicF32,
    output_db: AtomicF32,
}

impl Default for LevelMeters {
    fn default() -> Self {
        Self {
            input_db: AtomicF32::new(NEGATIVE_INFINITY_DB),
            output_db: AtomicF32::new(NEGATIVE_INFINITY_DB),
        }
    }
}

impl LevelMeters {
    /// Input RMS of the last block, dB, averaged over channels
    pub fn input_db(&self) -> f32 {
        self.input_db.load(Ordering::Relaxed)
    }

    /// Output RMS of the last block, dB, averaged over channels
    pub fn output_db(&self) -> f32 {
        self.output_db.load(Ordering::Relaxed)
    }

    fn publish(slot: &AtomicF32, buffer: &AudioBuffer) {
        let channels = buffer.channels();
        if channels == 0 {
            slot.store(NEGATIVE_INFINITY_DB, Ordering::Relaxed);
            return;
        }
        let mean = (0..channels).map(|ch| buffer.rms_level(ch)).sum::<f32>() / channels as f32;
        slot.store(linear_to_db_floor(mean, NEGATIVE_INFINITY_DB), Ordering::Relaxed);
    }
}

/// Input trim → filters → analyzer taps → compressor → output trim
pub struct FastVoxProcessor {
    params: Arc<ParameterStore>,
    chain: Arc<FilterChain>,
    meters: Arc<LevelMeters>,
    config: EngineConfig,
    input_gain: GainStage,
    filters: FilterStage,
    dynamics: DynamicsProcessor,
    output_gain: GainStage,
    taps: Vec<BlockAccumulator>,
    spec: Option<ProcessSpec>,
}

impl FastVoxProcessor {
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self::build(params, EngineConfig::default())
    }

    /// Build a processor with a validated `config`
    pub fn with_config(params: Arc<ParameterStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(params, config))
    }

    /// Subscribe a fresh filter chain to `params`
    fn build(params: Arc<ParameterStore>, config: EngineConfig) -> Self {
        let chain = Arc::new(FilterChain::with_settings(
            &params.chain_settings(),
            config.default_sample_rate as f64,
        ));
        params.add_listener(chain.clone());

        Self {
            input_gain: GainStage::new("input gain", params.get(ParamId::InputGain)),
            output_gain: GainStage::new("output gain", params.get(ParamId::OutputGain)),
            dynamics: DynamicsProcessor::new(params.dynamics_settings()),
            filters: FilterStage::new(Arc::clone(&chain)),
            taps: Vec::new(),
            spec: None,
            meters: Arc::new(LevelMeters::default()),
            chain,
            params,
            config,
        }
    }

    /// Only stereo in, stereo out
    pub fn is_layout_supported(inputs: usize, outputs: usize) -> bool {
        inputs == outputs && outputs == SUPPORTED_CHANNELS
    }

    /// Like [`Self::is_layout_supported`], as an error for setup code
    pub fn check_layout(inputs: usize, outputs: usize) -> Result<()> {
        if Self::is_layout_supported(inputs, outputs) {
            Ok(())
        } else {
            warn!(inputs, outputs, "Rejecting unsupported channel layout");
            Err(FastVoxError::UnsupportedLayout { inputs, outputs })
        }
    }

    /// Prepare for processing at `sample_rate` with blocks of up to `block_size`
    ///
    /// Re-derives every filter coefficient for the new rate, clears all
    /// history and returns fresh analyzer taps. Receivers from an earlier
    /// `prepare` stop receiving data.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<AnalyzerFeed> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FastVoxError::invalid_param(
                "sample_rate",
                sample_rate,
                "a positive sample rate",
            ));
        }
        if block_size == 0 {
            return Err(FastVoxError::invalid_param(
                "block_size",
                block_size,
                "at least one sample",
            ));
        }

        let spec = ProcessSpec::stereo(sample_rate, block_size);

        self.chain
            .apply_settings(&self.params.chain_settings(), sample_rate);
        self.dynamics.apply(&self.params.dynamics_settings());
        self.input_gain.set_gain_db(self.params.get(ParamId::InputGain));
        self.output_gain.set_gain_db(self.params.get(ParamId::OutputGain));

        self.input_gain.prepare(&spec);
        self.filters.prepare(&spec);
        self.dynamics.prepare(&spec);
        self.output_gain.prepare(&spec);

        let (left_tap, left) = channel_tap(Channel::Left, block_size, self.config.ring_capacity);
        let (right_tap, right) = channel_tap(Channel::Right, block_size, self.config.ring_capacity);
        self.taps = vec![left_tap, right_tap];
        self.spec = Some(spec);

        info!(
            sample_rate,
            block_size,
            ring_capacity = self.config.ring_capacity,
            "Prepared vocal chain"
        );

        Ok(AnalyzerFeed { left, right })
    }

    /// `prepare` for a host that negotiates buses first
    ///
    /// Fails before touching any state if the layout is not stereo in/out.
    pub fn prepare_for_layout(
        &mut self,
        inputs: usize,
        outputs: usize,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<AnalyzerFeed> {
        Self::check_layout(inputs, outputs)?;
        self.prepare(sample_rate, block_size)
    }

    /// Process one block in place
    ///
    /// Before `prepare` the audio passes through untouched.
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.spec.is_none() {
            return;
        }

        let params = &*self.params;
        self.input_gain.set_gain_db(params.get(ParamId::InputGain));
        self.output_gain.set_gain_db(params.get(ParamId::OutputGain));
        self.dynamics.apply(&params.dynamics_settings());

        self.input_gain.process(buffer);
        LevelMeters::publish(&self.meters.input_db, buffer);

        self.filters.process(buffer);
        for tap in &mut self.taps {
            tap.ingest_buffer(buffer);
        }

        self.dynamics.process(buffer);
        self.output_gain.process(buffer);
        LevelMeters::publish(&self.meters.output_db, buffer);
    }

    /// Run a whole buffer through `process` in host-sized blocks
    ///
    /// Offline helper; allocates per block.
    pub fn render(&mut self, buffer: &mut AudioBuffer, block_size: usize) {
        let block_size = block_size.max(1);
        let mut start = 0;
        while start < buffer.len() {
            let mut block = buffer.slice(start, block_size);
            self.process(&mut block);
            buffer.write_at(start, &block);
            start += block_size;
        }
    }

    /// Clear filter, envelope and ramp history
    pub fn reset(&mut self) {
        self.input_gain.reset();
        self.filters.reset();
        self.dynamics.reset();
        self.output_gain.reset();
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn chain(&self) -> &Arc<FilterChain> {
        &self.chain
    }

    pub fn meters(&self) -> &Arc<LevelMeters> {
        &self.meters
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.dynamics.gain_reduction_db()
    }
}

impl Drop for FastVoxProcessor {
    fn drop(&mut self) {
        let listener: Arc<dyn ParameterListener> = self.chain.clone();
        self.params.remove_listener(&listener);
    }
}
