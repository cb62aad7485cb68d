//! Observer loop: the non-real-time consumer of everything the audio thread
//! publishes.
//!
//! Each tick drains both analyzer taps, produces spectrum paths for any
//! ready frames, and rebuilds the response curve when parameters, bounds or
//! the sample rate changed. It only reads the live filter chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::path::{frequency_grid, gain_grid, GridLine, Path, Rect};
use super::response::{ParameterChangeFlag, ResponseCurve};
use super::spectrum::SpectrumAnalyzer;
use crate::config::EngineConfig;
use crate::dsp::FilterChain;
use crate::engine::accumulator::Channel;
use crate::engine::params::{ParamId, ParameterListener, ParameterStore};
use crate::engine::processor::AnalyzerFeed;

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Blocks drained across both taps
    pub blocks: usize,
    /// Spectrum paths produced
    pub frames: usize,
    pub response_updated: bool,
    /// Total blocks dropped by the audio thread so far
    pub dropped_blocks: u64,
}

pub struct Observer {
    params: Arc<ParameterStore>,
    chain: Arc<FilterChain>,
    flag: Arc<ParameterChangeFlag>,
    analyzers: [SpectrumAnalyzer; 2],
    response: ResponseCurve,
    bounds: Rect,
    config: EngineConfig,
    last_dropped: u64,
}

impl Observer {
    /// Wire an observer to a prepared processor's feed and filter chain
    ///
    /// Registers a change flag with `params`; it is removed again on drop.
    pub fn new(
        feed: AnalyzerFeed,
        chain: Arc<FilterChain>,
        params: Arc<ParameterStore>,
        config: &EngineConfig,
        bounds: Rect,
    ) -> Self {
        let flag = Arc::new(ParameterChangeFlag::new());
        params.add_listener(flag.clone());

        let AnalyzerFeed { left, right } = feed;
        Self {
            analyzers: [
                SpectrumAnalyzer::new(left, config),
                SpectrumAnalyzer::new(right, config),
            ],
            response: ResponseCurve::new(Arc::clone(&chain), Arc::clone(&flag), config),
            chain,
            flag,
            params,
            bounds,
            config: config.clone(),
            last_dropped: 0,
        }
    }

    /// New drawing area; the response curve follows on the next tick
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// One observer cycle
    pub fn tick(&mut self) -> TickReport {
        let sample_rate = self.chain.sample_rate();
        let enabled = self.params.get_bool(ParamId::AnalyzerEnabled);
        let mut report = TickReport::default();

        for analyzer in &mut self.analyzers {
            if enabled {
                report.blocks += analyzer.pull();
                if analyzer.process(self.bounds, sample_rate) {
                    report.frames += 1;
                }
            } else {
                report.blocks += analyzer.drain_only();
            }
        }

        report.response_updated = self.response.update(self.bounds);

        report.dropped_blocks = self.analyzers.iter().map(|a| a.dropped_blocks()).sum();
        if report.dropped_blocks > self.last_dropped {
            debug!(
                newly_dropped = report.dropped_blocks - self.last_dropped,
                total = report.dropped_blocks,
                "Analyzer ring overflowed"
            );
            self.last_dropped = report.dropped_blocks;
        }

        report
    }

    /// Tick at the configured refresh rate until `stop` is set
    pub fn run_until(&mut self, stop: &AtomicBool) {
        let interval: Duration = self.config.refresh_interval();
        let mut ticks = 0_u64;
        let mut frames = 0_u64;

        info!(refresh_hz = self.config.refresh_hz, "Observer started");
        while !stop.load(Ordering::Acquire) {
            let report = self.tick();
            ticks += 1;
            frames += report.frames as u64;
            std::thread::sleep(interval);
        }
        info!(ticks, frames, dropped = self.last_dropped, "Observer stopped");
    }

    /// Latest spectrum path for `channel`, once
    pub fn take_path(&mut self, channel: Channel) -> Option<Path> {
        self.analyzers[channel.index()].take_path()
    }

    pub fn response_path(&self) -> &Path {
        self.response.path()
    }

    pub fn response(&self) -> &ResponseCurve {
        &self.response
    }

    pub fn analyzer(&self, channel: Channel) -> &SpectrumAnalyzer {
        &self.analyzers[channel.index()]
    }

    /// Frequency and gain grid lines for the current bounds
    pub fn grid(&self) -> (Vec<GridLine>, Vec<GridLine>) {
        (
            frequency_grid(&self.bounds, self.config.min_frequency, self.config.max_frequency),
            gain_grid(&self.bounds, self.config.response_range_db),
        )
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        let listener: Arc<dyn ParameterListener> = self.flag.clone();
        self.params.remove_listener(&listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;
    use crate::engine::processor::FastVoxProcessor;

    fn setup() -> (FastVoxProcessor, Observer) {
        let params = Arc::new(ParameterStore::new());
        let mut processor = FastVoxProcessor::new(Arc::clone(&params));
        let feed = processor.prepare(48000.0, 512).unwrap();
        let observer = Observer::new(
            feed,
            Arc::clone(processor.chain()),
            params,
            &EngineConfig::default(),
            Rect::new(0.0, 0.0, 400.0, 200.0),
        );
        (processor, observer)
    }

    #[test]
    fn test_first_tick_draws_the_response() {
        let (_processor, mut observer) = setup();
        let report = observer.tick();
        assert!(report.response_updated);
        assert_eq!(report.blocks, 0);
        assert_eq!(observer.response_path().len(), 400);
        assert!(!observer.tick().response_updated);
    }

    #[test]
    fn test_spectrum_paths_for_both_channels() {
        let (mut processor, mut observer) = setup();
        for _ in 0..4 {
            let mut block = generate_test_tone(440.0, 0.5, 2, 512, 48000);
            processor.process(&mut block);
        }

        let report = observer.tick();
        assert_eq!(report.blocks, 8);
        assert_eq!(report.frames, 2);
        assert_eq!(observer.take_path(Channel::Left).unwrap().len(), 400);
        assert!(observer.take_path(Channel::Right).is_some());
        assert!(observer.take_path(Channel::Left).is_none());
    }

    #[test]
    fn test_disabled_analyzer_still_drains() {
        let (mut processor, mut observer) = setup();
        processor.params().set_bool(ParamId::AnalyzerEnabled, false);
        for _ in 0..4 {
            let mut block = generate_test_tone(440.0, 0.5, 2, 512, 48000);
            processor.process(&mut block);
        }

        let report = observer.tick();
        assert_eq!(report.blocks, 8);
        assert_eq!(report.frames, 0);
        assert!(observer.take_path(Channel::Left).is_none());
    }

    #[test]
    fn test_parameter_change_sets_flag() {
        let (processor, mut observer) = setup();
        observer.tick();
        processor.params().set(ParamId::PeakGain, 6.0);
        assert!(observer.tick().response_updated);
    }

    #[test]
    fn test_drop_unregisters_flag() {
        let (processor, observer) = setup();
        assert_eq!(processor.params().listener_count(), 2);
        drop(observer);
        assert_eq!(processor.params().listener_count(), 1);
    }

    #[test]
    fn test_run_until_stops() {
        let (_processor, mut observer) = setup();
        let stop = AtomicBool::new(true);
        observer.run_until(&stop);
        assert!(observer.response_path().is_empty());
    }
}
