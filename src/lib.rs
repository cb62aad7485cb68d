//! FastVox - real-time vocal chain engine
//!
//! A stereo processor with three tone-shaping stages (a Butterworth low-cut
//! of selectable slope, a peak band and a high shelf) followed by a
//! feed-forward compressor, plus the telemetry a display needs: per-channel
//! spectrum paths and the combined filter response.
//!
//! # Architecture
//!
//! Three threads touch the engine and never take a lock:
//! - Audio thread: [`engine::FastVoxProcessor::process`] reads atomic
//!   parameters, loads one immutable filter snapshot per block and pushes
//!   post-filter samples into SPSC rings.
//! - Control thread: [`engine::ParameterStore::set`] stores the value and
//!   notifies listeners, which re-derive and publish a new snapshot.
//! - Observer thread: [`analysis::Observer::tick`] drains the rings, runs
//!   the FFT and rebuilds the response curve when the change flag is set.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use analysis::{Observer, Path, Rect};
pub use config::EngineConfig;
pub use engine::{FastVoxProcessor, ParamId, ParameterStore};
pub use error::{FastVoxError, Result};
