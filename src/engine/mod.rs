//! Audio Engine Module
//!
//! Real-time side of the vocal chain:
//! - Audio buffer management
//! - Lock-free ring buffer and block accumulation for the analyzer
//! - Parameter store
//! - The host-facing processor
//! - WAV file I/O

pub mod accumulator;
pub mod buffer;
pub mod io;
pub mod params;
pub mod processor;
pub mod ring_buffer;

pub use accumulator::{channel_tap, BlockAccumulator, BlockReceiver, Channel, SlidingWindow};
pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{export_audio, generate_test_tone, import_audio, ExportFormat};
pub use params::{ParamId, ParamKind, ParameterListener, ParameterState, ParameterStore};
pub use processor::{AnalyzerFeed, FastVoxProcessor, LevelMeters};
pub use ring_buffer::{RingBuffer, RingConsumer, RingProducer};
