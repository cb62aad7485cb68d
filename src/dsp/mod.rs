//! DSP stages of the vocal chain
//!
//! Fixed topology: input trim → low-cut / peak / high shelf → compressor →
//! output trim. Every stage implements [`Processor`].

pub mod biquad;
pub mod compressor;
pub mod dynamics;
pub mod filter_chain;
pub mod gain;
pub mod processor;

pub use biquad::{BiquadCoeffs, BiquadState};
pub use compressor::Compressor;
pub use dynamics::{DynamicsProcessor, DynamicsSettings, RATIO_CHOICES};
pub use filter_chain::{
    ChainSettings, ChainSnapshot, ChannelFilterState, FilterChain, FilterStage, Slope, StageId,
};
pub use gain::GainStage;
pub use processor::{ProcessSpec, Processor};
