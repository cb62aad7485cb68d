//! CLI Module
//!
//! Offline front end for the engine: render files, inspect the filter
//! response and the analyzer output, list and save parameters.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FastVox - vocal chain engine
#[derive(Parser, Debug)]
#[command(name = "fastvox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Parameter sources shared by every command
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ParamArgs {
    /// Saved parameter state to start from
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Override a parameter, e.g. --set "Peak Gain=6" or --set "Ratio=4:1"
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a WAV file through the full chain
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        /// Host block size in samples
        #[arg(short, long, default_value_t = 512)]
        block_size: usize,

        /// Output bit depth (16, 24 or 32 for float)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },

    /// Print the combined filter response
    #[command(name = "response")]
    Response {
        #[command(flatten)]
        params: ParamArgs,

        /// Sample rate to design the filters for
        #[arg(short = 'r', long, default_value_t = 48000)]
        sample_rate: u32,

        /// Number of log-spaced frequencies
        #[arg(short, long, default_value_t = 31)]
        points: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the analyzer over a file and dump the final spectrum paths
    #[command(name = "spectrum")]
    Spectrum {
        /// Input WAV file
        input: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        /// Drawing area width in pixels
        #[arg(long, default_value_t = 400)]
        width: u32,

        /// Drawing area height in pixels
        #[arg(long, default_value_t = 200)]
        height: u32,

        /// Host block size in samples
        #[arg(short, long, default_value_t = 512)]
        block_size: usize,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List parameters with their current values
    #[command(name = "params")]
    Params {
        #[command(flatten)]
        params: ParamArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Save the resulting state to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}
