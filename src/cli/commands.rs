//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::ParamArgs;
use crate::analysis::{
    map_to_log10, Observer, ParameterChangeFlag, Path as DisplayPath, Rect, ResponseCurve,
};
use crate::config::EngineConfig;
use crate::dsp::FilterChain;
use crate::engine::buffer::linear_to_db;
use crate::engine::processor::SUPPORTED_CHANNELS;
use crate::engine::{
    export_audio, import_audio, AudioBuffer, Channel, ExportFormat, FastVoxProcessor, ParamId,
    ParameterState, ParameterStore,
};
use crate::error::{FastVoxError, Result};

/// Build a parameter store from `--state` and `--set` arguments
pub fn load_params(args: &ParamArgs) -> Result<Arc<ParameterStore>> {
    let params = Arc::new(ParameterStore::new());

    if let Some(path) = &args.state {
        params.load_state(&ParameterState::load(path)?)?;
        info!(path = %path.display(), "Loaded parameter state");
    }

    for assignment in &args.overrides {
        let (name, text) = assignment.split_once('=').ok_or_else(|| {
            FastVoxError::invalid_param("--set", assignment, "NAME=VALUE")
        })?;
        let id = ParamId::from_name(name.trim()).ok_or_else(|| FastVoxError::UnknownParameter {
            name: name.trim().to_string(),
        })?;
        params.set_from_text(id, text.trim())?;
        info!(parameter = %id, value = %params.display_string(id), "Override");
    }

    Ok(params)
}

/// Import a file and make sure it is stereo
fn import_stereo(path: &Path) -> Result<AudioBuffer> {
    let buffer = import_audio(path)?;
    if buffer.channels() == SUPPORTED_CHANNELS {
        return Ok(buffer);
    }

    warn!(channels = buffer.channels(), "Input is mono, duplicating to stereo");
    let mono = buffer.channel(0).to_vec();
    AudioBuffer::from_channels(vec![mono.clone(), mono], buffer.sample_rate)
}

/// Render a file through the full chain.
pub fn render(
    input: &Path,
    output: &Path,
    args: &ParamArgs,
    config: &EngineConfig,
    block_size: usize,
    bit_depth: u16,
) -> Result<()> {
    info!("Rendering {} -> {}", input.display(), output.display());

    let params = load_params(args)?;
    let mut buffer = import_stereo(input)?;
    let mut processor = FastVoxProcessor::with_config(params, config.clone())?;
    // Nobody reads the taps offline
    let _feed = processor.prepare_for_layout(
        buffer.channels(),
        SUPPORTED_CHANNELS,
        buffer.sample_rate as f64,
        block_size,
    )?;

    processor.render(&mut buffer, block_size);

    if !buffer.is_finite() {
        return Err(FastVoxError::InvalidAudio {
            reason: "render produced non-finite samples".to_string(),
            source: None,
        });
    }

    export_audio(&buffer, output, ExportFormat::new(bit_depth))?;

    let peak = (0..buffer.channels())
        .map(|ch| buffer.peak_level(ch))
        .fold(0.0_f32, f32::max);

    println!("Rendered: {}", output.display());
    println!("  Duration:        {:.2} s", buffer.duration_secs());
    println!("  Sample rate:     {} Hz", buffer.sample_rate);
    println!("  Output peak:     {:.1} dBFS", linear_to_db(peak));
    println!("  Output RMS:      {:.1} dB", processor.meters().output_db());
    println!("  Gain reduction:  {:.1} dB", processor.gain_reduction_db());

    Ok(())
}

#[derive(Debug, Serialize)]
struct ResponseDump {
    sample_rate: u32,
    frequencies: Vec<f64>,
    response_db: Vec<f64>,
    svg: String,
}

/// Print the combined filter response.
pub fn response(
    args: &ParamArgs,
    config: &EngineConfig,
    sample_rate: u32,
    points: usize,
    json: bool,
) -> Result<()> {
    if sample_rate == 0 {
        return Err(FastVoxError::invalid_param(
            "sample_rate",
            sample_rate,
            "a positive sample rate",
        ));
    }

    let params = load_params(args)?;
    let chain = Arc::new(FilterChain::with_settings(
        &params.chain_settings(),
        sample_rate as f64,
    ));
    let mut curve = ResponseCurve::new(chain, Arc::new(ParameterChangeFlag::new()), config);

    let points = points.max(2);
    let frequencies: Vec<f64> = (0..points)
        .map(|i| {
            map_to_log10(
                i as f64 / (points - 1) as f64,
                config.min_frequency as f64,
                config.max_frequency as f64,
            )
        })
        .collect();
    let response_db = curve.response_db(&frequencies);

    if json {
        curve.update(Rect::new(0.0, 0.0, points as f32, 100.0));
        let dump = ResponseDump {
            sample_rate,
            svg: curve.path().to_svg(),
            frequencies,
            response_db,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    println!("Filter response at {} Hz", sample_rate);
    println!("{:-<32}", "");
    for (freq, db) in frequencies.iter().zip(&response_db) {
        println!("{:>10.1} Hz  {:>+8.2} dB", freq, db);
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct SpectrumDump {
    width: u32,
    height: u32,
    frames: u64,
    left: Option<DisplayPath>,
    right: Option<DisplayPath>,
    response: DisplayPath,
}

/// Run the analyzer over a file and dump the last spectrum paths.
pub fn spectrum(
    input: &Path,
    args: &ParamArgs,
    config: &EngineConfig,
    width: u32,
    height: u32,
    block_size: usize,
    output: Option<&Path>,
) -> Result<()> {
    info!("Analyzing {}", input.display());

    let params = load_params(args)?;
    let buffer = import_stereo(input)?;
    let mut processor = FastVoxProcessor::with_config(Arc::clone(&params), config.clone())?;
    let feed = processor.prepare(buffer.sample_rate as f64, block_size.max(1))?;

    let bounds = Rect::new(0.0, 0.0, width as f32, height as f32);
    let mut observer = Observer::new(feed, Arc::clone(processor.chain()), params, config, bounds);

    let mut left = None;
    let mut right = None;
    let mut start = 0;
    while start < buffer.len() {
        let mut block = buffer.slice(start, block_size.max(1));
        processor.process(&mut block);
        observer.tick();
        left = observer.take_path(Channel::Left).or(left);
        right = observer.take_path(Channel::Right).or(right);
        start += block_size.max(1);
    }

    let frames = observer.analyzer(Channel::Left).frames();
    if frames == 0 {
        warn!(
            fft_size = config.fft_size(),
            samples = buffer.len(),
            "Input shorter than one analyzer frame; no spectrum produced"
        );
    }

    let dump = SpectrumDump {
        width,
        height,
        frames,
        left,
        right,
        response: observer.response_path().clone(),
    };
    let json = serde_json::to_string_pretty(&dump)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Spectrum written: {} ({} frames)", path.display(), frames);
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// List parameters and optionally save the resulting state.
pub fn params(args: &ParamArgs, json: bool, save: Option<&Path>) -> Result<()> {
    let params = load_params(args)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&params.describe())?);
    } else {
        println!("{:<22} {:>14} {:>10}", "Parameter", "Value", "Normalized");
        println!("{:-<48}", "");
        for id in ParamId::ALL {
            println!(
                "{:<22} {:>14} {:>10.3}",
                id.name(),
                params.display_string(id),
                params.normalized(id)
            );
        }
    }

    if let Some(path) = save {
        params.state().save(path)?;
        println!("State saved: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_accept_display_text() {
        let args = ParamArgs {
            state: None,
            overrides: vec![
                "Peak Gain = 6".to_string(),
                "ratio=4:1".to_string(),
                "LowCut Slope=36 db/Oct".to_string(),
                "Compressor Bypassed=on".to_string(),
            ],
        };
        let params = load_params(&args).unwrap();

        assert_eq!(params.get(ParamId::PeakGain), 6.0);
        assert_eq!(params.ratio(), 4.0);
        assert_eq!(params.get_choice(ParamId::LowCutSlope), 2);
        assert!(params.get_bool(ParamId::CompressorBypassed));
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let missing_eq = ParamArgs {
            state: None,
            overrides: vec!["Peak Gain".to_string()],
        };
        assert!(load_params(&missing_eq).is_err());

        let unknown = ParamArgs {
            state: None,
            overrides: vec!["Wobble=3".to_string()],
        };
        assert_eq!(
            load_params(&unknown).unwrap_err().error_code(),
            "UNKNOWN_PARAMETER"
        );
    }
}
