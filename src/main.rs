//! FastVox CLI - offline driver for the vocal chain engine

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fastvox::cli::{commands, Cli, Commands};
use fastvox::config::EngineConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("FastVox v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("FastVox v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            params,
            block_size,
            bit_depth,
        } => commands::render(&input, &output, &params, config, block_size, bit_depth)
            .with_context(|| format!("rendering {}", input.display()))?,
        Commands::Response {
            params,
            sample_rate,
            points,
            json,
        } => commands::response(&params, config, sample_rate, points, json)?,
        Commands::Spectrum {
            input,
            params,
            width,
            height,
            block_size,
            output,
        } => commands::spectrum(
            &input,
            &params,
            config,
            width,
            height,
            block_size,
            output.as_deref(),
        )
        .with_context(|| format!("analyzing {}", input.display()))?,
        Commands::Params { params, json, save } => {
            commands::params(&params, json, save.as_deref())?
        }
    }
    Ok(())
}
