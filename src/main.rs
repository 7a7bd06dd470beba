use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

use npuview::config::{AppConfig, Overrides};

/// Real-time NPU object detection overlay for H.264 streams
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// RTSP URL or path to an MP4/MOV file
    locator: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compiled .rknn model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Label typeface (.ttf or .ttc)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Video sink element
    #[arg(long)]
    sink: Option<String>,

    /// H.264 decoder element
    #[arg(long)]
    decoder: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn log_level(args: &Args) -> Level {
    if args.quiet {
        return Level::WARN;
    }
    match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let config = match &args.config {
        Some(path) => AppConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    Ok(config.with_overrides(Overrides {
        locator: args.locator.clone(),
        model: args.model.clone(),
        font: args.font.clone(),
        sink: args.sink.clone(),
        decoder: args.decoder.clone(),
    }))
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(&args))
        .init();

    let result = load_config(&args).and_then(|config| {
        npuview::run(config).context("npuview stopped with an error")
    });

    match result {
        Ok(summary) => info!("Finished: {}", summary),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
