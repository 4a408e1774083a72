// SPDX-License-Identifier: GPL-3.0-only

use barcode_capture::Config;
use barcode_capture::session::DeliveryMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-capture")]
#[command(about = "Scan barcodes from a camera or image files")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Hardware-decoded metadata (zbar)
    Metadata,
    /// Software decoding of raw frames
    Pixel,
}

impl From<Strategy> for DeliveryMode {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Metadata => DeliveryMode::Metadata,
            Strategy::Pixel => DeliveryMode::SampleBuffer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan barcodes from the default camera
    Scan {
        /// Recognition strategy (default: from config)
        #[arg(short, long, value_enum)]
        strategy: Option<Strategy>,

        /// Stop after this many codes
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Decode codes from image files or directories
    Decode {
        /// Image files or directories
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Only look inside the scan overlay rectangle
        #[arg(long)]
        roi: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_capture=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Scan {
            strategy,
            count,
            timeout,
        } => cli::scan(config, strategy.map(Into::into), count, timeout),
        Commands::Decode { input, roi } => cli::decode_images(&config, &input, roi),
        Commands::Config => cli::print_config(&config),
    }
}
