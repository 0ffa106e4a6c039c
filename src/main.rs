// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use shake_camera::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "shake-camera")]
#[command(about = "Camera that takes a photo when you shake it")]
#[command(version = shake_camera::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders camera to terminal)
    Terminal {
        /// Use the virtual camera instead of V4L2
        #[arg(long = "virtual")]
        use_virtual: bool,

        /// Replay motion from a JSON file instead of the accelerometer
        #[arg(short, long)]
        motion: Option<PathBuf>,
    },

    /// List available cameras and motion sensors
    List,

    /// Take a photo
    Photo {
        /// V4L2 device path (default: from config, usually /dev/video0)
        #[arg(short, long)]
        device: Option<String>,

        /// Output directory (default: ~/Pictures/ShakeCamera)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the virtual camera instead of V4L2
        #[arg(long = "virtual")]
        use_virtual: bool,
    },

    /// Capture a photo on every shake until stopped
    Watch {
        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Use the virtual camera instead of V4L2
        #[arg(long = "virtual")]
        use_virtual: bool,

        /// Replay motion from a JSON file instead of the accelerometer
        #[arg(short, long)]
        motion: Option<PathBuf>,
    },

    /// Print the shake decision for each sample of a motion recording
    Replay {
        /// JSON list of samples
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=shake_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Some(Commands::Terminal {
            use_virtual,
            motion,
        }) => shake_camera::terminal::run(&config, use_virtual, motion.as_deref()),
        Some(Commands::List) => cli::list_devices(),
        Some(Commands::Photo {
            device,
            output,
            use_virtual,
        }) => cli::take_photo(&config, device, output, use_virtual),
        Some(Commands::Watch {
            duration,
            use_virtual,
            motion,
        }) => cli::watch_shakes(&config, duration, use_virtual, motion),
        Some(Commands::Replay { file }) => cli::replay(&config, &file),
        None => shake_camera::terminal::run(&config, false, None),
    }
}
