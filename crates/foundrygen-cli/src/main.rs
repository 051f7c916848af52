//! Foundrygen CLI
//!
//! Generate images and videos on a hosted generative-media platform from the
//! terminal. Service locations and keys come from flags or environment
//! variables; results go to `--output` or to stdout.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use foundrygen_lib::ClientSettings;

mod auth;
mod commands;

use commands::image::ImageCommand;
use commands::video::VideoCommand;
use commands::RunContext;

#[derive(Parser)]
#[command(
    name = "foundrygen",
    version,
    about = "Generate images and videos with hosted generative models",
    after_help = "EXAMPLES:\n  \
                  foundrygen video generate --prompt \"A red fox in the snow\" --output fox.mp4\n  \
                  foundrygen image generate --prompt \"A lighthouse at dusk\" --size 1536x1024 > lighthouse.png\n  \
                  foundrygen image edit --image photo.png --mask mask.png --prompt \"Add a hat\" --output hat.png\n  \
                  foundrygen image flux2-edit --image a.png --image b.png --prompt \"Blend both scenes\" --output blend.png"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// JSON settings file (timeouts, poll interval)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Run the request on the calling thread instead of the async runtime
    #[arg(long, global = true)]
    blocking: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Asynchronous video generation jobs
    #[command(subcommand)]
    Video(VideoCommand),

    /// Image generation and editing
    #[command(subcommand)]
    Image(ImageCommand),
}

fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    // stdout may carry media bytes, so console logs go to stderr.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "foundrygen.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref())?;

    let settings = match &cli.settings {
        Some(path) => ClientSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ClientSettings::default(),
    };

    let ctx = RunContext {
        settings,
        blocking: cli.blocking,
    };

    match cli.command {
        Commands::Video(cmd) => cmd.execute(&ctx),
        Commands::Image(cmd) => cmd.execute(&ctx),
    }
}
