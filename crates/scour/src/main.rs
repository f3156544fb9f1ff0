//! Scour CLI - Remove identifying metadata from images.
//!
//! Scour takes JPEG, PNG, and WebP files and writes cleaned copies with
//! EXIF, XMP, ICC profiles, and other embedded metadata removed, either by
//! stripping the container in place or by re-encoding the pixels into a
//! brand new file.
//!
//! # Usage
//!
//! ```bash
//! # Strip metadata from a single image
//! scour clean photo.jpg
//!
//! # Re-encode a directory of images as PNG
//! scour clean ./photos/ --recursive --mode reencode --format png
//!
//! # View configuration
//! scour config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Scour - Remove identifying metadata from images.
#[derive(Parser, Debug)]
#[command(name = "scour")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use a specific config file instead of the default path
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean images by stripping or re-encoding away their metadata
    Clean(cli::clean::CleanArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    // An explicitly named config file is a hard error when broken; the
    // default path falls back to defaults.
    let config = match &cli.config {
        Some(path) => scour_core::Config::load_from(path)?,
        None => match scour_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `scour config path`."
                );
                scour_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Scour v{}", scour_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Clean(args) => cli::clean::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}
