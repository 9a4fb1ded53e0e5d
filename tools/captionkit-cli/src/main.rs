//! CaptionKit CLI: caption generation, styling, and burned-in export.
//!
//! Usage:
//!   captionkit captions <CLIP>    Print or save the captions of a trim window
//!   captionkit export <CLIP>      Render the trimmed clip with captions
//!   captionkit templates          List caption templates
//!   captionkit check              Check system capabilities

use std::path::PathBuf;

use captionkit_common::config::AppConfig;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "captionkit",
    about = "Trim clips, style captions, and burn them into video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that open a clip.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Clip descriptor JSON
    pub clip: PathBuf,

    /// Transcript JSON (defaults to <source>.transcript.json)
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Trim start in seconds (defaults to the clip's start_time)
    #[arg(long)]
    pub start: Option<f64>,

    /// Trim end in seconds (defaults to the clip's end_time)
    #[arg(long)]
    pub end: Option<f64>,

    /// Caption template applied to every caption
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or save the captions of the trim window
    Captions {
        #[command(flatten)]
        session: SessionArgs,

        /// Output format: srt|vtt|json
        #[arg(long, default_value = "srt")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the trimmed clip with burned-in captions
    Export {
        #[command(flatten)]
        session: SessionArgs,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Aspect preset: portrait|landscape
        #[arg(long)]
        aspect: Option<String>,

        /// Video codec: h264|h265|vp9
        #[arg(long)]
        codec: Option<String>,

        /// Also write an SRT file next to the output
        #[arg(long)]
        subtitles: bool,
    },

    /// List caption templates
    Templates {
        /// Print the full style of one template as JSON
        #[arg(long)]
        show: Option<String>,
    },

    /// Check system capabilities
    Check {
        /// Write the current settings to the config file if none exists
        #[arg(long)]
        write_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    captionkit_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Captions {
            session,
            format,
            output,
        } => commands::captions::run(&config, session, format, output).await,
        Commands::Export {
            session,
            output,
            fps,
            aspect,
            codec,
            subtitles,
        } => {
            commands::export::run(&config, session, output, fps, aspect, codec, subtitles).await
        }
        Commands::Templates { show } => commands::templates::run(&config, show),
        Commands::Check { write_config } => commands::check::run(&config, write_config).await,
    }
}
