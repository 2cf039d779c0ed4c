//! reelcut CLI: export short-form videos from the command line.
//!
//! Usage:
//!   reelcut export <INPUT> [OPTIONS]    Trim, reframe, color and encode a clip
//!   reelcut probe <INPUT>               Show source duration and geometry
//!   reelcut looks                       List color looks
//!   reelcut aspects                     List aspect ratio presets
//!   reelcut estimate <SECS>             Estimate output size per quality
//!   reelcut init-config <PATH>          Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use reelcut_core::config::ExportConfig;
use reelcut_core::types::{AspectRatio, FrameFit, OutputFormat, Quality, TextPosition};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcut",
    about = "Trim, reframe and color-grade clips for social video",
    version
)]
struct Cli {
    /// Config file (JSON). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a clip
    Export(ExportArgs),

    /// Show source metadata via ffprobe
    Probe {
        /// Source video
        input: PathBuf,
    },

    /// List available color looks
    Looks,

    /// List aspect ratio presets
    Aspects,

    /// Estimate output file size for every quality preset
    Estimate {
        /// Clip duration in seconds
        duration: f64,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct ExportArgs {
    /// Source video
    pub input: PathBuf,

    /// Trim start in seconds
    #[arg(long, default_value = "0")]
    pub start: f64,

    /// Trim end in seconds. Source duration when omitted.
    #[arg(long)]
    pub end: Option<f64>,

    /// Source duration in seconds, skips probing
    #[arg(long)]
    pub duration: Option<f64>,

    /// Target aspect ratio, e.g. 9:16
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Crop to fill the frame (cover) or pad with black bars (letterbox)
    #[arg(long, value_enum)]
    pub fit: Option<CliFrameFit>,

    /// Color look id (see `reelcut looks`)
    #[arg(long)]
    pub filter: Option<String>,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub brightness: i32,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub contrast: i32,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub saturation: i32,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub vibrance: i32,

    /// 4K, 1080p, 720p or 480p
    #[arg(long)]
    pub quality: Option<Quality>,

    /// mp4, mov or webm
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// 30 or 60
    #[arg(long)]
    pub fps: Option<u32>,

    /// Text to burn into the video
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long, value_enum, default_value = "bottom")]
    pub text_position: CliTextPosition,

    /// Text color as #RRGGBB
    #[arg(long, default_value = "#FFFFFF")]
    pub text_color: String,

    #[arg(long, default_value = "50")]
    pub text_size: u32,

    /// Fade the text in over the first second
    #[arg(long)]
    pub text_fade_in: bool,

    /// Directory the exported file is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the engine arguments and exit
    #[arg(long)]
    pub print_command: bool,

    /// Run the pipeline against the in-memory engine; nothing is transcoded
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliFrameFit {
    Cover,
    Letterbox,
}

impl From<CliFrameFit> for FrameFit {
    fn from(value: CliFrameFit) -> Self {
        match value {
            CliFrameFit::Cover => FrameFit::Cover,
            CliFrameFit::Letterbox => FrameFit::Letterbox,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CliTextPosition {
    Top,
    Center,
    Bottom,
}

impl From<CliTextPosition> for TextPosition {
    fn from(value: CliTextPosition) -> Self {
        match value {
            CliTextPosition::Top => TextPosition::Top,
            CliTextPosition::Center => TextPosition::Center,
            CliTextPosition::Bottom => TextPosition::Bottom,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ExportConfig::load_or_default(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    let fallback = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Export(args) => commands::export::run(args, &config).await,
        Commands::Probe { input } => commands::probe::run(input, &config).await,
        Commands::Looks => commands::list::looks(),
        Commands::Aspects => commands::list::aspects(),
        Commands::Estimate { duration } => commands::list::estimate(duration),
        Commands::InitConfig { path } => commands::init_config::run(path),
    }
}
