use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Player: headless\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Text to sign-language clip player
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Text to sign (optional with --serve; submit later via the API)
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    /// Directory with <Name>.clip files
    #[arg(short = 'a', long = "assets", value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Playback speed multiplier (e.g. 0.5, 1, 1.5, 2)
    #[arg(short = 's', long = "speed", value_name = "X")]
    pub speed: Option<f32>,

    /// Pause between words at 1x, in milliseconds
    #[arg(long = "word-gap", value_name = "MS")]
    pub word_gap_ms: Option<u64>,

    /// Nominal clip length for the headless player, in milliseconds
    #[arg(long = "clip-ms", value_name = "MS")]
    pub clip_ms: Option<u64>,

    /// Keep running and accept commands over the REST API
    #[arg(long = "serve")]
    pub serve: bool,

    /// REST API port
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Fetch worker threads
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Skip warming the letter/digit cache
    #[arg(long = "no-preload")]
    pub no_preload: bool,

    /// Enable logging to file (default: signplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
