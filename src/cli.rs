//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use noveldl_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS};
use noveldl_core::engine::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "novels";

/// Download serialized web novels chapter by chapter.
///
/// Each chapter is saved to its own file as soon as it arrives; an interrupted
/// or partly failed download resumes where it stopped when run again. When a
/// run ends, the chapters are merged into one `<title>_complete.txt`.
#[derive(Parser, Debug)]
#[command(name = "noveldl")]
#[command(author, version, about)]
pub struct Args {
    /// Work ids to download, one after another
    #[arg(value_name = "WORK_ID", required_unless_present = "list")]
    pub work_ids: Vec<String>,

    /// Site root; landing pages are read from <BASE_URL>/book/<WORK_ID>/
    #[arg(short = 'b', long, required_unless_present = "list")]
    pub base_url: Option<String>,

    /// Directory that receives one sub-directory per work
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Progress file [default: <OUTPUT_DIR>/download_progress.json]
    #[arg(long)]
    pub progress_file: Option<PathBuf>,

    /// Maximum chapters fetched at once (1-32)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=MAX_CONCURRENCY as i64))]
    pub concurrency: u8,

    /// Attempts per page, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Whole-request timeout in seconds (1-3600)
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// List downloaded works in the output directory and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
