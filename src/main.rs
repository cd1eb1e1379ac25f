//! CLI entry point for noveldl.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use noveldl_core::{Downloader, DownloaderConfig, list_downloaded_works};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cli;
mod progress_ui;

use cli::Args;
use progress_ui::ProgressReporter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    if args.list {
        list_works(&args.output_dir).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = build_config(&args)?;
    let downloader = Downloader::new(config).context("failed to initialize downloader")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let reporter = ProgressReporter::new(args.quiet);
    let mut all_complete = true;

    for work_id in &args.work_ids {
        if cancel.is_cancelled() {
            warn!(work_id = %work_id, "skipped after interrupt");
            all_complete = false;
            continue;
        }

        info!(work_id = %work_id, "Downloading work");
        match downloader
            .download_work_with(work_id, &args.output_dir, &reporter, &cancel)
            .await
        {
            Ok(download) => {
                reporter.finish();
                let report = &download.report;
                println!(
                    "{}: {} downloaded, {} already present, {} failed -> {}",
                    download.title,
                    report.succeeded.len(),
                    report.skipped.len(),
                    report.failed.len(),
                    download.merged_path.display()
                );
                for failed in &report.failed {
                    println!(
                        "  chapter {} {}: {}",
                        failed.index(),
                        failed.title(),
                        failed.error
                    );
                }
                if !report.not_started.is_empty() {
                    println!(
                        "  {} chapters not started; run again to resume",
                        report.not_started.len()
                    );
                }
                all_complete &= report.is_complete();
            }
            Err(err) => {
                reporter.finish();
                error!(work_id = %work_id, error = %err, "Download failed");
                all_complete = false;
            }
        }
    }

    Ok(if all_complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_config(args: &Args) -> Result<DownloaderConfig> {
    let base_url = args
        .base_url
        .as_deref()
        .context("--base-url is required to download")?;
    let mut config = DownloaderConfig::new(base_url)?;
    config.concurrency = usize::from(args.concurrency);
    config.max_attempts = u32::from(args.max_attempts);
    config.connect_timeout_secs = args.connect_timeout;
    config.read_timeout_secs = args.read_timeout;
    config.progress_file.clone_from(&args.progress_file);
    config.validate()?;
    Ok(config)
}

async fn list_works(output_dir: &Path) -> Result<()> {
    if !tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
        println!("No downloaded works in {}", output_dir.display());
        return Ok(());
    }

    let works = list_downloaded_works(output_dir)
        .await
        .with_context(|| format!("failed to list {}", output_dir.display()))?;
    if works.is_empty() {
        println!("No downloaded works in {}", output_dir.display());
        return Ok(());
    }
    for work in &works {
        println!("{}\t{}", work.title, work.merged_path.display());
    }
    Ok(())
}

/// Cancels `cancel` on the first Ctrl-C; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; finishing chapters in flight (Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
