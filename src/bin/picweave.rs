//! Batch-replace markdown image links in Word documents with the images
//! they point to, downloaded and sized to fit.
//!
//! Usage:
//!   picweave report.docx notes.docx                 # writes *_processed.docx
//!   picweave --suffix " (with images)" report.docx
//!   picweave --out-dir ./done report.docx notes.docx

use anyhow::{Context, Result};
use clap::Parser;
use picweave::fetch::HttpFetcher;
use picweave::pipeline::{self, OutputPolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "picweave")]
#[command(about = "Replace markdown image links in Word documents with downloaded images")]
struct Cli {
    /// Input .docx files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write results into this directory, keeping each filename
    #[arg(long, conflicts_with = "suffix")]
    out_dir: Option<PathBuf>,

    /// Filename suffix for output next to each input
    #[arg(long, default_value = pipeline::DEFAULT_SUFFIX)]
    suffix: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let policy = match cli.out_dir {
        Some(dir) => OutputPolicy::Directory(dir),
        None => OutputPolicy::Suffix(cli.suffix),
    };
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;

    let summary = pipeline::process_all(&cli.inputs, &policy, &fetcher, |progress| {
        println!(
            "[{}/{}] {}",
            progress.completed, progress.total, progress.line
        );
        true
    });

    println!("{}", summary.summary_line());
    if !summary.all_ok() {
        anyhow::bail!("{} document(s) failed", summary.failed);
    }
    Ok(())
}
