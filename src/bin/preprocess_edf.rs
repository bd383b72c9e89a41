/// preprocess_edf: batch channel picking, notch and band-pass filtering.
///
/// INPUT is a recording or a directory of recordings (safetensors, as
/// exported from the acquisition EDFs).  Each one is written to
/// `<output-dir>/<stem>_clean.safetensors`.
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use iedkit::{load_yaml, run_batch, FileOutcome, PreprocessConfig};

#[derive(Parser, Debug)]
#[command(name = "preprocess_edf", about = "Filter raw EEG recordings")]
struct Args {
    /// Recording file or directory.
    input: PathBuf,

    /// Output directory.
    #[arg(long)]
    output_dir: PathBuf,

    /// YAML preprocessing configuration; command-line values override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channels to keep (comma-separated).  Default: 19 standard 10-20.
    #[arg(long, value_delimiter = ',')]
    channels: Vec<String>,

    /// Band-pass lower edge (Hz).
    #[arg(long)]
    l_freq: Option<f64>,

    /// Band-pass upper edge (Hz).
    #[arg(long)]
    h_freq: Option<f64>,

    /// Notch frequency (Hz); 0 disables the notch.
    #[arg(long)]
    notch_freq: Option<f64>,

    /// Re-process files whose output already exists.
    #[arg(long)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: PreprocessConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => PreprocessConfig::default(),
    };
    if !args.channels.is_empty() {
        cfg.channels = args.channels.clone();
    }
    if let Some(v) = args.l_freq {
        cfg.l_freq = v;
    }
    if let Some(v) = args.h_freq {
        cfg.h_freq = v;
    }
    if let Some(v) = args.notch_freq {
        cfg.notch_freq = (v > 0.0).then_some(v);
    }
    cfg.overwrite |= args.overwrite;

    let outcomes = run_batch(&args.input, &args.output_dir, &cfg)?;
    let (mut written, mut skipped, mut failed) = (0, 0, 0);
    for outcome in &outcomes {
        match outcome {
            FileOutcome::Written(path) => {
                written += 1;
                println!("  written  {}", path.display());
            }
            FileOutcome::Skipped(path) => {
                skipped += 1;
                println!("  skipped  {}", path.display());
            }
            FileOutcome::Failed(path, e) => {
                failed += 1;
                println!("  FAILED   {}: {e:#}", path.display());
            }
        }
    }
    println!("{written} written, {skipped} skipped, {failed} failed");
    if outcomes.is_empty() {
        bail!("no recording found under {}", args.input.display());
    }
    Ok(())
}
