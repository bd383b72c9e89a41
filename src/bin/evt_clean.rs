/// evt_clean: turn an EVT export into a deduplicated, labelled event table.
///
/// Steps:
///   1. read the tab-delimited EVT file
///   2. comment filter, code → electrode label, electrodes of interest
///   3. near-duplicate removal (Δ ≤ threshold µs, label precedence)
///   4. write `Tmu,Electrode,Comnt` CSV (+ optional onsets.safetensors)
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use iedkit::{
    annotation::count_by_electrode, deduplicate, io::write_onsets, label_records, load_yaml,
    read_evt, write_events, EvtCleaningConfig,
};

#[derive(Parser, Debug)]
#[command(name = "evt_clean", about = "Clean and deduplicate IED annotations")]
struct Args {
    /// EVT export (tab-delimited).
    #[arg(long)]
    input: PathBuf,

    /// Cleaned event table (CSV).
    #[arg(long)]
    output: PathBuf,

    /// YAML cleaning configuration (codes, comment filter, dedup rules).
    #[arg(long)]
    config: PathBuf,

    /// Also export the kept onsets (s) to this safetensors file.
    #[arg(long)]
    onsets: Option<PathBuf>,

    /// Override the deduplication threshold (µs).
    #[arg(long)]
    threshold: Option<f64>,

    /// Print every close pair and how it was resolved.
    #[arg(long)]
    show_pairs: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: EvtCleaningConfig = load_yaml(&args.config)?;
    if let Some(t) = args.threshold {
        cfg.dedup.threshold = t;
    }

    let records = read_evt(&args.input)?;
    let events = label_records(&records, &cfg.annotation);
    println!("{} EVT rows → {} labelled events", records.len(), events.len());

    let out = deduplicate(&events, &cfg.dedup)?;

    if args.show_pairs {
        // Pair indices refer to the time-sorted events.
        let mut sorted = events.clone();
        sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        for p in &out.pairs {
            let (a, b) = (&sorted[p.first], &sorted[p.second]);
            let (side, how) = iedkit::resolve_labels(&a.electrode, &b.electrode, &cfg.dedup);
            println!(
                "  {:>12} {:<8} {:>12} {:<8} Δ={:>8.0}µs  drop={:?} ({:?})",
                a.timestamp, a.electrode, b.timestamp, b.electrode, p.delta, side, how
            );
        }
    }

    println!("Removed {} events, kept {}", out.removed.len(), out.kept.len());
    for (label, n) in count_by_electrode(&out.kept) {
        println!("  {label:<10} {n}");
    }

    write_events(&args.output, &out.kept)?;
    println!("Written → {}", args.output.display());

    if let Some(path) = &args.onsets {
        write_onsets(path, &out.kept)?;
        println!("Onsets → {}", path.display());
    }
    Ok(())
}
