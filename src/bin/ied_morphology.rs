/// ied_morphology: amplitude, half-width and slopes of every annotated IED.
///
/// Input events are a `Tmu,Electrode` table with `Tmu` in µs (as written by
/// evt_clean).  One output row per (event, analysed channel).
use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use iedkit::{
    extract_morphology, load_yaml, morphology::write_records, read_events, AnnotationEvent,
    MorphologyConfig, Recording,
};

#[derive(Parser, Debug)]
#[command(name = "ied_morphology", about = "Morphology features of annotated IEDs")]
struct Args {
    /// Preprocessed recording (safetensors).
    #[arg(long)]
    recording: PathBuf,

    /// Cleaned event table (Tmu in µs).
    #[arg(long)]
    events: PathBuf,

    /// Output CSV.
    #[arg(long)]
    output: PathBuf,

    /// YAML morphology configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg: MorphologyConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => MorphologyConfig::default(),
    };

    let rec = Recording::load(&args.recording)?;
    println!(
        "Loaded {} ch × {} samples @ {} Hz",
        rec.data.nrows(),
        rec.n_times(),
        rec.sfreq
    );

    let events: Vec<AnnotationEvent> = read_events(&args.events)?
        .into_iter()
        .map(|e| AnnotationEvent { timestamp: e.seconds(), ..e })
        .collect();

    let records = extract_morphology(&rec, &events, &cfg)?;
    println!("{} events → {} records", events.len(), records.len());

    let mut per_channel: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for r in &records {
        let entry = per_channel.entry(r.channel.as_str()).or_default();
        entry.0 += 1;
        entry.1 += r.amplitude.abs();
    }
    for (channel, (n, sum)) in &per_channel {
        println!("  {channel:<8} n={n:<5} mean |amplitude| = {:.2}", sum / *n as f64);
    }

    write_records(&args.output, &records)?;
    println!("Written → {}", args.output.display());
    Ok(())
}
