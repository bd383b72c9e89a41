/// event_stats: IED counts and morphology outliers per vigilance period.
///
/// Counts come from a cleaned event table (`Tmu` in µs); outliers from a
/// morphology CSV written by ied_morphology (times in seconds).
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use iedkit::{
    counts_by_period, load_yaml,
    morphology::read_records,
    morphology_outliers, read_events,
    stats::{normalized_rates, period_ratio, write_outliers, MorphologyVariable},
    AnnotationEvent, StatsConfig,
};

#[derive(Parser, Debug)]
#[command(name = "event_stats", about = "IED statistics per vigilance period")]
struct Args {
    /// YAML with `periods` and `durations`.
    #[arg(long)]
    config: PathBuf,

    /// Cleaned event table (Tmu in µs).
    #[arg(long)]
    events: Option<PathBuf>,

    /// Morphology CSV.
    #[arg(long)]
    morphology: Option<PathBuf>,

    /// Where to write the morphology outliers.
    #[arg(long, requires = "morphology")]
    outliers: Option<PathBuf>,

    /// Ratio numerator period.
    #[arg(long, default_value = "eveil")]
    numerator: String,

    /// Ratio denominator period.
    #[arg(long, default_value = "sommeil")]
    denominator: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.events.is_none() && args.morphology.is_none() {
        bail!("nothing to do: pass --events and/or --morphology");
    }

    let cfg: StatsConfig = load_yaml(&args.config)?;

    if let Some(path) = &args.events {
        let events: Vec<AnnotationEvent> = read_events(path)?
            .into_iter()
            .map(|e| AnnotationEvent { timestamp: e.seconds(), ..e })
            .collect();
        let counts = counts_by_period(&events, &cfg.periods);
        let labelled: usize = counts.values().flat_map(|m| m.values()).sum();
        println!("{} events, {} inside a period", events.len(), labelled);

        println!("Counts:");
        for (period, per_electrode) in &counts {
            for (electrode, n) in per_electrode {
                println!("  {period:<10} {electrode:<8} {n}");
            }
        }

        if !cfg.durations.is_empty() {
            let rates = normalized_rates(&counts, &cfg.durations)?;
            println!("Rates (events/s):");
            for (period, per_electrode) in &rates {
                for (electrode, r) in per_electrode {
                    println!("  {period:<10} {electrode:<8} {r:.4}");
                }
            }
            println!("Ratio {}/{}:", args.numerator, args.denominator);
            for (electrode, ratio) in period_ratio(&rates, &args.numerator, &args.denominator) {
                match ratio {
                    Some(r) => println!("  {electrode:<8} {r:.3}"),
                    None => println!("  {electrode:<8} n/a"),
                }
            }
        }
    }

    if let Some(path) = &args.morphology {
        let records = read_records(path)?;
        let mut all = Vec::new();
        for variable in MorphologyVariable::ALL {
            let found = morphology_outliers(&records, &cfg.periods, variable);
            println!("{variable}: {} outliers", found.len());
            all.extend(found);
        }
        if let Some(out) = &args.outliers {
            write_outliers(out, &all)?;
            println!("Written → {}", out.display());
        }
    }
    Ok(())
}
