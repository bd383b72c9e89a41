/// select_ieds: manually validate a subset of detected IEDs.
///
/// Candidates (optionally only those in one vigilance period) are shown one
/// at a time; the accepted ones are written as a `Tmu,Electrode` table (µs)
/// and, optionally, as onsets.
use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

use iedkit::{
    annotation::US_PER_SEC, io::write_onsets, load_yaml, read_events, select_validated,
    write_events, AcceptAll, AnnotationEvent, Recording, SelectionConfig, TerminalPrompt,
};

#[derive(Parser, Debug)]
#[command(name = "select_ieds", about = "Manual validation of detected IEDs")]
struct Args {
    /// Recording (safetensors).
    #[arg(long)]
    recording: PathBuf,

    /// Event table (Tmu in µs).
    #[arg(long)]
    events: PathBuf,

    /// Accepted events (CSV).
    #[arg(long)]
    output: PathBuf,

    /// YAML selection configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only review events in this period (overrides the configuration).
    #[arg(long)]
    period: Option<String>,

    /// Number of events to accept.
    #[arg(long)]
    n_target: Option<usize>,

    /// Also export accepted onsets (s) to this safetensors file.
    #[arg(long)]
    onsets: Option<PathBuf>,

    /// Accept every candidate without asking.
    #[arg(long)]
    yes: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: SelectionConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => SelectionConfig::default(),
    };
    if args.period.is_some() {
        cfg.period = args.period.clone();
    }
    if let Some(n) = args.n_target {
        cfg.n_target = n;
    }

    let rec = Recording::load(&args.recording)?;
    let events: Vec<AnnotationEvent> = read_events(&args.events)?
        .into_iter()
        .map(|e| AnnotationEvent { timestamp: e.seconds(), ..e })
        .collect();

    let accepted = if args.yes {
        select_validated(&rec, &events, &cfg, AcceptAll)?
    } else {
        let prompt = TerminalPrompt::new(io::stdin().lock(), io::stdout(), |e: &AnnotationEvent| {
            format!("{} @ {:.3} s", e.electrode, e.timestamp)
        });
        select_validated(&rec, &events, &cfg, prompt)?
    };
    println!("{} of {} events accepted", accepted.len(), cfg.n_target);

    // back to µs for the table
    let table: Vec<AnnotationEvent> = accepted
        .iter()
        .map(|e| AnnotationEvent { timestamp: e.timestamp * US_PER_SEC, ..e.clone() })
        .collect();
    write_events(&args.output, &table)?;
    println!("Written → {}", args.output.display());

    if let Some(path) = &args.onsets {
        write_onsets(path, &table)?;
        println!("Onsets → {}", path.display());
    }
    Ok(())
}
