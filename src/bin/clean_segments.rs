/// clean_segments: extract event-free resting data from a recording.
///
/// Every event marks `event_duration_sec` of signal as artifact; the clean
/// runs of at least `min_seg_sec` (inside the wake periods, when given) are
/// accepted in order until `total_duration_sec` has been collected, then
/// concatenated into a new recording.
use anyhow::{bail, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;

use iedkit::{
    extract_clean, io::read_onsets, load_yaml, read_events, segments::parse_wake_periods,
    AcceptAll, CleanSegment, Recording, SegmentConfig, TerminalPrompt,
};

#[derive(Parser, Debug)]
#[command(name = "clean_segments", about = "Extract clean resting segments")]
struct Args {
    /// Recording (safetensors).
    #[arg(long)]
    recording: PathBuf,

    /// Event table with `Tmu` in µs.
    #[arg(long, conflicts_with = "onsets")]
    events: Option<PathBuf>,

    /// Onsets (s) written by evt_clean --onsets.
    #[arg(long)]
    onsets: Option<PathBuf>,

    /// Output recording (safetensors).
    #[arg(long)]
    output: PathBuf,

    /// YAML segment configuration; command-line values override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum clean segment length (s).
    #[arg(long)]
    min_seg_sec: Option<f64>,

    /// Amount of clean data to collect (s).
    #[arg(long)]
    total_duration_sec: Option<f64>,

    /// Wake periods as `start end start end …` (s).
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    wake_periods: Vec<f64>,

    /// Ask for each candidate segment on the terminal.
    #[arg(long)]
    interactive: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: SegmentConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => SegmentConfig::default(),
    };
    if let Some(v) = args.min_seg_sec {
        cfg.min_seg_sec = v;
    }
    if let Some(v) = args.total_duration_sec {
        cfg.total_duration_sec = v;
    }
    if let Some(wake) = parse_wake_periods(&args.wake_periods) {
        cfg.wake_periods = Some(wake);
    }

    let rec = Recording::load(&args.recording)?;
    println!("Loaded {} ch × {:.1} s @ {} Hz", rec.data.nrows(), rec.duration(), rec.sfreq);

    let onsets: Vec<f64> = match (&args.events, &args.onsets) {
        (Some(path), _) => read_events(path)?.iter().map(|e| e.seconds()).collect(),
        (None, Some(path)) => read_onsets(path)?,
        (None, None) => bail!("one of --events or --onsets is required"),
    };

    let sfreq = rec.sfreq;
    let result = if args.interactive {
        let prompt = TerminalPrompt::new(io::stdin().lock(), io::stdout(), |s: &CleanSegment| {
            format!(
                "segment {:.2}–{:.2} s ({:.2} s)",
                s.start_sec(sfreq),
                s.end_sec(sfreq),
                s.len() as f64 / sfreq
            )
        });
        extract_clean(&rec, &onsets, &cfg, prompt)?
    } else {
        extract_clean(&rec, &onsets, &cfg, AcceptAll)?
    };

    let Some((clean, selection)) = result else {
        bail!("no clean segment selected");
    };
    println!(
        "{} segments, {:.1} s of clean data{}",
        selection.segments.len(),
        clean.duration(),
        if selection.target_reached { "" } else { " (target not reached)" }
    );
    clean.save(&args.output)?;
    println!("Written → {}", args.output.display());
    Ok(())
}
