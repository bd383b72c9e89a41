//! # iedkit: interictal epileptiform discharge tooling for EEG
//!
//! `iedkit` turns raw IED annotations into clean, analysable event sets and
//! measures the waveform of every retained discharge.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.evt                       recording.safetensors
//!   │                                   │
//!   ├─ annotation::read_evt()           ├─ preprocess        notch + 1.5–80 Hz band-pass
//!   ├─ annotation::label_records()      │
//!   │    comment filter, code → label   │
//!   ├─ dedup::deduplicate()             │
//!   │    one event per discharge        │
//!   │                                   │
//!   └──────────────┬────────────────────┘
//!                  │
//!                  ├─ morphology   amplitude, half-width, slopes per (event, channel)
//!                  ├─ segments     event-free resting data, reviewed
//!                  ├─ selection    manual validation of a subset of events
//!                  └─ stats        counts, rates and outliers per vigilance period
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use iedkit::{deduplicate, extract_morphology, DedupConfig, MorphologyConfig, Recording};
//! use iedkit::annotation::{read_events, AnnotationEvent};
//! use std::path::Path;
//!
//! // 1. Annotations (Tmu in µs) → near-duplicates removed
//! let events = read_events(Path::new("data/p01_events.csv")).unwrap();
//! let clean = deduplicate(&events, &DedupConfig::default()).unwrap();
//!
//! // 2. Morphology of every retained event (timestamps in seconds)
//! let rec = Recording::load(Path::new("data/p01_clean.safetensors")).unwrap();
//! let in_sec: Vec<AnnotationEvent> = clean
//!     .kept
//!     .iter()
//!     .map(|e| AnnotationEvent { timestamp: e.seconds(), ..e.clone() })
//!     .collect();
//! let records = extract_morphology(&rec, &in_sec, &MorphologyConfig::default()).unwrap();
//!
//! for r in &records {
//!     println!("{} {} amplitude={:.1}", r.electrode, r.channel, r.amplitude);
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod dedup;
pub mod filter;
pub mod io;
pub mod morphology;
pub mod preprocess;
pub mod review;
pub mod segments;
pub mod selection;
pub mod stats;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `iedkit::Foo` without having to know the internal module layout.

// config
pub use config::{
    load_yaml, AnnotationConfig, ChannelSpec, CommentFilter, ConfigError, DedupConfig,
    EvtCleaningConfig, FilterMode, MorphologyConfig, PairRule, PreprocessConfig, SegmentConfig,
    SelectionConfig, StatsConfig,
};

// annotation
pub use annotation::{label_records, read_events, read_evt, write_events, AnnotationEvent, EvtRecord};

// dedup
pub use dedup::{deduplicate, find_close_pairs, resolve_labels, ClosePair, DedupOutcome, Resolution, Side};

// morphology
pub use morphology::{
    extract_morphology, local_extrema, MorphologyExtractor, MorphologyRecord, WindowFeatures,
};

// io
pub use io::{read_onsets, write_onsets, Recording, StWriter};

// preprocess
pub use preprocess::{pick_channels, preprocess_recording, run_batch, FileOutcome};

// review
pub use review::{review_fn, AcceptAll, Reviewer, TerminalPrompt, Verdict};

// segments
pub use segments::{artifact_mask, clean_segments, extract_clean, CleanSegment, Selection};

// selection
pub use selection::select_validated;

// stats
pub use stats::{counts_by_period, iqr_fences, label_period, morphology_outliers, quantile};
