//! Configuration structs.
//!
//! Every batch step takes its parameters as a plain struct passed by
//! reference.  All fields are `pub` and have defaults matching the values
//! used on the clinical data, so you can construct one with struct-update
//! syntax:
//!
//! ```
//! use iedkit::DedupConfig;
//!
//! let cfg = DedupConfig {
//!     threshold: 50_000.0,   // 50 ms in µs
//!     ..DedupConfig::default()
//! };
//! ```
//!
//! Each struct also deserialises from YAML with [`load_yaml`].  Missing keys
//! fall back to the defaults, so a configuration file only has to name what
//! it changes.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Invalid parameter values detected before any data is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("proximity threshold must be finite and >= 0, got {0}")]
    InvalidThreshold(f64),

    #[error("sampling rate must be finite and > 0, got {0}")]
    InvalidSamplingRate(f64),

    #[error("cutoff {cutoff} Hz must lie strictly between 0 and Nyquist ({nyquist} Hz)")]
    CutoffOutOfRange { cutoff: f64, nyquist: f64 },

    #[error("band edges must satisfy 0 < low < high, got low={low} high={high}")]
    InvalidBand { low: f64, high: f64 },

    #[error("only 2nd-order slope smoothing is supported, got order {0}")]
    UnsupportedOrder(usize),

    #[error("duration `{name}` must be > 0, got {value}")]
    NonPositiveDuration { name: &'static str, value: f64 },
}

/// Load any configuration struct from a YAML file.
///
/// ```no_run
/// use iedkit::config::{load_yaml, MorphologyConfig};
/// let cfg: MorphologyConfig = load_yaml("config/morphology.yaml").unwrap();
/// ```
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

// ── Annotation cleaning ──────────────────────────────────────────────────────

/// Configuration of the near-duplicate event removal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum timestamp difference for two events to count as duplicates,
    /// in the unit of the timestamps (µs for EVT `Tmu`).
    ///
    /// The boundary is inclusive: a pair exactly `threshold` apart collides.
    ///
    /// Default: `25_000.0` (25 ms in µs).
    pub threshold: f64,

    /// Unordered electrode pairs that are never resolved.  Both events of
    /// such a pair survive, e.g. `[["F8", "T4"]]` when F8 and T4 discharges
    /// are genuinely independent.
    ///
    /// Default: `[]`.
    pub excluded_pairs: Vec<[String; 2]>,

    /// Explicit resolutions tried before the built-in precedence.
    ///
    /// Default: `[]`.
    pub rules: Vec<PairRule>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 25_000.0,
            excluded_pairs: vec![],
            rules: vec![],
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// "When `labels[0]` and `labels[1]` collide, remove the `drop` event."
///
/// Label order inside `labels` does not matter.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PairRule {
    pub labels: [String; 2],
    pub drop: String,
}

/// Whether [`CommentFilter`] keeps everything or excludes unlisted comments.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Keep,
    Exclude,
}

/// Comment-based row filter applied to raw EVT rows.
///
/// In [`FilterMode::Exclude`] mode, rows carrying trigger `code` whose
/// comment is **not** listed in `values` are dropped.  Rows with other codes
/// are never touched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentFilter {
    pub mode: FilterMode,
    /// Default: `2` (manually placed markers).
    pub code: i64,
    pub values: Vec<String>,
}

impl Default for CommentFilter {
    fn default() -> Self {
        Self { mode: FilterMode::Keep, code: 2, values: vec![] }
    }
}

/// Turning raw EVT rows into labelled annotation events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Trigger code → electrode label.  Unmapped codes are labelled `"0"`.
    pub codes: BTreeMap<i64, String>,

    /// Labels to keep.  Empty keeps every label.
    pub electrodes_of_interest: Vec<String>,

    pub comment_filter: CommentFilter,
}

/// Everything `evt_clean` needs, as one YAML document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EvtCleaningConfig {
    pub annotation: AnnotationConfig,
    pub dedup: DedupConfig,
}

// ── Morphology ───────────────────────────────────────────────────────────────

/// Parameters of the per-event morphology extraction.
///
/// Durations are in seconds and converted to samples with the recording's
/// actual sampling rate.  The `*_samples` fields are sample counts taken
/// as-is.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    /// Half-width of the analysis window around each event.
    ///
    /// Default: `0.2` s (window of 0.4 s).
    pub window_half_sec: f64,

    /// The peak is searched from this long before the event...
    ///
    /// Default: `0.025` s.
    pub peak_before_sec: f64,

    /// ...to this long after it.
    ///
    /// Default: `0.020` s.
    pub peak_after_sec: f64,

    /// Minimum distance between the peak and the left crossing.
    ///
    /// Default: `7`.
    pub left_min_samples: usize,

    /// Minimum distance between the peak and the right crossing.
    ///
    /// Default: `5`.
    pub right_min_samples: usize,

    /// Cut-off of the Butterworth low-pass smoothing the derivative.
    ///
    /// Default: `80.0` Hz.
    pub slope_cutoff_hz: f64,

    /// Order of that low-pass.  Only `2` is supported.
    pub slope_order: usize,

    /// Samples searched before the peak for the steepest descent.
    ///
    /// Default: `15`.
    pub slope_lookback: usize,

    /// Samples searched from the peak on for the steepest ascent.
    ///
    /// Default: `20`.
    pub slope_lookahead: usize,

    /// Electrode label → recording channel name(s).
    ///
    /// Electrodes missing here resolve to the channel of the same name.
    pub channel_map: BTreeMap<String, ChannelSpec>,
}

/// One channel name or several, as written in YAML:
///
/// ```yaml
/// channel_map:
///   C4: C4
///   F8-T4: [F8, T4]
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelSpec {
    One(String),
    Many(Vec<String>),
}

impl ChannelSpec {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ChannelSpec::One(name) => vec![name.as_str()],
            ChannelSpec::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            window_half_sec: 0.2,
            peak_before_sec: 0.025,
            peak_after_sec: 0.020,
            left_min_samples: 7,
            right_min_samples: 5,
            slope_cutoff_hz: 80.0,
            slope_order: 2,
            slope_lookback: 15,
            slope_lookahead: 20,
            channel_map: BTreeMap::new(),
        }
    }
}

impl MorphologyConfig {
    /// Reject parameter combinations that cannot work at `sfreq`.
    pub fn validate(&self, sfreq: f64) -> Result<(), ConfigError> {
        if !sfreq.is_finite() || sfreq <= 0.0 {
            return Err(ConfigError::InvalidSamplingRate(sfreq));
        }
        if self.slope_order != 2 {
            return Err(ConfigError::UnsupportedOrder(self.slope_order));
        }
        let nyquist = sfreq / 2.0;
        if self.slope_cutoff_hz <= 0.0 || self.slope_cutoff_hz >= nyquist {
            return Err(ConfigError::CutoffOutOfRange { cutoff: self.slope_cutoff_hz, nyquist });
        }
        for (name, value) in [
            ("window_half_sec", self.window_half_sec),
            ("peak_before_sec", self.peak_before_sec),
            ("peak_after_sec", self.peak_after_sec),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveDuration { name, value });
            }
        }
        Ok(())
    }
}

// ── Clean resting segments ───────────────────────────────────────────────────

/// Extraction of event-free resting data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Shortest clean run worth keeping.
    ///
    /// Default: `2.0` s.
    pub min_seg_sec: f64,

    /// Stop selecting once this much clean data has been accepted.
    ///
    /// Default: `60.0` s.
    pub total_duration_sec: f64,

    /// Each event marks `[onset, onset + event_duration_sec)` as artifact.
    ///
    /// Default: `0.3` s.
    pub event_duration_sec: f64,

    /// Optional `(start, end)` wake periods in seconds.  When set, only
    /// segments lying entirely inside one of them are eligible.
    ///
    /// Default: `None`.
    pub wake_periods: Option<Vec<(f64, f64)>>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_seg_sec: 2.0,
            total_duration_sec: 60.0,
            event_duration_sec: 0.3,
            wake_periods: None,
        }
    }
}

impl SegmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("min_seg_sec", self.min_seg_sec),
            ("total_duration_sec", self.total_duration_sec),
            ("event_duration_sec", self.event_duration_sec),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveDuration { name, value });
            }
        }
        Ok(())
    }
}

// ── Preprocessing ────────────────────────────────────────────────────────────

/// The 19 scalp electrodes of the 10-20 montage kept by default.
pub const STANDARD_10_20: [&str; 19] = [
    "Fp1", "Fp2", "F7", "F3", "Fz", "F4", "F8",
    "T3", "C3", "Cz", "C4", "T4",
    "T5", "P3", "Pz", "P4", "T6",
    "O1", "O2",
];

/// Channel picking and filtering applied to raw recordings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Channels to keep (those absent from a recording are ignored).
    ///
    /// Default: [`STANDARD_10_20`].
    pub channels: Vec<String>,

    /// Band-pass lower edge.
    ///
    /// Default: `1.5` Hz.
    pub l_freq: f64,

    /// Band-pass upper edge.
    ///
    /// Default: `80.0` Hz.
    pub h_freq: f64,

    /// Powerline frequency removed by the notch.  `None` skips the notch.
    ///
    /// Default: `Some(50.0)` Hz.
    pub notch_freq: Option<f64>,

    /// Re-process files whose output already exists.
    ///
    /// Default: `false`.
    pub overwrite: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            channels: STANDARD_10_20.iter().map(|s| s.to_string()).collect(),
            l_freq: 1.5,
            h_freq: 80.0,
            notch_freq: Some(50.0),
            overwrite: false,
        }
    }
}

// ── Statistics / selection ───────────────────────────────────────────────────

/// Vigilance periods and their durations.
///
/// ```yaml
/// periods:
///   eveil:   [[0, 169], [278, 600]]
///   sommeil: [[960, 2248]]
/// durations:
///   eveil: 491
///   sommeil: 1288
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Period name → inclusive `[start, end]` ranges in seconds.
    pub periods: BTreeMap<String, Vec<[f64; 2]>>,

    /// Period name → total duration used to normalise counts.
    pub durations: BTreeMap<String, f64>,
}

/// Manual validation of a subset of detected IEDs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Restrict the candidates to this period (case-insensitive).
    /// `None` reviews every event.
    pub period: Option<String>,

    /// Stop once this many events have been accepted.
    ///
    /// Default: `10`.
    pub n_target: usize,

    /// Half-width of the data shown to the reviewer.
    ///
    /// Default: `0.5` s.
    pub window_sec: f64,

    /// Channels to review.  The first one present is used.
    pub channels: Vec<String>,

    pub periods: BTreeMap<String, Vec<[f64; 2]>>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            period: None,
            n_target: 10,
            window_sec: 0.5,
            channels: vec![],
            periods: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let cfg: MorphologyConfig = serde_yaml::from_str("slope_cutoff_hz: 60.0\n").unwrap();
        assert_eq!(cfg.slope_cutoff_hz, 60.0);
        assert_eq!(cfg.left_min_samples, 7);
        assert_eq!(cfg.window_half_sec, 0.2);
    }

    #[test]
    fn channel_map_accepts_scalar_and_list() {
        let yaml = "channel_map:\n  C4: C4\n  F8-T4: [F8, T4]\n";
        let cfg: MorphologyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.channel_map["C4"].names(), vec!["C4"]);
        assert_eq!(cfg.channel_map["F8-T4"].names(), vec!["F8", "T4"]);
    }

    #[test]
    fn evt_cleaning_document() {
        let yaml = r#"
annotation:
  codes: {10: F8, 11: T4}
  electrodes_of_interest: [F8, T4]
  comment_filter: {mode: exclude, values: [pointe]}
dedup:
  threshold: 30000
  excluded_pairs: [[F8, T4]]
  rules:
    - {labels: [C4, F8], drop: C4}
"#;
        let cfg: EvtCleaningConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.annotation.codes[&10], "F8");
        assert_eq!(cfg.annotation.comment_filter.mode, FilterMode::Exclude);
        assert_eq!(cfg.annotation.comment_filter.code, 2);
        assert_eq!(cfg.dedup.threshold, 30_000.0);
        assert_eq!(cfg.dedup.rules[0].drop, "C4");
    }

    #[test]
    fn negative_threshold_rejected() {
        let cfg = DedupConfig { threshold: -1.0, ..DedupConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidThreshold(-1.0)));
    }

    #[test]
    fn cutoff_above_nyquist_rejected() {
        let cfg = MorphologyConfig::default();
        assert!(cfg.validate(512.0).is_ok());
        assert!(matches!(
            cfg.validate(128.0),
            Err(ConfigError::CutoffOutOfRange { .. })
        ));
    }
}
