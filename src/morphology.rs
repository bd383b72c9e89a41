//! Morphological features of annotated discharges.
//!
//! For each `(event, channel)` a window of `±window_half_sec` is cut around
//! the event and analysed:
//!
//! ```text
//!            peak search
//!         ├──────┼────┤  −25 ms … +20 ms
//!  ───────┐      ╱╲
//!         │     ╱  ╲        amplitude  = x[peak] − x[left]
//!  left ──┴────╱    ╲────── half-width = time spent beyond amplitude / 2
//!  crossing          right  slopes     = extrema of the smoothed derivative
//!                    crossing
//! ```
//!
//! A crossing is a local extremum: a sample where the sign of the discrete
//! derivative changes (`sign(0) = 0`, so the foot of a pulse on a flat
//! baseline counts).  The left crossing is the last one at least
//! `left_min_samples` before the peak, the right crossing the first one at
//! least `right_min_samples` after it; the window edges are the fallbacks.
//!
//! The derivative is scaled by the sampling rate (amplitude per second) and
//! smoothed by a causal 2nd-order Butterworth low-pass before the slopes are
//! read off.
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationEvent;
use crate::config::MorphologyConfig;
use crate::filter::Biquad;
use crate::io::Recording;

/// One analysed `(event, channel)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyRecord {
    /// Event time in seconds.
    #[serde(rename = "Tmu")]
    pub timestamp: f64,
    #[serde(rename = "Electrode")]
    pub electrode: String,
    #[serde(rename = "Channel")]
    pub channel: String,
    /// Signed `x[peak] - x[crossing_left]` in signal units, so negative-going
    /// discharges report a negative amplitude. This is not `max|x| - x[crossing_left]`.
    #[serde(rename = "Amplitude")]
    pub amplitude: f64,
    /// Width at half amplitude in seconds (sample count divided by the
    /// sampling rate), not in samples. `None` when the signal never returns
    /// past half amplitude.
    #[serde(rename = "Half_Width")]
    pub half_width: Option<f64>,
    /// Sample index inside the analysis window.
    #[serde(rename = "Crossing_Left")]
    pub crossing_left: usize,
    /// Sample index inside the analysis window.
    #[serde(rename = "Crossing_Right")]
    pub crossing_right: usize,
    #[serde(rename = "Negative_Slope")]
    pub negative_slope: f64,
    #[serde(rename = "Positive_Slope")]
    pub positive_slope: f64,
}

/// Features of a single analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFeatures {
    /// Sample indices are relative to the window start.
    pub peak: usize,
    pub crossing_left: usize,
    pub crossing_right: usize,
    /// Signed, as in [`MorphologyRecord::amplitude`].
    pub amplitude: f64,
    /// Seconds.
    pub half_width: Option<f64>,
    pub negative_slope: f64,
    pub positive_slope: f64,
}

/// Indices where the sign of `diff(x)` changes.
pub fn local_extrema(x: &[f64]) -> Vec<usize> {
    let signs: Vec<f64> = x.windows(2).map(|w| sign(w[1] - w[0])).collect();
    signs
        .windows(2)
        .enumerate()
        .filter(|(_, s)| s[0] != s[1])
        .map(|(k, _)| k + 1)
        .collect()
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Window-level analysis with sample counts resolved for one sampling rate.
#[derive(Debug, Clone)]
pub struct MorphologyExtractor {
    sfreq: f64,
    half: usize,
    before: usize,
    after: usize,
    left_min: usize,
    right_min: usize,
    lookback: usize,
    lookahead: usize,
    smoother: Biquad,
}

impl MorphologyExtractor {
    /// Resolve `cfg` at `sfreq`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid at this sampling rate, e.g.
    /// a smoothing cut-off at or above Nyquist.
    pub fn new(cfg: &MorphologyConfig, sfreq: f64) -> Result<Self> {
        cfg.validate(sfreq)?;
        Ok(Self {
            sfreq,
            half: (cfg.window_half_sec * sfreq).floor() as usize,
            before: (cfg.peak_before_sec * sfreq).ceil() as usize,
            after: (cfg.peak_after_sec * sfreq).floor() as usize,
            left_min: cfg.left_min_samples,
            right_min: cfg.right_min_samples,
            lookback: cfg.slope_lookback,
            lookahead: cfg.slope_lookahead,
            smoother: Biquad::butterworth_lowpass(sfreq, cfg.slope_cutoff_hz)?,
        })
    }

    /// Number of samples either side of the event.
    pub fn half_window(&self) -> usize {
        self.half
    }

    /// `[start, end)` of the window around `t_sec`, or `None` when it
    /// would leave `[0, n_times)`.
    pub fn window_bounds(&self, t_sec: f64, n_times: usize) -> Option<(usize, usize)> {
        let centre = (t_sec * self.sfreq).round();
        if !centre.is_finite() || centre < self.half as f64 {
            return None;
        }
        let centre = centre as usize;
        let end = centre + self.half;
        (end <= n_times).then(|| (centre - self.half, end))
    }

    /// Analyse a window whose event sits at index `half_window()`.
    pub fn analyze(&self, x: &[f64]) -> Result<WindowFeatures> {
        let n = x.len();
        let event = self.half;
        if n < 3 || event >= n {
            return Err(anyhow!("window of {n} samples is too short to analyse"));
        }

        // 1. peak of |x| in the restricted window (first one on ties)
        let lo = event.saturating_sub(self.before);
        let hi = (event + self.after).min(n - 2).max(lo + 1);
        let peak = (lo..hi)
            .reduce(|best, i| if x[i].abs() > x[best].abs() { i } else { best })
            .unwrap_or(event);

        // 2. crossings
        let extrema = local_extrema(x);
        let crossing_left = extrema
            .iter()
            .rev()
            .copied()
            .find(|&e| e + self.left_min <= peak)
            .unwrap_or(0);
        let crossing_right = extrema
            .iter()
            .copied()
            .find(|&e| e >= peak + self.right_min)
            .unwrap_or(n - 1);

        // 3. amplitude + half-width
        let amplitude = x[peak] - x[crossing_left];
        let half_width = self.half_width(x, peak, x[crossing_left], amplitude);

        // 4. slopes of the smoothed derivative
        let derivative: Vec<f64> = x.windows(2).map(|w| (w[1] - w[0]) * self.sfreq).collect();
        let smoothed = self.smoother.filter(&derivative);
        let back = peak.saturating_sub(self.lookback);
        let negative_slope = smoothed[back..=peak]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let ahead = (peak + self.lookahead).min(smoothed.len()).max(peak + 1);
        let positive_slope = smoothed[peak..ahead]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(WindowFeatures {
            peak,
            crossing_left,
            crossing_right,
            amplitude,
            half_width,
            negative_slope,
            positive_slope,
        })
    }

    /// Time between the last sample before the peak and the first sample
    /// after it that lie on the baseline side of `baseline + amplitude / 2`.
    fn half_width(&self, x: &[f64], peak: usize, baseline: f64, amplitude: f64) -> Option<f64> {
        if amplitude == 0.0 || !amplitude.is_finite() {
            return None;
        }
        let level = baseline + amplitude / 2.0;
        let returned = |v: f64| if amplitude > 0.0 { v <= level } else { v >= level };
        let left = (0..peak).rev().find(|&i| returned(x[i]))?;
        let right = (peak + 1..x.len()).find(|&i| returned(x[i]))?;
        Some((right - left) as f64 / self.sfreq)
    }
}

/// Channels analysed for `electrode`: its `channel_map` entry, or the
/// channel of the same name.
pub fn resolve_channels(cfg: &MorphologyConfig, electrode: &str) -> Vec<String> {
    match cfg.channel_map.get(electrode) {
        Some(spec) => spec.names().into_iter().map(String::from).collect(),
        None => vec![electrode.to_string()],
    }
}

/// Extract one [`MorphologyRecord`] per `(event, resolved channel)`.
///
/// Event timestamps are in **seconds**.  Events whose window leaves the
/// recording are skipped.
///
/// # Errors
///
/// Returns an error if the configuration is invalid at `rec.sfreq` or a
/// resolved channel is not in the recording.
pub fn extract_morphology(
    rec: &Recording,
    events: &[AnnotationEvent],
    cfg: &MorphologyConfig,
) -> Result<Vec<MorphologyRecord>> {
    let extractor = MorphologyExtractor::new(cfg, rec.sfreq)?;
    let n_times = rec.n_times();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for event in events {
        let Some((start, end)) = extractor.window_bounds(event.timestamp, n_times) else {
            debug!("{} @ {:.3}s: window out of bounds, skipped", event.electrode, event.timestamp);
            skipped += 1;
            continue;
        };
        for channel in resolve_channels(cfg, &event.electrode) {
            let idx = rec.channel_index(&channel).ok_or_else(|| {
                anyhow!("channel '{channel}' (electrode '{}') not in recording", event.electrode)
            })?;
            let window: Vec<f64> = rec.data.row(idx).slice(ndarray::s![start..end]).to_vec();
            let f = extractor
                .analyze(&window)
                .with_context(|| format!("{} @ {:.3}s", channel, event.timestamp))?;
            records.push(MorphologyRecord {
                timestamp: event.timestamp,
                electrode: event.electrode.clone(),
                channel,
                amplitude: f.amplitude,
                half_width: f.half_width,
                crossing_left: f.crossing_left,
                crossing_right: f.crossing_right,
                negative_slope: f.negative_slope,
                positive_slope: f.positive_slope,
            });
        }
    }
    info!(
        "{} morphology records from {} events ({} out of bounds)",
        records.len(),
        events.len(),
        skipped
    );
    Ok(records)
}

pub fn write_records(path: &Path, records: &[MorphologyRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in records {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<MorphologyRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<MorphologyRecord>, _>>()
        .with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrema_at_pulse_feet_and_tip() {
        let x = [0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0];
        assert_eq!(local_extrema(&x), vec![1, 3, 5]);
    }

    #[test]
    fn flat_signal_has_no_extrema() {
        assert!(local_extrema(&[2.0; 10]).is_empty());
    }

    #[test]
    fn sample_counts_scale_with_sfreq() {
        let cfg = MorphologyConfig::default();
        let ex256 = MorphologyExtractor::new(&cfg, 256.0).unwrap();
        let ex512 = MorphologyExtractor::new(&cfg, 512.0).unwrap();
        assert_eq!(ex256.half_window(), 51);
        assert_eq!(ex512.half_window(), 102);
    }

    #[test]
    fn window_bounds_edges() {
        let ex = MorphologyExtractor::new(&MorphologyConfig::default(), 512.0).unwrap();
        // half = 102 samples
        assert_eq!(ex.window_bounds(102.0 / 512.0, 1000), Some((0, 204)));
        assert_eq!(ex.window_bounds(101.0 / 512.0, 1000), None);
        assert_eq!(ex.window_bounds(898.0 / 512.0, 1000), Some((796, 1000)));
        assert_eq!(ex.window_bounds(899.0 / 512.0, 1000), None);
    }

    #[test]
    fn channel_fallback_is_electrode_name() {
        let cfg = MorphologyConfig::default();
        assert_eq!(resolve_channels(&cfg, "C4"), vec!["C4".to_string()]);
    }

    #[test]
    fn records_round_trip_through_csv_with_missing_half_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("morpho.csv");
        let rec = MorphologyRecord {
            timestamp: 1.5,
            electrode: "F8-T4".into(),
            channel: "T4".into(),
            amplitude: -80.0,
            half_width: None,
            crossing_left: 3,
            crossing_right: 190,
            negative_slope: -4000.0,
            positive_slope: 2500.0,
        };
        write_records(&path, std::slice::from_ref(&rec)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Tmu,Electrode,Channel,Amplitude,Half_Width,"));
        assert_eq!(read_records(&path).unwrap(), vec![rec]);
    }
}
