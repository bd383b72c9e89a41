//! Event-free resting segments.
//!
//! Each annotated event marks `[onset, onset + event_duration)` as artifact.
//! The remaining runs of clean samples that are long enough (and, if wake
//! periods are given, lie entirely inside one) are offered to a
//! [`Reviewer`] in recording order until the requested amount of data has
//! been accepted.  The accepted segments are concatenated into a new
//! [`Recording`].
use anyhow::{ensure, Result};
use log::{info, warn};
use ndarray::{concatenate, Axis};

use crate::config::SegmentConfig;
use crate::io::Recording;
use crate::review::{Reviewer, Verdict};

/// Half-open sample interval `[start_sample, end_sample)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanSegment {
    pub start_sample: usize,
    pub end_sample: usize,
}

impl CleanSegment {
    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start_sec(&self, sfreq: f64) -> f64 {
        self.start_sample as f64 / sfreq
    }

    pub fn end_sec(&self, sfreq: f64) -> f64 {
        self.end_sample as f64 / sfreq
    }
}

/// `true` for every sample covered by an event.
///
/// Bounds are rounded to the nearest sample and clipped to `[0, n_times)`.
pub fn artifact_mask(onsets_sec: &[f64], event_duration: f64, sfreq: f64, n_times: usize) -> Vec<bool> {
    let mut mask = vec![false; n_times];
    let to_sample = |t: f64| ((t * sfreq).round().max(0.0) as usize).min(n_times);
    for &onset in onsets_sec {
        let start = to_sample(onset);
        let end = to_sample(onset + event_duration);
        if start < end {
            mask[start..end].fill(true);
        }
    }
    mask
}

/// Maximal runs of clean samples at least `min_samples` long.
pub fn clean_segments(mask: &[bool], min_samples: usize) -> Vec<CleanSegment> {
    let mut segments = Vec::new();
    let mut current: Option<usize> = None;
    for (i, &artifact) in mask.iter().enumerate() {
        match (artifact, current) {
            (false, None) => current = Some(i),
            (true, Some(start)) => {
                if i - start >= min_samples {
                    segments.push(CleanSegment { start_sample: start, end_sample: i });
                }
                current = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        if mask.len() - start >= min_samples {
            segments.push(CleanSegment { start_sample: start, end_sample: mask.len() });
        }
    }
    segments
}

/// Segments lying entirely inside one of the `(start, end)` periods (s).
pub fn within_wake(segments: &[CleanSegment], wake: &[(f64, f64)], sfreq: f64) -> Vec<CleanSegment> {
    segments
        .iter()
        .filter(|s| {
            let (start, end) = (s.start_sec(sfreq), s.end_sec(sfreq));
            wake.iter().any(|&(ws, we)| start >= ws && end <= we)
        })
        .copied()
        .collect()
}

/// Pair up a flat `start end start end …` list.
///
/// An odd number of values cannot be paired; it is reported and ignored.
pub fn parse_wake_periods(values: &[f64]) -> Option<Vec<(f64, f64)>> {
    if values.is_empty() {
        return None;
    }
    if values.len() % 2 != 0 {
        warn!("odd number of wake period bounds ({}), ignored", values.len());
        return None;
    }
    Some(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

/// Segments accepted by [`select_segments`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub segments: Vec<CleanSegment>,
    pub total_samples: usize,
    pub target_reached: bool,
}

/// Offer `candidates` to `reviewer` in order until `target_samples` have
/// been accepted.
pub fn select_segments<R: Reviewer<CleanSegment>>(
    rec: &Recording,
    candidates: &[CleanSegment],
    target_samples: f64,
    mut reviewer: R,
) -> Selection {
    let mut selection = Selection { segments: vec![], total_samples: 0, target_reached: false };
    for seg in candidates {
        match reviewer.review(seg, rec.slice(seg.start_sample, seg.end_sample)) {
            Verdict::Keep => {}
            Verdict::Reject => continue,
            Verdict::Stop => break,
        }
        selection.segments.push(*seg);
        selection.total_samples += seg.len();
        if selection.total_samples as f64 >= target_samples {
            selection.target_reached = true;
            break;
        }
    }
    selection
}

/// Concatenate `segments` of `rec` along time.
pub fn concatenate_segments(rec: &Recording, segments: &[CleanSegment]) -> Result<Recording> {
    ensure!(!segments.is_empty(), "no segment to concatenate");
    let views: Vec<_> = segments
        .iter()
        .map(|s| rec.slice(s.start_sample, s.end_sample))
        .collect();
    let data = concatenate(Axis(1), &views)?;
    Recording::new(data, rec.sfreq, rec.ch_names.clone())
}

/// Full clean-resting extraction.
///
/// Returns `None` when no segment was accepted.
///
/// # Errors
///
/// Fails on a non-positive duration in `cfg`.
pub fn extract_clean<R: Reviewer<CleanSegment>>(
    rec: &Recording,
    onsets_sec: &[f64],
    cfg: &SegmentConfig,
    reviewer: R,
) -> Result<Option<(Recording, Selection)>> {
    cfg.validate()?;
    let sfreq = rec.sfreq;
    let mask = artifact_mask(onsets_sec, cfg.event_duration_sec, sfreq, rec.n_times());
    let min_samples = (cfg.min_seg_sec * sfreq) as usize;
    let mut candidates = clean_segments(&mask, min_samples);
    info!(
        "{} events, {} clean segments >= {}s",
        onsets_sec.len(),
        candidates.len(),
        cfg.min_seg_sec
    );

    if let Some(wake) = &cfg.wake_periods {
        candidates = within_wake(&candidates, wake, sfreq);
        info!("{} clean segments inside wake periods", candidates.len());
    }

    let selection = select_segments(rec, &candidates, cfg.total_duration_sec * sfreq, reviewer);
    if selection.target_reached {
        info!("{}s of clean data selected", cfg.total_duration_sec);
    } else {
        warn!(
            "only {:.1}s of clean data selected (wanted {}s)",
            selection.total_samples as f64 / sfreq,
            cfg.total_duration_sec
        );
    }
    if selection.segments.is_empty() {
        return Ok(None);
    }
    let clean = concatenate_segments(rec, &selection.segments)?;
    Ok(Some((clean, selection)))
}
