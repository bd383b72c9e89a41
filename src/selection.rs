//! Manual validation of a subset of detected IEDs.
//!
//! Candidates (optionally restricted to one vigilance period) are shown one
//! at a time to a [`Reviewer`] with `±window_sec` of signal on the review
//! channel, until `n_target` of them have been accepted.
use anyhow::{anyhow, Result};
use log::info;
use ndarray::s;

use crate::annotation::AnnotationEvent;
use crate::config::SelectionConfig;
use crate::io::Recording;
use crate::review::{Reviewer, Verdict};
use crate::stats::label_period;

/// Row of the first configured channel present in `rec`.  With no channels
/// configured, the first channel of the recording.
pub fn review_channel(rec: &Recording, channels: &[String]) -> Result<usize> {
    if channels.is_empty() {
        return if rec.ch_names.is_empty() {
            Err(anyhow!("recording has no channels"))
        } else {
            Ok(0)
        };
    }
    channels
        .iter()
        .find_map(|c| rec.channel_index(c))
        .ok_or_else(|| anyhow!("none of the channels {channels:?} is in the recording"))
}

/// Events eligible for review: all of them, or those in `cfg.period`.
/// Timestamps are in seconds.
pub fn candidates<'a>(events: &'a [AnnotationEvent], cfg: &SelectionConfig) -> Vec<&'a AnnotationEvent> {
    match &cfg.period {
        None => events.iter().collect(),
        Some(wanted) => events
            .iter()
            .filter(|e| {
                label_period(e.timestamp, &cfg.periods)
                    .is_some_and(|p| p.eq_ignore_ascii_case(wanted))
            })
            .collect(),
    }
}

/// Review candidates in order and return the accepted ones.
pub fn select_validated<R: Reviewer<AnnotationEvent>>(
    rec: &Recording,
    events: &[AnnotationEvent],
    cfg: &SelectionConfig,
    mut reviewer: R,
) -> Result<Vec<AnnotationEvent>> {
    let ch = review_channel(rec, &cfg.channels)?;
    let pool = candidates(events, cfg);
    let half = (cfg.window_sec * rec.sfreq).round() as usize;
    let n_times = rec.n_times();

    let mut accepted = Vec::new();
    for event in &pool {
        if accepted.len() >= cfg.n_target {
            break;
        }
        let centre = ((event.timestamp * rec.sfreq).round().max(0.0) as usize).min(n_times);
        let start = centre.saturating_sub(half);
        let stop = (centre + half).min(n_times);
        let view = rec.data.slice(s![ch..ch + 1, start..stop]);
        match reviewer.review(event, view) {
            Verdict::Keep => accepted.push((*event).clone()),
            Verdict::Reject => {}
            Verdict::Stop => break,
        }
    }
    info!(
        "{} of {} candidate events accepted (target {})",
        accepted.len(),
        pool.len(),
        cfg.n_target
    );
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{review_fn, AcceptAll};
    use ndarray::Array2;

    fn rec() -> Recording {
        Recording::new(Array2::zeros((2, 1000)), 100.0, vec!["F8".into(), "T4".into()]).unwrap()
    }

    fn events() -> Vec<AnnotationEvent> {
        (0..5).map(|i| AnnotationEvent::new(i as f64 * 2.0, "T4")).collect()
    }

    #[test]
    fn stops_at_target() {
        let cfg = SelectionConfig { n_target: 3, ..SelectionConfig::default() };
        let out = select_validated(&rec(), &events(), &cfg, AcceptAll).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn rejected_events_are_skipped() {
        let cfg = SelectionConfig { n_target: 10, ..SelectionConfig::default() };
        let odd_only = review_fn(|e: &AnnotationEvent, _| {
            if (e.timestamp as usize / 2) % 2 == 1 { Verdict::Keep } else { Verdict::Reject }
        });
        let out = select_validated(&rec(), &events(), &cfg, odd_only).unwrap();
        let times: Vec<f64> = out.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![2.0, 6.0]);
    }

    #[test]
    fn review_window_on_requested_channel() {
        let cfg = SelectionConfig {
            channels: vec!["T4".into()],
            window_sec: 0.5,
            ..SelectionConfig::default()
        };
        let mut shapes = Vec::new();
        let record_shape = review_fn(|_: &AnnotationEvent, data| {
            shapes.push(data.dim());
            Verdict::Keep
        });
        select_validated(&rec(), &events()[1..2], &cfg, record_shape).unwrap();
        assert_eq!(shapes, vec![(1, 100)]);
    }

    #[test]
    fn period_filter() {
        let cfg = SelectionConfig {
            period: Some("eveil".into()),
            periods: [("eveil".to_string(), vec![[0.0, 3.0]])].into(),
            ..SelectionConfig::default()
        };
        let evs = events();
        assert_eq!(candidates(&evs, &cfg).len(), 2);
    }

    #[test]
    fn unknown_channels_rejected() {
        assert!(review_channel(&rec(), &["Cz".to_string()]).is_err());
    }
}
