//! Near-duplicate annotation removal.
//!
//! The same discharge is often marked on several neighbouring electrodes a
//! few milliseconds apart.  This module finds every pair of events closer
//! than a threshold and removes one event of each pair.
//!
//! Pair search is a sorted sweep: for event `i` the scan over `j > i` stops
//! at the first event more than `threshold` later, so the cost is
//! `O(n · k)` with `k` the largest cluster size.
//!
//! Which event of a pair goes is decided in this order:
//!
//! 1. pairs listed in [`DedupConfig::excluded_pairs`] are left alone;
//! 2. the first matching [`PairRule`] names the electrode to drop;
//! 3. identical labels: the later event is dropped;
//! 4. one label contains the other (`F8` / `F8-T4`): the longer one is dropped;
//! 5. otherwise the lexicographically larger label is dropped.
//!
//! Step 4 can only fire in one direction: two distinct labels cannot each
//! contain the other, and equal labels are caught by step 3 first.
use std::collections::BTreeSet;

use anyhow::{bail, Result};
use log::{debug, info};

use crate::annotation::AnnotationEvent;
use crate::config::{DedupConfig, PairRule};

/// Two events closer than the threshold, as indices into the sorted list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePair {
    pub first: usize,
    pub second: usize,
    pub delta: f64,
}

/// Which member of a [`ClosePair`] to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// Why a pair was resolved the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Excluded,
    Rule(usize),
    ExactMatch,
    Substring,
    Lexicographic,
}

/// Result of [`deduplicate`].
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Surviving events, sorted by timestamp.
    pub kept: Vec<AnnotationEvent>,
    /// Removed events, sorted by timestamp.
    pub removed: Vec<AnnotationEvent>,
    /// Every close pair found, indices into the sorted input.
    pub pairs: Vec<ClosePair>,
}

/// Find all pairs of events at most `threshold` apart.
///
/// `events` must be sorted by timestamp.
pub fn find_close_pairs(events: &[AnnotationEvent], threshold: f64) -> Vec<ClosePair> {
    let mut pairs = Vec::new();
    for (i, a) in events.iter().enumerate() {
        for (j, b) in events.iter().enumerate().skip(i + 1) {
            let delta = b.timestamp - a.timestamp;
            // NaN gaps end the scan too
            if !(delta <= threshold) {
                break;
            }
            pairs.push(ClosePair { first: i, second: j, delta });
        }
    }
    pairs
}

fn same_pair(labels: &[String; 2], a: &str, b: &str) -> bool {
    (labels[0] == a && labels[1] == b) || (labels[0] == b && labels[1] == a)
}

fn apply_rule(rule: &PairRule, a: &str, b: &str) -> Option<Side> {
    if !same_pair(&rule.labels, a, b) {
        return None;
    }
    if rule.drop == a {
        Some(Side::First)
    } else if rule.drop == b {
        Some(Side::Second)
    } else {
        None
    }
}

/// Decide which of two colliding labels loses.
///
/// `a` belongs to the earlier event.  Returns `None` for excluded pairs.
pub fn resolve_labels(a: &str, b: &str, cfg: &DedupConfig) -> (Option<Side>, Resolution) {
    if cfg.excluded_pairs.iter().any(|p| same_pair(p, a, b)) {
        return (None, Resolution::Excluded);
    }
    if let Some((k, side)) = cfg
        .rules
        .iter()
        .enumerate()
        .find_map(|(k, r)| apply_rule(r, a, b).map(|s| (k, s)))
    {
        return (Some(side), Resolution::Rule(k));
    }
    if a == b {
        return (Some(Side::Second), Resolution::ExactMatch);
    }
    if a.contains(b) {
        return (Some(Side::First), Resolution::Substring);
    }
    if b.contains(a) {
        return (Some(Side::Second), Resolution::Substring);
    }
    let side = if a > b { Side::First } else { Side::Second };
    (Some(side), Resolution::Lexicographic)
}

/// Indices (into `events`) removed by the configured policy.
///
/// Set semantics: an event caught in several pairs appears once.
pub fn removal_set(
    events: &[AnnotationEvent],
    pairs: &[ClosePair],
    cfg: &DedupConfig,
) -> BTreeSet<usize> {
    let mut removed = BTreeSet::new();
    for pair in pairs {
        let a = &events[pair.first];
        let b = &events[pair.second];
        let (side, why) = resolve_labels(&a.electrode, &b.electrode, cfg);
        debug!(
            "{} ({}) / {} ({}) Δ={} → {:?} {:?}",
            a.electrode, a.timestamp, b.electrode, b.timestamp, pair.delta, side, why
        );
        match side {
            Some(Side::First) => removed.insert(pair.first),
            Some(Side::Second) => removed.insert(pair.second),
            None => false,
        };
    }
    removed
}

/// Remove near-duplicate events.
///
/// The input is stable-sorted by timestamp first, so events with equal
/// timestamps keep their relative order.
///
/// # Errors
///
/// Returns an error if the threshold is negative or not finite, or if an
/// event timestamp is not finite.
///
/// # Examples
///
/// ```
/// use iedkit::{deduplicate, AnnotationEvent, DedupConfig};
///
/// let events = vec![
///     AnnotationEvent::new(0.0, "F8"),
///     AnnotationEvent::new(10_000.0, "F8"),
///     AnnotationEvent::new(60_000.0, "T4"),
/// ];
/// let out = deduplicate(&events, &DedupConfig::default()).unwrap();
/// assert_eq!(out.kept.len(), 2);
/// assert_eq!(out.removed[0].timestamp, 10_000.0);
/// ```
pub fn deduplicate(events: &[AnnotationEvent], cfg: &DedupConfig) -> Result<DedupOutcome> {
    cfg.validate()?;
    if let Some((i, e)) = events.iter().enumerate().find(|(_, e)| !e.timestamp.is_finite()) {
        bail!("event {i} ({}) has a non-finite timestamp {}", e.electrode, e.timestamp);
    }

    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let pairs = find_close_pairs(&sorted, cfg.threshold);
    let remove = removal_set(&sorted, &pairs, cfg);

    let (mut kept, mut removed) = (Vec::new(), Vec::new());
    for (i, event) in sorted.into_iter().enumerate() {
        if remove.contains(&i) {
            removed.push(event);
        } else {
            kept.push(event);
        }
    }

    info!(
        "{} close pairs, {} events removed, {} kept",
        pairs.len(),
        removed.len(),
        kept.len()
    );
    Ok(DedupOutcome { kept, removed, pairs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: f64, label: &str) -> AnnotationEvent {
        AnnotationEvent::new(t, label)
    }

    #[test]
    fn sweep_stops_past_threshold() {
        let events = vec![ev(0.0, "A"), ev(10.0, "B"), ev(30.0, "C"), ev(31.0, "D")];
        let pairs = find_close_pairs(&events, 10.0);
        let idx: Vec<(usize, usize)> = pairs.iter().map(|p| (p.first, p.second)).collect();
        assert_eq!(idx, vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn boundary_is_inclusive() {
        let events = vec![ev(0.0, "A"), ev(25_000.0, "B")];
        assert_eq!(find_close_pairs(&events, 25_000.0).len(), 1);
    }

    #[test]
    fn precedence_order() {
        let cfg = DedupConfig::default();
        assert_eq!(resolve_labels("F8", "F8", &cfg), (Some(Side::Second), Resolution::ExactMatch));
        assert_eq!(resolve_labels("F8-T4", "F8", &cfg), (Some(Side::First), Resolution::Substring));
        assert_eq!(resolve_labels("F8", "F8-T4", &cfg), (Some(Side::Second), Resolution::Substring));
        assert_eq!(resolve_labels("F4", "F3", &cfg), (Some(Side::First), Resolution::Lexicographic));
        assert_eq!(resolve_labels("F3", "F4", &cfg), (Some(Side::Second), Resolution::Lexicographic));
    }

    #[test]
    fn rules_and_exclusions_come_first() {
        let cfg = DedupConfig {
            excluded_pairs: vec![["T4".into(), "F8".into()]],
            rules: vec![PairRule { labels: ["F3".into(), "F4".into()], drop: "F3".into() }],
            ..DedupConfig::default()
        };
        assert_eq!(resolve_labels("F8", "T4", &cfg), (None, Resolution::Excluded));
        assert_eq!(resolve_labels("F4", "F3", &cfg), (Some(Side::Second), Resolution::Rule(0)));
    }

    #[test]
    fn rule_naming_neither_label_falls_through() {
        let cfg = DedupConfig {
            rules: vec![PairRule { labels: ["F3".into(), "F4".into()], drop: "C4".into() }],
            ..DedupConfig::default()
        };
        assert_eq!(resolve_labels("F3", "F4", &cfg).1, Resolution::Lexicographic);
    }

    #[test]
    fn event_in_two_pairs_removed_once() {
        // F4 collides with both neighbours and loses both times.
        let events = vec![ev(0.0, "F3"), ev(10.0, "F4"), ev(20.0, "C4")];
        let cfg = DedupConfig { threshold: 10.0, ..DedupConfig::default() };
        let out = deduplicate(&events, &cfg).unwrap();
        assert_eq!(out.pairs.len(), 2);
        assert_eq!(out.removed.len(), 1);
        assert_eq!(out.removed[0].electrode, "F4");
        assert_eq!(out.kept.len(), 2);
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let events = vec![ev(50_000.0, "T4"), ev(0.0, "F8")];
        let out = deduplicate(&events, &DedupConfig::default()).unwrap();
        assert_eq!(out.kept[0].electrode, "F8");
        assert!(out.removed.is_empty());
    }

    #[test]
    fn invalid_threshold_is_an_error() {
        let cfg = DedupConfig { threshold: f64::NAN, ..DedupConfig::default() };
        assert!(deduplicate(&[], &cfg).is_err());
    }

    #[test]
    fn nan_gap_is_not_a_pair() {
        let events = vec![ev(0.0, "F3"), ev(1_000_000.0, "F8"), ev(f64::NAN, "C4")];
        assert!(find_close_pairs(&events, 25_000.0).is_empty());
    }

    #[test]
    fn non_finite_timestamp_is_an_error() {
        let events = vec![ev(0.0, "F3"), ev(1_000_000.0, "F8"), ev(f64::NAN, "C4")];
        let err = deduplicate(&events, &DedupConfig::default()).unwrap_err();
        assert!(err.to_string().contains("C4"));
        let events = vec![ev(f64::INFINITY, "F8")];
        assert!(deduplicate(&events, &DedupConfig::default()).is_err());
    }
}
