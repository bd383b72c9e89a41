mod common;
use common::events;
use iedkit::{deduplicate, DedupConfig, PairRule};

// ── Threshold behaviour ───────────────────────────────────────────────────────

#[test]
fn identical_labels_within_threshold_keep_one() {
    let ev = events(&[(1_000_000.0, "F8"), (1_012_000.0, "F8")]);
    let out = deduplicate(&ev, &DedupConfig::default()).unwrap();
    assert_eq!(out.kept.len(), 1);
    assert_eq!(out.removed.len(), 1);
    assert_eq!(out.kept[0].timestamp, 1_000_000.0);
}

#[test]
fn events_beyond_threshold_both_survive() {
    let ev = events(&[(0.0, "F8"), (30_000.0, "F8")]);
    let out = deduplicate(&ev, &DedupConfig { threshold: 25_000.0, ..Default::default() }).unwrap();
    assert_eq!(out.kept.len(), 2);
    assert!(out.pairs.is_empty());
}

#[test]
fn zero_threshold_only_merges_simultaneous_events() {
    let ev = events(&[(0.0, "F8"), (0.0, "F8"), (1.0, "F8")]);
    let out = deduplicate(&ev, &DedupConfig { threshold: 0.0, ..Default::default() }).unwrap();
    assert_eq!(out.kept.len(), 2);
}

#[test]
fn simultaneous_identical_events_keep_exactly_one() {
    let ev = events(&[(5.0, "T4"), (5.0, "T4")]);
    let out = deduplicate(&ev, &DedupConfig::default()).unwrap();
    assert_eq!(out.kept.len(), 1);
    assert_eq!(out.removed.len(), 1);
}

// ── Policy ────────────────────────────────────────────────────────────────────

#[test]
fn substring_label_event_removed() {
    let ev = events(&[(0.0, "F8"), (1_000.0, "F8-T4")]);
    let out = deduplicate(&ev, &DedupConfig::default()).unwrap();
    assert_eq!(out.removed[0].electrode, "F8-T4");
}

#[test]
fn lexicographically_greater_label_removed() {
    let ev = events(&[(0.0, "F4"), (1_000.0, "F3")]);
    let out = deduplicate(&ev, &DedupConfig::default()).unwrap();
    assert_eq!(out.removed[0].electrode, "F4");
}

#[test]
fn excluded_pairs_survive() {
    let cfg = DedupConfig {
        excluded_pairs: vec![["F8".into(), "T4".into()]],
        ..Default::default()
    };
    let ev = events(&[(0.0, "T4"), (1_000.0, "F8")]);
    let out = deduplicate(&ev, &cfg).unwrap();
    assert_eq!(out.kept.len(), 2);
    assert_eq!(out.pairs.len(), 1);
}

#[test]
fn configured_rule_overrides_lexicographic_order() {
    let cfg = DedupConfig {
        rules: vec![PairRule { labels: ["F3".into(), "F4".into()], drop: "F3".into() }],
        ..Default::default()
    };
    let ev = events(&[(0.0, "F4"), (1_000.0, "F3")]);
    let out = deduplicate(&ev, &cfg).unwrap();
    assert_eq!(out.removed[0].electrode, "F3");
}

// ── Set-level properties ──────────────────────────────────────────────────────

fn burst() -> Vec<iedkit::AnnotationEvent> {
    events(&[
        (0.0, "F8"),
        (5_000.0, "F8"),
        (9_000.0, "T4"),
        (20_000.0, "F8-T4"),
        (40_000.0, "C4"),
        (41_000.0, "C3"),
        (100_000.0, "F8"),
        (110_000.0, "Fp2"),
        (126_000.0, "F8"),
        (500_000.0, "O1"),
    ])
}

#[test]
fn deduplication_is_idempotent() {
    let cfg = DedupConfig {
        excluded_pairs: vec![["F8".into(), "Fp2".into()]],
        ..Default::default()
    };
    let once = deduplicate(&burst(), &cfg).unwrap();
    let twice = deduplicate(&once.kept, &cfg).unwrap();
    assert!(twice.removed.is_empty());
    assert_eq!(twice.kept, once.kept);
}

#[test]
fn every_event_is_kept_or_removed() {
    let input = burst();
    let out = deduplicate(&input, &DedupConfig::default()).unwrap();
    assert_eq!(out.kept.len() + out.removed.len(), input.len());
    assert!(out.kept.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn survivors_have_no_close_neighbours() {
    let cfg = DedupConfig::default();
    let out = deduplicate(&burst(), &cfg).unwrap();
    for w in out.kept.windows(2) {
        assert!(w[1].timestamp - w[0].timestamp > cfg.threshold, "{:?}", w);
    }
}

#[test]
fn negative_threshold_rejected() {
    let cfg = DedupConfig { threshold: -1.0, ..Default::default() };
    assert!(deduplicate(&burst(), &cfg).is_err());
}

#[test]
fn non_finite_timestamp_never_removes_a_real_event() {
    let ev = events(&[(0.0, "F3"), (1_000_000.0, "F8"), (f64::NAN, "C4")]);
    assert!(deduplicate(&ev, &DedupConfig::default()).is_err());

    let pairs = iedkit::find_close_pairs(&events(&[(1_000_000.0, "F8"), (f64::NAN, "C4")]), 25_000.0);
    assert!(pairs.is_empty());
}
