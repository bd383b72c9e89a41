mod common;
use approx::assert_abs_diff_eq;
use common::{events, spike_recording, triangle, SFREQ};
use iedkit::{extract_morphology, ChannelSpec, MorphologyConfig, MorphologyExtractor};

const AMP: f64 = -100.0;

fn cfg_with_map() -> MorphologyConfig {
    let mut cfg = MorphologyConfig::default();
    cfg.channel_map
        .insert("T4".into(), ChannelSpec::Many(vec!["T4".into(), "Cz".into()]));
    cfg
}

// ── Single window ─────────────────────────────────────────────────────────────

#[test]
fn triangle_amplitude_and_half_width() {
    let ex = MorphologyExtractor::new(&MorphologyConfig::default(), SFREQ).unwrap();
    let half = ex.half_window();
    let x = triangle(2 * half, half, AMP, 10);

    let f = ex.analyze(&x).unwrap();
    assert_eq!(f.peak, half);
    assert_eq!(f.crossing_left, half - 10);
    assert_eq!(f.crossing_right, half + 10);
    assert_abs_diff_eq!(f.amplitude, AMP, epsilon = 1e-9);
    assert_abs_diff_eq!(f.half_width.unwrap(), 10.0 / SFREQ, epsilon = 1e-12);
}

#[test]
fn amplitude_is_signed_from_left_crossing_and_width_is_in_seconds() {
    let fs = 2.0 * SFREQ;
    let ex = MorphologyExtractor::new(&MorphologyConfig::default(), fs).unwrap();
    let half = ex.half_window();
    // negative spike riding on a +20 baseline: peak at -80, feet at +20
    let x: Vec<f64> = triangle(2 * half, half, AMP, 10).iter().map(|v| v + 20.0).collect();

    let f = ex.analyze(&x).unwrap();
    assert_abs_diff_eq!(f.amplitude, -100.0, epsilon = 1e-9);
    // same 10-sample width, halved in seconds at twice the rate
    assert_abs_diff_eq!(f.half_width.unwrap(), 10.0 / fs, epsilon = 1e-12);
}

#[test]
fn triangle_slopes_follow_the_edges() {
    let ex = MorphologyExtractor::new(&MorphologyConfig::default(), SFREQ).unwrap();
    let half = ex.half_window();
    let x = triangle(2 * half, half, AMP, 10);
    let f = ex.analyze(&x).unwrap();

    // each edge moves 100 units in 10 samples
    let edge = AMP.abs() / 10.0 * SFREQ;
    assert!(f.negative_slope < 0.0 && f.positive_slope > 0.0);
    assert_abs_diff_eq!(f.negative_slope, -edge, epsilon = 0.15 * edge);
    assert_abs_diff_eq!(f.positive_slope, edge, epsilon = 0.15 * edge);
}

#[test]
fn monotonic_ramp_has_no_half_width() {
    let ex = MorphologyExtractor::new(&MorphologyConfig::default(), SFREQ).unwrap();
    let ramp: Vec<f64> = (0..2 * ex.half_window()).map(|i| 0.5 * i as f64).collect();
    let f = ex.analyze(&ramp).unwrap();
    assert!(f.half_width.is_none());
    assert!(f.amplitude > 0.0);
}

#[test]
fn flat_window_has_no_half_width() {
    let ex = MorphologyExtractor::new(&MorphologyConfig::default(), SFREQ).unwrap();
    let f = ex.analyze(&vec![3.0; 2 * ex.half_window()]).unwrap();
    assert_eq!(f.amplitude, 0.0);
    assert!(f.half_width.is_none());
}

#[test]
fn cutoff_above_nyquist_rejected() {
    let cfg = MorphologyConfig { slope_cutoff_hz: 80.0, ..Default::default() };
    assert!(MorphologyExtractor::new(&cfg, 128.0).is_err());
}

// ── Recording-level extraction ────────────────────────────────────────────────

#[test]
fn one_record_per_event_and_channel() {
    let rec = spike_recording(&["F8", "T4", "Cz"], &["F8", "T4"], 10.0, &[2.0, 5.0], AMP);
    let ev = events(&[(2.0, "F8"), (5.0, "T4")]);

    let records = extract_morphology(&rec, &ev, &cfg_with_map()).unwrap();
    let channels: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.electrode.as_str(), r.channel.as_str()))
        .collect();
    assert_eq!(channels, vec![("F8", "F8"), ("T4", "T4"), ("T4", "Cz")]);

    assert_abs_diff_eq!(records[0].amplitude, AMP, epsilon = 1e-9);
    assert_abs_diff_eq!(records[1].amplitude, AMP, epsilon = 1e-9);
    assert_eq!(records[0].timestamp, 2.0);
    // Cz is flat
    assert_eq!(records[2].amplitude, 0.0);
    assert!(records[2].half_width.is_none());
}

#[test]
fn out_of_bounds_events_are_dropped() {
    let rec = spike_recording(&["F8"], &["F8"], 10.0, &[2.0], AMP);
    // 0.1 s and 9.9 s are closer than 0.2 s to an edge
    let ev = events(&[(0.1, "F8"), (2.0, "F8"), (9.9, "F8")]);

    let records = extract_morphology(&rec, &ev, &MorphologyConfig::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 2.0);
}

#[test]
fn missing_channel_is_an_error() {
    let rec = spike_recording(&["F8"], &["F8"], 10.0, &[2.0], AMP);
    let ev = events(&[(2.0, "O1")]);
    assert!(extract_morphology(&rec, &ev, &MorphologyConfig::default()).is_err());
}

#[test]
fn positive_spike_keeps_its_sign() {
    let rec = spike_recording(&["F8"], &["F8"], 4.0, &[2.0], 60.0);
    let records =
        extract_morphology(&rec, &events(&[(2.0, "F8")]), &MorphologyConfig::default()).unwrap();
    assert_abs_diff_eq!(records[0].amplitude, 60.0, epsilon = 1e-9);
    assert_abs_diff_eq!(records[0].half_width.unwrap(), 10.0 / SFREQ, epsilon = 1e-12);
}
