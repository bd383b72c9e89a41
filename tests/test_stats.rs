mod common;
use common::{events, spike_recording};
use iedkit::morphology::{read_records, write_records};
use iedkit::stats::{normalized_rates, period_ratio, write_outliers, MorphologyVariable};
use iedkit::{counts_by_period, extract_morphology, label_period, morphology_outliers, MorphologyConfig, StatsConfig};

const CONFIG: &str = r#"
periods:
  eveil:   [[0, 10], [30, 40]]
  sommeil: [[10.5, 29.5]]
durations:
  eveil: 20
  sommeil: 19
"#;

fn cfg() -> StatsConfig {
    serde_yaml::from_str(CONFIG).unwrap()
}

#[test]
fn counts_rates_and_ratio() {
    let cfg = cfg();
    let ev = events(&[
        (1.0, "F8"),
        (2.0, "F8"),
        (35.0, "F8"),
        (12.0, "F8"),
        (20.0, "T4"),
        (10.2, "F8"), // between periods
    ]);
    let counts = counts_by_period(&ev, &cfg.periods);
    assert_eq!(counts["EVEIL"]["F8"], 3);
    assert_eq!(counts["SOMMEIL"]["F8"], 1);
    assert_eq!(counts["SOMMEIL"]["T4"], 1);
    assert_eq!(label_period(10.2, &cfg.periods), None);

    let rates = normalized_rates(&counts, &cfg.durations).unwrap();
    approx::assert_abs_diff_eq!(rates["EVEIL"]["F8"], 0.15);

    let ratio = period_ratio(&rates, "eveil", "sommeil");
    approx::assert_abs_diff_eq!(ratio["F8"].unwrap(), 0.15 / (1.0 / 19.0), epsilon = 1e-12);
    assert_eq!(ratio["T4"], None);
}

#[test]
fn outliers_from_extracted_morphology() {
    let centres: Vec<f64> = (1..9).map(|i| i as f64).collect();
    let rec = spike_recording(&["F8"], &["F8"], 10.0, &centres, -100.0);
    let ev = events(&centres.iter().map(|&t| (t, "F8")).collect::<Vec<_>>());
    let mut records = extract_morphology(&rec, &ev, &MorphologyConfig::default()).unwrap();
    assert_eq!(records.len(), 8);

    // one abnormally large discharge
    records[3].amplitude = -900.0;

    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("morpho.csv");
    write_records(&csv, &records).unwrap();
    let back = read_records(&csv).unwrap();
    assert_eq!(back, records);

    let out = morphology_outliers(&back, &cfg().periods, MorphologyVariable::Amplitude);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].record.timestamp, 4.0);
    assert_eq!(out[0].period, "EVEIL");

    // identical shapes elsewhere: no half-width outliers
    assert!(morphology_outliers(&back, &cfg().periods, MorphologyVariable::HalfWidth).is_empty());

    let path = dir.path().join("outliers.csv");
    write_outliers(&path, &out).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Variable,Period,Tmu,Electrode,Channel,Value"));
    assert!(text.contains("Amplitude,EVEIL,4,F8,F8,-900"));
}
