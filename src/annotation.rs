//! Annotation tables.
//!
//! Two shapes of table are handled:
//!
//! - **EVT** exports (tab-delimited, `Tmu  Code  TriNo  Comnt  Ver-C`), one
//!   row per trigger.  Header names carry padding, so they are trimmed.
//! - **Labelled** tables (`Tmu,Electrode[,Comnt]`), produced by
//!   [`write_events`] after cleaning and consumed by the morphology and
//!   statistics steps.  Comma or tab, sniffed from the header line.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::{debug, info};

use crate::config::{AnnotationConfig, FilterMode};

/// Label given to rows whose trigger code has no electrode mapping.
pub const UNMAPPED_LABEL: &str = "0";

/// Microseconds per second (EVT `Tmu` is in µs).
pub const US_PER_SEC: f64 = 1e6;

/// One raw row of an EVT export.
#[derive(Debug, Clone, PartialEq)]
pub struct EvtRecord {
    pub tmu: f64,
    pub code: i64,
    pub tri_no: i64,
    pub comment: String,
}

/// One annotation: a timestamp on an electrode.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEvent {
    /// Unit follows the source table (µs for `Tmu`).
    pub timestamp: f64,
    pub electrode: String,
    pub comment: String,
}

impl AnnotationEvent {
    pub fn new(timestamp: f64, electrode: impl Into<String>) -> Self {
        Self { timestamp, electrode: electrode.into(), comment: String::new() }
    }

    /// Timestamp in seconds, assuming it is stored in µs.
    pub fn seconds(&self) -> f64 {
        self.timestamp / US_PER_SEC
    }
}

fn header_index(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, h)| (h.trim().to_ascii_lowercase(), idx))
        .collect()
}

fn column(idx: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize> {
    idx.get(&name.to_ascii_lowercase())
        .copied()
        .ok_or_else(|| anyhow!("missing column '{name}' in {}", path.display()))
}

fn parse_field<T: std::str::FromStr>(record: &StringRecord, col: usize, name: &str, line: usize) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = record.get(col).unwrap_or("").trim();
    raw.parse::<T>()
        .with_context(|| format!("line {line}: parsing {name} '{raw}'"))
}

/// `Tmu` field; `nan` and `inf` parse as floats but are not times.
fn parse_time(record: &StringRecord, col: usize, line: usize) -> Result<f64> {
    let t: f64 = parse_field(record, col, "Tmu", line)?;
    if !t.is_finite() {
        bail!("line {line}: Tmu '{t}' is not a finite time");
    }
    Ok(t)
}

/// Sniff the delimiter from the first line: tab if it contains one.
fn sniff_delimiter(path: &Path) -> Result<u8> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let first = text.lines().next().unwrap_or("");
    Ok(if first.contains('\t') { b'\t' } else { b',' })
}

/// Read a tab-delimited EVT export.
pub fn read_evt(path: &Path) -> Result<Vec<EvtRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("reading EVT {}", path.display()))?;
    let idx = header_index(reader.headers()?);
    let tmu_col = column(&idx, "Tmu", path)?;
    let code_col = column(&idx, "Code", path)?;
    let tri_col = idx.get("trino").copied();
    let comment_col = idx.get("comnt").copied();

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = i + 2;
        let tri_no = match tri_col {
            Some(col) if !record.get(col).unwrap_or("").is_empty() => {
                parse_field(&record, col, "TriNo", line)?
            }
            _ => 0,
        };
        records.push(EvtRecord {
            tmu: parse_time(&record, tmu_col, line)?,
            code: parse_field(&record, code_col, "Code", line)?,
            tri_no,
            comment: comment_col
                .and_then(|col| record.get(col))
                .unwrap_or("")
                .to_string(),
        });
    }
    info!("{}: {} EVT rows", path.display(), records.len());
    Ok(records)
}

/// Apply the comment filter, map codes to electrodes and keep electrodes of
/// interest.  Row order is preserved.
pub fn label_records(records: &[EvtRecord], cfg: &AnnotationConfig) -> Vec<AnnotationEvent> {
    let filter = &cfg.comment_filter;
    let events: Vec<AnnotationEvent> = records
        .iter()
        .filter(|r| {
            filter.mode == FilterMode::Keep
                || r.code != filter.code
                || filter.values.iter().any(|v| v == &r.comment)
        })
        .map(|r| AnnotationEvent {
            timestamp: r.tmu,
            electrode: cfg
                .codes
                .get(&r.code)
                .cloned()
                .unwrap_or_else(|| UNMAPPED_LABEL.to_string()),
            comment: r.comment.clone(),
        })
        .filter(|e| {
            cfg.electrodes_of_interest.is_empty()
                || cfg.electrodes_of_interest.contains(&e.electrode)
        })
        .collect();
    debug!("{} of {} rows kept after labelling", events.len(), records.len());
    events
}

/// Read a labelled table with `Tmu` and `Electrode` columns.
pub fn read_events(path: &Path) -> Result<Vec<AnnotationEvent>> {
    let delimiter = sniff_delimiter(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("reading annotations {}", path.display()))?;
    let idx = header_index(reader.headers()?);
    let tmu_col = column(&idx, "Tmu", path)?;
    let electrode_col = column(&idx, "Electrode", path)?;
    let comment_col = idx.get("comnt").copied();

    let mut events = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        events.push(AnnotationEvent {
            timestamp: parse_time(&record, tmu_col, i + 2)?,
            electrode: record.get(electrode_col).unwrap_or("").to_string(),
            comment: comment_col
                .and_then(|col| record.get(col))
                .unwrap_or("")
                .to_string(),
        });
    }
    Ok(events)
}

/// Write a labelled table (`Tmu,Electrode,Comnt`).
pub fn write_events(path: &Path, events: &[AnnotationEvent]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Tmu", "Electrode", "Comnt"])?;
    for e in events {
        writer.write_record([e.timestamp.to_string(), e.electrode.clone(), e.comment.clone()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Number of events per electrode, sorted by label.
pub fn count_by_electrode(events: &[AnnotationEvent]) -> Vec<(String, usize)> {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for e in events {
        *counts.entry(e.electrode.as_str()).or_default() += 1;
    }
    counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
