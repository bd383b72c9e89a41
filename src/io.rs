//! Safetensors I/O.
//!
//! Recordings travel between the batch steps as safetensors files holding:
//!
//! | key        | dtype     | shape    |
//! |------------|-----------|----------|
//! | `data`     | F32 / F64 | `[C, T]` |
//! | `sfreq`    | F32 / F64 | `[1]`    |
//! | `ch_names` | U8        | newline-joined UTF-8 |
//!
//! Onsets exported for other tools use `onsets` (F64 seconds) and
//! `descriptions` (U8, newline-joined labels).
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use ndarray::{s, Array2, ArrayView2};

use crate::annotation::AnnotationEvent;

// ── Low-level safetensors parser ─────────────────────────────────────────────

struct Entry {
    dtype: String,
    shape: Vec<usize>,
    start: usize,
    end: usize,
}

struct StFile {
    bytes: Vec<u8>,
    data_start: usize,
    entries: HashMap<String, Entry>,
}

fn as_usize(v: &serde_json::Value, what: &str) -> Result<usize> {
    v.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| anyhow!("{what} is not an unsigned integer"))
}

impl StFile {
    fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        ensure!(bytes.len() >= 8, "safetensors file too small: {}", path.display());
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let data_start = usize::try_from(u64::from_le_bytes(len))
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| anyhow!("truncated safetensors header: {}", path.display()))?;

        let header: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..data_start]).context("failed to parse safetensors header")?;

        let mut entries = HashMap::new();
        for (key, val) in &header {
            if key == "__metadata__" {
                continue;
            }
            let dtype = val["dtype"]
                .as_str()
                .ok_or_else(|| anyhow!("tensor '{key}' has no dtype"))?
                .to_string();
            let offsets = val["data_offsets"]
                .as_array()
                .ok_or_else(|| anyhow!("tensor '{key}' has no data_offsets"))?;
            ensure!(offsets.len() == 2, "tensor '{key}': malformed data_offsets");
            let shape = val["shape"]
                .as_array()
                .ok_or_else(|| anyhow!("tensor '{key}' has no shape"))?
                .iter()
                .map(|v| as_usize(v, "shape entry"))
                .collect::<Result<Vec<_>>>()?;
            let start = as_usize(&offsets[0], "offset")?;
            let end = as_usize(&offsets[1], "offset")?;
            let in_file = data_start.checked_add(end).is_some_and(|stop| stop <= bytes.len());
            ensure!(start <= end && in_file, "tensor '{key}' out of bounds");
            entries.insert(key.clone(), Entry { dtype, shape, start, end });
        }
        Ok(Self { bytes, data_start, entries })
    }

    fn entry(&self, key: &str) -> Result<&Entry> {
        self.entries.get(key).ok_or_else(|| anyhow!("missing '{key}' key"))
    }

    fn raw(&self, e: &Entry) -> &[u8] {
        &self.bytes[self.data_start + e.start..self.data_start + e.end]
    }

    /// Any float tensor as `f64`.
    fn floats(&self, key: &str) -> Result<(Vec<f64>, Vec<usize>)> {
        let e = self.entry(key)?;
        let raw = self.raw(e);
        let vals: Vec<f64> = match e.dtype.as_str() {
            "F32" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            other => bail!("tensor '{key}': unsupported dtype {other}"),
        };
        Ok((vals, e.shape.clone()))
    }

    /// Newline-joined UTF-8 strings stored as U8.
    fn lines(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(e) = self.entries.get(key) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(self.raw(e))
            .with_context(|| format!("tensor '{key}' is not UTF-8"))?;
        Ok(Some(
            text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect(),
        ))
    }
}

// ── Generic safetensors builder ──────────────────────────────────────────────

/// Simple safetensors file writer that handles F32, F64 and U8 tensors.
///
/// ```rust,no_run
/// use iedkit::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("onsets", &[1.0, 2.5], &[2]);
/// w.add_lines("descriptions", &["F8", "T4"]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: ArrayView2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Strings joined with `\n`, stored as a U8 tensor.
    pub fn add_lines<S: AsRef<str>>(&mut self, name: &str, lines: &[S]) {
        let joined = lines.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("\n");
        let bytes = joined.into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Recording ────────────────────────────────────────────────────────────────

/// A continuous multi-channel recording held in memory.
#[derive(Debug, Clone)]
pub struct Recording {
    /// `[C, T]` in original units.
    pub data: Array2<f64>,
    /// Sampling rate (Hz).
    pub sfreq: f64,
    /// One name per row of `data`.
    pub ch_names: Vec<String>,
}

impl Recording {
    pub fn new(data: Array2<f64>, sfreq: f64, ch_names: Vec<String>) -> Result<Self> {
        ensure!(sfreq.is_finite() && sfreq > 0.0, "sampling rate must be > 0, got {sfreq}");
        ensure!(
            ch_names.len() == data.nrows(),
            "{} channel names for {} channels",
            ch_names.len(),
            data.nrows()
        );
        Ok(Self { data, sfreq, ch_names })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let st = StFile::open(path)?;

        let (data_vec, shape) = st.floats("data")?;
        ensure!(shape.len() == 2, "'data' must be 2-D, got shape {shape:?}");
        let data = Array2::from_shape_vec((shape[0], shape[1]), data_vec)?;

        let (sfreq, _) = st.floats("sfreq")?;
        let sfreq = *sfreq.first().ok_or_else(|| anyhow!("empty 'sfreq'"))?;

        // Unnamed recordings get positional names.
        let ch_names = st
            .lines("ch_names")?
            .unwrap_or_else(|| (0..data.nrows()).map(|i| format!("ch{i}")).collect());

        Self::new(data, sfreq, ch_names)
            .with_context(|| format!("loading recording {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f64_arr2("data", self.data.view());
        w.add_f64("sfreq", &[self.sfreq], &[1]);
        w.add_lines("ch_names", &self.ch_names);
        w.write(path)
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Samples `[start, stop)` of every channel.
    pub fn slice(&self, start: usize, stop: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., start..stop])
    }
}

// ── Onsets ───────────────────────────────────────────────────────────────────

/// Export event onsets (seconds) and their electrode labels.
pub fn write_onsets(path: &Path, events: &[AnnotationEvent]) -> Result<()> {
    let onsets: Vec<f64> = events.iter().map(AnnotationEvent::seconds).collect();
    let labels: Vec<&str> = events.iter().map(|e| e.electrode.as_str()).collect();
    let mut w = StWriter::new();
    w.add_f64("onsets", &onsets, &[onsets.len()]);
    w.add_lines("descriptions", &labels);
    w.write(path)
}

/// Read onsets (seconds) written by [`write_onsets`].
pub fn read_onsets(path: &Path) -> Result<Vec<f64>> {
    let st = StFile::open(path)?;
    let (onsets, _) = st.floats("onsets")?;
    Ok(onsets)
}
