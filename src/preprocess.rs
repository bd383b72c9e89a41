//! Recording clean-up: channel picking, notch and band-pass filtering.
//!
//! ```text
//! raw.safetensors
//!   │
//!   ├─ pick_channels     keep the configured montage (those present)
//!   ├─ notch             band-stop FIR at the powerline frequency
//!   └─ band-pass         l_freq … h_freq FIR, zero-phase overlap-add
//!        │
//!        └─→ <stem>_clean.safetensors
//! ```
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use log::{info, warn};
use ndarray::{Array2, Axis};

use crate::config::PreprocessConfig;
use crate::filter::{design_bandpass, design_notch, ZeroPhaseFir};
use crate::io::Recording;

/// Extension of recording files picked up by [`run_batch`].
pub const RECORDING_EXT: &str = "safetensors";

/// Keep the `wanted` channels present in `rec`, in recording order.
///
/// Name matching ignores case and spaces (`"fp 1"` matches `"Fp1"`).
pub fn pick_channels(rec: &Recording, wanted: &[String]) -> Result<Recording> {
    let norm = |s: &str| s.replace(' ', "").to_lowercase();
    let wanted: Vec<String> = wanted.iter().map(|w| norm(w)).collect();
    let keep: Vec<usize> = rec
        .ch_names
        .iter()
        .enumerate()
        .filter(|(_, name)| wanted.contains(&norm(name)))
        .map(|(i, _)| i)
        .collect();
    ensure!(!keep.is_empty(), "none of the requested channels is in the recording");
    if keep.len() < wanted.len() {
        warn!("{} of {} requested channels present", keep.len(), wanted.len());
    }
    let data: Array2<f64> = rec.data.select(Axis(0), &keep);
    let names = keep.iter().map(|&i| rec.ch_names[i].clone()).collect();
    Recording::new(data, rec.sfreq, names)
}

/// Pick channels, then notch and band-pass filter.
pub fn preprocess_recording(rec: &Recording, cfg: &PreprocessConfig) -> Result<Recording> {
    let mut out = if cfg.channels.is_empty() {
        rec.clone()
    } else {
        pick_channels(rec, &cfg.channels)?
    };
    let n_times = out.data.ncols();
    if let Some(freq) = cfg.notch_freq {
        ZeroPhaseFir::new(&design_notch(freq, out.sfreq)?, n_times)?.apply_rows(&mut out.data)?;
    }
    ZeroPhaseFir::new(&design_bandpass(cfg.l_freq, cfg.h_freq, out.sfreq)?, n_times)?
        .apply_rows(&mut out.data)?;
    Ok(out)
}

/// What happened to one input of [`run_batch`].
#[derive(Debug)]
pub enum FileOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Failed(PathBuf, anyhow::Error),
}

/// `<output_dir>/<stem>_clean.safetensors`.
pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    output_dir.join(format!("{stem}_clean.{RECORDING_EXT}"))
}

/// Recording files to process: `input` itself, or the recordings inside the
/// directory `input` (sorted by name).
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    let is_recording = |p: &Path| p.extension().is_some_and(|e| e == RECORDING_EXT);
    if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("listing {}", input.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_recording(p))
            .collect();
        files.sort();
        Ok(files)
    } else if is_recording(input) {
        Ok(vec![input.to_path_buf()])
    } else {
        bail!(
            "input must be a .{RECORDING_EXT} file or a directory containing some: {}",
            input.display()
        )
    }
}

/// Preprocess every recording under `input`.
///
/// Existing outputs are kept unless `cfg.overwrite`.  A file that fails is
/// logged and reported; the batch goes on.
pub fn run_batch(input: &Path, output_dir: &Path, cfg: &PreprocessConfig) -> Result<Vec<FileOutcome>> {
    let inputs = collect_inputs(input)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut outcomes = Vec::with_capacity(inputs.len());
    for path in inputs {
        let out = output_path(&path, output_dir);
        if out.exists() && !cfg.overwrite {
            info!("{} exists, skipped (overwrite disabled)", out.display());
            outcomes.push(FileOutcome::Skipped(out));
            continue;
        }
        info!("processing {}", path.display());
        let result = Recording::load(&path)
            .and_then(|rec| preprocess_recording(&rec, cfg))
            .and_then(|clean| clean.save(&out));
        match result {
            Ok(()) => outcomes.push(FileOutcome::Written(out)),
            Err(e) => {
                warn!("error processing {}: {e:#}", path.display());
                outcomes.push(FileOutcome::Failed(path, e));
            }
        }
    }
    Ok(outcomes)
}
