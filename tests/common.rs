/// Shared helpers for synthetic recordings and annotation sets.
use iedkit::{AnnotationEvent, Recording};
use ndarray::Array2;

#[allow(unused)]
pub const SFREQ: f64 = 512.0;

/// Triangle of height `amplitude` peaking at sample `centre`, reaching zero
/// `half_base` samples either side.
#[allow(unused)]
pub fn triangle(n: usize, centre: usize, amplitude: f64, half_base: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let d = (i as f64 - centre as f64).abs() / half_base as f64;
            amplitude * (1.0 - d).max(0.0)
        })
        .collect()
}

/// `[C, T]` recording; every channel in `spiking` carries a triangle of
/// `amplitude` at each of `centres_sec`, the others are flat.
#[allow(unused)]
pub fn spike_recording(
    ch_names: &[&str],
    spiking: &[&str],
    duration_sec: f64,
    centres_sec: &[f64],
    amplitude: f64,
) -> Recording {
    let n = (duration_sec * SFREQ) as usize;
    let mut data = Array2::<f64>::zeros((ch_names.len(), n));
    for (c, name) in ch_names.iter().enumerate() {
        if !spiking.contains(name) {
            continue;
        }
        for &t in centres_sec {
            let pulse = triangle(n, (t * SFREQ).round() as usize, amplitude, 10);
            for (dst, v) in data.row_mut(c).iter_mut().zip(pulse) {
                *dst += v;
            }
        }
    }
    Recording::new(data, SFREQ, ch_names.iter().map(|s| s.to_string()).collect()).unwrap()
}

/// Events from `(timestamp, label)` pairs.
#[allow(unused)]
pub fn events(spec: &[(f64, &str)]) -> Vec<AnnotationEvent> {
    spec.iter().map(|&(t, l)| AnnotationEvent::new(t, l)).collect()
}

/// Sine of `freq` Hz, `n` samples at `sfreq`.
#[allow(unused)]
pub fn sine(freq: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sfreq).sin())
        .collect()
}

/// RMS of a slice.
#[allow(unused)]
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}
