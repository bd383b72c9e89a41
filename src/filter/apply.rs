//! Zero-phase FIR filtering by FFT overlap-add (MNE's `_overlap_add_filter`).
//!
//! The output is the causal convolution advanced by `(N-1)/2` samples, not a
//! forward-backward pass. Each side of the signal is extended by `N-1`
//! samples of point-symmetric reflection before convolving.
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// An odd-length FIR kernel planned for signals of one length.
///
/// The kernel spectrum and both FFT plans are built once, so filtering every
/// channel of a recording reuses them.
pub struct ZeroPhaseFir {
    taps_fft: Vec<Complex<f64>>,
    n_taps: usize,
    n_times: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl ZeroPhaseFir {
    /// Plan `taps` for signals of `n_times` samples.
    pub fn new(taps: &[f64], n_times: usize) -> Result<Self> {
        let n_taps = taps.len();
        ensure!(n_taps % 2 == 1, "zero-phase FIR needs an odd number of taps, got {n_taps}");

        let n_ext = n_times + 2 * (n_taps - 1);
        let block = block_len(n_taps, n_ext);

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(block);
        let inverse = planner.plan_fft_inverse(block);

        let mut taps_fft = to_complex(taps, block);
        forward.process(&mut taps_fft);

        Ok(Self { taps_fft, n_taps, n_times, forward, inverse })
    }

    pub fn n_times(&self) -> usize {
        self.n_times
    }

    /// FFT block length chosen for this plan.
    pub fn block_len(&self) -> usize {
        self.taps_fft.len()
    }

    /// Filter one signal of the planned length.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>> {
        ensure!(
            x.len() == self.n_times,
            "filter planned for {} samples, got {}",
            self.n_times,
            x.len()
        );
        if x.is_empty() {
            return Ok(Vec::new());
        }

        let pad = self.n_taps - 1;
        let shift = pad / 2;
        let ext = edge_extend(x, pad);
        let block = self.block_len();
        let hop = block - self.n_taps + 1;
        let scale = 1.0 / block as f64;

        // full-convolution index `k` lands on output `k - lead` when inside [0, n_times)
        let lead = shift + pad;
        let mut y = vec![0.0_f64; self.n_times];

        for start in (0..ext.len()).step_by(hop) {
            let stop = (start + hop).min(ext.len());
            let mut buf = to_complex(&ext[start..stop], block);
            self.forward.process(&mut buf);
            for (b, &t) in buf.iter_mut().zip(&self.taps_fft) {
                *b *= t;
            }
            self.inverse.process(&mut buf);

            for (p, v) in buf.iter().enumerate() {
                if let Some(o) = (start + p).checked_sub(lead).filter(|&o| o < self.n_times) {
                    y[o] += v.re * scale;
                }
            }
        }
        Ok(y)
    }

    /// Filter every row of a `[C, T]` matrix in place.
    pub fn apply_rows(&self, data: &mut Array2<f64>) -> Result<()> {
        for mut row in data.rows_mut() {
            let y = self.apply(&row.to_vec())?;
            for (dst, v) in row.iter_mut().zip(y) {
                *dst = v;
            }
        }
        Ok(())
    }
}

/// Filter each channel of `data` ([C, T]) in place with one shared plan.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    ZeroPhaseFir::new(h, data.ncols())?.apply_rows(data)
}

/// Filter a single signal; the output has the length of `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    ZeroPhaseFir::new(h, x.len())?.apply(x)
}

/// `x` with `pad` samples added on each side, reflected through the end
/// points (`2*x[0] - x[k]` on the left). Positions further out than the
/// signal can reflect are zero (MNE's `_smart_pad`).
fn edge_extend(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];
    let left = (1..=pad).rev().map(|k| if k < n { 2.0 * first - x[k] } else { 0.0 });
    let right = (1..=pad).map(|k| if k < n { 2.0 * last - x[n - 1 - k] } else { 0.0 });
    left.chain(x.iter().copied()).chain(right).collect()
}

/// Power-of-two block length with the lowest MNE cost,
/// `ceil(n_x / (N - n_h + 1)) * N * (log2(N) + 1) + 4e-5 * N * n_x`.
/// Ties go to the shorter block.
fn block_len(n_h: usize, n_x: usize) -> usize {
    let min_pow = ((2 * n_h - 1) as f64).log2().ceil() as u32;
    let max_pow = ((n_x as f64).log2().ceil() as u32 + 1).max(min_pow);
    let cost = |pow: u32| {
        let n = (1_usize << pow) as f64;
        let hop = n - n_h as f64 + 1.0;
        (n_x as f64 / hop).ceil() * n * (pow as f64 + 1.0) + 4e-5 * n * n_x as f64
    };
    let best = (min_pow..=max_pow).min_by(|&a, &b| cost(a).total_cmp(&cost(b))).unwrap_or(min_pow);
    1 << best
}

/// Real samples as complex, zero-padded to `len`.
fn to_complex(x: &[f64], len: usize) -> Vec<Complex<f64>> {
    let mut buf = vec![Complex::default(); len];
    for (b, &v) in buf.iter_mut().zip(x) {
        b.re = v;
    }
    buf
}
