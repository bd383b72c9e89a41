//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! Every filter is a Hamming-windowed sinc of odd length with MNE's automatic
//! transition bandwidths:
//!   • low edge  : `min(max(0.25 · l_freq, 2.0), l_freq)`
//!   • high edge : `min(max(0.25 · h_freq, 2.0), nyquist − h_freq)`
//!   • length N  : `ceil(3.3 / min(trans_bw) · sfreq)`, rounded to odd
//!
//! Band-pass and band-stop kernels are built as differences of two
//! unit-DC-gain low-passes of the same length.
use std::f64::consts::PI;

use crate::config::ConfigError;

/// Transition bandwidth of the notch edges, in Hz (MNE default).
pub const NOTCH_TRANS_BW: f64 = 1.0;

/// MNE-compatible transition bandwidth for a highpass edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE-compatible transition bandwidth for a lowpass edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), nyquist - h_freq)`
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase band-pass FIR between `l_freq` and `h_freq`.
///
/// Each `-6 dB` point sits in the middle of its transition band, as in
/// `mne.filter.create_filter(l_freq, h_freq, fir_design='firwin')`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>, ConfigError> {
    let nyquist = sfreq / 2.0;
    if !(l_freq > 0.0 && l_freq < h_freq) {
        return Err(ConfigError::InvalidBand { low: l_freq, high: h_freq });
    }
    if h_freq >= nyquist {
        return Err(ConfigError::CutoffOutOfRange { cutoff: h_freq, nyquist });
    }
    let l_trans = auto_trans_bandwidth(l_freq);
    let h_trans = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);

    let lp_high = firwin(n, h_freq + h_trans / 2.0, sfreq);
    let lp_low = firwin(n, l_freq - l_trans / 2.0, sfreq);
    Ok(lp_high.iter().zip(&lp_low).map(|(h, l)| h - l).collect())
}

/// Design a zero-phase notch (band-stop) FIR at `freq`.
///
/// Stop band width is `freq / 200` (MNE's default `notch_widths`), with
/// [`NOTCH_TRANS_BW`] transition bands on each side.
pub fn design_notch(freq: f64, sfreq: f64) -> Result<Vec<f64>, ConfigError> {
    let nyquist = sfreq / 2.0;
    let half_width = freq / 200.0 / 2.0;
    let lo = freq - half_width - NOTCH_TRANS_BW / 2.0;
    let hi = freq + half_width + NOTCH_TRANS_BW / 2.0;
    if lo <= 0.0 || hi >= nyquist {
        return Err(ConfigError::CutoffOutOfRange { cutoff: freq, nyquist });
    }
    let n = auto_filter_length(NOTCH_TRANS_BW, sfreq);

    // band-stop = delta − band-pass
    let lp_hi = firwin(n, hi, sfreq);
    let lp_lo = firwin(n, lo, sfreq);
    let mut h: Vec<f64> = lp_hi.iter().zip(&lp_lo).map(|(a, b)| -(a - b)).collect();
    h[n / 2] += 1.0;
    Ok(h)
}

/// Design a lowpass FIR filter using a Hamming-windowed sinc.
///
/// `cutoff_hz` is the -6 dB point.  The kernel is normalised to unit DC gain.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);   // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
