//! Causal 2nd-order IIR (biquad) filtering.
//!
//! The Butterworth low-pass uses the bilinear transform with the cut-off
//! pre-warped, which gives the same coefficients as
//! `scipy.signal.butter(2, cutoff / nyquist)`.  [`Biquad::filter`] runs from
//! zero initial state like `scipy.signal.lfilter(b, a, x)`.
use std::f64::consts::{PI, SQRT_2};

use crate::config::ConfigError;

/// Normalised biquad coefficients (`a0 = 1`):
///
/// `y[n] = b0·x[n] + b1·x[n-1] + b2·x[n-2] − a1·y[n-1] − a2·y[n-2]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// 2nd-order Butterworth low-pass.
    ///
    /// # Errors
    ///
    /// The cut-off must lie strictly between 0 and Nyquist.
    pub fn butterworth_lowpass(sfreq: f64, cutoff: f64) -> Result<Self, ConfigError> {
        let nyquist = sfreq / 2.0;
        if !(cutoff > 0.0 && cutoff < nyquist) {
            return Err(ConfigError::CutoffOutOfRange { cutoff, nyquist });
        }
        let omega = 2.0 * PI * cutoff / sfreq;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / SQRT_2; // Q = 1/√2

        let a0 = 1.0 + alpha;
        let b0 = (1.0 - cos_w) / 2.0;
        Ok(Self {
            b0: b0 / a0,
            b1: 2.0 * b0 / a0,
            b2: b0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// Filter `x` causally from zero state (Direct Form I).
    pub fn filter(&self, x: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        x.iter()
            .map(|&x0| {
                let y0 = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x0;
                y2 = y1;
                y1 = y0;
                y0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_scipy_butter() {
        // scipy.signal.butter(2, 80 / 256) at fs = 512
        let bq = Biquad::butterworth_lowpass(512.0, 80.0).unwrap();
        approx::assert_abs_diff_eq!(bq.b0, 0.139_939_3, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(bq.b1, 0.279_878_6, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(bq.a1, -0.699_738_0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(bq.a2, 0.259_495_2, epsilon = 1e-6);
    }

    #[test]
    fn unit_dc_gain() {
        let bq = Biquad::butterworth_lowpass(256.0, 40.0).unwrap();
        let y = bq.filter(&vec![1.0; 500]);
        approx::assert_abs_diff_eq!(y[499], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn causal_from_zero_state() {
        let bq = Biquad::butterworth_lowpass(256.0, 40.0).unwrap();
        let mut x = vec![0.0; 10];
        x[5] = 1.0;
        let y = bq.filter(&x);
        assert!(y[..5].iter().all(|&v| v == 0.0));
        approx::assert_abs_diff_eq!(y[5], bq.b0, epsilon = 1e-15);
    }

    #[test]
    fn cutoff_must_be_below_nyquist() {
        assert!(Biquad::butterworth_lowpass(160.0, 80.0).is_err());
        assert!(Biquad::butterworth_lowpass(256.0, 0.0).is_err());
    }
}
