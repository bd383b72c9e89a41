//! Filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc band-pass and notch FIR design,
//!   matching `mne.filter.create_filter(fir_window='hamming', phase='zero')`.
//! - [`apply`]: [`ZeroPhaseFir`], a kernel planned once per signal length
//!   and run by FFT overlap-add, matching MNE's `_overlap_add_filter`.
//! - [`iir`]: causal Butterworth biquad used to smooth derivatives.

pub mod apply;
pub mod design;
pub mod iir;

pub use apply::{apply_fir_zero_phase, filter_1d, ZeroPhaseFir};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high, design_bandpass,
    design_notch, firwin, hamming,
};
pub use iir::Biquad;
