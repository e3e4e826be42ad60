// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample-level DSP building blocks: FIR low-pass bank, integer decimation
//! and the linear resampler.

pub mod filter;
pub mod resample;

pub use filter::{design_lowpass, FilterState, FirFilter};
pub use resample::resample;

/// Cutoff of the sideband filter used by USB/LSB (Hz).
pub const SSB_CUTOFF_HZ: f32 = 3_000.0;
pub const SSB_TAPS: usize = 64;

/// Cutoff of the channel filter ahead of the FM discriminator (Hz).
pub const FM_CUTOFF_HZ: f32 = 6_000.0;
pub const FM_TAPS: usize = 128;

/// Keep samples `0, d, 2d, ...` of every complete group of `factor`.
///
/// A trailing partial group is discarded, so the output holds `⌊N / factor⌋`
/// samples. A factor of 0 or 1 passes the input through.
pub fn decimate<T: Copy>(input: &[T], factor: usize) -> Vec<T> {
    if factor <= 1 {
        return input.to_vec();
    }
    input.chunks_exact(factor).map(|group| group[0]).collect()
}
