// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

use crate::dsp::{FilterState, FirFilter};

/// USB: sideband filter, then the real part.
pub(super) fn demod_usb(
    filter: &FirFilter,
    state: &mut FilterState,
    samples: &[Complex<f32>],
) -> Vec<f32> {
    filter
        .apply(state, samples)
        .into_iter()
        .map(|sample| sample.re)
        .collect()
}

/// LSB: conjugate to mirror the lower sideband up, then as USB.
pub(super) fn demod_lsb(
    filter: &FirFilter,
    state: &mut FilterState,
    samples: &[Complex<f32>],
) -> Vec<f32> {
    let mirrored: Vec<Complex<f32>> = samples.iter().map(|s| s.conj()).collect();
    demod_usb(filter, state, &mirrored)
}
