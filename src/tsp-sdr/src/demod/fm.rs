// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::{PI, TAU};

use num_complex::Complex;

use crate::dsp::{FilterState, FirFilter};

/// Peak deviation that maps to unit discriminator output (Hz).
pub const FM_DEVIATION_HZ: f32 = 2_500.0;

/// Phase of the last FM sample of the previous block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhaseState {
    last_phase: f32,
}

impl PhaseState {
    pub fn last_phase(&self) -> f32 {
        self.last_phase
    }
}

/// Discriminator gain turning radians/sample into units of [`FM_DEVIATION_HZ`].
pub(super) fn fm_scale(sample_rate: u32) -> f32 {
    sample_rate as f32 / (TAU * FM_DEVIATION_HZ)
}

/// Wrap a phase difference into `[-π, π)`.
#[inline]
fn wrap_phase(delta: f32) -> f32 {
    (delta + PI).rem_euclid(TAU) - PI
}

/// Phase-difference discriminator.
///
/// The first difference of each block is taken against the phase carried in
/// `phase`, so splitting a stream at any point gives the same output as
/// processing it whole.
pub(super) fn discriminate(
    filtered: &[Complex<f32>],
    phase: &mut PhaseState,
    scale: f32,
) -> Vec<f32> {
    let mut prev = phase.last_phase;
    let mut output = Vec::with_capacity(filtered.len());
    for sample in filtered {
        let current = sample.im.atan2(sample.re);
        output.push(wrap_phase(current - prev) * scale);
        prev = current;
    }
    phase.last_phase = prev;
    output
}

/// Narrow-band FM: channel filter, then the discriminator.
pub(super) fn demod_fm(
    filter: &FirFilter,
    filter_state: &mut FilterState,
    phase: &mut PhaseState,
    scale: f32,
    samples: &[Complex<f32>],
) -> Vec<f32> {
    let filtered = filter.apply(filter_state, samples);
    discriminate(&filtered, phase, scale)
}
