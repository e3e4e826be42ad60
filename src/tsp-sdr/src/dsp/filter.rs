// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;

use num_complex::Complex;

/// Normalised sinc: `sin(πx) / (πx)`, 1 at the origin.
fn sinc(x: f32) -> f32 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Windowed-sinc low-pass design (Hamming window), normalised to unity DC gain.
///
/// `cutoff_hz / sample_rate` is the normalised cutoff; `taps` must be at least 1.
pub fn design_lowpass(cutoff_hz: f32, sample_rate: f32, taps: usize) -> Vec<f32> {
    assert!(taps >= 1, "FIR filter must have at least 1 tap");
    let fc = cutoff_hz / sample_rate;
    let m = (taps - 1) as f32;
    let mut coeffs = Vec::with_capacity(taps);
    for i in 0..taps {
        let x = i as f32 - m / 2.0;
        let window = if taps == 1 {
            1.0
        } else {
            0.54 - 0.46 * (2.0 * PI * i as f32 / m).cos()
        };
        coeffs.push(sinc(2.0 * fc * x) * window);
    }
    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        let inv = 1.0 / sum;
        for coeff in &mut coeffs {
            *coeff *= inv;
        }
    }
    coeffs
}

/// History carried between calls to [`FirFilter::apply`]: the last
/// `taps - 1` input samples.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    history: Vec<Complex<f32>>,
}

impl FilterState {
    /// All-zero history for a filter with `taps` coefficients.
    pub fn zeroed(taps: usize) -> Self {
        Self {
            history: vec![Complex::new(0.0, 0.0); taps.saturating_sub(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn as_slice(&self) -> &[Complex<f32>] {
        &self.history
    }
}

/// Time-domain FIR low-pass with real coefficients, applied to complex samples.
///
/// The coefficients are immutable; the per-stream history lives in a
/// [`FilterState`] owned by the caller, so filtering a stream chunk by chunk
/// gives exactly the same output as filtering it in one pass.
#[derive(Debug, Clone)]
pub struct FirFilter {
    coeffs: Vec<f32>,
}

impl FirFilter {
    pub fn lowpass(cutoff_hz: f32, sample_rate: f32, taps: usize) -> Self {
        Self {
            coeffs: design_lowpass(cutoff_hz, sample_rate, taps),
        }
    }

    pub fn from_coeffs(coeffs: Vec<f32>) -> Self {
        assert!(!coeffs.is_empty(), "FIR filter must have at least 1 tap");
        Self { coeffs }
    }

    pub fn taps(&self) -> usize {
        self.coeffs.len()
    }

    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    /// Fresh zero history sized for this filter.
    pub fn initial_state(&self) -> FilterState {
        FilterState::zeroed(self.coeffs.len())
    }

    /// Valid-mode convolution of `state ++ input` with the coefficients.
    ///
    /// Returns one output per input sample and replaces `state` with the
    /// trailing `taps - 1` samples of the extended input.
    pub fn apply(&self, state: &mut FilterState, input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let n_hist = self.coeffs.len() - 1;
        debug_assert_eq!(
            state.history.len(),
            n_hist,
            "filter state belongs to a filter with a different tap count"
        );
        if input.is_empty() {
            return Vec::new();
        }

        let mut extended = Vec::with_capacity(n_hist + input.len());
        extended.extend_from_slice(&state.history);
        extended.extend_from_slice(input);

        let mut output = Vec::with_capacity(input.len());
        for k in 0..input.len() {
            // ext[k + n_hist] is the newest sample under the window.
            let newest = k + n_hist;
            let mut acc = Complex::new(0.0_f32, 0.0_f32);
            for (j, &h) in self.coeffs.iter().enumerate() {
                acc += extended[newest - j] * h;
            }
            output.push(acc);
        }

        state.history.clear();
        state
            .history
            .extend_from_slice(&extended[extended.len() - n_hist..]);
        output
    }
}
