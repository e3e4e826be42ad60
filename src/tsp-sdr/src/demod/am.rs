// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// AM envelope detector: magnitude of IQ.
pub(super) fn demod_am(samples: &[Complex<f32>]) -> Vec<f32> {
    samples.iter().map(|sample| sample.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::demod_am;
    use num_complex::Complex;

    #[test]
    fn magnitude_of_iq() {
        let input = vec![
            Complex::new(0.0_f32, 0.0),
            Complex::new(3.0, 4.0),
            Complex::new(-1.0, 0.0),
            Complex::new(0.0, -2.0),
        ];
        assert_eq!(demod_am(&input), vec![0.0, 5.0, 1.0, 2.0]);
    }
}
