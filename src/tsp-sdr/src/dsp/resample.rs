// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Linear-interpolation resampler producing 16-bit PCM.
///
/// The output holds `round(n * to_rate / from_rate)` samples. Output sample
/// `k` sits at input position `k * from_rate / to_rate`; positions past the
/// last input clamp to the last input value. Matching rates only convert to
/// `i16` (rounded, saturating).
pub fn resample<T>(samples: &[T], from_rate: u32, to_rate: u32) -> Vec<i16>
where
    T: Copy + Into<f64>,
{
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return samples.iter().map(|&s| to_i16(s.into())).collect();
    }

    let n = samples.len();
    let out_len = (n as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    if out_len == 0 {
        return Vec::new();
    }

    let step = from_rate as f64 / to_rate as f64;
    let last = n - 1;
    let mut out = Vec::with_capacity(out_len);
    for k in 0..out_len {
        let pos = k as f64 * step;
        let idx = pos.floor() as usize;
        let value = if idx >= last {
            samples[last].into()
        } else {
            let frac = pos - idx as f64;
            let a: f64 = samples[idx].into();
            let b: f64 = samples[idx + 1].into();
            a + (b - a) * frac
        };
        out.push(to_i16(value));
    }
    out
}

fn to_i16(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn identity_when_rates_match() {
        let input: Vec<i16> = vec![0, 100, -100, i16::MAX, i16::MIN];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn identity_rounds_and_saturates_floats() {
        let input = [0.4_f32, -1.6, 40_000.0, -40_000.0];
        assert_eq!(
            resample(&input, 16_000, 16_000),
            vec![0, -2, i16::MAX, i16::MIN]
        );
    }

    #[test]
    fn output_length_is_rounded_ratio() {
        let input = vec![0_i16; 1000];
        assert_eq!(resample(&input, 48_000, 16_000).len(), 333);
        assert_eq!(resample(&input, 44_100, 16_000).len(), 363);
        assert_eq!(resample(&input, 8_000, 16_000).len(), 2000);
    }

    #[test]
    fn empty_cases() {
        assert!(resample::<i16>(&[], 48_000, 16_000).is_empty());
        assert!(resample(&[1_i16], 48_000, 16_000).is_empty());
        assert!(resample(&[1_i16, 2], 0, 16_000).is_empty());
        assert!(resample(&[1_i16, 2], 16_000, 0).is_empty());
    }

    #[test]
    fn upsampling_interpolates_and_clamps_tail() {
        let input = [0_i16, 100, 200];
        // positions 0, 0.5, 1, 1.5, 2, 2.5 (clamped)
        assert_eq!(
            resample(&input, 8_000, 16_000),
            vec![0, 50, 100, 150, 200, 200]
        );
    }

    #[test]
    fn round_trip_preserves_low_frequency_tone() {
        let input: Vec<i16> = (0..4800)
            .map(|n| (10_000.0 * (2.0 * PI * 100.0 * n as f64 / 48_000.0).sin()) as i16)
            .collect();
        let down = resample(&input, 48_000, 16_000);
        assert_eq!(down.len(), 1600);
        let up = resample(&down, 16_000, 48_000);
        assert_eq!(up.len(), input.len());

        // The last few samples are held at the final value; skip them.
        for (i, (&a, &b)) in input.iter().zip(up.iter()).take(input.len() - 4).enumerate() {
            assert!(
                (a as i32 - b as i32).abs() <= 5,
                "sample {}: {} vs {}",
                i,
                a,
                b
            );
        }
    }
}
