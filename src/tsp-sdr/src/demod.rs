// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ to 16-bit PCM: per-mode demodulation, integer decimation and level
//! normalisation.

mod am;
mod fm;
mod ssb;

use num_complex::Complex;
use tsp_core::{AudioBlock, ConfigError, DemodMode, SourceConfig};

use crate::dsp::{self, FilterState, FirFilter};

pub use fm::{PhaseState, FM_DEVIATION_HZ};

/// Fraction of full scale the block peak is normalised to.
const PEAK_LEVEL: f64 = 0.8;
const FULL_SCALE: f64 = 32_767.0;

/// Per-stream state carried from one block to the next.
///
/// Starts zeroed and belongs to exactly one [`Demodulator`].
#[derive(Debug, Clone, PartialEq)]
pub struct DemodState {
    pub fm_filter: FilterState,
    pub ssb_filter: FilterState,
    pub phase: PhaseState,
}

/// Demodulator for one configured source.
///
/// Holds only immutable configuration (mode, rates, filter coefficients);
/// all history is threaded through a [`DemodState`].
#[derive(Debug, Clone)]
pub struct Demodulator {
    mode: DemodMode,
    sample_rate: u32,
    target_rate: u32,
    decimation: usize,
    fm_scale: f32,
    fm_filter: FirFilter,
    ssb_filter: FirFilter,
}

impl Demodulator {
    /// Build a demodulator converting `sample_rate` IQ into `target_rate` PCM.
    ///
    /// The rate ratio must be a positive integer.
    pub fn new(mode: DemodMode, sample_rate: u32, target_rate: u32) -> Result<Self, ConfigError> {
        if target_rate == 0 {
            return Err(ConfigError::MissingField("target_rate"));
        }
        if sample_rate == 0 || sample_rate % target_rate != 0 {
            return Err(ConfigError::NonIntegralDecimation {
                sample_rate,
                target_rate,
            });
        }
        let rate = sample_rate as f32;
        Ok(Self {
            mode,
            sample_rate,
            target_rate,
            decimation: (sample_rate / target_rate) as usize,
            fm_scale: fm::fm_scale(sample_rate),
            fm_filter: FirFilter::lowpass(dsp::FM_CUTOFF_HZ, rate, dsp::FM_TAPS),
            ssb_filter: FirFilter::lowpass(dsp::SSB_CUTOFF_HZ, rate, dsp::SSB_TAPS),
        })
    }

    pub fn for_config(config: &SourceConfig, target_rate: u32) -> Result<Self, ConfigError> {
        config.validate(target_rate)?;
        Self::new(config.mode, config.sample_rate, target_rate)
    }

    pub fn mode(&self) -> DemodMode {
        self.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    pub fn new_state(&self) -> DemodState {
        DemodState {
            fm_filter: self.fm_filter.initial_state(),
            ssb_filter: self.ssb_filter.initial_state(),
            phase: PhaseState::default(),
        }
    }

    /// Demodulate one block of IQ captured at [`Self::sample_rate`].
    ///
    /// Produces `⌊len / decimation⌋` samples at [`Self::target_rate`].
    pub fn demodulate(&self, state: &mut DemodState, samples: &[Complex<f32>]) -> AudioBlock {
        if samples.is_empty() {
            return AudioBlock::new(Vec::new(), self.target_rate);
        }
        let baseband = match self.mode {
            DemodMode::Fm => fm::demod_fm(
                &self.fm_filter,
                &mut state.fm_filter,
                &mut state.phase,
                self.fm_scale,
                samples,
            ),
            DemodMode::Am => am::demod_am(samples),
            DemodMode::Usb => ssb::demod_usb(&self.ssb_filter, &mut state.ssb_filter, samples),
            DemodMode::Lsb => ssb::demod_lsb(&self.ssb_filter, &mut state.ssb_filter, samples),
        };
        AudioBlock::new(to_pcm(&baseband, self.decimation), self.target_rate)
    }
}

/// Decimate, remove the block mean, normalise the peak and quantise.
///
/// A block whose peak is zero after mean removal is emitted as silence.
/// Quantisation truncates toward zero.
fn to_pcm(baseband: &[f32], decimation: usize) -> Vec<i16> {
    let decimated = dsp::decimate(baseband, decimation);
    if decimated.is_empty() {
        return Vec::new();
    }
    let mean = decimated.iter().map(|&s| s as f64).sum::<f64>() / decimated.len() as f64;
    let peak = decimated
        .iter()
        .map(|&s| (s as f64 - mean).abs())
        .fold(0.0_f64, f64::max);
    let gain = if peak > 0.0 { PEAK_LEVEL / peak } else { 1.0 };
    decimated
        .iter()
        .map(|&s| ((s as f64 - mean) * gain * FULL_SCALE) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;
    use std::f32::consts::TAU;
    use tsp_core::TARGET_SAMPLE_RATE;

    const RAW_RATE: u32 = 256_000;
    const BLOCK: usize = 65_536;
    const TONE_HZ: f32 = 1_000.0;

    /// Frequency of the strongest non-DC bin.
    fn dominant_freq(samples: &[i16], rate: u32) -> f32 {
        let n = samples.len();
        let mut buf: Vec<rustfft::num_complex::Complex<f32>> = samples
            .iter()
            .map(|&s| rustfft::num_complex::Complex::new(s as f32, 0.0))
            .collect();
        FftPlanner::<f32>::new().plan_fft_forward(n).process(&mut buf);
        let (bin, _) = buf[1..n / 2]
            .iter()
            .enumerate()
            .map(|(i, c)| (i + 1, c.norm()))
            .fold((0, 0.0_f32), |best, cur| if cur.1 > best.1 { cur } else { best });
        bin as f32 * rate as f32 / n as f32
    }

    fn assert_near_tone(freq: f32, label: &str) {
        assert!(
            (freq - TONE_HZ).abs() <= TONE_HZ * 0.05,
            "{}: dominant {} Hz, expected ~{} Hz",
            label,
            freq,
            TONE_HZ
        );
    }

    /// Run two consecutive blocks and return the second block's audio.
    fn second_block(mode: DemodMode, signal: impl Fn(usize) -> Complex<f32>) -> AudioBlock {
        let demod = Demodulator::new(mode, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
        let mut state = demod.new_state();
        let first: Vec<Complex<f32>> = (0..BLOCK).map(&signal).collect();
        let second: Vec<Complex<f32>> = (BLOCK..2 * BLOCK).map(&signal).collect();
        demod.demodulate(&mut state, &first);
        demod.demodulate(&mut state, &second)
    }

    fn t(n: usize) -> f32 {
        n as f32 / RAW_RATE as f32
    }

    #[test]
    fn rejects_fractional_ratio() {
        assert!(matches!(
            Demodulator::new(DemodMode::Fm, 250_000, TARGET_SAMPLE_RATE),
            Err(ConfigError::NonIntegralDecimation { .. })
        ));
        assert!(Demodulator::new(DemodMode::Fm, 0, TARGET_SAMPLE_RATE).is_err());
        let ok = Demodulator::new(DemodMode::Am, 960_000, TARGET_SAMPLE_RATE).unwrap();
        assert_eq!(ok.decimation(), 60);
    }

    #[test]
    fn output_length_is_floor_of_decimation() {
        let demod = Demodulator::new(DemodMode::Am, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
        let mut state = demod.new_state();
        let input = vec![Complex::new(0.5_f32, 0.5); 4096];
        assert_eq!(demod.demodulate(&mut state, &input).len(), 256);
        let input = vec![Complex::new(0.5_f32, 0.5); 4100];
        let block = demod.demodulate(&mut state, &input);
        assert_eq!(block.len(), 256);
        assert_eq!(block.sample_rate, TARGET_SAMPLE_RATE);
    }

    #[test]
    fn empty_input_gives_empty_block() {
        let demod = Demodulator::new(DemodMode::Usb, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
        let mut state = demod.new_state();
        let before = state.clone();
        assert!(demod.demodulate(&mut state, &[]).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn zero_input_is_silence_in_every_mode() {
        for mode in [DemodMode::Fm, DemodMode::Am, DemodMode::Usb, DemodMode::Lsb] {
            let demod = Demodulator::new(mode, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
            let mut state = demod.new_state();
            let block = demod.demodulate(&mut state, &vec![Complex::new(0.0, 0.0); 4096]);
            assert_eq!(block.len(), 256, "{mode}");
            assert!(block.samples.iter().all(|&s| s == 0), "{mode} not silent");
        }
    }

    #[test]
    fn pcm_peak_is_eighty_percent_of_full_scale() {
        let pcm = to_pcm(&[1.0, -1.0, 0.5, -0.5], 1);
        assert_eq!(pcm, vec![26_213, -26_213, 13_106, -13_106]);
    }

    #[test]
    fn pcm_removes_mean() {
        let pcm = to_pcm(&[3.0, 5.0, 3.0, 5.0], 1);
        assert_eq!(pcm, vec![-26_213, 26_213, -26_213, 26_213]);
    }

    #[test]
    fn fm_tone_end_to_end() {
        // 1 kHz tone at 2.5 kHz deviation: modulation index 2.5.
        let block = second_block(DemodMode::Fm, |n| {
            let beta = FM_DEVIATION_HZ / TONE_HZ;
            Complex::from_polar(1.0, beta * (TAU * TONE_HZ * t(n)).sin())
        });
        assert_eq!(block.len(), BLOCK / 16);
        assert_near_tone(dominant_freq(&block.samples, TARGET_SAMPLE_RATE), "FM");
        let peak = block.samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        assert!(peak > 20_000, "FM peak {}", peak);
    }

    #[test]
    fn am_tone_end_to_end() {
        let block = second_block(DemodMode::Am, |n| {
            Complex::new(1.0 + 0.5 * (TAU * TONE_HZ * t(n)).cos(), 0.0)
        });
        assert_near_tone(dominant_freq(&block.samples, TARGET_SAMPLE_RATE), "AM");
    }

    #[test]
    fn usb_tone_end_to_end() {
        let block = second_block(DemodMode::Usb, |n| {
            Complex::from_polar(1.0, TAU * TONE_HZ * t(n))
        });
        assert_near_tone(dominant_freq(&block.samples, TARGET_SAMPLE_RATE), "USB");
    }

    #[test]
    fn lsb_tone_end_to_end() {
        let block = second_block(DemodMode::Lsb, |n| {
            Complex::from_polar(1.0, -TAU * TONE_HZ * t(n))
        });
        assert_near_tone(dominant_freq(&block.samples, TARGET_SAMPLE_RATE), "LSB");
    }

    #[test]
    fn opposite_sideband_tone_is_mirrored() {
        // Real-part detection has no image rejection.
        let usb = second_block(DemodMode::Usb, |n| {
            Complex::from_polar(1.0, -TAU * TONE_HZ * t(n))
        });
        assert_near_tone(dominant_freq(&usb.samples, TARGET_SAMPLE_RATE), "USB image");
        let lsb = second_block(DemodMode::Lsb, |n| {
            Complex::from_polar(1.0, TAU * TONE_HZ * t(n))
        });
        assert_near_tone(dominant_freq(&lsb.samples, TARGET_SAMPLE_RATE), "LSB image");
        let peak = usb.samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        assert!(peak > 20_000, "USB image peak {}", peak);
    }

    #[test]
    fn sideband_filter_rejects_out_of_band_tone() {
        // 20 kHz above the carrier is outside the 3 kHz sideband filter.
        let demod = Demodulator::new(DemodMode::Usb, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
        let mut state = demod.new_state();
        let tone: Vec<Complex<f32>> = (0..4096)
            .map(|n| Complex::from_polar(1.0, TAU * 20_000.0 * t(n)))
            .collect();
        let filtered = demod.ssb_filter.apply(&mut state.ssb_filter, &tone);
        let peak = filtered[128..].iter().map(|s| s.re.abs()).fold(0.0_f32, f32::max);
        assert!(peak < 0.01, "leakage {}", peak);
    }

    #[test]
    fn state_carries_between_blocks() {
        let demod = Demodulator::new(DemodMode::Fm, RAW_RATE, TARGET_SAMPLE_RATE).unwrap();
        let mut state = demod.new_state();
        let input: Vec<Complex<f32>> = (0..1024)
            .map(|n| Complex::from_polar(1.0, TAU * 500.0 * t(n)))
            .collect();
        demod.demodulate(&mut state, &input);
        assert_ne!(state, demod.new_state());
        assert_ne!(state.phase.last_phase(), 0.0);
    }
}
