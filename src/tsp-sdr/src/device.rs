// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Hardware boundary: the [`SdrDevice`] trait, the silent mock device and a
//! scripted fake for driving the pipeline deterministically.

mod scripted;

use std::time::Duration;

use num_complex::Complex;
use thiserror::Error;
use tsp_core::{DirectSampling, Gain};

pub use scripted::{AppliedSetting, DeviceProbe, ScriptStep, ScriptedDevice};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("failed to open SDR device: {0}")]
    Open(String),

    #[error("failed to set {setting}: {reason}")]
    Setting {
        setting: &'static str,
        reason: String,
    },

    #[error("IQ read failed: {0}")]
    Read(String),
}

impl DeviceError {
    pub fn setting(setting: &'static str, reason: impl Into<String>) -> Self {
        DeviceError::Setting {
            setting,
            reason: reason.into(),
        }
    }
}

/// One block of raw IQ samples and the rate it was captured at.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSampleBlock {
    pub samples: Vec<Complex<f32>>,
    pub sample_rate: u32,
}

impl RawSampleBlock {
    pub fn new(samples: Vec<Complex<f32>>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Abstraction over any IQ sample source (real SoapySDR device or mock).
///
/// Setters are called once, in order, while the pipeline configures the
/// device; `read_into` is then called repeatedly from the acquisition thread.
pub trait SdrDevice: Send + 'static {
    fn set_sample_rate(&mut self, rate_hz: u32) -> Result<(), DeviceError>;

    fn set_center_freq(&mut self, freq_hz: u64) -> Result<(), DeviceError>;

    fn set_direct_sampling(&mut self, mode: DirectSampling) -> Result<(), DeviceError>;

    fn set_agc(&mut self, enabled: bool) -> Result<(), DeviceError>;

    fn set_freq_correction(&mut self, ppm: i32) -> Result<(), DeviceError>;

    fn set_gain(&mut self, gain: Gain) -> Result<(), DeviceError>;

    /// Read the next block of IQ samples into `buf`.
    /// Returns the number of samples written; `Ok(0)` means nothing was
    /// available this time.
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, DeviceError>;

    /// Release the hardware handle.
    fn close(&mut self) {}
}

/// IQ source that produces silence (all zeros). Used when no SDR hardware is present.
///
/// Reads are paced to the configured sample rate so the pipeline sees a
/// realistic block cadence.
#[derive(Debug, Default)]
pub struct MockIqSource {
    sample_rate: u32,
}

impl MockIqSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SdrDevice for MockIqSource {
    fn set_sample_rate(&mut self, rate_hz: u32) -> Result<(), DeviceError> {
        self.sample_rate = rate_hz;
        Ok(())
    }

    fn set_center_freq(&mut self, _freq_hz: u64) -> Result<(), DeviceError> {
        Ok(())
    }

    fn set_direct_sampling(&mut self, _mode: DirectSampling) -> Result<(), DeviceError> {
        Ok(())
    }

    fn set_agc(&mut self, _enabled: bool) -> Result<(), DeviceError> {
        Ok(())
    }

    fn set_freq_correction(&mut self, _ppm: i32) -> Result<(), DeviceError> {
        Ok(())
    }

    fn set_gain(&mut self, _gain: Gain) -> Result<(), DeviceError> {
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, DeviceError> {
        buf.fill(Complex::new(0.0, 0.0));
        if self.sample_rate > 0 {
            std::thread::sleep(Duration::from_secs_f64(
                buf.len() as f64 / self.sample_rate as f64,
            ));
        }
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_iq_source_fills_zeros() {
        let mut src = MockIqSource::new();
        let mut buf = vec![Complex::new(1.0_f32, 1.0); 64];
        let n = src.read_into(&mut buf).unwrap();
        assert_eq!(n, 64);
        assert!(buf.iter().all(|s| s.re == 0.0 && s.im == 0.0));
    }

    #[test]
    fn mock_accepts_every_setting() {
        let mut src = MockIqSource::new();
        src.set_sample_rate(256_000).unwrap();
        src.set_center_freq(146_520_000).unwrap();
        src.set_direct_sampling(DirectSampling::QBranch).unwrap();
        src.set_agc(true).unwrap();
        src.set_freq_correction(-3).unwrap();
        src.set_gain(Gain::Manual(20.0)).unwrap();
        src.close();
    }

    #[test]
    fn setting_error_message() {
        let err = DeviceError::setting("gain", "out of range");
        assert_eq!(err.to_string(), "failed to set gain: out of range");
    }
}
