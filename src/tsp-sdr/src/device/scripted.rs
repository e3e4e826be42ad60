// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use num_complex::Complex;
use tsp_core::{DirectSampling, Gain};

use super::{DeviceError, SdrDevice};

/// One scripted response to `read_into`.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Samples(Vec<Complex<f32>>),
    /// Block the reader for a while, then return the samples.
    Delay(Duration, Vec<Complex<f32>>),
    Fail(String),
}

/// A setting the device accepted, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedSetting {
    SampleRate(u32),
    CenterFreq(u64),
    DirectSampling(DirectSampling),
    Agc(bool),
    FreqCorrection(i32),
    Gain(Gain),
}

/// Read side of a [`ScriptedDevice`] that stays with the test after the
/// device has been moved into the pipeline.
#[derive(Debug, Clone, Default)]
pub struct DeviceProbe {
    applied: Arc<Mutex<Vec<AppliedSetting>>>,
    closes: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl DeviceProbe {
    pub fn applied(&self) -> Vec<AppliedSetting> {
        self.applied
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Deterministic fake device.
///
/// Reads replay the script in order; once it runs out the device either
/// repeats a fixed block or reports nothing available (`Ok(0)`). Any
/// setting named with [`ScriptedDevice::failing`] is rejected.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    script: VecDeque<ScriptStep>,
    repeat: Option<Vec<Complex<f32>>>,
    failing: Vec<&'static str>,
    probe: DeviceProbe,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: ScriptStep) -> Self {
        self.script.push_back(step);
        self
    }

    pub fn samples(self, samples: Vec<Complex<f32>>) -> Self {
        self.step(ScriptStep::Samples(samples))
    }

    /// Keep returning `block` after the script is exhausted.
    pub fn repeating(mut self, block: Vec<Complex<f32>>) -> Self {
        self.repeat = Some(block);
        self
    }

    /// Reject the named setting (`"sample rate"`, `"center frequency"`,
    /// `"direct sampling"`, `"agc"`, `"frequency correction"` or `"gain"`).
    pub fn failing(mut self, setting: &'static str) -> Self {
        self.failing.push(setting);
        self
    }

    pub fn probe(&self) -> DeviceProbe {
        self.probe.clone()
    }

    fn apply(&mut self, name: &'static str, setting: AppliedSetting) -> Result<(), DeviceError> {
        if self.failing.contains(&name) {
            return Err(DeviceError::setting(name, "rejected by device"));
        }
        if let Ok(mut log) = self.probe.applied.lock() {
            log.push(setting);
        }
        Ok(())
    }
}

fn copy_into(buf: &mut [Complex<f32>], samples: &[Complex<f32>]) -> usize {
    let n = samples.len().min(buf.len());
    buf[..n].copy_from_slice(&samples[..n]);
    n
}

impl SdrDevice for ScriptedDevice {
    fn set_sample_rate(&mut self, rate_hz: u32) -> Result<(), DeviceError> {
        self.apply("sample rate", AppliedSetting::SampleRate(rate_hz))
    }

    fn set_center_freq(&mut self, freq_hz: u64) -> Result<(), DeviceError> {
        self.apply("center frequency", AppliedSetting::CenterFreq(freq_hz))
    }

    fn set_direct_sampling(&mut self, mode: DirectSampling) -> Result<(), DeviceError> {
        self.apply("direct sampling", AppliedSetting::DirectSampling(mode))
    }

    fn set_agc(&mut self, enabled: bool) -> Result<(), DeviceError> {
        self.apply("agc", AppliedSetting::Agc(enabled))
    }

    fn set_freq_correction(&mut self, ppm: i32) -> Result<(), DeviceError> {
        self.apply("frequency correction", AppliedSetting::FreqCorrection(ppm))
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), DeviceError> {
        self.apply("gain", AppliedSetting::Gain(gain))
    }

    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, DeviceError> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(ScriptStep::Samples(samples)) => Ok(copy_into(buf, &samples)),
            Some(ScriptStep::Delay(delay, samples)) => {
                std::thread::sleep(delay);
                Ok(copy_into(buf, &samples))
            }
            Some(ScriptStep::Fail(reason)) => Err(DeviceError::Read(reason)),
            None => match &self.repeat {
                Some(block) => Ok(copy_into(buf, block)),
                None => Ok(0),
            },
        }
    }

    fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}
