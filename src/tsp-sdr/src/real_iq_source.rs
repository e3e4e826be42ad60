// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real SoapySDR device IQ source implementation.

use num_complex::Complex;
use soapysdr::{Device, Direction, RxStream};
use tsp_core::{DirectSampling, Gain};

use crate::device::{DeviceError, SdrDevice};

const CHANNEL: usize = 0;
/// Per-read timeout handed to the driver (µs).
const READ_TIMEOUT_US: i64 = 1_000_000;

/// Real SoapySDR device IQ source.
///
/// The RX stream is created and activated on the first read, after the
/// pipeline has applied every setting.
pub struct RealIqSource {
    device: Device,
    stream: Option<RxStream<Complex<f32>>>,
}

impl RealIqSource {
    /// Open a SoapySDR device.
    ///
    /// `args` is the SoapySDR device arguments string (e.g. `"driver=rtlsdr"`).
    pub fn open(args: &str) -> Result<Self, DeviceError> {
        tracing::info!("Initializing SoapySDR device with args: {}", args);
        let device = Device::new(args).map_err(|e| {
            DeviceError::Open(format!("no SoapySDR device for args '{}': {}", args, e))
        })?;
        tracing::info!("SoapySDR device opened successfully");
        Ok(Self {
            device,
            stream: None,
        })
    }

    fn stream(&mut self) -> Result<&mut RxStream<Complex<f32>>, DeviceError> {
        if self.stream.is_none() {
            let mut stream = self
                .device
                .rx_stream::<Complex<f32>>(&[CHANNEL])
                .map_err(|e| DeviceError::Read(format!("failed to open RX stream: {}", e)))?;
            stream
                .activate(None)
                .map_err(|e| DeviceError::Read(format!("failed to activate RX stream: {}", e)))?;
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| DeviceError::Read("RX stream unavailable".to_string()))
    }
}

impl SdrDevice for RealIqSource {
    fn set_sample_rate(&mut self, rate_hz: u32) -> Result<(), DeviceError> {
        self.device
            .set_sample_rate(Direction::Rx, CHANNEL, rate_hz as f64)
            .map_err(|e| DeviceError::setting("sample rate", e.to_string()))?;
        let actual = self
            .device
            .sample_rate(Direction::Rx, CHANNEL)
            .unwrap_or(rate_hz as f64);
        tracing::info!("Set sample rate to {} Hz (actual: {} Hz)", rate_hz, actual);
        Ok(())
    }

    fn set_center_freq(&mut self, freq_hz: u64) -> Result<(), DeviceError> {
        self.device
            .set_frequency(Direction::Rx, CHANNEL, freq_hz as f64, ())
            .map_err(|e| DeviceError::setting("center frequency", e.to_string()))?;
        let actual = self
            .device
            .frequency(Direction::Rx, CHANNEL)
            .unwrap_or(freq_hz as f64);
        tracing::info!(
            "Set center frequency to {} Hz (actual: {} Hz)",
            freq_hz,
            actual
        );
        Ok(())
    }

    fn set_direct_sampling(&mut self, mode: DirectSampling) -> Result<(), DeviceError> {
        let value = u8::from(mode).to_string();
        self.device
            .write_setting("direct_samp", value.as_str())
            .map_err(|e| DeviceError::setting("direct sampling", e.to_string()))
    }

    fn set_agc(&mut self, enabled: bool) -> Result<(), DeviceError> {
        let value = if enabled { "true" } else { "false" };
        self.device
            .write_setting("digital_agc", value)
            .map_err(|e| DeviceError::setting("agc", e.to_string()))
    }

    fn set_freq_correction(&mut self, ppm: i32) -> Result<(), DeviceError> {
        self.device
            .set_component_frequency(Direction::Rx, CHANNEL, "CORR", ppm as f64, ())
            .map_err(|e| DeviceError::setting("frequency correction", e.to_string()))
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), DeviceError> {
        match gain {
            Gain::Auto => self
                .device
                .set_gain_mode(Direction::Rx, CHANNEL, true)
                .map_err(|e| DeviceError::setting("gain", e.to_string())),
            Gain::Manual(db) => {
                if let Err(e) = self.device.set_gain_mode(Direction::Rx, CHANNEL, false) {
                    tracing::warn!("Failed to disable automatic gain: {}", e);
                }
                self.device
                    .set_gain(Direction::Rx, CHANNEL, db)
                    .map_err(|e| DeviceError::setting("gain", e.to_string()))
            }
        }
    }

    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, DeviceError> {
        let stream = self.stream()?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream
                .read(&mut [&mut buf[filled..]], READ_TIMEOUT_US)
                .map_err(|e| DeviceError::Read(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.deactivate(None) {
                tracing::warn!("Failed to deactivate RX stream: {}", e);
            }
        }
    }
}
