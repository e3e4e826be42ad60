// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::Duration;

use num_complex::Complex;
use tracing::{error, info};
use tsp_core::SourceConfig;

use super::configure::{configure_device, ConfigReport};
use crate::cancel::CancelToken;
use crate::device::{DeviceError, RawSampleBlock, SdrDevice};
use crate::exchange::{Enqueue, ExchangeProducer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    Idle,
    Configuring,
    Streaming,
    Stopping,
    Stopped,
    Faulted,
}

/// What one acquisition iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireStep {
    /// A block was read and queued.
    Delivered,
    /// A block was read but the queue was full.
    Dropped,
    /// The device returned no samples.
    Empty,
    /// Cancelled, or the consumer went away; the device is released.
    Stopped,
    /// The read failed; the device is released.
    Faulted(DeviceError),
}

/// Producer half of the pipeline: owns the hardware handle and feeds the
/// exchange one fixed-size block at a time.
pub struct AcquisitionLoop {
    device: Option<Box<dyn SdrDevice>>,
    producer: ExchangeProducer,
    block_size: usize,
    sample_rate: u32,
    cancel: CancelToken,
    phase: AcquisitionPhase,
    buf: Vec<Complex<f32>>,
}

impl AcquisitionLoop {
    pub fn new(
        device: Box<dyn SdrDevice>,
        producer: ExchangeProducer,
        block_size: usize,
        cancel: CancelToken,
    ) -> Self {
        let block_size = block_size.max(1);
        Self {
            device: Some(device),
            producer,
            block_size,
            sample_rate: 0,
            cancel,
            phase: AcquisitionPhase::Idle,
            buf: vec![Complex::new(0.0, 0.0); block_size],
        }
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.phase
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Apply `config` to the device. A mandatory failure releases the device.
    pub fn configure(&mut self, config: &SourceConfig) -> ConfigReport {
        self.phase = AcquisitionPhase::Configuring;
        self.sample_rate = config.sample_rate;
        let Some(device) = self.device.as_mut() else {
            self.phase = AcquisitionPhase::Stopped;
            return ConfigReport::default();
        };
        let report = configure_device(device.as_mut(), config);
        if report.is_ok() {
            info!(
                "SDR streaming at {} Hz, {} samples per block",
                self.sample_rate, self.block_size
            );
            self.phase = AcquisitionPhase::Streaming;
        } else {
            self.release();
            self.phase = AcquisitionPhase::Faulted;
        }
        report
    }

    /// One read-and-offer iteration. Checks the cancel token first.
    pub fn step(&mut self) -> AcquireStep {
        if matches!(
            self.phase,
            AcquisitionPhase::Stopped | AcquisitionPhase::Faulted
        ) {
            return AcquireStep::Stopped;
        }
        if self.cancel.is_cancelled() {
            return self.shut_down();
        }
        let Some(device) = self.device.as_mut() else {
            return self.shut_down();
        };
        self.phase = AcquisitionPhase::Streaming;

        match device.read_into(&mut self.buf) {
            Ok(0) => AcquireStep::Empty,
            Ok(n) => {
                let block = RawSampleBlock::new(self.buf[..n].to_vec(), self.sample_rate);
                match self.producer.try_enqueue(block) {
                    Enqueue::Queued => AcquireStep::Delivered,
                    Enqueue::Dropped => AcquireStep::Dropped,
                    Enqueue::Disconnected => self.shut_down(),
                }
            }
            // A read interrupted by shutdown is not a hardware fault.
            Err(_) if self.cancel.is_cancelled() => self.shut_down(),
            Err(err) => {
                error!("SDR read error: {}", err);
                self.release();
                self.phase = AcquisitionPhase::Faulted;
                AcquireStep::Faulted(err)
            }
        }
    }

    /// Step until stopped or faulted. `on_fault` runs once, after the
    /// device has been released.
    pub fn run(mut self, on_fault: impl FnOnce(DeviceError)) {
        loop {
            match self.step() {
                AcquireStep::Delivered | AcquireStep::Dropped => {}
                AcquireStep::Empty => std::thread::sleep(Duration::from_millis(1)),
                AcquireStep::Stopped => break,
                AcquireStep::Faulted(err) => {
                    on_fault(err);
                    break;
                }
            }
        }
    }

    fn shut_down(&mut self) -> AcquireStep {
        self.phase = AcquisitionPhase::Stopping;
        self.release();
        self.phase = AcquisitionPhase::Stopped;
        AcquireStep::Stopped
    }

    /// Close the device. Safe to call repeatedly; only the first call
    /// reaches the hardware.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            info!("SDR device released");
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.release();
    }
}
