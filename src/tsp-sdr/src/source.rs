// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Output contract shared by every audio source: mono 16-bit PCM at the
//! target rate, delivered in order to one [`AudioSink`].

use tracing::warn;
use tsp_core::{AudioBlock, PipelineState, SourceConfig, TARGET_SAMPLE_RATE};

use crate::device::{DeviceError, SdrDevice};
use crate::dsp::resample;
use crate::pipeline::{PipelineError, PipelineOptions, SdrPipeline};

/// Receives audio on the source's worker thread, one block at a time.
pub trait AudioSink: Send + 'static {
    fn on_audio(&mut self, block: AudioBlock);

    /// Called at most once, when the source stops because of a fault.
    fn on_fault(&mut self, message: &str) {
        warn!("Audio source faulted: {}", message);
    }
}

impl<F> AudioSink for F
where
    F: FnMut(AudioBlock) + Send + 'static,
{
    fn on_audio(&mut self, block: AudioBlock) {
        self(block)
    }
}

/// Anything that can produce the 16 kHz PCM stream.
pub trait AudioSource {
    fn start<S: AudioSink>(&mut self, sink: S) -> Result<(), PipelineError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

type DeviceOpener = Box<dyn Fn() -> Result<Box<dyn SdrDevice>, DeviceError> + Send + Sync>;

/// SDR hardware as an [`AudioSource`].
///
/// Every `start` opens a fresh device through the opener, so a faulted
/// source can be started again.
pub struct SdrSource {
    config: SourceConfig,
    opener: DeviceOpener,
    pipeline: SdrPipeline,
}

impl SdrSource {
    pub fn new<F>(config: SourceConfig, options: PipelineOptions, opener: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SdrDevice>, DeviceError> + Send + Sync + 'static,
    {
        Self {
            config,
            opener: Box::new(opener),
            pipeline: SdrPipeline::new(options),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn fault(&self) -> Option<String> {
        self.pipeline.fault()
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.pipeline.dropped_blocks()
    }
}

impl AudioSource for SdrSource {
    fn start<S: AudioSink>(&mut self, sink: S) -> Result<(), PipelineError> {
        let opener = &self.opener;
        self.pipeline.start(&self.config, || opener(), sink)
    }

    fn stop(&mut self) {
        self.pipeline.stop();
    }

    fn is_running(&self) -> bool {
        self.pipeline.state() == PipelineState::Running
    }
}

/// Adapts a source that already produces audio (at any rate) to the
/// target-rate contract by linear resampling each chunk.
pub struct ResamplingSink<S> {
    inner: S,
    to_rate: u32,
}

impl<S: AudioSink> ResamplingSink<S> {
    pub fn new(inner: S) -> Self {
        Self::with_rate(inner, TARGET_SAMPLE_RATE)
    }

    pub fn with_rate(inner: S, to_rate: u32) -> Self {
        Self { inner, to_rate }
    }

    /// Resample one chunk captured at `from_rate` and pass it on.
    /// Chunks too short to yield a sample are dropped.
    pub fn push<T>(&mut self, samples: &[T], from_rate: u32)
    where
        T: Copy + Into<f64>,
    {
        let out = resample(samples, from_rate, self.to_rate);
        if out.is_empty() {
            return;
        }
        self.inner.on_audio(AudioBlock::new(out, self.to_rate));
    }

    pub fn fault(&mut self, message: &str) {
        self.inner.on_fault(message);
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}
