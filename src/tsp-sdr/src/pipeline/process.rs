// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::Duration;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::demod::{DemodState, Demodulator};
use crate::device::RawSampleBlock;
use crate::exchange::{Dequeue, ExchangeConsumer};
use crate::source::AudioSink;

/// What one processing iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStep {
    /// A block was demodulated and this many samples went to the sink.
    Delivered(usize),
    /// A block arrived but produced no audio.
    Skipped,
    /// Nothing arrived within the dequeue timeout.
    Idle,
    /// Nothing has been queued for longer than the stall threshold.
    Stalled(Duration),
    Stopped,
}

/// Consumer half of the pipeline: dequeues raw blocks, demodulates them and
/// hands the audio to the sink on this thread.
pub struct ProcessingLoop<S: AudioSink> {
    consumer: ExchangeConsumer,
    demod: Demodulator,
    state: DemodState,
    sink: S,
    cancel: CancelToken,
    dequeue_timeout: Duration,
    stall_threshold: Duration,
    chunks: u64,
}

impl<S: AudioSink> ProcessingLoop<S> {
    pub fn new(
        consumer: ExchangeConsumer,
        demod: Demodulator,
        sink: S,
        cancel: CancelToken,
        dequeue_timeout: Duration,
        stall_threshold: Duration,
    ) -> Self {
        let state = demod.new_state();
        Self {
            consumer,
            demod,
            state,
            sink,
            cancel,
            dequeue_timeout,
            stall_threshold,
            chunks: 0,
        }
    }

    /// Number of audio chunks handed to the sink so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn step(&mut self) -> ProcessStep {
        if self.cancel.is_cancelled() {
            return ProcessStep::Stopped;
        }
        match self.consumer.dequeue(self.dequeue_timeout) {
            Dequeue::Block(block) => self.process(block),
            Dequeue::Empty => {
                let quiet = self.consumer.since_last_enqueue();
                if quiet > self.stall_threshold {
                    warn!("SDR stalled - no data for {:.1}s", quiet.as_secs_f64());
                    ProcessStep::Stalled(quiet)
                } else {
                    ProcessStep::Idle
                }
            }
            Dequeue::Disconnected => ProcessStep::Stopped,
        }
    }

    fn process(&mut self, block: RawSampleBlock) -> ProcessStep {
        if block.sample_rate != self.demod.sample_rate() {
            warn!(
                "Skipping IQ block captured at {} Hz (expected {} Hz)",
                block.sample_rate,
                self.demod.sample_rate()
            );
            return ProcessStep::Skipped;
        }
        let audio = self.demod.demodulate(&mut self.state, &block.samples);
        if audio.is_empty() {
            return ProcessStep::Skipped;
        }
        let len = audio.len();
        self.sink.on_audio(audio);
        self.chunks += 1;
        ProcessStep::Delivered(len)
    }

    /// Demodulate whatever is still queued, without waiting for more.
    fn drain(&mut self) {
        while let Dequeue::Block(block) = self.consumer.dequeue(Duration::ZERO) {
            self.process(block);
        }
    }

    /// Step until stopped. If `fault()` then returns a message, the blocks
    /// read before the fault are still delivered and the sink is told once.
    pub fn run(mut self, fault: impl FnOnce() -> Option<String>) {
        while self.step() != ProcessStep::Stopped {}
        if let Some(message) = fault() {
            self.drain();
            self.sink.on_fault(&message);
        }
    }
}
