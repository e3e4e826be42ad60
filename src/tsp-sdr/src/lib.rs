// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ acquisition and demodulation pipeline.
//!
//! Raw IQ blocks are read from an [`device::SdrDevice`] on one thread,
//! handed over a bounded drop-when-full [`exchange`] and demodulated to
//! 16-bit mono PCM on a second thread, which feeds an [`source::AudioSink`].

pub mod cancel;
pub mod clock;
pub mod demod;
pub mod device;
pub mod dsp;
pub mod exchange;
pub mod pipeline;
#[cfg(feature = "soapysdr-sys")]
pub mod real_iq_source;
pub mod source;

pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use demod::{DemodState, Demodulator};
pub use device::{DeviceError, MockIqSource, RawSampleBlock, SdrDevice};
pub use pipeline::{PipelineError, PipelineOptions, SdrPipeline};
pub use source::{AudioSink, AudioSource, ResamplingSink, SdrSource};
#[cfg(feature = "soapysdr-sys")]
pub use real_iq_source::RealIqSource;
