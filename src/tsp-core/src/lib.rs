// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod audio;
pub mod config;
pub mod mode;
pub mod state;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Sample rate of every PCM stream handed to the speech recognizer (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

pub use audio::AudioBlock;
pub use config::{ConfigError, DirectSampling, Gain, SourceConfig};
pub use mode::DemodMode;
pub use state::PipelineState;
