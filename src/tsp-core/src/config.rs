// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Immutable description of one SDR source, checked before any hardware I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::DemodMode;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown demodulation mode: {0}")]
    UnknownMode(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("sample rate {sample_rate} Hz must be a non-zero multiple of the {target_rate} Hz audio rate (try 256000 or 960000)")]
    NonIntegralDecimation { sample_rate: u32, target_rate: u32 },

    #[error("invalid gain '{0}' (expected \"auto\" or a number of dB)")]
    InvalidGain(String),

    #[error("invalid direct sampling mode {0} (expected 0=off, 1=I-branch, 2=Q-branch)")]
    InvalidDirectSampling(u8),
}

/// Tuner gain: hardware automatic gain or a fixed value in dB.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gain {
    #[default]
    Auto,
    Manual(f64),
}

impl FromStr for Gain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Gain::Auto);
        }
        match s.parse::<f64>() {
            Ok(db) if db.is_finite() => Ok(Gain::Manual(db)),
            _ => Err(ConfigError::InvalidGain(s.to_string())),
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gain::Auto => f.write_str("auto"),
            Gain::Manual(db) => write!(f, "{} dB", db),
        }
    }
}

/// RTL2832 direct-sampling branch (bypasses the tuner for HF reception).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DirectSampling {
    #[default]
    Off,
    IBranch,
    QBranch,
}

impl DirectSampling {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, DirectSampling::Off)
    }
}

impl TryFrom<u8> for DirectSampling {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DirectSampling::Off),
            1 => Ok(DirectSampling::IBranch),
            2 => Ok(DirectSampling::QBranch),
            other => Err(ConfigError::InvalidDirectSampling(other)),
        }
    }
}

impl From<DirectSampling> for u8 {
    fn from(value: DirectSampling) -> Self {
        match value {
            DirectSampling::Off => 0,
            DirectSampling::IBranch => 1,
            DirectSampling::QBranch => 2,
        }
    }
}

/// Snapshot of everything needed to tune and demodulate one SDR source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub center_freq_hz: u64,
    pub mode: DemodMode,
    /// Raw IQ capture rate (Hz).
    pub sample_rate: u32,
    pub gain: Gain,
    /// Frequency correction in parts per million. Zero is never sent to hardware.
    pub ppm: i32,
    pub direct_sampling: DirectSampling,
    /// Enable the RTL2832 digital AGC.
    pub agc: bool,
}

impl SourceConfig {
    pub fn new(center_freq_hz: u64, mode: DemodMode) -> Self {
        Self {
            center_freq_hz,
            mode,
            sample_rate: 256_000,
            gain: Gain::Auto,
            ppm: 0,
            direct_sampling: DirectSampling::Off,
            agc: false,
        }
    }

    /// Check the configuration and return the integer decimation factor
    /// from `sample_rate` down to `target_rate`.
    pub fn validate(&self, target_rate: u32) -> Result<usize, ConfigError> {
        if self.center_freq_hz == 0 {
            return Err(ConfigError::MissingField("center_freq_hz"));
        }
        if target_rate == 0 {
            return Err(ConfigError::MissingField("target_rate"));
        }
        if self.sample_rate == 0 || self.sample_rate % target_rate != 0 {
            return Err(ConfigError::NonIntegralDecimation {
                sample_rate: self.sample_rate,
                target_rate,
            });
        }
        if let Gain::Manual(db) = self.gain {
            if !db.is_finite() {
                return Err(ConfigError::InvalidGain(db.to_string()));
            }
        }
        Ok((self.sample_rate / target_rate) as usize)
    }
}
