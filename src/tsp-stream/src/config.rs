// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for tsp-stream.
//!
//! Config is loaded from the `[tsp-stream]` section of `tsp.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. Path in `$TSP_CONFIG`
//! 3. `./tsp.toml`
//! 4. `~/.config/tsp/tsp.toml`
//! 5. `/etc/tsp/tsp.toml`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tsp_app::ConfigFile;
use tsp_core::{ConfigError, DemodMode, DirectSampling, Gain, SourceConfig, TARGET_SAMPLE_RATE};
use tsp_sdr::PipelineOptions;

/// Top-level tsp-stream configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub general: GeneralConfig,
    pub sdr: SdrConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Gain as written in the file: `"auto"` or a number of dB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GainSetting {
    Db(f64),
    Text(String),
}

impl Default for GainSetting {
    fn default() -> Self {
        GainSetting::Text("auto".to_string())
    }
}

impl GainSetting {
    pub fn resolve(&self) -> Result<Gain, ConfigError> {
        match self {
            GainSetting::Db(db) if db.is_finite() => Ok(Gain::Manual(*db)),
            GainSetting::Db(db) => Err(ConfigError::InvalidGain(db.to_string())),
            GainSetting::Text(text) => text.parse(),
        }
    }
}

/// Receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdrConfig {
    /// SoapySDR device arguments; `"mock"` selects the silent test source.
    pub args: String,
    /// Tuned frequency (kHz).
    pub frequency_khz: f64,
    pub mode: DemodMode,
    /// Raw IQ rate (Hz); must be a multiple of 16000.
    pub sample_rate: u32,
    pub gain: GainSetting,
    pub ppm: i32,
    /// 0=off, 1=I-branch, 2=Q-branch (use 2 for HF)
    pub direct_sampling: u8,
    /// Enable the RTL2832 digital AGC (recommended for direct sampling)
    pub agc: bool,
}

impl Default for SdrConfig {
    fn default() -> Self {
        Self {
            args: "driver=rtlsdr".to_string(),
            frequency_khz: 146_520.0,
            mode: DemodMode::Fm,
            sample_rate: 256_000,
            gain: GainSetting::default(),
            ppm: 0,
            direct_sampling: 0,
            agc: false,
        }
    }
}

/// Buffering and timing of the acquisition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// IQ samples per hardware read
    pub block_size: usize,
    /// Raw blocks buffered before new ones are dropped
    pub queue_capacity: usize,
    pub dequeue_timeout_ms: u64,
    /// Warn when no IQ arrives for this long
    pub stall_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: 65_536,
            queue_capacity: 10,
            dequeue_timeout_ms: 500,
            stall_timeout_ms: 5_000,
        }
    }
}

impl StreamConfig {
    pub fn source_config(&self) -> Result<SourceConfig, ConfigError> {
        let center_freq_hz = (self.sdr.frequency_khz * 1_000.0).round() as u64;
        let mut config = SourceConfig::new(center_freq_hz, self.sdr.mode);
        config.sample_rate = self.sdr.sample_rate;
        config.gain = self.sdr.gain.resolve()?;
        config.ppm = self.sdr.ppm;
        config.direct_sampling = DirectSampling::try_from(self.sdr.direct_sampling)?;
        config.agc = self.sdr.agc;
        config.validate(TARGET_SAMPLE_RATE)?;
        Ok(config)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            target_rate: TARGET_SAMPLE_RATE,
            block_size: self.pipeline.block_size,
            queue_capacity: self.pipeline.queue_capacity,
            dequeue_timeout: Duration::from_millis(self.pipeline.dequeue_timeout_ms),
            stall_threshold: Duration::from_millis(self.pipeline.stall_timeout_ms),
        }
    }

    pub fn example_toml() -> String {
        let example = StreamConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            sdr: SdrConfig::default(),
            pipeline: PipelineConfig::default(),
        };
        let body = toml::to_string_pretty(&example).unwrap_or_default();
        // Nest every table under the [tsp-stream] section the loader expects.
        body.replace("[general]", "[tsp-stream.general]")
            .replace("[sdr]", "[tsp-stream.sdr]")
            .replace("[pipeline]", "[tsp-stream.pipeline]")
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for StreamConfig {
    fn section_key() -> &'static str {
        "tsp-stream"
    }

    fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if !self.sdr.frequency_khz.is_finite() || self.sdr.frequency_khz <= 0.0 {
            return Err("[sdr].frequency_khz must be > 0".to_string());
        }
        if self.sdr.args.trim().is_empty() {
            return Err("[sdr].args must not be empty".to_string());
        }
        DirectSampling::try_from(self.sdr.direct_sampling)
            .map_err(|e| format!("[sdr].direct_sampling: {}", e))?;
        self.sdr
            .gain
            .resolve()
            .map_err(|e| format!("[sdr].gain: {}", e))?;
        if self.sdr.sample_rate == 0 || self.sdr.sample_rate % TARGET_SAMPLE_RATE != 0 {
            return Err(format!(
                "[sdr].sample_rate {} must be a multiple of {}",
                self.sdr.sample_rate, TARGET_SAMPLE_RATE
            ));
        }

        if self.pipeline.block_size == 0 {
            return Err("[pipeline].block_size must be > 0".to_string());
        }
        if self.pipeline.queue_capacity == 0 {
            return Err("[pipeline].queue_capacity must be > 0".to_string());
        }
        if self.pipeline.dequeue_timeout_ms == 0 {
            return Err("[pipeline].dequeue_timeout_ms must be > 0".to_string());
        }
        if self.pipeline.stall_timeout_ms == 0 {
            return Err("[pipeline].stall_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}
