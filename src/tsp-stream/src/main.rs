// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use tsp_app::{init_logging, ConfigFile};
use tsp_core::{AudioBlock, DemodMode, DynResult, Gain};
use tsp_sdr::{AudioSink, AudioSource, DeviceError, MockIqSource, SdrDevice, SdrSource};

use config::{GainSetting, StreamConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - SDR audio streamer");
const FAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const REPORT_EVERY_CHUNKS: u64 = 20;
const MOCK_ARGS: &str = "mock";

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file (default: $TSP_CONFIG, then tsp.toml search)
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Frequency in kHz (e.g. 146520 for 146.520 MHz)
    #[arg(short = 'f', long = "freq")]
    freq: Option<f64>,
    /// Demodulation mode: FM, AM, USB or LSB
    #[arg(short = 'm', long = "mode")]
    mode: Option<DemodMode>,
    /// Tuner gain in dB, or "auto"
    #[arg(short = 'g', long = "gain")]
    gain: Option<Gain>,
    /// Frequency correction in PPM
    #[arg(long = "ppm", allow_hyphen_values = true)]
    ppm: Option<i32>,
    /// Direct sampling: 0=off, 1=I-branch, 2=Q-branch (use 2 for HF)
    #[arg(short = 'D', long = "direct-sampling")]
    direct_sampling: Option<u8>,
    /// Enable RTL2832 digital AGC (recommended for direct sampling)
    #[arg(long = "agc")]
    agc: bool,
    /// Raw IQ sample rate in Hz
    #[arg(short = 's', long = "sample-rate")]
    sample_rate: Option<u32>,
    /// SoapySDR device arguments ("mock" for a silent test source)
    #[arg(short = 'a', long = "args")]
    args: Option<String>,
    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

impl Cli {
    fn apply_to(&self, cfg: &mut StreamConfig) {
        if let Some(freq) = self.freq {
            cfg.sdr.frequency_khz = freq;
        }
        if let Some(mode) = self.mode {
            cfg.sdr.mode = mode;
        }
        if let Some(gain) = self.gain {
            cfg.sdr.gain = match gain {
                Gain::Auto => GainSetting::Text("auto".to_string()),
                Gain::Manual(db) => GainSetting::Db(db),
            };
        }
        if let Some(ppm) = self.ppm {
            cfg.sdr.ppm = ppm;
        }
        if let Some(direct_sampling) = self.direct_sampling {
            cfg.sdr.direct_sampling = direct_sampling;
        }
        if self.agc {
            cfg.sdr.agc = true;
        }
        if let Some(rate) = self.sample_rate {
            cfg.sdr.sample_rate = rate;
        }
        if let Some(ref args) = self.args {
            cfg.sdr.args = args.clone();
        }
        if self.debug {
            cfg.general.log_level = Some("debug".to_string());
        }
    }
}

/// Logs delivery progress; the audio itself goes to whatever consumes the
/// stream downstream.
struct ChunkReporter {
    chunks: u64,
    audio: Duration,
}

impl ChunkReporter {
    fn new() -> Self {
        Self {
            chunks: 0,
            audio: Duration::ZERO,
        }
    }
}

impl AudioSink for ChunkReporter {
    fn on_audio(&mut self, block: AudioBlock) {
        self.chunks += 1;
        self.audio += block.duration();
        if self.chunks == 1 {
            info!("First audio chunk: {} samples", block.len());
        } else if self.chunks % REPORT_EVERY_CHUNKS == 0 {
            info!(
                "Chunks received: {} ({:.1}s of audio)",
                self.chunks,
                self.audio.as_secs_f64()
            );
        }
    }

    fn on_fault(&mut self, message: &str) {
        error!("Audio stream stopped after {} chunks: {}", self.chunks, message);
    }
}

fn open_device(args: &str) -> Result<Box<dyn SdrDevice>, DeviceError> {
    if args == MOCK_ARGS {
        info!("Using mock IQ source");
        return Ok(Box::new(MockIqSource::new()));
    }

    #[cfg(feature = "soapysdr")]
    {
        let device = tsp_sdr::RealIqSource::open(args)?;
        Ok(Box::new(device))
    }

    #[cfg(not(feature = "soapysdr"))]
    {
        Err(DeviceError::Open(format!(
            "built without SoapySDR support; cannot open '{}' (use --args {})",
            args, MOCK_ARGS
        )))
    }
}

async fn wait_for_fault(source: &SdrSource) -> String {
    loop {
        tokio::time::sleep(FAULT_POLL_INTERVAL).await;
        if let Some(message) = source.fault() {
            return message;
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", StreamConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = StreamConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        StreamConfig::load_from_default_paths()?
    };
    cli.apply_to(&mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid tsp-stream configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let source_config = cfg.source_config()?;
    info!(
        "Starting tsp-stream ({} at {:.3} kHz, {} Hz IQ, gain {})",
        source_config.mode,
        source_config.center_freq_hz as f64 / 1_000.0,
        source_config.sample_rate,
        source_config.gain
    );

    let args = cfg.sdr.args.clone();
    let mut source = SdrSource::new(source_config, cfg.pipeline_options(), move || {
        open_device(&args)
    });
    source.start(ChunkReporter::new())?;

    let fault = tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Ctrl+C received, shutting down");
            None
        }
        message = wait_for_fault(&source) => Some(message),
    };

    // Joining the worker threads blocks.
    let source = tokio::task::spawn_blocking(move || {
        source.stop();
        source
    })
    .await?;

    let dropped = source.dropped_blocks();
    if dropped > 0 {
        warn!("Dropped {} IQ blocks while the processor lagged", dropped);
    }

    match fault {
        Some(message) => Err(format!("SDR pipeline faulted: {}", message).into()),
        None => Ok(()),
    }
}
