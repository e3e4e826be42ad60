// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline supervisor: validates and applies the configuration, runs the
//! acquisition and processing loops on their own threads and owns the
//! [`PipelineState`].

pub mod acquire;
pub mod configure;
pub mod process;

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use tsp_core::{ConfigError, PipelineState, SourceConfig, TARGET_SAMPLE_RATE};

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::demod::Demodulator;
use crate::device::{DeviceError, SdrDevice};
use crate::exchange::{bounded_exchange, ExchangeStatsHandle};
use crate::source::AudioSink;

pub use acquire::{AcquireStep, AcquisitionLoop, AcquisitionPhase};
pub use configure::{configure_device, ConfigReport, ConfigStep, StepOutcome};
pub use process::{ProcessStep, ProcessingLoop};

/// Tunables for one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Output PCM rate (Hz).
    pub target_rate: u32,
    /// IQ samples per hardware read.
    pub block_size: usize,
    /// Raw blocks buffered between the loops before new ones are dropped.
    pub queue_capacity: usize,
    /// Longest the processing loop waits for a block; bounds stop latency.
    pub dequeue_timeout: Duration,
    /// Silence longer than this is reported as a stall.
    pub stall_threshold: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_rate: TARGET_SAMPLE_RATE,
            block_size: 65_536,
            queue_capacity: 10,
            dequeue_timeout: Duration::from_millis(500),
            stall_threshold: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Open(DeviceError),

    #[error("failed to configure {step}: {source}")]
    Configure {
        step: ConfigStep,
        source: DeviceError,
    },

    #[error("pipeline is already {0}")]
    AlreadyRunning(PipelineState),

    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct Status {
    state: PipelineState,
    fault: Option<String>,
}

/// State shared between the supervisor and the worker threads.
#[derive(Debug, Default)]
struct StatusCell(Mutex<Status>);

impl StatusCell {
    fn with<R>(&self, f: impl FnOnce(&mut Status) -> R) -> R {
        let mut status = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status)
    }

    fn state(&self) -> PipelineState {
        self.with(|s| s.state)
    }

    fn set(&self, state: PipelineState) {
        self.with(|s| s.state = state);
    }

    /// Running -> Faulted. A pipeline that is already stopping keeps its state.
    fn fault(&self, message: String) {
        self.with(|s| {
            if s.state == PipelineState::Running {
                s.state = PipelineState::Faulted;
                s.fault = Some(message);
            }
        });
    }

    fn fault_message(&self) -> Option<String> {
        self.with(|s| match s.state {
            PipelineState::Faulted => s.fault.clone(),
            _ => None,
        })
    }
}

struct Workers {
    cancel: CancelToken,
    handles: Vec<JoinHandle<()>>,
    stats: ExchangeStatsHandle,
}

impl Workers {
    fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("SDR pipeline thread panicked");
            }
        }
    }
}

/// One SDR acquisition/demodulation pipeline.
///
/// `start` and `stop` may be called from any thread. Independent pipelines
/// share nothing and can run side by side.
pub struct SdrPipeline {
    options: PipelineOptions,
    clock: Arc<dyn Clock>,
    status: Arc<StatusCell>,
    workers: Mutex<Option<Workers>>,
}

impl SdrPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: PipelineOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            options,
            clock,
            status: Arc::new(StatusCell::default()),
            workers: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn state(&self) -> PipelineState {
        self.status.state()
    }

    /// Why the pipeline faulted, while it is in [`PipelineState::Faulted`].
    pub fn fault(&self) -> Option<String> {
        self.status.fault_message()
    }

    /// Blocks discarded because the processing loop fell behind.
    pub fn dropped_blocks(&self) -> u64 {
        self.lock_workers()
            .as_ref()
            .map(|w| w.stats.dropped())
            .unwrap_or(0)
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Option<Workers>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate `config`, open and configure the device, then start both
    /// loops. On any error the pipeline is left stopped and the device, if
    /// it was opened, is released.
    pub fn start<S, F>(&self, config: &SourceConfig, open: F, sink: S) -> Result<(), PipelineError>
    where
        S: AudioSink,
        F: FnOnce() -> Result<Box<dyn SdrDevice>, DeviceError>,
    {
        let mut workers = self.lock_workers();
        let current = self.status.state();
        if !current.can_start() {
            return Err(PipelineError::AlreadyRunning(current));
        }
        if let Some(mut stale) = workers.take() {
            stale.cancel.cancel();
            stale.join();
        }

        let demod = Demodulator::for_config(config, self.options.target_rate)?;
        self.status.with(|s| {
            s.state = PipelineState::Starting;
            s.fault = None;
        });
        info!(
            "Starting SDR pipeline: {} Hz, {} mode, {} Hz -> {} Hz",
            config.center_freq_hz,
            config.mode,
            config.sample_rate,
            self.options.target_rate
        );

        let device = match open() {
            Ok(device) => device,
            Err(err) => {
                self.status.set(PipelineState::Stopped);
                return Err(PipelineError::Open(err));
            }
        };

        let cancel = CancelToken::new();
        let (producer, consumer) =
            bounded_exchange(self.options.queue_capacity, self.clock.clone());
        let stats = consumer.stats();

        let mut acquisition =
            AcquisitionLoop::new(device, producer, self.options.block_size, cancel.clone());
        let report = acquisition.configure(config);
        if let Some((step, err)) = report.mandatory_failure() {
            self.status.set(PipelineState::Stopped);
            return Err(PipelineError::Configure {
                step,
                source: err.clone(),
            });
        }

        let processing = ProcessingLoop::new(
            consumer,
            demod,
            sink,
            cancel.clone(),
            self.options.dequeue_timeout,
            self.options.stall_threshold,
        );

        // Running before the threads exist so an immediate fault is recorded.
        self.status.set(PipelineState::Running);

        let status = self.status.clone();
        let fault_cancel = cancel.clone();
        let acquire_handle = std::thread::Builder::new()
            .name("sdr-acquire".to_string())
            .spawn(move || {
                acquisition.run(|err| {
                    warn!("SDR pipeline faulted: {}", err);
                    status.fault(err.to_string());
                    fault_cancel.cancel();
                })
            });
        let acquire_handle = match acquire_handle {
            Ok(handle) => handle,
            Err(err) => {
                self.status.set(PipelineState::Stopped);
                return Err(PipelineError::Spawn(err));
            }
        };

        let status = self.status.clone();
        let process_handle = std::thread::Builder::new()
            .name("sdr-process".to_string())
            .spawn(move || processing.run(|| status.fault_message()));
        let process_handle = match process_handle {
            Ok(handle) => handle,
            Err(err) => {
                cancel.cancel();
                let _ = acquire_handle.join();
                self.status.set(PipelineState::Stopped);
                return Err(PipelineError::Spawn(err));
            }
        };

        *workers = Some(Workers {
            cancel,
            handles: vec![acquire_handle, process_handle],
            stats,
        });
        info!("SDR pipeline running");
        Ok(())
    }

    /// Signal both loops, wait for them and release the device.
    ///
    /// Idempotent. A faulted pipeline stays [`PipelineState::Faulted`].
    pub fn stop(&self) {
        let mut workers = self.lock_workers();
        let Some(active) = workers.as_mut() else {
            return;
        };
        if active.handles.is_empty() {
            return;
        }

        let faulted = self.status.state() == PipelineState::Faulted;
        if !faulted {
            self.status.set(PipelineState::Stopping);
        }
        active.cancel.cancel();
        active.join();
        if !faulted {
            self.status.set(PipelineState::Stopped);
        }
        info!(
            "SDR pipeline stopped ({} blocks dropped)",
            active.stats.dropped()
        );
    }
}

impl Drop for SdrPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceProbe, ScriptStep, ScriptedDevice};
    use num_complex::Complex;
    use std::time::Instant;
    use tsp_core::{AudioBlock, DemodMode};

    #[derive(Default)]
    struct Recorded {
        blocks: Vec<AudioBlock>,
        faults: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Recorded>>);

    impl RecordingSink {
        fn blocks(&self) -> usize {
            self.0.lock().unwrap().blocks.len()
        }

        fn faults(&self) -> Vec<String> {
            self.0.lock().unwrap().faults.clone()
        }
    }

    impl AudioSink for RecordingSink {
        fn on_audio(&mut self, block: AudioBlock) {
            self.0.lock().unwrap().blocks.push(block);
        }

        fn on_fault(&mut self, message: &str) {
            self.0.lock().unwrap().faults.push(message.to_string());
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            block_size: 4096,
            queue_capacity: 4,
            dequeue_timeout: Duration::from_millis(10),
            stall_threshold: Duration::from_millis(50),
            ..PipelineOptions::default()
        }
    }

    fn config() -> SourceConfig {
        SourceConfig::new(146_520_000, DemodMode::Am)
    }

    fn tone(n: usize) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| Complex::new(1.0 + 0.5 * (i as f32 * 0.02).sin(), 0.0))
            .collect()
    }

    fn opener(
        device: ScriptedDevice,
    ) -> impl FnOnce() -> Result<Box<dyn SdrDevice>, DeviceError> {
        move || Ok(Box::new(device) as Box<dyn SdrDevice>)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn started(device: ScriptedDevice) -> (SdrPipeline, RecordingSink, DeviceProbe) {
        let probe = device.probe();
        let sink = RecordingSink::default();
        let pipeline = SdrPipeline::new(options());
        pipeline
            .start(&config(), opener(device), sink.clone())
            .unwrap();
        (pipeline, sink, probe)
    }

    #[test]
    fn default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.target_rate, 16_000);
        assert_eq!(opts.block_size, 65_536);
        assert_eq!(opts.queue_capacity, 10);
        assert_eq!(opts.dequeue_timeout, Duration::from_millis(500));
        assert_eq!(opts.stall_threshold, Duration::from_secs(5));
    }

    #[test]
    fn streams_until_stopped() {
        let (pipeline, sink, probe) = started(ScriptedDevice::new().repeating(tone(4096)));
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(wait_for(|| sink.blocks() >= 3));

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(probe.close_count(), 1);
        assert!(sink.faults().is_empty());

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn second_start_is_rejected() {
        let (pipeline, _sink, _) = started(ScriptedDevice::new().repeating(tone(4096)));
        let err = pipeline
            .start(
                &config(),
                opener(ScriptedDevice::new()),
                RecordingSink::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::AlreadyRunning(PipelineState::Running)
        ));
        pipeline.stop();
    }

    #[test]
    fn invalid_config_never_opens_device() {
        let pipeline = SdrPipeline::new(options());
        let mut cfg = config();
        cfg.sample_rate = 250_000;
        let mut opened = false;
        let err = pipeline
            .start(
                &cfg,
                || {
                    opened = true;
                    Ok(Box::new(ScriptedDevice::new()) as Box<dyn SdrDevice>)
                },
                RecordingSink::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!opened);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn open_failure_leaves_pipeline_stopped() {
        let pipeline = SdrPipeline::new(options());
        let err = pipeline
            .start(
                &config(),
                || Err(DeviceError::Open("no device found".into())),
                RecordingSink::default(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to open SDR device: no device found");
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn mandatory_step_failure_releases_device() {
        let device = ScriptedDevice::new().failing("center frequency");
        let probe = device.probe();
        let pipeline = SdrPipeline::new(options());
        let err = pipeline
            .start(&config(), opener(device), RecordingSink::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configure {
                step: ConfigStep::CenterFrequency,
                ..
            }
        ));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn optional_step_failure_still_runs() {
        let (pipeline, sink, _) =
            started(ScriptedDevice::new().failing("gain").repeating(tone(4096)));
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(wait_for(|| sink.blocks() >= 1));
        pipeline.stop();
    }

    #[test]
    fn slow_read_stalls_but_keeps_running() {
        let device = ScriptedDevice::new()
            .samples(tone(4096))
            .step(ScriptStep::Delay(Duration::from_millis(300), tone(4096)))
            .repeating(tone(4096));
        let (pipeline, sink, _) = started(device);

        std::thread::sleep(Duration::from_millis(150));
        // Past the 50 ms stall threshold, yet still running.
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(wait_for(|| sink.blocks() >= 2));
        assert_eq!(pipeline.state(), PipelineState::Running);
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn read_failure_faults_and_releases_once() {
        let device = ScriptedDevice::new()
            .samples(tone(4096))
            .step(ScriptStep::Fail("device lost".into()));
        let (pipeline, sink, probe) = started(device);

        assert!(wait_for(|| pipeline.state() == PipelineState::Faulted));
        assert_eq!(pipeline.fault().as_deref(), Some("IQ read failed: device lost"));

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Faulted);
        assert_eq!(probe.close_count(), 1);
        assert_eq!(sink.faults(), vec!["IQ read failed: device lost".to_string()]);
    }

    #[test]
    fn faulted_pipeline_can_be_restarted() {
        let device = ScriptedDevice::new().step(ScriptStep::Fail("gone".into()));
        let (pipeline, _sink, _) = started(device);
        assert!(wait_for(|| pipeline.state() == PipelineState::Faulted));

        let sink = RecordingSink::default();
        pipeline
            .start(
                &config(),
                opener(ScriptedDevice::new().repeating(tone(4096))),
                sink.clone(),
            )
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert_eq!(pipeline.fault(), None);
        assert!(wait_for(|| sink.blocks() >= 1));
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn stop_during_start_waits_then_stops() {
        let device = ScriptedDevice::new().repeating(tone(4096));
        let probe = device.probe();
        let pipeline = Arc::new(SdrPipeline::new(options()));

        let starter = {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                pipeline.start(
                    &config(),
                    move || {
                        std::thread::sleep(Duration::from_millis(200));
                        Ok(Box::new(device) as Box<dyn SdrDevice>)
                    },
                    RecordingSink::default(),
                )
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pipeline.state(), PipelineState::Starting);
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        assert!(starter.join().unwrap().is_ok());
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn drop_without_start_is_a_no_op() {
        let pipeline = SdrPipeline::new(PipelineOptions::default());
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        drop(pipeline);
    }

    #[test]
    fn drop_stops_running_pipeline() {
        let (pipeline, _sink, probe) = started(ScriptedDevice::new().repeating(tone(4096)));
        drop(pipeline);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn independent_pipelines_run_side_by_side() {
        let (a, sink_a, _) = started(ScriptedDevice::new().repeating(tone(4096)));
        let (b, sink_b, _) = started(ScriptedDevice::new().repeating(tone(4096)));
        assert!(wait_for(|| sink_a.blocks() >= 1 && sink_b.blocks() >= 1));
        a.stop();
        assert_eq!(b.state(), PipelineState::Running);
        b.stop();
    }
}
