// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use tracing::{info, warn};
use tsp_core::{DirectSampling, SourceConfig};

use crate::device::{DeviceError, SdrDevice};

/// Device configuration steps, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    SampleRate,
    CenterFrequency,
    DirectSampling,
    HardwareAgc,
    FrequencyCorrection,
    Gain,
}

impl ConfigStep {
    pub const ORDER: [ConfigStep; 6] = [
        ConfigStep::SampleRate,
        ConfigStep::CenterFrequency,
        ConfigStep::DirectSampling,
        ConfigStep::HardwareAgc,
        ConfigStep::FrequencyCorrection,
        ConfigStep::Gain,
    ];

    /// Streaming cannot start if a mandatory step fails.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, ConfigStep::SampleRate | ConfigStep::CenterFrequency)
    }
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigStep::SampleRate => "sample rate",
            ConfigStep::CenterFrequency => "center frequency",
            ConfigStep::DirectSampling => "direct sampling",
            ConfigStep::HardwareAgc => "hardware AGC",
            ConfigStep::FrequencyCorrection => "frequency correction",
            ConfigStep::Gain => "gain",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Applied,
    /// Not requested by the configuration; nothing was sent to the device.
    Skipped,
    Failed(DeviceError),
}

/// Per-step results of configuring one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigReport {
    pub steps: Vec<(ConfigStep, StepOutcome)>,
}

impl ConfigReport {
    pub fn outcome(&self, step: ConfigStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    /// The first mandatory step that failed, if any.
    pub fn mandatory_failure(&self) -> Option<(ConfigStep, &DeviceError)> {
        self.steps.iter().find_map(|(step, outcome)| match outcome {
            StepOutcome::Failed(err) if step.is_mandatory() => Some((*step, err)),
            _ => None,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.mandatory_failure().is_none()
    }
}

fn apply_step(
    device: &mut dyn SdrDevice,
    config: &SourceConfig,
    step: ConfigStep,
) -> StepOutcome {
    let result = match step {
        ConfigStep::SampleRate => device.set_sample_rate(config.sample_rate),
        ConfigStep::CenterFrequency => device.set_center_freq(config.center_freq_hz),
        ConfigStep::DirectSampling => {
            if !config.direct_sampling.is_enabled() {
                return StepOutcome::Skipped;
            }
            device.set_direct_sampling(config.direct_sampling)
        }
        ConfigStep::HardwareAgc => {
            if !config.agc {
                return StepOutcome::Skipped;
            }
            device.set_agc(true)
        }
        ConfigStep::FrequencyCorrection => {
            if config.ppm == 0 {
                return StepOutcome::Skipped;
            }
            device.set_freq_correction(config.ppm)
        }
        ConfigStep::Gain => device.set_gain(config.gain),
    };
    match result {
        Ok(()) => StepOutcome::Applied,
        Err(err) => StepOutcome::Failed(err),
    }
}

fn log_outcome(config: &SourceConfig, step: ConfigStep, outcome: &StepOutcome) {
    match (step, outcome) {
        (ConfigStep::DirectSampling, StepOutcome::Applied) => {
            let branch = match config.direct_sampling {
                DirectSampling::QBranch => "Q-branch",
                _ => "I-branch",
            };
            info!("Direct sampling enabled: {}", branch);
        }
        (ConfigStep::HardwareAgc, StepOutcome::Applied) => info!("Hardware AGC enabled"),
        (ConfigStep::HardwareAgc, StepOutcome::Failed(err)) => {
            warn!("Could not enable AGC: {}", err)
        }
        (ConfigStep::FrequencyCorrection, StepOutcome::Applied) => {
            info!("PPM correction: {}", config.ppm)
        }
        (ConfigStep::FrequencyCorrection, StepOutcome::Failed(err)) => {
            warn!("Could not set PPM correction: {}", err)
        }
        (ConfigStep::Gain, StepOutcome::Applied) => info!("Gain: {}", config.gain),
        (step, StepOutcome::Failed(err)) if !step.is_mandatory() => {
            warn!("Could not set {}: {}", step, err)
        }
        _ => {}
    }
}

/// Apply every configuration step in order.
///
/// Optional failures are logged and configuration continues; the first
/// mandatory failure ends it and is the last entry in the report.
pub fn configure_device(device: &mut dyn SdrDevice, config: &SourceConfig) -> ConfigReport {
    let mut report = ConfigReport::default();
    for step in ConfigStep::ORDER {
        let outcome = apply_step(device, config, step);
        log_outcome(config, step, &outcome);
        let fatal = step.is_mandatory() && matches!(outcome, StepOutcome::Failed(_));
        report.steps.push((step, outcome));
        if fatal {
            break;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AppliedSetting, ScriptedDevice};
    use tsp_core::{DemodMode, Gain};

    fn config() -> SourceConfig {
        SourceConfig::new(146_520_000, DemodMode::Fm)
    }

    #[test]
    fn applies_steps_in_order_and_skips_unrequested() {
        let mut dev = ScriptedDevice::new();
        let probe = dev.probe();
        let report = configure_device(&mut dev, &config());

        assert!(report.is_ok());
        assert_eq!(
            probe.applied(),
            vec![
                AppliedSetting::SampleRate(256_000),
                AppliedSetting::CenterFreq(146_520_000),
                AppliedSetting::Gain(Gain::Auto),
            ]
        );
        assert_eq!(
            report.outcome(ConfigStep::FrequencyCorrection),
            Some(&StepOutcome::Skipped)
        );
        assert_eq!(report.outcome(ConfigStep::HardwareAgc), Some(&StepOutcome::Skipped));
        assert_eq!(report.steps.len(), 6);
    }

    #[test]
    fn applies_everything_requested() {
        let mut cfg = config();
        cfg.ppm = -2;
        cfg.agc = true;
        cfg.direct_sampling = DirectSampling::QBranch;
        cfg.gain = Gain::Manual(30.0);

        let mut dev = ScriptedDevice::new();
        let probe = dev.probe();
        configure_device(&mut dev, &cfg);
        assert_eq!(
            probe.applied(),
            vec![
                AppliedSetting::SampleRate(256_000),
                AppliedSetting::CenterFreq(146_520_000),
                AppliedSetting::DirectSampling(DirectSampling::QBranch),
                AppliedSetting::Agc(true),
                AppliedSetting::FreqCorrection(-2),
                AppliedSetting::Gain(Gain::Manual(30.0)),
            ]
        );
    }

    #[test]
    fn optional_failures_do_not_stop_configuration() {
        let mut cfg = config();
        cfg.ppm = 5;
        cfg.agc = true;
        let mut dev = ScriptedDevice::new()
            .failing("agc")
            .failing("frequency correction")
            .failing("gain");
        let report = configure_device(&mut dev, &cfg);

        assert!(report.is_ok());
        assert!(matches!(
            report.outcome(ConfigStep::HardwareAgc),
            Some(StepOutcome::Failed(_))
        ));
        assert!(matches!(
            report.outcome(ConfigStep::Gain),
            Some(StepOutcome::Failed(_))
        ));
        assert_eq!(report.steps.len(), 6);
    }

    #[test]
    fn mandatory_failure_aborts() {
        let mut dev = ScriptedDevice::new().failing("center frequency");
        let probe = dev.probe();
        let report = configure_device(&mut dev, &config());

        let (step, _) = report.mandatory_failure().unwrap();
        assert_eq!(step, ConfigStep::CenterFrequency);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(probe.applied(), vec![AppliedSetting::SampleRate(256_000)]);
    }
}
