// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

/// Lifecycle of one acquisition/demodulation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    /// Hardware read failed; the pipeline is not restarted automatically.
    Faulted,
}

impl PipelineState {
    /// A new `start()` is only accepted from these states.
    pub fn can_start(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Faulted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Stopped => "stopped",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}
