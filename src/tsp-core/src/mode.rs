// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Demodulation mode applied to the IQ stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DemodMode {
    /// Narrow-band FM (`nbfm` is accepted as an alias).
    #[serde(alias = "nbfm", alias = "FM", alias = "NBFM")]
    Fm,
    #[serde(alias = "AM")]
    Am,
    #[serde(alias = "USB")]
    Usb,
    #[serde(alias = "LSB")]
    Lsb,
}

impl DemodMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemodMode::Fm => "fm",
            DemodMode::Am => "am",
            DemodMode::Usb => "usb",
            DemodMode::Lsb => "lsb",
        }
    }
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemodMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fm" | "nbfm" => Ok(DemodMode::Fm),
            "am" => Ok(DemodMode::Am),
            "usb" => Ok(DemodMode::Usb),
            "lsb" => Ok(DemodMode::Lsb),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}
