// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Names a config file that replaces the default search.
pub const CONFIG_PATH_ENV: &str = "TSP_CONFIG";

/// Returns the default search paths for `tsp.toml`
/// (current directory → XDG config → /etc).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("tsp.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("tsp").join("tsp.toml"));
    }
    paths.push(PathBuf::from("/etc/tsp/tsp.toml"));
    paths
}

/// Path from `TSP_CONFIG`, ignoring an empty value.
fn env_config_path(value: Option<std::ffi::OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Pull one named section out of a TOML document and deserialize it.
///
/// `Ok(None)` means the section is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Re-serialize the section then parse as T so all serde defaults apply.
    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// Trait for loading configuration from a `tsp.toml` section.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `tsp.toml` (e.g. `"tsp-stream"`).
    fn section_key() -> &'static str;

    /// Cross-field checks, run by the caller once CLI overrides are applied.
    /// Messages name the offending `[section].field`.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load the section from a specific file path.
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// does not contain the expected `[<section_key>]` header.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Parse the section from an in-memory TOML document.
    fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from("<inline>");
        parse_section::<Self>(&path, content, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(path, format!("missing [{}] section", Self::section_key()))
        })
    }

    /// Load from `$TSP_CONFIG` when set (the file must exist and hold the
    /// section), otherwise search default paths (`tsp.toml` in CWD → XDG →
    /// /etc) and load the first file that contains the expected section.
    ///
    /// Returns `(config, path_where_found)` or `(Default::default(), None)`
    /// when no config file is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = env_config_path(std::env::var_os(CONFIG_PATH_ENV)) {
            let cfg = Self::load_from_file(&path)?;
            return Ok((cfg, Some(path)));
        }
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }
}
