// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a level name, falling back to INFO when absent or invalid.
pub fn parse_level(log_level: Option<&str>) -> Level {
    log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Overrides the configured level, e.g. `TSP_LOG=trace`.
pub const LOG_LEVEL_ENV: &str = "TSP_LOG";

/// A valid `TSP_LOG` wins over the configured level.
fn effective_level(configured: Option<&str>, env: Option<&str>) -> Level {
    match env.and_then(|s| s.parse::<Level>().ok()) {
        Some(level) => level,
        None => parse_level(configured),
    }
}

/// Initialize logging with optional level from config.
/// Falls back to INFO if level is None or invalid.
///
/// Thread names are printed so acquisition and processing lines can be
/// told apart.
pub fn init_logging(log_level: Option<&str>) {
    let env = std::env::var(LOG_LEVEL_ENV).ok();
    FmtSubscriber::builder()
        .with_target(false)
        .with_thread_names(true)
        .with_max_level(effective_level(log_level, env.as_deref()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_defaults_to_info() {
        assert_eq!(parse_level(None), Level::INFO);
        assert_eq!(parse_level(Some("bogus")), Level::INFO);
        assert_eq!(parse_level(Some("debug")), Level::DEBUG);
        assert_eq!(parse_level(Some("warn")), Level::WARN);
    }

    #[test]
    fn env_level_overrides_config() {
        assert_eq!(effective_level(Some("warn"), Some("trace")), Level::TRACE);
        assert_eq!(effective_level(Some("warn"), Some("loud")), Level::WARN);
        assert_eq!(effective_level(None, None), Level::INFO);
    }
}
