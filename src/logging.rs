// src/logging.rs

//! Logging setup for `dirwatch` using `tracing` + `tracing-subscriber`.
//!
//! Most of the interesting activity happens off the main thread: tree
//! mutations on the `dirwatch-mutations` worker and raw notifications on
//! notify's event thread. Thread names are therefore always printed.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (one level for everything),
//! 2. `DIRWATCH_LOG`, as full `EnvFilter` directives, e.g.
//!    `info,dirwatch::watch::node=debug,dirwatch::watch::handle=trace`,
//! 3. `info`.
//!
//! Logs go to STDERR; stdout carries only watch events.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

const ENV_VAR: &str = "DIRWATCH_LOG";

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(ENV_VAR).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level_directive(level));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {ENV_VAR}={directives:?}: {err}");
            EnvFilter::new("info")
        }),
        None => EnvFilter::new("info"),
    }
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Debug), Some("dirwatch=trace"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn env_accepts_per_module_directives() {
        let filter = build_filter(None, Some("dirwatch::watch::node=debug"));
        assert_eq!(filter.to_string(), "dirwatch::watch::node=debug");
    }

    #[test]
    fn missing_or_invalid_env_falls_back_to_info() {
        assert_eq!(build_filter(None, None).to_string(), "info");
        assert_eq!(build_filter(None, Some("  ")).to_string(), "info");
        assert_eq!(
            build_filter(None, Some("dirwatch=notalevel")).to_string(),
            "info"
        );
    }
}
