// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::types::OutputFormat;

/// Command-line arguments for `dirwatch`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "dirwatch",
    version,
    about = "Watch directory trees and report which directories changed.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories to watch. Replace any `[[root]]` entries from the config.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Path to a config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also watch every subdirectory, and any that appear later.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "no_recursive")]
    pub recursive: bool,

    /// Only watch the given directories themselves.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_recursive: bool,

    /// Glob for subdirectories that are never watched automatically.
    /// May be given more than once; added to the config's `exclude`.
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Output format for events on stdout.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Print the directory's contents after each files-changed event.
    #[arg(long)]
    pub list_contents: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DIRWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the configuration, but don't watch anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// `Some(true)` for `--recursive`, `Some(false)` for `--no-recursive`.
    pub fn recursive_override(&self) -> Option<bool> {
        match (self.recursive, self.no_recursive) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_and_repeated_excludes() {
        let args = CliArgs::try_parse_from([
            "dirwatch",
            "/a",
            "/b",
            "--exclude",
            "**/.git",
            "--exclude",
            "**/target",
            "--format",
            "json",
            "--no-recursive",
        ])
        .unwrap();

        assert_eq!(args.paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(args.exclude, vec!["**/.git", "**/target"]);
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.recursive_override(), Some(false));
    }

    #[test]
    fn recursive_flags_conflict() {
        let result = CliArgs::try_parse_from(["dirwatch", "--recursive", "--no-recursive"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_flag_means_no_override() {
        let args = CliArgs::try_parse_from(["dirwatch", "."]).unwrap();
        assert_eq!(args.recursive_override(), None);
        assert!(args.config.is_none());
    }
}
