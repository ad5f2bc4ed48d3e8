use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// How the `dirwatch` binary prints observed events on stdout.
///
/// - `Text`: one human-readable line per event (default).
/// - `Json`: one JSON object per line, suitable for piping into other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "invalid output format: {other} (expected \"text\" or \"json\")"
            )),
        }
    }
}
