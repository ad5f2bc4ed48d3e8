// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::OutputFormat;
use crate::watch::ExcludeSet;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// auto_recurse = true
/// exclude = ["**/.git", "**/target"]
///
/// [[root]]
/// path = "/srv/data"
/// auto_recurse = false
///
/// [output]
/// format = "json"
/// list_contents = false
/// ```
///
/// All sections are optional and have reasonable defaults, but a config
/// without any root does not validate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Tree-wide settings from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// Every `[[root]]` entry, in file order.
    #[serde(default, rename = "root")]
    pub roots: Vec<RootConfig>,

    /// `[output]` section.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Used by roots that don't set their own `auto_recurse`.
    #[serde(default = "default_auto_recurse")]
    pub auto_recurse: bool,

    /// Glob patterns; matching subdirectories are never auto-watched.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_auto_recurse() -> bool {
    true
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            auto_recurse: default_auto_recurse(),
            exclude: Vec::new(),
        }
    }
}

/// One `[[root]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    pub path: PathBuf,

    #[serde(default)]
    pub auto_recurse: Option<bool>,
}

impl RootConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            auto_recurse: None,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub list_contents: bool,
}

/// A root with its path normalized and `auto_recurse` resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    pub path: PathBuf,
    pub auto_recurse: bool,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so holding
/// one means the roots are non-empty and unique and every exclude glob
/// compiled.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    roots: Vec<ResolvedRoot>,
    exclude: ExcludeSet,
    output: OutputSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        roots: Vec<ResolvedRoot>,
        exclude: ExcludeSet,
        output: OutputSection,
    ) -> Self {
        Self {
            roots,
            exclude,
            output,
        }
    }

    pub fn roots(&self) -> &[ResolvedRoot] {
        &self.roots
    }

    pub fn root(&self, path: &Path) -> Option<&ResolvedRoot> {
        self.roots.iter().find(|r| r.path == path)
    }

    pub fn exclude(&self) -> &ExcludeSet {
        &self.exclude
    }

    pub fn output(&self) -> &OutputSection {
        &self.output
    }
}
