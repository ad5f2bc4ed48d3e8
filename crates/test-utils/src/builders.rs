#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dirwatch::config::{ConfigFile, RawConfigFile, RootConfig};
use dirwatch::fs::mock::MockFileSystem;
use dirwatch::types::OutputFormat;
use dirwatch::watch::mock::MockBackend;
use dirwatch::watch::{ExcludeSet, WatchContext};

/// An in-memory directory tree plus a mock backend over it, wired into an
/// isolated watch context.
pub struct MockTree {
    pub fs: MockFileSystem,
    pub backend: MockBackend,
    pub ctx: WatchContext,
}

impl MockTree {
    /// Path of `rel` under the tree root used by [`MockTreeBuilder`].
    pub fn path(&self, rel: &str) -> PathBuf {
        root_path(rel)
    }
}

fn root_path(rel: &str) -> PathBuf {
    let root = Path::new("/mock");
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Builder for [`MockTree`] to simplify test setup.
///
/// Paths are relative to `/mock`, which always exists.
pub struct MockTreeBuilder {
    fs: MockFileSystem,
    exclude: Vec<String>,
}

impl MockTreeBuilder {
    pub fn new() -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(root_path(""));
        Self {
            fs,
            exclude: Vec::new(),
        }
    }

    pub fn dir(self, rel: &str) -> Self {
        self.fs.add_dir(root_path(rel));
        self
    }

    pub fn file(self, rel: &str) -> Self {
        self.fs.add_file(root_path(rel));
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude.push(pattern.to_string());
        self
    }

    pub fn build(self) -> MockTree {
        let backend = MockBackend::new(self.fs.clone());
        let exclude = ExcludeSet::new(self.exclude.as_slice()).expect("invalid exclude pattern in test");
        let ctx = WatchContext::isolated()
            .with_fs(Arc::new(self.fs.clone()))
            .with_backend(Arc::new(backend.clone()))
            .with_exclude(exclude);
        MockTree {
            fs: self.fs,
            backend,
            ctx,
        }
    }
}

impl Default for MockTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.push(RootConfig::new(path));
        self
    }

    pub fn with_root_recursion(mut self, path: impl Into<PathBuf>, auto_recurse: bool) -> Self {
        self.config.roots.push(RootConfig {
            path: path.into(),
            auto_recurse: Some(auto_recurse),
        });
        self
    }

    pub fn auto_recurse(mut self, val: bool) -> Self {
        self.config.watch.auto_recurse = val;
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
