// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile, ResolvedRoot};
use crate::errors::{DirwatchError, Result};
use crate::fs::normalize_path;
use crate::watch::ExcludeSet;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DirwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_roots(&raw)?;
        let roots = resolve_roots(&raw)?;
        let exclude = ExcludeSet::new(raw.watch.exclude.as_slice())?;
        Ok(ConfigFile::new_unchecked(roots, exclude, raw.output))
    }
}

fn ensure_has_roots(cfg: &RawConfigFile) -> Result<()> {
    if cfg.roots.is_empty() {
        return Err(DirwatchError::ConfigError(
            "no directory to watch: pass PATHS or add a [[root]] section".to_string(),
        ));
    }
    Ok(())
}

fn resolve_roots(cfg: &RawConfigFile) -> Result<Vec<ResolvedRoot>> {
    let mut seen = HashSet::new();
    let mut roots = Vec::with_capacity(cfg.roots.len());

    for (idx, root) in cfg.roots.iter().enumerate() {
        if root.path.as_os_str().is_empty() {
            return Err(DirwatchError::ConfigError(format!(
                "[[root]] #{} has an empty path",
                idx + 1
            )));
        }

        let path = normalize_path(&root.path);
        if !seen.insert(path.clone()) {
            return Err(DirwatchError::ConfigError(format!(
                "root {:?} is listed more than once",
                path
            )));
        }

        roots.push(ResolvedRoot {
            path,
            auto_recurse: root.auto_recurse.unwrap_or(cfg.watch.auto_recurse),
        });
    }

    Ok(roots)
}
