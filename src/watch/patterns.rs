// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{DirwatchError, Result};

/// Compiled exclude globs for auto-recursion.
///
/// A subdirectory is skipped by rescans when either its full path
/// (`/srv/data/.git`) or its bare name (`.git`) matches one of the patterns.
/// An empty set excludes nothing.
#[derive(Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for ExcludeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcludeSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl ExcludeSet {
    /// Compile the given patterns. Fails on the first invalid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let pat = pat.as_ref();
            let glob = Glob::new(pat)
                .map_err(|e| DirwatchError::InvalidPattern(format!("{pat}: {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| DirwatchError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: Some(set),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_none()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(set) = &self.set else {
            return false;
        };
        let full = path.to_string_lossy().replace('\\', "/");
        if set.is_match(&full) {
            return true;
        }
        path.file_name()
            .map(|name| set.is_match(name.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_excludes_nothing() {
        let set = ExcludeSet::new::<&str>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.is_excluded(Path::new("/r/.git")));
    }

    #[test]
    fn matches_full_path_or_name() {
        let set = ExcludeSet::new(&["**/target", ".git"]).unwrap();
        assert!(set.is_excluded(Path::new("/work/project/target")));
        assert!(set.is_excluded(Path::new("/work/project/.git")));
        assert!(!set.is_excluded(Path::new("/work/project/src")));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = ExcludeSet::new(&["a[b"]).unwrap_err();
        assert!(matches!(err, DirwatchError::InvalidPattern(msg) if msg.contains("a[b")));
    }
}
