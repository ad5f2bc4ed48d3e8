// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, RawConfigFile, RootConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Build the effective configuration for a CLI invocation.
///
/// Starts from `--config` (if given) and lets every flag that was actually
/// passed override it:
/// - positional paths replace the file's roots,
/// - `--recursive` / `--no-recursive` force `auto_recurse` on every root,
/// - `--exclude` patterns are appended,
/// - `--format` and `--list-contents` override `[output]`.
pub fn resolve(args: &CliArgs) -> Result<ConfigFile> {
    let raw = match &args.config {
        Some(path) => {
            debug!(?path, "loading config file");
            load_from_path(path)?
        }
        None => RawConfigFile::default(),
    };
    ConfigFile::try_from(apply_cli_overrides(raw, args))
}

fn apply_cli_overrides(mut raw: RawConfigFile, args: &CliArgs) -> RawConfigFile {
    if !args.paths.is_empty() {
        raw.roots = args.paths.iter().cloned().map(RootConfig::new).collect();
    }

    if let Some(recursive) = args.recursive_override() {
        raw.watch.auto_recurse = recursive;
        for root in raw.roots.iter_mut() {
            root.auto_recurse = Some(recursive);
        }
    }

    raw.watch.exclude.extend(args.exclude.iter().cloned());

    if let Some(format) = args.format {
        raw.output.format = format;
    }
    if args.list_contents {
        raw.output.list_contents = true;
    }

    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;

    use crate::errors::DirwatchError;
    use crate::types::OutputFormat;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_all_sections() {
        let file = write_config(
            r#"
[watch]
auto_recurse = false
exclude = ["**/.git"]

[[root]]
path = "/srv/one"

[[root]]
path = "/srv/two"
auto_recurse = true

[output]
format = "json"
list_contents = true
"#,
        );

        let cfg = load_and_validate(file.path()).unwrap();
        assert_eq!(cfg.roots().len(), 2);
        assert!(!cfg.roots()[0].auto_recurse);
        assert!(cfg.roots()[1].auto_recurse);
        assert_eq!(cfg.exclude().patterns(), ["**/.git"]);
        assert_eq!(cfg.output().format, OutputFormat::Json);
        assert!(cfg.output().list_contents);
    }

    #[test]
    fn cli_paths_replace_config_roots() {
        let file = write_config("[[root]]\npath = \"/srv/from-file\"\n");
        let args = CliArgs {
            paths: vec![PathBuf::from("/srv/from-cli")],
            config: Some(file.path().to_path_buf()),
            no_recursive: true,
            exclude: vec!["tmp".to_string()],
            ..CliArgs::default()
        };

        let cfg = resolve(&args).unwrap();
        assert_eq!(cfg.roots().len(), 1);
        assert_eq!(cfg.roots()[0].path, PathBuf::from("/srv/from-cli"));
        assert!(!cfg.roots()[0].auto_recurse);
        assert_eq!(cfg.exclude().patterns(), ["tmp"]);
    }

    #[test]
    fn no_roots_anywhere_is_a_config_error() {
        let err = resolve(&CliArgs::default()).unwrap_err();
        assert!(matches!(err, DirwatchError::ConfigError(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[watch]\nrecurse = true\n");
        assert!(matches!(
            load_from_path(file.path()),
            Err(DirwatchError::TomlError(_))
        ));
    }
}
