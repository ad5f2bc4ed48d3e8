// tests/error_handling.rs

mod common;
use crate::common::builders::ConfigFileBuilder;

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use dirwatch::cli::CliArgs;
use dirwatch::config::{load_and_validate, resolve, ConfigFile};
use dirwatch::errors::DirwatchError;
use dirwatch::types::OutputFormat;
use dirwatch::watch::mock::MockBackend;
use dirwatch::fs::mock::MockFileSystem;
use dirwatch::watch::HandleBackend;

#[test]
fn test_config_without_roots_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[watch]
auto_recurse = true
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(DirwatchError::ConfigError(msg)) => assert!(msg.contains("no directory to watch")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_exclude_returns_pattern_error() {
    let raw = ConfigFileBuilder::new()
        .with_root("/srv/data")
        .with_exclude("{unclosed")
        .raw();

    match ConfigFile::try_from(raw) {
        Err(DirwatchError::InvalidPattern(msg)) => assert!(msg.contains("{unclosed")),
        Err(e) => panic!("Expected InvalidPattern, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_bad_toml_returns_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[[root]\npath = ").unwrap();

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(DirwatchError::TomlError(_))));
}

#[test]
fn test_wrong_format_value_returns_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[[root]]\npath = \"/a\"\n[output]\nformat = \"yaml\"\n").unwrap();

    assert!(matches!(
        load_and_validate(file.path()),
        Err(DirwatchError::TomlError(_))
    ));
}

#[test]
fn test_missing_config_file_returns_io_error() {
    let args = CliArgs {
        config: Some(PathBuf::from("/definitely/not/here/dirwatch.toml")),
        paths: vec![PathBuf::from("/srv")],
        ..CliArgs::default()
    };
    assert!(matches!(resolve(&args), Err(DirwatchError::IoError(_))));
}

#[test]
fn test_cli_format_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[[root]]\npath = \"/a\"\n[output]\nformat = \"text\"\n").unwrap();
    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        format: Some(OutputFormat::Json),
        recursive: true,
        ..CliArgs::default()
    };

    let cfg = resolve(&args).unwrap();
    assert_eq!(cfg.output().format, OutputFormat::Json);
    assert!(cfg.roots()[0].auto_recurse);
}

#[test]
fn test_open_failure_names_the_path() {
    let backend = MockBackend::new(MockFileSystem::new());
    match backend.open(std::path::Path::new("/gone")) {
        Err(DirwatchError::OpenFailed { path, .. }) => assert_eq!(path, PathBuf::from("/gone")),
        Err(e) => panic!("Expected OpenFailed, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}
