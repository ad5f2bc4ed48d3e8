// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, OutputSection};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::OutputFormat;
use crate::watch::{DelegateSink, Node, WatchContext, WatchEvent};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + CLI overrides)
/// - one watcher tree per root, all on the process-wide context
/// - printing events to stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::resolve(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let ctx = WatchContext::global().with_exclude(cfg.exclude().clone());
    let (sink, mut stream) = DelegateSink::channel();

    let mut roots = Vec::with_capacity(cfg.roots().len());
    for root in cfg.roots() {
        let node = Node::with_context(&root.path, root.auto_recurse, ctx.clone())
            .with_sink(sink.clone());
        if node.start() {
            roots.push(node);
        } else {
            warn!(path = ?root.path, "cannot watch root; skipping");
        }
    }
    // Only the nodes hold the sink from here on.
    drop(sink);

    if roots.is_empty() {
        anyhow::bail!("none of the configured roots could be watched");
    }
    info!(roots = roots.len(), "watching; press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = stream.recv() => {
                let Some(event) = event else {
                    debug!("event stream closed");
                    break;
                };
                match render_event(&event, cfg.output(), &RealFileSystem) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(?event, "failed to render event: {err:#}"),
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    for node in &roots {
        node.stop();
    }
    if let Err(err) = ctx.executor().drain() {
        debug!("executor already gone at shutdown: {err}");
    }
    Ok(())
}

/// Format one event as a single output line.
///
/// With `list_contents`, files-changed events also carry the directory's
/// entries (sorted), read from `fs` at print time.
pub fn render_event(
    event: &WatchEvent,
    output: &OutputSection,
    fs: &dyn FileSystem,
) -> Result<String> {
    let contents = match event {
        WatchEvent::FilesChanged { path } if output.list_contents => {
            let mut entries = fs.read_dir(path)?;
            entries.sort();
            Some(entries)
        }
        _ => None,
    };

    match output.format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(event)?;
            if let (Some(entries), Some(obj)) = (contents, value.as_object_mut()) {
                obj.insert("contents".to_string(), serde_json::to_value(entries)?);
            }
            Ok(serde_json::to_string(&value)?)
        }
        OutputFormat::Text => {
            let mut line = match event {
                WatchEvent::FilesChanged { path } => format!("changed  {}", path.display()),
                WatchEvent::DirectoryDeleted { path } => format!("deleted  {}", path.display()),
                WatchEvent::DirectoryRenamed { from, to: Some(to) } => {
                    format!("renamed  {} -> {}", from.display(), to.display())
                }
                WatchEvent::DirectoryRenamed { from, to: None } => {
                    format!("renamed  {} -> ?", from.display())
                }
            };
            for entry in contents.iter().flatten() {
                line.push_str("\n    ");
                line.push_str(&display_name(entry));
            }
            Ok(line)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Simple dry-run output: print roots, excludes and output settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("dirwatch dry-run");
    println!("  output.format = {:?}", cfg.output().format);
    println!("  output.list_contents = {}", cfg.output().list_contents);
    if !cfg.exclude().is_empty() {
        println!("  exclude: {:?}", cfg.exclude().patterns());
    }
    println!();

    println!("roots ({}):", cfg.roots().len());
    for root in cfg.roots() {
        println!("  - {}", root.path.display());
        println!("      auto_recurse: {}", root.auto_recurse);
    }

    debug!("dry-run complete (nothing watched)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::fs::mock::MockFileSystem;

    fn output(format: OutputFormat, list_contents: bool) -> OutputSection {
        OutputSection {
            format,
            list_contents,
        }
    }

    #[test]
    fn text_lines_name_the_directory() {
        let fs = MockFileSystem::new();
        let renamed = WatchEvent::DirectoryRenamed {
            from: PathBuf::from("/w/a"),
            to: None,
        };
        let line = render_event(&renamed, &output(OutputFormat::Text, false), &fs).unwrap();
        assert_eq!(line, "renamed  /w/a -> ?");
    }

    #[test]
    fn json_includes_contents_only_for_files_changed() {
        let fs = MockFileSystem::new();
        fs.add_file("/w/b.txt");
        fs.add_dir("/w/a");

        let changed = WatchEvent::FilesChanged {
            path: PathBuf::from("/w"),
        };
        let line = render_event(&changed, &output(OutputFormat::Json, true), &fs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "files_changed");
        assert_eq!(value["contents"], serde_json::json!(["/w/a", "/w/b.txt"]));

        let deleted = WatchEvent::DirectoryDeleted {
            path: PathBuf::from("/w/a"),
        };
        let line = render_event(&deleted, &output(OutputFormat::Json, true), &fs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(value.get("contents").is_none());
    }
}
