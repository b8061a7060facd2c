//! Selection artifacts: the path list and the hard-linked destination tree.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::Item;
use crate::error::{ExportError, MaterializeError};

/// Writes the selected items' label-file paths, one per line.
pub fn write_selection(path: &Path, items: &[&Item]) -> Result<(), ExportError> {
    let wrap = |source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    let mut out = BufWriter::new(File::create(path).map_err(wrap)?);
    for item in items {
        writeln!(out, "{}", item.path.display()).map_err(wrap)?;
    }
    out.flush().map_err(wrap)?;

    info!(path = %path.display(), items = items.len(), "Wrote selection list");
    Ok(())
}

/// Outcome of materializing a selection.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Number of files linked.
    pub linked: usize,
    /// Per-file failures; the run continues past them.
    pub failures: Vec<MaterializeError>,
}

/// File name up to its first `.`, so `001.tar.gz` gives `001`.
fn base_name(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    Some(name.split('.').next().unwrap_or(name))
}

/// Files next to the item that share its base name, any extension.
fn companions(item: &Item) -> Result<Vec<PathBuf>, std::io::Error> {
    let dir = match item.path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let base = base_name(&item.path);

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && base.is_some() && base_name(&path) == base {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Hard-links every file belonging to each selected item into `destination`.
///
/// Only failing to create `destination` is fatal. Link failures are
/// collected per file and logged.
pub fn materialize(destination: &Path, items: &[&Item]) -> Result<MaterializeReport, ExportError> {
    fs::create_dir_all(destination).map_err(|source| ExportError::Write {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut report = MaterializeReport::default();
    for item in items {
        let files = match companions(item) {
            Ok(files) => files,
            Err(source) => {
                let err = MaterializeError::Companions {
                    item: item.path.clone(),
                    source,
                };
                warn!(error = %err, "Skipping item");
                report.failures.push(err);
                continue;
            }
        };

        for source_path in files {
            let file_name = source_path.file_name().unwrap_or(OsStr::new(""));
            let target = destination.join(file_name);
            match fs::hard_link(&source_path, &target) {
                Ok(()) => {
                    debug!(from = %source_path.display(), to = %target.display(), "Linked");
                    report.linked += 1;
                }
                Err(source) => {
                    let err = MaterializeError::Link {
                        source_path,
                        target,
                        source,
                    };
                    warn!(error = %err, "Failed to link file");
                    report.failures.push(err);
                }
            }
        }
    }

    info!(
        destination = %destination.display(),
        linked = report.linked,
        failures = report.failures.len(),
        "Materialized selection"
    );
    Ok(report)
}
