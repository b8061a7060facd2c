//! Error types for coverforge operations.
//!
//! Defines error types for each pipeline stage:
//! - Catalog loading (label sources, glob patterns)
//! - Solving (engine failures)
//! - Materialization of the selection into a destination directory
//! - Export of artifacts (selection list, model dumps, config files)

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building the item catalog.
///
/// All of these are fatal: a catalog is either complete or not built at all.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read label source '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Label source '{0}' does not exist")]
    MissingSource(String),

    #[error("No label files with extension '.{extension}' found under '{source_spec}'")]
    NoSources {
        source_spec: String,
        extension: String,
    },

    #[error("Invalid source pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors reported by the integer-programming engine.
///
/// Infeasibility and early stops are not errors; they are solve statuses.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Numerical failure in LP engine: {0}")]
    Numerical(String),

    #[error("Unsupported model: {0}")]
    Unsupported(String),
}

/// Per-item failures while hard-linking the selection into a destination.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to link '{source_path}' to '{target}': {source}")]
    Link {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list companion files for '{item}': {source}")]
    Companions {
        item: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while writing artifacts or reading configuration.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
