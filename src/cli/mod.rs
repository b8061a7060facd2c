//! Command-line interface for coverforge.
//!
//! Provides the `select` command, which runs the full curation pipeline, and
//! the `labels` command for inspecting label frequencies before choosing a
//! threshold.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
