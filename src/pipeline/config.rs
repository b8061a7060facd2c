//! Curation run configuration.
//!
//! Every option has a default except `source`. A YAML file can supply any
//! subset of the keys; command-line values are layered on top of it by the
//! CLI.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{default_denylist, CatalogOptions, DEFAULT_EXTENSION};
use crate::error::ExportError;
use crate::model::builder::{DEFAULT_MINIMUM, DEFAULT_THRESHOLD};
use crate::solver::SolverSettings;

/// Default path of the selection list.
pub const DEFAULT_OUTPUT: &str = "selection.txt";

/// Default progress interval in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Configuration for one curation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurationConfig {
    /// Directory or glob of label files.
    pub source: String,
    /// Directory receiving hard links of the selected items' files.
    pub destination: Option<PathBuf>,
    /// Labels occurring at least this often must be covered.
    pub threshold: usize,
    /// Coverage multiplicity required for each such label.
    pub minimum: u32,
    /// Demand a certified optimum instead of the default gap.
    pub exact: bool,
    /// Selection list path.
    pub output: PathBuf,
    /// Label-file extension for directory sources.
    pub extension: String,
    /// Extra labels to exclude from counting.
    pub ignore_labels: Vec<String>,
    /// Start from an empty denylist instead of the built-in one.
    pub no_default_denylist: bool,
    /// Run the continuous relaxation stage.
    pub relax: bool,
    /// Maximum number of objective-integrality cuts.
    pub cut_rounds: u32,
    /// Skip constraint reduction.
    pub no_reduce: bool,
    pub seed: Option<u64>,
    pub node_limit: Option<u64>,
    pub time_limit_secs: Option<u64>,
    pub progress_interval_ms: u64,
    /// LP-format dump of the model before cuts.
    pub write_model: Option<PathBuf>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            destination: None,
            threshold: DEFAULT_THRESHOLD,
            minimum: DEFAULT_MINIMUM,
            exact: false,
            output: PathBuf::from(DEFAULT_OUTPUT),
            extension: DEFAULT_EXTENSION.to_string(),
            ignore_labels: Vec::new(),
            no_default_denylist: false,
            relax: true,
            cut_rounds: 0,
            no_reduce: false,
            seed: None,
            node_limit: None,
            time_limit_secs: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            write_model: None,
        }
    }
}

impl CurationConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Parses a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ExportError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ExportError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Checks values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.source.trim().is_empty() {
            return Err(ExportError::Config("source is required".to_string()));
        }
        if self.threshold == 0 {
            return Err(ExportError::Config(
                "threshold must be greater than 0".to_string(),
            ));
        }
        if self.minimum == 0 {
            return Err(ExportError::Config(
                "minimum must be greater than 0".to_string(),
            ));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(ExportError::Config("extension cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_minimum(mut self, minimum: u32) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_ignore_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_default_denylist(mut self, enabled: bool) -> Self {
        self.no_default_denylist = !enabled;
        self
    }

    pub fn with_relax(mut self, relax: bool) -> Self {
        self.relax = relax;
        self
    }

    pub fn with_cut_rounds(mut self, rounds: u32) -> Self {
        self.cut_rounds = rounds;
        self
    }

    pub fn with_reduce(mut self, reduce: bool) -> Self {
        self.no_reduce = !reduce;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    pub fn with_time_limit_secs(mut self, secs: u64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    pub fn with_progress_interval_ms(mut self, ms: u64) -> Self {
        self.progress_interval_ms = ms;
        self
    }

    pub fn with_write_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.write_model = Some(path.into());
        self
    }

    /// The effective denylist.
    pub fn denylist(&self) -> HashSet<String> {
        let mut denylist = if self.no_default_denylist {
            HashSet::new()
        } else {
            default_denylist()
        };
        denylist.extend(self.ignore_labels.iter().cloned());
        denylist
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions::default()
            .with_extension(self.extension.as_str())
            .with_denylist(self.denylist())
    }

    pub fn solver_settings(&self) -> SolverSettings {
        let base = if self.exact {
            SolverSettings::exact()
        } else {
            SolverSettings::default()
        };
        let interval = Duration::from_millis(self.progress_interval_ms);
        let mut settings = base.with_progress_interval(interval);
        if let Some(seed) = self.seed {
            settings = settings.with_seed(seed);
        }
        if let Some(limit) = self.node_limit {
            settings = settings.with_node_limit(limit);
        }
        if let Some(secs) = self.time_limit_secs {
            settings = settings.with_time_limit(Duration::from_secs(secs));
        }
        settings
    }

    /// Path of the post-cut model dump: `<stem>.cuts.lp` next to `write_model`.
    pub fn cuts_model_path(&self) -> Option<PathBuf> {
        let path = self.write_model.as_ref()?;
        let stem = path.file_stem()?.to_string_lossy();
        Some(path.with_file_name(format!("{}.cuts.lp", stem)))
    }
}
