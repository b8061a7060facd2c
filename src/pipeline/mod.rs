//! End-to-end curation run.
//!
//! # Pipeline Flow
//!
//! 1. **Catalog**: label files are resolved, parsed and tallied
//! 2. **Model**: one binary variable per item, one coverage row per required label
//! 3. **Reduction**: rows implied by a retained subset row are dropped
//! 4. **Relaxation**: the continuous bound is computed, optionally with cuts
//! 5. **Solve**: branch-and-bound under the configured gap and limits
//! 6. **Selection**: positive variables are mapped back to items, audited,
//!    written to the selection list and optionally hard-linked
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::atomic::AtomicBool;
//! use coverforge::pipeline::{run, CurationConfig};
//!
//! let config = CurationConfig::new("./tags")
//!     .with_threshold(50)
//!     .with_minimum(10)
//!     .with_destination("./curated");
//! let report = run(&config, &AtomicBool::new(false))?;
//! println!("{} -> {} items", report.items, report.selected.len());
//! ```

pub mod config;

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{Catalog, LabelCount};
use crate::model::{reduce, write_lp_file, CoverageModelBuilder, ReductionReport};
use crate::selection::{audit_coverage, extract, materialize, write_selection, CoverageShortfall};
use crate::solver::{
    run_relaxation_stage, BranchAndBound, CoverageSolver, Progress, RelaxationReport, SolveStatus,
};

pub use config::{CurationConfig, DEFAULT_OUTPUT, DEFAULT_PROGRESS_INTERVAL_MS};

/// Number of labels listed in the report's frequency section.
pub const TOP_LABELS: usize = 10;

/// Everything a run produced, for logging and the JSON summary.
#[derive(Debug, Clone, Serialize)]
pub struct CurationReport {
    pub status: SolveStatus,
    /// Items in the catalog.
    pub items: usize,
    /// Distinct counted labels.
    pub labels: usize,
    pub required_labels: usize,
    pub top_labels: Vec<LabelCount>,
    pub reduction: ReductionReport,
    /// Absent when the relaxation stage was disabled.
    pub relaxation: Option<RelaxationReport>,
    pub objective: Option<f64>,
    pub best_bound: Option<f64>,
    pub gap: Option<f64>,
    pub nodes: u64,
    pub iterations: u64,
    /// Selected label-file paths, in catalog order.
    pub selected: Vec<PathBuf>,
    /// Absent when the solve was infeasible and nothing was written.
    pub selection_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub cuts_model_path: Option<PathBuf>,
    /// Files hard-linked into the destination, if one was given.
    pub linked: Option<usize>,
    pub materialize_failures: Vec<String>,
    /// Required labels the selection covers fewer than `minimum` times.
    pub shortfalls: Vec<CoverageShortfall>,
    pub solve_secs: f64,
    pub elapsed_secs: f64,
}

impl CurationReport {
    /// Whether the run ended with a usable selection.
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            SolveStatus::Optimal | SolveStatus::FeasibleWithinGap
        ) && self.shortfalls.is_empty()
    }
}

/// Runs the pipeline with the bundled branch-and-bound engine.
///
/// Setting `abort` stops the solve at its next progress poll; the best
/// selection found so far is still written.
pub fn run(config: &CurationConfig, abort: &AtomicBool) -> anyhow::Result<CurationReport> {
    let solver = BranchAndBound::new(config.solver_settings());
    run_with_solver(config, &solver, abort)
}

/// Runs the pipeline against any engine.
pub fn run_with_solver(
    config: &CurationConfig,
    solver: &dyn CoverageSolver,
    abort: &AtomicBool,
) -> anyhow::Result<CurationReport> {
    config.validate()?;
    let started = Instant::now();

    let catalog = Catalog::load(&config.source, &config.catalog_options())
        .with_context(|| format!("Failed to load label files from '{}'", config.source))?;

    let required_labels: Vec<String> = catalog
        .labels()
        .required(config.threshold)
        .into_iter()
        .map(str::to_string)
        .collect();
    info!(
        required = required_labels.len(),
        threshold = config.threshold,
        minimum = config.minimum,
        "Required labels determined"
    );

    let mut model = CoverageModelBuilder::new(config.threshold, config.minimum).build(&catalog);

    let reduction = if config.no_reduce {
        ReductionReport {
            before: model.constraints().len(),
            after: model.constraints().len(),
            removed: Vec::new(),
        }
    } else {
        reduce(&mut model)
    };

    if let Some(path) = &config.write_model {
        write_lp_file(&model, path)
            .with_context(|| format!("Failed to write model to '{}'", path.display()))?;
    }

    let relaxation = if config.relax {
        let report = run_relaxation_stage(solver, &mut model, config.cut_rounds)
            .context("Continuous relaxation failed")?;
        Some(report)
    } else {
        None
    };

    let mut cuts_model_path = None;
    if !model.cuts().is_empty() {
        if let Some(path) = config.cuts_model_path() {
            write_lp_file(&model, &path)
                .with_context(|| format!("Failed to write model to '{}'", path.display()))?;
            cuts_model_path = Some(path);
        }
    }

    let mut on_progress = |progress: &Progress| {
        info!(
            nodes = progress.nodes,
            iterations = progress.iterations,
            open = progress.open_nodes,
            bound = ?progress.best_bound,
            incumbent = ?progress.incumbent,
            elapsed_secs = progress.elapsed.as_secs_f64(),
            "Solving"
        );
        if abort.load(Ordering::Relaxed) {
            warn!("Interrupt received; stopping search");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let solution = solver
        .solve(&model, &mut on_progress)
        .context("Integer solve failed")?;

    info!(
        status = %solution.status,
        objective = ?solution.objective,
        bound = ?solution.best_bound,
        nodes = solution.nodes,
        iterations = solution.iterations,
        "Solve finished"
    );

    let selected = extract(&catalog, &solution);
    let shortfalls = if solution.has_assignment() {
        audit_coverage(&selected, &required_labels, config.minimum)
    } else {
        Vec::new()
    };
    for shortfall in &shortfalls {
        warn!(
            label = %shortfall.label,
            covered = shortfall.covered,
            required = shortfall.required,
            "Selection under-covers label"
        );
    }

    let mut selection_path = None;
    let mut linked = None;
    let mut materialize_failures = Vec::new();
    if solution.status == SolveStatus::Infeasible {
        info!("No feasible selection; leaving output files untouched");
    } else {
        write_selection(&config.output, &selected).with_context(|| {
            format!("Failed to write selection to '{}'", config.output.display())
        })?;
        selection_path = Some(config.output.clone());

        if let Some(destination) = &config.destination {
            let outcome = materialize(destination, &selected).with_context(|| {
                format!("Failed to prepare destination '{}'", destination.display())
            })?;
            linked = Some(outcome.linked);
            materialize_failures = outcome.failures.iter().map(|e| e.to_string()).collect();
        }
    }

    let report = CurationReport {
        status: solution.status,
        items: catalog.len(),
        labels: catalog.labels().len(),
        required_labels: required_labels.len(),
        top_labels: catalog.labels().top(TOP_LABELS),
        reduction,
        relaxation,
        objective: solution.objective,
        best_bound: solution.best_bound,
        gap: solution.gap(),
        nodes: solution.nodes,
        iterations: solution.iterations,
        selected: selected.iter().map(|item| item.path.clone()).collect(),
        selection_path,
        model_path: config.write_model.clone(),
        cuts_model_path,
        linked,
        materialize_failures,
        shortfalls,
        solve_secs: solution.elapsed.as_secs_f64(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };

    info!(
        status = %report.status,
        items = report.items,
        selected = report.selected.len(),
        elapsed_secs = report.elapsed_secs,
        "Curation finished"
    );
    Ok(report)
}
