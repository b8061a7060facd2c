//! Integer-programming engine interface and the bundled engine.
//!
//! The pipeline only talks to [`CoverageSolver`]: it asks for the continuous
//! relaxation of a model and for an integer solve, and it can stop a running
//! solve through the progress callback. [`BranchAndBound`] is the bundled
//! implementation; its node relaxations go through `good_lp`'s `microlp`
//! backend.
//!
//! # Gap policy
//!
//! The objective counts selected items, so every feasible objective is an
//! integer. A node whose relaxation bound is within `mip_gap` of the
//! incumbent is pruned. With the default gap just under one unit, a pruned
//! node can never hold a strictly better integer solution, so the search
//! still ends with a proven optimum while skipping nodes that could only tie.
//! Exact mode uses a near-zero gap and does not lean on integrality.

pub mod branch;
mod lp;
pub mod relax;

use std::ops::ControlFlow;
use std::time::Duration;

use serde::Serialize;

use crate::error::SolverError;
use crate::model::Model;

pub use branch::BranchAndBound;
pub use relax::{objective_cut, run_relaxation_stage, CutRecord, RelaxationReport};

/// Default gap in objective units: prunes nodes that cannot improve by a whole unit.
pub const DEFAULT_MIP_GAP: f64 = 0.999;

/// Gap used in exact mode.
pub const EXACT_MIP_GAP: f64 = 1e-9;

/// Distance from 0 or 1 below which a value counts as integral.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Default minimum time between two progress callbacks.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome class of an integer solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible, with a proven bound more than one unit below the objective.
    FeasibleWithinGap,
    /// No assignment satisfies every row.
    Infeasible,
    /// Stopped by the progress callback or a limit. May carry an incumbent.
    Aborted,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::FeasibleWithinGap => "feasible_within_gap",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solution of the continuous relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relaxation {
    pub objective: f64,
    pub values: Vec<f64>,
}

/// Result of an integer solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// Objective of the returned assignment, if there is one.
    pub objective: Option<f64>,
    /// Best proven lower bound on the optimum.
    pub best_bound: Option<f64>,
    /// One value per decision variable; empty when there is no assignment.
    pub values: Vec<f64>,
    pub nodes: u64,
    /// Number of LP relaxations solved.
    pub iterations: u64,
    pub elapsed: Duration,
}

impl Solution {
    /// An infeasible result with no assignment.
    pub fn infeasible(nodes: u64, iterations: u64, elapsed: Duration) -> Self {
        Self {
            status: SolveStatus::Infeasible,
            objective: None,
            best_bound: None,
            values: Vec::new(),
            nodes,
            iterations,
            elapsed,
        }
    }

    /// Distance between the objective and the proven bound.
    pub fn gap(&self) -> Option<f64> {
        match (self.objective, self.best_bound) {
            (Some(objective), Some(bound)) => Some((objective - bound).max(0.0)),
            _ => None,
        }
    }

    pub fn has_assignment(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone)]
pub struct Progress {
    pub iterations: u64,
    pub nodes: u64,
    pub open_nodes: usize,
    pub elapsed: Duration,
    pub best_bound: Option<f64>,
    pub incumbent: Option<f64>,
}

/// Engine settings for the integer solve.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Pruning gap in objective units.
    pub mip_gap: f64,
    /// Stop after this many nodes.
    pub node_limit: Option<u64>,
    /// Stop after this much wall-clock time.
    pub time_limit: Option<Duration>,
    /// Minimum time between progress callbacks.
    pub progress_interval: Duration,
    /// Seed for branching tie-breaks (None = non-deterministic).
    pub seed: Option<u64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            mip_gap: DEFAULT_MIP_GAP,
            node_limit: None,
            time_limit: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: None,
        }
    }
}

impl SolverSettings {
    /// Settings for a certified optimum.
    pub fn exact() -> Self {
        Self {
            mip_gap: EXACT_MIP_GAP,
            ..Self::default()
        }
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap.max(0.0);
        self
    }

    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// An integer-programming engine for coverage models.
pub trait CoverageSolver {
    /// Solves the model with every variable continuous in [0, 1].
    ///
    /// Returns `Ok(None)` when even the relaxation is infeasible.
    fn relax(&self, model: &Model) -> Result<Option<Relaxation>, SolverError>;

    /// Solves the model with binary variables.
    ///
    /// `on_progress` is polled at engine-chosen intervals; returning
    /// `ControlFlow::Break` stops the search and yields the incumbent.
    fn solve(
        &self,
        model: &Model,
        on_progress: &mut dyn FnMut(&Progress) -> ControlFlow<()>,
    ) -> Result<Solution, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_settings() {
        let settings = SolverSettings::exact();
        assert_eq!(settings.mip_gap, EXACT_MIP_GAP);
        assert!(settings.node_limit.is_none());
    }

    #[test]
    fn test_settings_builders() {
        let settings = SolverSettings::default()
            .with_mip_gap(-1.0)
            .with_node_limit(10)
            .with_time_limit(Duration::from_secs(5))
            .with_seed(7);
        assert_eq!(settings.mip_gap, 0.0);
        assert_eq!(settings.node_limit, Some(10));
        assert_eq!(settings.time_limit, Some(Duration::from_secs(5)));
        assert_eq!(settings.seed, Some(7));
    }

    #[test]
    fn test_solution_gap() {
        let solution = Solution {
            status: SolveStatus::Optimal,
            objective: Some(5.0),
            best_bound: Some(4.2),
            values: vec![1.0; 5],
            nodes: 3,
            iterations: 3,
            elapsed: Duration::ZERO,
        };
        assert!((solution.gap().unwrap() - 0.8).abs() < 1e-12);
        assert!(solution.has_assignment());

        let none = Solution::infeasible(1, 1, Duration::ZERO);
        assert!(none.gap().is_none());
        assert!(!none.has_assignment());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SolveStatus::FeasibleWithinGap).unwrap();
        assert_eq!(json, "\"feasible_within_gap\"");
        assert_eq!(SolveStatus::Aborted.to_string(), "aborted");
    }
}
