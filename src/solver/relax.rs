//! Continuous relaxation bound and objective-integrality cuts.
//!
//! The relaxation objective is a lower bound on the integer optimum and is
//! only reported. The optional cut loop looks at the fractional relaxation
//! point: the variables below 1 sum to some T, and since selections are
//! whole items that sum is pushed up to ceil(T). The cut is added, the
//! relaxation re-solved, and the loop repeats up to a round cap.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SolverError;
use crate::model::{CoverageConstraint, Model};

use super::{CoverageSolver, Relaxation, INTEGRALITY_TOLERANCE};

/// A cut added by the relaxation stage.
#[derive(Debug, Clone, Serialize)]
pub struct CutRecord {
    pub name: String,
    pub round: u32,
    /// Number of variables in the cut.
    pub size: usize,
    pub rhs: u32,
    /// Sum of the fractional values the cut was derived from.
    pub fractional_sum: f64,
    /// Relaxation bound after adding the cut.
    pub bound_after: f64,
}

/// Outcome of the relaxation stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelaxationReport {
    /// Relaxation objective before any cut.
    pub initial_bound: Option<f64>,
    /// Relaxation objective after the last kept cut.
    pub final_bound: Option<f64>,
    pub cuts: Vec<CutRecord>,
    /// The relaxation itself had no feasible point.
    pub infeasible: bool,
}

/// Derives the integrality cut for a relaxation point.
///
/// Returns `None` when the values below 1 already sum to an integer
/// (within tolerance).
pub fn objective_cut(
    values: &[f64],
    name: impl Into<String>,
) -> Option<(CoverageConstraint, f64)> {
    let fractional: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < 1.0 - INTEGRALITY_TOLERANCE)
        .map(|(i, _)| i)
        .collect();
    let total: f64 = fractional.iter().map(|&i| values[i].max(0.0)).sum();
    let target = (total - INTEGRALITY_TOLERANCE).ceil();

    if target - total <= INTEGRALITY_TOLERANCE || target <= 0.0 {
        return None;
    }

    Some((
        CoverageConstraint::new(name, fractional, target as u32),
        total,
    ))
}

/// Solves the relaxation and runs up to `max_cuts` cut rounds.
///
/// Only the first relaxation can fail the stage. Errors and infeasibility
/// inside the cut loop drop the offending cut and end the loop.
pub fn run_relaxation_stage(
    solver: &dyn CoverageSolver,
    model: &mut Model,
    max_cuts: u32,
) -> Result<RelaxationReport, SolverError> {
    let Some(mut current) = solver.relax(model)? else {
        info!("Continuous relaxation is infeasible");
        return Ok(RelaxationReport {
            infeasible: true,
            ..RelaxationReport::default()
        });
    };
    info!(bound = current.objective, "Continuous relaxation bound");

    let mut report = RelaxationReport {
        initial_bound: Some(current.objective),
        final_bound: Some(current.objective),
        cuts: Vec::new(),
        infeasible: false,
    };

    for round in 1..=max_cuts {
        let name = format!("cut_{}", round);
        let Some((cut, fractional_sum)) = objective_cut(&current.values, name) else {
            debug!(round, "Relaxation point yields no integrality cut");
            break;
        };
        let (size, rhs, name) = (cut.indices.len(), cut.rhs, cut.name.clone());
        model.add_cut(cut);

        let next: Relaxation = match solver.relax(model) {
            Ok(Some(next)) => next,
            Ok(None) => {
                warn!(round, "Cut made the relaxation infeasible; dropping it");
                model.pop_cut();
                break;
            }
            Err(e) => {
                warn!(round, error = %e, "Relaxation failed after cut; dropping it");
                model.pop_cut();
                break;
            }
        };

        info!(round, size, rhs, bound = next.objective, "Added integrality cut");
        report.cuts.push(CutRecord {
            name,
            round,
            size,
            rhs,
            fractional_sum,
            bound_after: next.objective,
        });

        let improved = next.objective > current.objective + INTEGRALITY_TOLERANCE;
        report.final_bound = Some(next.objective);
        current = next;
        if !improved {
            debug!(round, "Cut did not raise the bound; stopping");
            break;
        }
    }

    Ok(report)
}
