//! LP relaxations through `good_lp` with the `microlp` backend.

use good_lp::solvers::microlp::microlp;
use good_lp::{
    variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};

use crate::error::SolverError;
use crate::model::Model;

use super::Relaxation;

/// Solves the model's LP relaxation with per-variable bounds.
///
/// `lower` and `upper` must have one entry per variable. Returns `Ok(None)`
/// when the bounded relaxation is infeasible.
pub(crate) fn solve_bounded(
    model: &Model,
    lower: &[f64],
    upper: &[f64],
) -> Result<Option<Relaxation>, SolverError> {
    if lower.len() != model.num_vars() || upper.len() != model.num_vars() {
        return Err(SolverError::Unsupported(format!(
            "bound vectors ({}, {}) do not match {} variables",
            lower.len(),
            upper.len(),
            model.num_vars()
        )));
    }

    // Rows over no variables are decided without the engine
    if model.rows().any(|row| row.indices.is_empty() && row.rhs > 0) {
        return Ok(None);
    }
    if model.num_vars() == 0 {
        return Ok(Some(Relaxation {
            objective: 0.0,
            values: Vec::new(),
        }));
    }

    let mut vars = ProblemVariables::new();
    let x: Vec<Variable> = lower
        .iter()
        .zip(upper)
        .map(|(&lo, &hi)| vars.add(variable().min(lo).max(hi)))
        .collect();

    let objective: Expression = x.iter().sum();
    let mut problem = vars.minimise(objective).using(microlp);
    for row in model.rows().filter(|row| !row.indices.is_empty()) {
        let lhs: Expression = row.indices.iter().map(|&i| x[i]).sum();
        problem = problem.with(lhs.geq(f64::from(row.rhs)));
    }

    match problem.solve() {
        Ok(solution) => {
            let values: Vec<f64> = x.iter().map(|&v| solution.value(v)).collect();
            let objective = values.iter().sum();
            Ok(Some(Relaxation { objective, values }))
        }
        Err(ResolutionError::Infeasible) => Ok(None),
        Err(ResolutionError::Unbounded) => Err(SolverError::Unsupported(
            "relaxation reported unbounded over [0, 1] variables".to_string(),
        )),
        Err(other) => Err(SolverError::Numerical(other.to_string())),
    }
}

/// Solves the plain [0, 1] relaxation.
pub(crate) fn solve_relaxation(model: &Model) -> Result<Option<Relaxation>, SolverError> {
    let n = model.num_vars();
    solve_bounded(model, &vec![0.0; n], &vec![1.0; n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageConstraint;

    #[test]
    fn test_relaxation_is_fractional_on_odd_cycle() {
        // each pair of a triangle needs one item: LP optimum 1.5, integer optimum 2
        let model = Model::new(
            3,
            vec![
                CoverageConstraint::new("ab", vec![0, 1], 1),
                CoverageConstraint::new("bc", vec![1, 2], 1),
                CoverageConstraint::new("ac", vec![0, 2], 1),
            ],
        );
        let relaxation = solve_relaxation(&model).unwrap().unwrap();
        assert!((relaxation.objective - 1.5).abs() < 1e-6);
        assert!(model.is_feasible(&relaxation.values, 1e-6));
    }

    #[test]
    fn test_relaxation_infeasible() {
        let model = Model::new(2, vec![CoverageConstraint::new("a", vec![0, 1], 3)]);
        assert!(solve_relaxation(&model).unwrap().is_none());
    }

    #[test]
    fn test_bounds_fix_variables() {
        let model = Model::new(3, vec![CoverageConstraint::new("a", vec![0, 1, 2], 2)]);
        let relaxation = solve_bounded(&model, &[1.0, 0.0, 0.0], &[1.0, 0.0, 1.0])
            .unwrap()
            .unwrap();
        assert!((relaxation.values[0] - 1.0).abs() < 1e-6);
        assert!(relaxation.values[1].abs() < 1e-6);
        assert!((relaxation.values[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_model() {
        let model = Model::new(0, Vec::new());
        let relaxation = solve_relaxation(&model).unwrap().unwrap();
        assert_eq!(relaxation.objective, 0.0);
    }

    #[test]
    fn test_bound_length_mismatch() {
        let model = Model::new(2, Vec::new());
        assert!(matches!(
            solve_bounded(&model, &[0.0], &[1.0, 1.0]),
            Err(SolverError::Unsupported(_))
        ));
    }
}
