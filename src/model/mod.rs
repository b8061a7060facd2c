//! Coverage integer program.
//!
//! One binary decision variable per catalog item, one "at least `minimum`"
//! row per required label, and the objective `minimize sum(x)`. Rows hold the
//! ascending item indices they sum over; the constraint reducer relies on
//! that ordering for its merge-scan subset test.

pub mod builder;
pub mod lp_format;
pub mod reduce;

use serde::Serialize;

pub use builder::CoverageModelBuilder;
pub use lp_format::{write_lp, write_lp_file};
pub use reduce::{is_subset, reduce, ReductionReport, RemovedConstraint};

/// A linear lower-bound row: `sum(x[i] for i in indices) >= rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageConstraint {
    /// Label name for coverage rows, `cut_<n>` for cuts.
    pub name: String,
    /// Strictly ascending item indices.
    pub indices: Vec<usize>,
    pub rhs: u32,
}

impl CoverageConstraint {
    /// Creates a row, sorting and deduplicating the indices.
    pub fn new(name: impl Into<String>, mut indices: Vec<usize>, rhs: u32) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self {
            name: name.into(),
            indices,
            rhs,
        }
    }

    /// Left-hand side value under an assignment.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.indices.iter().map(|&i| values[i]).sum()
    }

    /// Whether the row holds under an assignment, within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        self.activity(values) + tolerance >= f64::from(self.rhs)
    }
}

/// The coverage model: variables, coverage rows and any added cuts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Model {
    num_vars: usize,
    constraints: Vec<CoverageConstraint>,
    cuts: Vec<CoverageConstraint>,
}

impl Model {
    pub fn new(num_vars: usize, constraints: Vec<CoverageConstraint>) -> Self {
        Self {
            num_vars,
            constraints,
            cuts: Vec::new(),
        }
    }

    /// Number of decision variables (one per item).
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Coverage rows (one per retained required label).
    pub fn constraints(&self) -> &[CoverageConstraint] {
        &self.constraints
    }

    pub(crate) fn constraints_mut(&mut self) -> &mut Vec<CoverageConstraint> {
        &mut self.constraints
    }

    /// Cut rows added by the relaxation stage.
    pub fn cuts(&self) -> &[CoverageConstraint] {
        &self.cuts
    }

    pub fn add_cut(&mut self, cut: CoverageConstraint) {
        self.cuts.push(cut);
    }

    /// Removes the most recently added cut.
    pub fn pop_cut(&mut self) -> Option<CoverageConstraint> {
        self.cuts.pop()
    }

    /// All rows: coverage first, then cuts.
    pub fn rows(&self) -> impl Iterator<Item = &CoverageConstraint> {
        self.constraints.iter().chain(self.cuts.iter())
    }

    pub fn num_rows(&self) -> usize {
        self.constraints.len() + self.cuts.len()
    }

    /// Objective value: the unweighted sum of all variables.
    pub fn objective(&self, values: &[f64]) -> f64 {
        values.iter().sum()
    }

    /// Whether every row holds under an assignment.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.num_vars
            && self.rows().all(|row| row.is_satisfied(values, tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_sorts_and_dedups() {
        let row = CoverageConstraint::new("cat", vec![3, 1, 3, 0], 2);
        assert_eq!(row.indices, vec![0, 1, 3]);
        assert_eq!(row.rhs, 2);
    }

    #[test]
    fn test_constraint_satisfaction() {
        let row = CoverageConstraint::new("cat", vec![0, 2], 2);
        assert!(row.is_satisfied(&[1.0, 0.0, 1.0], 1e-9));
        assert!(!row.is_satisfied(&[1.0, 1.0, 0.0], 1e-9));
        assert_eq!(row.activity(&[0.5, 1.0, 0.25]), 0.75);
    }

    #[test]
    fn test_model_rows_include_cuts() {
        let mut model = Model::new(3, vec![CoverageConstraint::new("a", vec![0, 1], 1)]);
        model.add_cut(CoverageConstraint::new("cut_1", vec![0, 1, 2], 2));
        assert_eq!(model.num_rows(), 2);
        assert_eq!(model.rows().count(), 2);
        assert!(model.is_feasible(&[1.0, 1.0, 0.0], 1e-9));
        assert!(!model.is_feasible(&[1.0, 0.0, 0.0], 1e-9));
        assert!(!model.is_feasible(&[1.0, 1.0], 1e-9));
    }
}
