//! Removal of dominated coverage constraints.
//!
//! All coverage rows share the same right-hand side. If row B sums over a
//! subset of row A's items, any assignment meeting B's bound also meets A's,
//! so A can be dropped without changing the feasible region.

use serde::Serialize;
use tracing::{debug, info};

use super::{CoverageConstraint, Model};

/// A constraint dropped by the reducer and the retained row that implies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedConstraint {
    pub removed: String,
    pub covered_by: String,
}

/// Outcome of a reduction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReductionReport {
    pub before: usize,
    pub after: usize,
    pub removed: Vec<RemovedConstraint>,
}

impl ReductionReport {
    /// Fraction of constraints removed.
    pub fn reduction_ratio(&self) -> f64 {
        if self.before == 0 {
            return 0.0;
        }
        self.removed.len() as f64 / self.before as f64
    }
}

/// Tests `sub ⊆ sup` for strictly ascending index sequences.
///
/// Walks `sub`, advancing a cursor in `sup` until it reaches or passes each
/// element. Stops at the first element `sup` lacks.
pub fn is_subset(sub: &[usize], sup: &[usize]) -> bool {
    if sub.len() > sup.len() {
        return false;
    }

    let mut cursor = 0;
    for &wanted in sub {
        while cursor < sup.len() && sup[cursor] < wanted {
            cursor += 1;
        }
        if cursor == sup.len() || sup[cursor] != wanted {
            return false;
        }
        cursor += 1;
    }
    true
}

/// Removes every coverage row implied by another retained row.
///
/// Rows are swept once from last to first; a row is dropped as soon as any
/// other still-retained row is a subset of it. Of two identical rows the
/// earlier one survives. Cut rows are left alone.
pub fn reduce(model: &mut Model) -> ReductionReport {
    let constraints = model.constraints_mut();
    let before = constraints.len();
    let mut removed = vec![false; before];
    let mut records = Vec::new();

    for candidate in (0..before).rev() {
        let superset = &constraints[candidate].indices;
        let covering = (0..before).find(|&other| {
            other != candidate
                && !removed[other]
                && is_subset(&constraints[other].indices, superset)
        });

        if let Some(other) = covering {
            removed[candidate] = true;
            debug!(
                removed = %constraints[candidate].name,
                covered_by = %constraints[other].name,
                "Dropped dominated constraint"
            );
            records.push(RemovedConstraint {
                removed: constraints[candidate].name.clone(),
                covered_by: constraints[other].name.clone(),
            });
        }
    }

    let mut flags = removed.into_iter();
    constraints.retain(|_| !flags.next().unwrap_or(false));

    let report = ReductionReport {
        before,
        after: constraints.len(),
        removed: records,
    };
    info!(
        before = report.before,
        after = report.after,
        removed = report.removed.len(),
        "Reduced coverage constraints"
    );
    report
}

/// Names of rows in `rows` that some other row is a subset of.
///
/// Used to check that a reduced model has no remaining domination.
pub fn dominated_rows(rows: &[CoverageConstraint]) -> Vec<&str> {
    rows.iter()
        .enumerate()
        .filter(|(i, row)| {
            rows.iter()
                .enumerate()
                .any(|(j, other)| j != *i && is_subset(&other.indices, &row.indices))
        })
        .map(|(_, row)| row.name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, indices: &[usize]) -> CoverageConstraint {
        CoverageConstraint::new(name, indices.to_vec(), 2)
    }

    #[test]
    fn test_is_subset_basic() {
        assert!(is_subset(&[0, 1], &[0, 1, 2]));
        assert!(is_subset(&[], &[0, 1]));
        assert!(is_subset(&[1, 2], &[1, 2]));
        assert!(!is_subset(&[0, 3], &[0, 1, 2]));
        assert!(!is_subset(&[0, 1, 2], &[0, 1]));
        assert!(!is_subset(&[5], &[]));
    }

    #[test]
    fn test_is_subset_cursor_passes_element() {
        // cursor overshoots 2 when looking for it in [1, 3]
        assert!(!is_subset(&[1, 2], &[1, 3, 4]));
        assert!(is_subset(&[3, 9], &[1, 2, 3, 5, 8, 9]));
    }

    #[test]
    fn test_reduce_removes_superset() {
        let mut model = Model::new(3, vec![row("x", &[0, 1, 2]), row("y", &[0, 1])]);
        let report = reduce(&mut model);

        assert_eq!(report.before, 2);
        assert_eq!(report.after, 1);
        assert_eq!(model.constraints()[0].name, "y");
        assert_eq!(
            report.removed,
            vec![RemovedConstraint {
                removed: "x".to_string(),
                covered_by: "y".to_string(),
            }]
        );
    }

    #[test]
    fn test_reduce_keeps_incomparable_rows() {
        let mut model = Model::new(3, vec![row("cat", &[0, 1]), row("dog", &[0, 2])]);
        let report = reduce(&mut model);
        assert!(report.removed.is_empty());
        assert_eq!(model.constraints().len(), 2);
    }

    #[test]
    fn test_reduce_identical_rows_keep_one() {
        let mut model = Model::new(
            4,
            vec![row("a", &[1, 2]), row("b", &[1, 2]), row("c", &[1, 2])],
        );
        let report = reduce(&mut model);
        assert_eq!(model.constraints().len(), 1);
        assert_eq!(model.constraints()[0].name, "a");
        assert_eq!(report.removed.len(), 2);
    }

    #[test]
    fn test_reduce_chain() {
        let mut model = Model::new(
            5,
            vec![
                row("small", &[0]),
                row("mid", &[0, 1, 2]),
                row("large", &[0, 1, 2, 3, 4]),
                row("other", &[3, 4]),
            ],
        );
        reduce(&mut model);
        let names: Vec<_> = model.constraints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["small", "other"]);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let mut model = Model::new(
            6,
            vec![
                row("a", &[0, 1, 2, 3]),
                row("b", &[1, 2]),
                row("c", &[2, 3, 4]),
                row("d", &[2, 3, 4, 5]),
                row("e", &[0, 5]),
            ],
        );
        reduce(&mut model);
        let second = reduce(&mut model);
        assert!(second.removed.is_empty());
        assert!(dominated_rows(model.constraints()).is_empty());
    }

    #[test]
    fn test_reduce_every_dominated_row_removed() {
        let rows = vec![
            row("a", &[0, 1, 2, 3]),
            row("b", &[1, 2]),
            row("c", &[2, 3, 4]),
            row("d", &[2, 3, 4, 5]),
            row("e", &[0, 5]),
        ];
        let dominated: Vec<String> = dominated_rows(&rows)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut model = Model::new(6, rows);
        reduce(&mut model);
        for name in dominated {
            assert!(model.constraints().iter().all(|c| c.name != name));
        }
    }

    #[test]
    fn test_reduce_leaves_cuts() {
        let mut model = Model::new(3, vec![row("x", &[0, 1, 2]), row("y", &[0, 1])]);
        model.add_cut(row("cut_1", &[0, 1, 2]));
        reduce(&mut model);
        assert_eq!(model.cuts().len(), 1);
    }

    #[test]
    fn test_reduction_ratio() {
        let report = ReductionReport {
            before: 4,
            after: 3,
            removed: vec![RemovedConstraint {
                removed: "a".to_string(),
                covered_by: "b".to_string(),
            }],
        };
        assert!((report.reduction_ratio() - 0.25).abs() < 1e-12);
        assert_eq!(ReductionReport::default().reduction_ratio(), 0.0);
    }
}
