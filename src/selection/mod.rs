//! Mapping a solver assignment back to catalog items.

pub mod export;

use serde::Serialize;

use crate::catalog::{Catalog, Item};
use crate::solver::Solution;

pub use export::{materialize, write_selection, MaterializeReport};

/// Values at or below this count as "not selected".
pub const SELECTION_TOLERANCE: f64 = 1e-6;

/// Indices of items whose decision value is positive, in catalog order.
pub fn selected_indices(values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > SELECTION_TOLERANCE)
        .map(|(i, _)| i)
        .collect()
}

/// The selected items of a solution, in catalog order.
///
/// Solutions without an assignment select nothing.
pub fn extract<'a>(catalog: &'a Catalog, solution: &Solution) -> Vec<&'a Item> {
    selected_indices(&solution.values)
        .into_iter()
        .filter_map(|i| catalog.item(i))
        .collect()
}

/// A required label covered fewer than `minimum` times by a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageShortfall {
    pub label: String,
    pub covered: usize,
    pub required: u32,
}

/// Re-counts coverage of each required label over the selected items.
///
/// Returns every label that falls short of `minimum`.
pub fn audit_coverage(
    selected: &[&Item],
    required_labels: &[String],
    minimum: u32,
) -> Vec<CoverageShortfall> {
    required_labels
        .iter()
        .filter_map(|label| {
            let covered = selected.iter().filter(|item| item.has_label(label)).count();
            (covered < minimum as usize).then(|| CoverageShortfall {
                label: label.clone(),
                covered,
                required: minimum,
            })
        })
        .collect()
}
